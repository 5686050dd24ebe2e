//! Optimization controller.
//!
//! Orchestrates one run: validates the configuration, seeds the random
//! source, builds the evaluation pool, dispatches to the configured
//! [`SearchEngine`], and packages the best schedule with its fitness
//! report, KPIs, and per-generation trace.
//!
//! # Usage
//!
//! ```
//! use u_construct::config::OptimizerConfig;
//! use u_construct::controller::optimize;
//! use u_construct::models::{Resource, ResourceKind, Task};
//!
//! let tasks = vec![
//!     Task::new("EXCAVATE", 3).requires("DIGGER", ResourceKind::Equipment, 1),
//!     Task::new("POUR", 2)
//!         .with_predecessor("EXCAVATE")
//!         .requires("CREW", ResourceKind::Labor, 2),
//! ];
//! let resources = vec![
//!     Resource::equipment("DIGGER"),
//!     Resource::labor("CREW").with_capacity(4),
//! ];
//! let config = OptimizerConfig {
//!     population_size: 10,
//!     generations: 5,
//!     ..OptimizerConfig::default()
//! };
//! let result = optimize(tasks, resources, vec![], config).unwrap();
//! assert_eq!(result.report.makespan, 5);
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{OptimizerConfig, SearchMode};
use crate::encoding::ScheduleGenome;
use crate::error::{ConfigurationError, InfeasibleProblemError, OptimizeError};
use crate::fitness::{FitnessReport, ProjectKpi};
use crate::ga::GeneticSearch;
use crate::models::{Constraint, ProblemModel, Resource, Schedule, Task};
use crate::rl::PolicySearch;
use crate::search::{CancelToken, GenerationStats, SearchContext, SearchEngine};

/// Final product of a run.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Best schedule found.
    pub schedule: Schedule,
    /// Its fitness report.
    pub report: FitnessReport,
    /// Reporting metrics for the best schedule.
    pub kpi: ProjectKpi,
    /// Per-generation diagnostics (entry 0 = initial generation).
    pub trace: Vec<GenerationStats>,
    /// Generations run after the initial one.
    pub generations: usize,
    /// Engine that produced the result.
    pub search_mode: SearchMode,
    /// Whether the run stopped on a cancellation request.
    pub cancelled: bool,
    /// Genome of the best schedule.
    #[serde(skip)]
    pub genome: ScheduleGenome,
}

/// Runs optimizations with one configuration.
///
/// Holds no run state between calls; concurrent runs on separate
/// controllers (or the same one) do not interfere.
#[derive(Debug, Clone)]
pub struct OptimizationController {
    config: OptimizerConfig,
    cancel: CancelToken,
}

impl OptimizationController {
    /// Creates a controller.
    ///
    /// # Errors
    /// The first out-of-range configuration option.
    pub fn new(config: OptimizerConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Token that cancels runs of this controller at the next generation
    /// boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Optimizes a validated problem.
    ///
    /// # Errors
    /// [`OptimizeError::Infeasible`] when no evaluated candidate is free of
    /// structural violations and the best penalty exceeds
    /// `acceptable_penalty`. When the best-scoring schedule is
    /// structurally infeasible but a feasible one was found, the feasible
    /// one is returned. A cancelled run always returns `Ok`.
    pub fn run(&self, problem: &ProblemModel) -> Result<OptimizationResult, OptimizeError> {
        let cfg = &self.config;
        info!(
            tasks = problem.task_count(),
            resources = problem.resources().len(),
            mode = ?cfg.search_mode,
            seed = cfg.seed,
            "optimization started"
        );

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.workers)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, evaluating inline");
                None
            }
        };
        let ctx = SearchContext {
            config: cfg,
            evaluator: cfg.evaluator(),
            cancel: self.cancel.clone(),
            pool: pool.as_ref(),
        };

        let engine: &dyn SearchEngine = match cfg.search_mode {
            SearchMode::Genetic => &GeneticSearch,
            SearchMode::Reinforcement => &PolicySearch,
        };
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let outcome = engine.run(problem, &ctx, &mut rng);

        let generations = outcome.trace.len().saturating_sub(1);
        let package = |genome: ScheduleGenome, schedule: Schedule, report: FitnessReport| {
            OptimizationResult {
                kpi: ProjectKpi::calculate(&schedule, problem),
                schedule,
                report,
                trace: outcome.trace.clone(),
                generations,
                search_mode: cfg.search_mode,
                cancelled: outcome.cancelled,
                genome,
            }
        };

        if outcome.cancelled {
            warn!(
                engine = engine.name(),
                generations,
                score = outcome.report.score,
                "optimization cancelled, returning best so far"
            );
            return Ok(package(outcome.best, outcome.schedule, outcome.report));
        }

        let acceptable = outcome.report.is_feasible()
            || outcome.report.penalty <= cfg.acceptable_penalty;
        let result = match (acceptable, outcome.feasible) {
            (true, _) => package(outcome.best, outcome.schedule, outcome.report),
            (false, Some(candidate)) => {
                info!(
                    engine = engine.name(),
                    best_penalty = outcome.report.penalty,
                    feasible_penalty = candidate.report.penalty,
                    "best score violates hard constraints, returning best feasible schedule"
                );
                package(candidate.genome, candidate.schedule, candidate.report)
            }
            (false, None) => {
                let best = package(outcome.best, outcome.schedule, outcome.report);
                warn!(
                    engine = engine.name(),
                    penalty = best.report.penalty,
                    overloaded = best.report.overloaded_slices,
                    precedence = best.report.precedence_violations,
                    "no acceptable schedule within budget"
                );
                return Err(InfeasibleProblemError {
                    best: Box::new(best),
                    acceptable_penalty: cfg.acceptable_penalty,
                }
                .into());
            }
        };

        info!(
            engine = engine.name(),
            generations = result.generations,
            makespan = result.report.makespan,
            cost = result.report.cost,
            emissions = result.report.emissions,
            score = result.report.score,
            "optimization finished"
        );
        Ok(result)
    }
}

/// Loads the problem, validates the configuration, and runs one
/// optimization.
///
/// # Errors
/// - [`OptimizeError::Validation`] for malformed or cyclic input
/// - [`OptimizeError::Configuration`] for an out-of-range option
/// - [`OptimizeError::Infeasible`] as in [`OptimizationController::run`]
pub fn optimize(
    tasks: Vec<Task>,
    resources: Vec<Resource>,
    constraints: Vec<Constraint>,
    config: OptimizerConfig,
) -> Result<OptimizationResult, OptimizeError> {
    let problem = ProblemModel::load(tasks, resources, constraints)?;
    OptimizationController::new(config)?.run(&problem)
}
