//! Shared search-engine contract.
//!
//! Both engines implement [`SearchEngine`] and report through the same
//! types: one [`GenerationStats`] per generation and a final
//! [`SearchOutcome`]. Run-scoped state (random source, generation counter,
//! worker pool) lives in the caller, never in globals, so independent runs
//! can proceed side by side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::OptimizerConfig;
use crate::encoding::{decode, ScheduleGenome};
use crate::fitness::{FitnessEvaluator, FitnessReport};
use crate::models::{ProblemModel, Schedule};

/// Cooperative cancellation flag, checked at generation boundaries.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Diagnostics for one generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationStats {
    /// Generation number (0 = initial population).
    pub generation: usize,
    /// Best score found so far.
    pub best_score: f64,
    /// Mean score of this generation's candidates.
    pub mean_score: f64,
    /// Penalty of the best-so-far candidate.
    pub best_penalty: f64,
    /// Consecutive generations without improvement.
    pub stagnation: usize,
}

/// Everything an engine hands back to the controller.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Best genome found.
    pub best: ScheduleGenome,
    /// Its decoded schedule.
    pub schedule: Schedule,
    /// Its fitness report.
    pub report: FitnessReport,
    /// Per-generation diagnostics.
    pub trace: Vec<GenerationStats>,
    /// Whether the run stopped on a cancellation request.
    pub cancelled: bool,
    /// Lowest-scoring candidate without structural violations, if any was
    /// evaluated. Differs from `best` when soft penalties rank an
    /// overloaded schedule first.
    pub feasible: Option<FeasibleCandidate>,
}

/// A scored candidate with no overload and no precedence violation.
#[derive(Debug, Clone)]
pub struct FeasibleCandidate {
    /// Its genome, with `fitness` set.
    pub genome: ScheduleGenome,
    /// Its decoded schedule.
    pub schedule: Schedule,
    /// Its fitness report.
    pub report: FitnessReport,
}

/// Per-run inputs shared by every engine.
pub struct SearchContext<'a> {
    /// Run configuration (already validated).
    pub config: &'a OptimizerConfig,
    /// Scoring function.
    pub evaluator: FitnessEvaluator,
    /// Cancellation flag.
    pub cancel: CancelToken,
    /// Worker pool for parallel evaluation; `None` evaluates inline.
    pub pool: Option<&'a rayon::ThreadPool>,
}

impl SearchContext<'_> {
    /// Decodes and scores a genome.
    ///
    /// Structurally broken genomes get a degenerate (maximal) score.
    pub fn score(&self, genome: &ScheduleGenome, problem: &ProblemModel) -> (Schedule, FitnessReport) {
        if !genome.is_valid(problem) {
            return (Schedule::new(), FitnessReport::degenerate());
        }
        let schedule = decode(genome, problem);
        let report = self.evaluator.evaluate(&schedule, problem);
        (schedule, report)
    }

    /// Scores every genome, in parallel when a pool is available.
    ///
    /// Results land in each genome's `fitness`; order is preserved, so the
    /// outcome does not depend on the number of workers. Returns the
    /// structural feasibility of each genome.
    pub fn evaluate_all(&self, genomes: &mut [ScheduleGenome], problem: &ProblemModel) -> Vec<bool> {
        let eval = |g: &mut ScheduleGenome| {
            let report = self.score(g, problem).1;
            g.fitness = report.score;
            report.is_feasible()
        };
        match self.pool {
            Some(pool) => pool.install(|| genomes.par_iter_mut().map(eval).collect()),
            None => genomes.iter_mut().map(eval).collect(),
        }
    }

    /// Replaces `kept` with the lowest-scoring feasible genome of
    /// `genomes` when that one scores strictly lower.
    ///
    /// `feasible[i]` flags `genomes[i]`; ties go to the lowest index.
    pub fn keep_feasible(
        &self,
        kept: &mut Option<FeasibleCandidate>,
        genomes: &[ScheduleGenome],
        feasible: &[bool],
        problem: &ProblemModel,
    ) {
        let candidate = genomes
            .iter()
            .zip(feasible)
            .enumerate()
            .filter(|&(_, (_, &ok))| ok)
            .min_by(|(i, (a, _)), (j, (b, _))| a.fitness.total_cmp(&b.fitness).then(i.cmp(j)))
            .map(|(_, (g, _))| g);
        let Some(genome) = candidate else {
            return;
        };
        if kept.as_ref().map_or(false, |k| k.report.score <= genome.fitness) {
            return;
        }
        let (schedule, report) = self.score(genome, problem);
        let mut genome = genome.clone();
        genome.fitness = report.score;
        *kept = Some(FeasibleCandidate {
            genome,
            schedule,
            report,
        });
    }

    /// Decodes and scores every genome, keeping schedules and reports.
    pub fn score_all(
        &self,
        genomes: &[ScheduleGenome],
        problem: &ProblemModel,
    ) -> Vec<(Schedule, FitnessReport)> {
        match self.pool {
            Some(pool) => pool.install(|| genomes.par_iter().map(|g| self.score(g, problem)).collect()),
            None => genomes.iter().map(|g| self.score(g, problem)).collect(),
        }
    }
}

/// A search strategy over schedule genomes.
pub trait SearchEngine {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Runs the search to termination or cancellation.
    fn run(&self, problem: &ProblemModel, ctx: &SearchContext<'_>, rng: &mut StdRng) -> SearchOutcome;
}

/// Best-score tracker implementing the stagnation rule.
#[derive(Debug, Clone)]
pub struct StagnationTracker {
    best: f64,
    stale: usize,
    limit: usize,
    epsilon: f64,
}

impl StagnationTracker {
    /// `limit = 0` disables stagnation stopping.
    pub fn new(limit: usize, epsilon: f64) -> Self {
        Self {
            best: f64::INFINITY,
            stale: 0,
            limit,
            epsilon,
        }
    }

    /// Records a generation's best-so-far score.
    pub fn observe(&mut self, best: f64) {
        if self.best.is_infinite() || self.best - best > self.epsilon {
            self.stale = 0;
        } else {
            self.stale += 1;
        }
        self.best = self.best.min(best);
    }

    /// Consecutive generations without improvement.
    pub fn stale(&self) -> usize {
        self.stale
    }

    /// Whether the stagnation limit is reached.
    pub fn is_stagnant(&self) -> bool {
        self.limit > 0 && self.stale >= self.limit
    }
}

/// Mean of finite scores; `f64::MAX` if there are none.
pub(crate) fn mean_score(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores
        .filter(|s| s.is_finite() && *s < f64::MAX)
        .fold((0.0, 0usize), |(s, c), x| (s + x, c + 1));
    if count == 0 {
        f64::MAX
    } else {
        sum / count as f64
    }
}
