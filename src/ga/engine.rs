//! Generational genetic algorithm.
//!
//! ```text
//! Initialize → Evaluate → { Select, Crossover, Mutate, Repair } → Evaluate
//!            → CheckTermination → loop | Terminate
//! ```
//!
//! - Initial population: one critical-path seed, then alternating
//!   load-balanced and fully random genomes.
//! - Elitism: the best genome is copied unchanged to slot 0 of the next
//!   generation, so the best score never increases.
//! - Offspring are repaired before evaluation, keeping every evaluated
//!   order topological.
//!
//! # Reference
//! Goldberg (1989), "Genetic Algorithms in Search, Optimization, and
//! Machine Learning"; Hartmann (1998) for the RCPSP adaptation

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::operators::{tournament_select, GeneticOperators};
use crate::encoding::ScheduleGenome;
use crate::models::ProblemModel;
use crate::search::{
    mean_score, GenerationStats, SearchContext, SearchEngine, SearchOutcome, StagnationTracker,
};

/// Genetic-algorithm search engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneticSearch;

impl SearchEngine for GeneticSearch {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn run(&self, problem: &ProblemModel, ctx: &SearchContext<'_>, rng: &mut StdRng) -> SearchOutcome {
        let cfg = ctx.config;
        let ops = cfg.operators();

        let mut population = initial_population(problem, cfg.population_size, rng);
        let flags = ctx.evaluate_all(&mut population, problem);
        let mut feasible = None;
        ctx.keep_feasible(&mut feasible, &population, &flags, problem);

        let mut best = population[best_index(&population)].clone();
        let mut best_penalty = ctx.score(&best, problem).1.penalty;
        let mut tracker = StagnationTracker::new(cfg.stagnation_limit, cfg.stagnation_epsilon);
        tracker.observe(best.fitness);

        let mut trace = vec![GenerationStats {
            generation: 0,
            best_score: best.fitness,
            mean_score: mean_score(population.iter().map(|g| g.fitness)),
            best_penalty,
            stagnation: tracker.stale(),
        }];

        let mut cancelled = false;
        for generation in 1..=cfg.generations {
            if ctx.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if tracker.is_stagnant() {
                debug!(generation, stale = tracker.stale(), "stagnation limit reached");
                break;
            }

            population = breed(&population, problem, &ops, cfg.crossover_rate, cfg.tournament_size, rng);
            // Slot 0 is the elite and keeps its score.
            let flags = ctx.evaluate_all(&mut population[1..], problem);
            ctx.keep_feasible(&mut feasible, &population[1..], &flags, problem);

            let gen_best = &population[best_index(&population)];
            if gen_best.fitness < best.fitness {
                best = gen_best.clone();
                best_penalty = ctx.score(&best, problem).1.penalty;
            }
            tracker.observe(best.fitness);

            let stats = GenerationStats {
                generation,
                best_score: best.fitness,
                mean_score: mean_score(population.iter().map(|g| g.fitness)),
                best_penalty,
                stagnation: tracker.stale(),
            };
            debug!(
                generation,
                best = stats.best_score,
                mean = stats.mean_score,
                stale = stats.stagnation,
                "generation complete"
            );
            trace.push(stats);
        }

        let (schedule, report) = ctx.score(&best, problem);
        SearchOutcome {
            best,
            schedule,
            report,
            trace,
            cancelled,
            feasible,
        }
    }
}

/// Seed, then alternating load-balanced and random genomes.
pub(crate) fn initial_population<R: Rng>(
    problem: &ProblemModel,
    size: usize,
    rng: &mut R,
) -> Vec<ScheduleGenome> {
    let mut population = Vec::with_capacity(size);
    population.push(ScheduleGenome::critical_path_seed(problem));
    for i in 1..size {
        let g = if i % 2 == 1 {
            ScheduleGenome::with_load_balancing(problem, rng)
        } else {
            ScheduleGenome::random(problem, rng)
        };
        population.push(g);
    }
    population
}

/// Index of the lowest score; ties go to the lowest index.
pub(crate) fn best_index(population: &[ScheduleGenome]) -> usize {
    population
        .iter()
        .enumerate()
        .min_by(|(i, a), (j, b)| a.fitness.total_cmp(&b.fitness).then(i.cmp(j)))
        .map_or(0, |(i, _)| i)
}

/// Builds the next generation: elite first, then repaired offspring.
fn breed<R: Rng>(
    population: &[ScheduleGenome],
    problem: &ProblemModel,
    ops: &GeneticOperators,
    crossover_rate: f64,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<ScheduleGenome> {
    let n = population.len();
    let scores: Vec<f64> = population.iter().map(|g| g.fitness).collect();

    let mut next = Vec::with_capacity(n);
    next.push(population[best_index(population)].clone());

    while next.len() < n {
        let a = &population[tournament_select(&scores, tournament_size, rng)];
        let b = &population[tournament_select(&scores, tournament_size, rng)];
        let (c1, c2) = if rng.random_bool(crossover_rate) {
            ops.crossover(a, b, rng)
        } else {
            (a.clone(), b.clone())
        };
        for mut child in [c1, c2] {
            if next.len() == n {
                break;
            }
            ops.mutate(&mut child, problem, rng);
            child.repair_in_place(problem);
            next.push(child);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::models::{Resource, ResourceDemand, ResourceKind, Task};
    use crate::search::CancelToken;
    use rand::SeedableRng;

    /// Eight tasks in two chains sharing two crews of different speed.
    fn problem() -> ProblemModel {
        let mut tasks = Vec::new();
        for chain in ["A", "B"] {
            for i in 0..4 {
                let mut t = Task::new(format!("{chain}{i}"), 2 + i as i64)
                    .with_demand(ResourceDemand::new(ResourceKind::Labor, 1));
                if i > 0 {
                    t = t.with_predecessor(format!("{chain}{}", i - 1));
                }
                tasks.push(t);
            }
        }
        let resources = vec![
            Resource::labor("SLOW").with_unit_cost(80.0),
            Resource::labor("FAST").with_efficiency(2.0).with_unit_cost(200.0),
        ];
        ProblemModel::load(tasks, resources, vec![]).expect("valid")
    }

    fn run(config: &OptimizerConfig, cancel: CancelToken) -> SearchOutcome {
        let p = problem();
        let ctx = SearchContext {
            config,
            evaluator: config.evaluator(),
            cancel,
            pool: None,
        };
        let mut rng = StdRng::seed_from_u64(config.seed);
        GeneticSearch.run(&p, &ctx, &mut rng)
    }

    fn small_config() -> OptimizerConfig {
        OptimizerConfig {
            population_size: 16,
            generations: 30,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn test_initial_population_valid() {
        let p = problem();
        let mut rng = StdRng::seed_from_u64(1);
        let pop = initial_population(&p, 10, &mut rng);
        assert_eq!(pop.len(), 10);
        assert!(pop.iter().all(|g| g.is_valid(&p) && g.is_topological(&p)));
    }

    #[test]
    fn test_best_index_tie_lowest() {
        let mk = |f: f64| ScheduleGenome {
            order: vec![],
            assignment: vec![],
            fitness: f,
        };
        assert_eq!(best_index(&[mk(3.0), mk(1.0), mk(1.0)]), 1);
    }

    #[test]
    fn test_elitism_never_regresses() {
        let out = run(&small_config(), CancelToken::new());
        assert!(out.trace.len() >= 2);
        for w in out.trace.windows(2) {
            assert!(w[1].best_score <= w[0].best_score);
        }
        assert_eq!(out.trace[0].generation, 0);
    }

    #[test]
    fn test_result_is_feasible_and_topological() {
        let p = problem();
        let out = run(&small_config(), CancelToken::new());
        assert!(out.best.is_topological(&p));
        assert!(out.report.is_feasible());
        assert_eq!(out.schedule.assignment_count(), 8);
        assert!((out.report.score - out.best.fitness).abs() < 1e-12);
        // The best is feasible, so it is also the kept feasible candidate.
        let kept = out.feasible.expect("feasible candidate");
        assert_eq!(kept.report.score, out.report.score);
    }

    #[test]
    fn test_deterministic() {
        let a = run(&small_config(), CancelToken::new());
        let b = run(&small_config(), CancelToken::new());
        assert_eq!(a.best, b.best);
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn test_cancel_stops_after_initial_generation() {
        let token = CancelToken::new();
        token.cancel();
        let out = run(&small_config(), token);
        assert!(out.cancelled);
        assert_eq!(out.trace.len(), 1);
        assert_eq!(out.schedule.assignment_count(), 8);
    }

    #[test]
    fn test_generation_limit() {
        let cfg = OptimizerConfig {
            generations: 3,
            stagnation_limit: 0,
            ..small_config()
        };
        let out = run(&cfg, CancelToken::new());
        assert_eq!(out.trace.len(), 4);
    }

    #[test]
    fn test_precedence_crossover_variant() {
        let cfg = OptimizerConfig {
            crossover: crate::ga::CrossoverType::Precedence,
            mutation: crate::ga::MutationType::Invert,
            ..small_config()
        };
        let p = problem();
        let out = run(&cfg, CancelToken::new());
        assert!(out.best.is_topological(&p));
        for w in out.trace.windows(2) {
            assert!(w[1].best_score <= w[0].best_score);
        }
    }
}
