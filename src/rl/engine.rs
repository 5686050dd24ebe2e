//! Policy-gradient construction search.
//!
//! An agent builds a schedule one decision at a time: pick the next task
//! among those whose predecessors are placed, then pick a resource for
//! each of its demands. The finished sequence is a topological
//! [`ScheduleGenome`] scored by the same decoder and evaluator as the GA.
//!
//! # Rewards
//!
//! For the task placed at step `k` (in decode order):
//!
//! ```text
//! r_k = −( w_time · Δmakespan_k / M₀
//!        + w_cost · cost_k / C₀
//!        + w_em · emissions_k / E₀
//!        + penalty_k )
//! ```
//!
//! where `penalty_k` is the share of the penalty caused by that placement
//! ([`FitnessEvaluator::penalty_shares`]), so `Σ r_k = −score`. The last step also receives the terminal bonus
//! `makespan_bonus · M₀ / makespan`.
//!
//! One generation is a batch of `population_size` episodes; the policy is
//! updated after the batch with discounted returns minus a per-step
//! running-mean baseline.

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use super::policy::Policy;
use crate::encoding::ScheduleGenome;
use crate::fitness::{FitnessEvaluator, FitnessReport};
use crate::models::{ProblemModel, Schedule};
use crate::search::{
    mean_score, GenerationStats, SearchContext, SearchEngine, SearchOutcome, StagnationTracker,
};

/// Advantages are clipped to `±ADVANTAGE_CLIP`.
const ADVANTAGE_CLIP: f64 = 10.0;

/// Reinforcement-learning search engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicySearch;

/// One task decision of an episode.
#[derive(Debug, Clone)]
struct Step {
    prev: Option<usize>,
    ready: Vec<usize>,
    chosen: usize,
    task: usize,
}

#[derive(Debug, Clone)]
struct Episode {
    genome: ScheduleGenome,
    steps: Vec<Step>,
}

/// Running mean of returns per step index.
#[derive(Debug, Clone)]
struct Baseline {
    mean: Vec<f64>,
    count: Vec<usize>,
}

impl Baseline {
    fn new(n: usize) -> Self {
        Self {
            mean: vec![0.0; n],
            count: vec![0; n],
        }
    }

    /// Advantage of `ret` at step `k`, then folds `ret` into the mean.
    ///
    /// The first observation at a step has zero advantage.
    fn advantage(&mut self, k: usize, ret: f64) -> f64 {
        let adv = if self.count[k] == 0 {
            0.0
        } else {
            ret - self.mean[k]
        };
        self.count[k] += 1;
        self.mean[k] += (ret - self.mean[k]) / self.count[k] as f64;
        adv.clamp(-ADVANTAGE_CLIP, ADVANTAGE_CLIP)
    }
}

impl SearchEngine for PolicySearch {
    fn name(&self) -> &'static str {
        "reinforcement"
    }

    fn run(&self, problem: &ProblemModel, ctx: &SearchContext<'_>, rng: &mut StdRng) -> SearchOutcome {
        let cfg = ctx.config;
        let n = problem.task_count();
        let mut policy = Policy::new(problem);
        let mut baseline = Baseline::new(n);
        let mut tracker = StagnationTracker::new(cfg.stagnation_limit, cfg.stagnation_epsilon);

        let mut best: Option<(ScheduleGenome, Schedule, FitnessReport)> = None;
        let mut feasible = None;
        let mut trace = Vec::new();
        let mut cancelled = false;

        for generation in 0..=cfg.generations {
            if generation > 0 {
                if ctx.cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                if tracker.is_stagnant() {
                    debug!(generation, stale = tracker.stale(), "stagnation limit reached");
                    break;
                }
            }

            let episodes: Vec<Episode> = (0..cfg.population_size)
                .map(|_| rollout(&policy, problem, rng))
                .collect();
            let mut genomes: Vec<ScheduleGenome> = episodes.iter().map(|e| e.genome.clone()).collect();
            let scored = ctx.score_all(&genomes, problem);
            for (g, (_, report)) in genomes.iter_mut().zip(&scored) {
                g.fitness = report.score;
            }
            let flags: Vec<bool> = scored.iter().map(|(_, r)| r.is_feasible()).collect();
            ctx.keep_feasible(&mut feasible, &genomes, &flags, problem);

            for (episode, (schedule, report)) in episodes.iter().zip(&scored) {
                let rewards = step_rewards(schedule, report, problem, &ctx.evaluator, cfg.makespan_bonus);
                let mut ret = 0.0;
                let mut returns = vec![0.0; rewards.len()];
                for k in (0..rewards.len()).rev() {
                    ret = rewards[k] + cfg.discount * ret;
                    returns[k] = ret;
                }
                for (k, (step, &g)) in episode.steps.iter().zip(&returns).enumerate() {
                    let step_size = cfg.learning_rate * baseline.advantage(k, g);
                    if step_size == 0.0 {
                        continue;
                    }
                    policy.update_task(step.prev, &step.ready, step.chosen, step_size);
                    for (d, &c) in episode.genome.assignment[step.task].iter().enumerate() {
                        if problem.demands(step.task)[d].candidates.len() > 1 {
                            policy.update_resource(step.task, d, c, step_size);
                        }
                    }
                }
            }

            let batch_best = scored
                .iter()
                .enumerate()
                .min_by(|(i, a), (j, b)| a.1.score.total_cmp(&b.1.score).then(i.cmp(j)))
                .map(|(i, _)| i);
            if let Some(i) = batch_best {
                let (schedule, report) = &scored[i];
                if best.as_ref().map_or(true, |(_, _, r)| report.score < r.score) {
                    let mut genome = episodes[i].genome.clone();
                    genome.fitness = report.score;
                    best = Some((genome, schedule.clone(), report.clone()));
                }
            }

            let (best_score, best_penalty) = best
                .as_ref()
                .map_or((f64::MAX, f64::MAX), |(_, _, r)| (r.score, r.penalty));
            tracker.observe(best_score);
            let stats = GenerationStats {
                generation,
                best_score,
                mean_score: mean_score(scored.iter().map(|(_, r)| r.score)),
                best_penalty,
                stagnation: tracker.stale(),
            };
            debug!(
                generation,
                best = stats.best_score,
                mean = stats.mean_score,
                stale = stats.stagnation,
                "batch complete"
            );
            trace.push(stats);
        }

        let (best, schedule, report) = match best {
            Some(b) => b,
            None => {
                // Only reachable with an empty batch.
                let genome = ScheduleGenome::critical_path_seed(problem);
                let (schedule, report) = ctx.score(&genome, problem);
                (genome, schedule, report)
            }
        };
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

/// Builds one genome by sampling the policy.
fn rollout<R: Rng>(policy: &Policy, problem: &ProblemModel, rng: &mut R) -> Episode {
    let n = problem.task_count();
    let mut remaining: Vec<usize> = (0..n).map(|t| problem.predecessors(t).len()).collect();
    let mut ready: Vec<usize> = (0..n).filter(|&t| remaining[t] == 0).collect();
    let mut order = Vec::with_capacity(n);
    let mut assignment = vec![Vec::new(); n];
    let mut steps = Vec::with_capacity(n);
    let mut prev = None;

    while !ready.is_empty() {
        let pos = policy.sample_task(prev, &ready, rng);
        let t = ready[pos];
        steps.push(Step {
            prev,
            ready: ready.clone(),
            chosen: pos,
            task: t,
        });
        ready.remove(pos);
        order.push(t);
        assignment[t] = (0..problem.demands(t).len())
            .map(|d| policy.sample_resource(t, d, rng))
            .collect();
        for &s in problem.successors(t) {
            remaining[s] -= 1;
            if remaining[s] == 0 {
                ready.push(s);
            }
        }
        prev = Some(t);
    }

    Episode {
        genome: ScheduleGenome {
            order,
            assignment,
            fitness: f64::INFINITY,
        },
        steps,
    }
}

/// Per-step rewards for a decoded episode (see module docs).
fn step_rewards(
    schedule: &Schedule,
    report: &FitnessReport,
    problem: &ProblemModel,
    evaluator: &FitnessEvaluator,
    makespan_bonus: f64,
) -> Vec<f64> {
    let n = schedule.assignments.len();
    if n == 0 {
        return Vec::new();
    }
    let w = evaluator.weights();
    let scales = problem.reference_scales();
    let resources = problem.resources();
    let penalties = if report.penalty < f64::MAX {
        evaluator.penalty_shares(schedule, problem)
    } else {
        vec![f64::MAX / 2.0 / n as f64; n]
    };

    let mut running = 0i64;
    let mut rewards: Vec<f64> = schedule
        .assignments
        .iter()
        .zip(penalties)
        .map(|(a, penalty)| {
            let duration = a.duration() as f64;
            let (cost, emissions) = a
                .resources
                .iter()
                .filter_map(|u| resources.get(u.resource_index).map(|r| (u.quantity as f64, r)))
                .fold((0.0, 0.0), |(c, e), (qty, r)| {
                    (
                        c + qty * r.unit_cost * duration,
                        e + qty * r.emission_factor * duration,
                    )
                });
            let grown = (a.finish - running).max(0);
            running = running.max(a.finish);
            -(w.time * grown as f64 / scales.makespan
                + w.cost * cost / scales.cost
                + w.emissions * emissions / scales.emissions
                + penalty)
        })
        .collect();

    let makespan = schedule.makespan().max(1) as f64;
    if let Some(last) = rewards.last_mut() {
        *last += makespan_bonus * scales.makespan / makespan;
    }
    rewards
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::models::{Resource, ResourceDemand, ResourceKind, Task};
    use crate::search::CancelToken;
    use rand::SeedableRng;

    fn uses_of(schedule: &Schedule, task_id: &str) -> Vec<(usize, i64)> {
        schedule
            .assignment_for_task(task_id)
            .map(|a| a.resources.iter().map(|u| (u.resource_index, u.quantity)).collect())
            .unwrap_or_default()
    }

    fn problem() -> ProblemModel {
        let tasks = vec![
            Task::new("A", 4).with_demand(ResourceDemand::new(ResourceKind::Equipment, 1)),
            Task::new("B", 2).with_predecessor("A"),
            Task::new("C", 3).with_demand(ResourceDemand::new(ResourceKind::Equipment, 1)),
        ];
        let resources = vec![
            Resource::equipment("DIESEL").with_emission_factor(80.0),
            Resource::equipment("ELECTRIC").with_emission_factor(5.0),
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
        PolicySearch.run(&p, &ctx, &mut rng)
    }

    fn small_config() -> OptimizerConfig {
        OptimizerConfig {
            population_size: 10,
            generations: 20,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn test_rollout_is_topological() {
        let p = problem();
        let policy = Policy::new(&p);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..30 {
            let e = rollout(&policy, &p, &mut rng);
            assert!(e.genome.is_valid(&p));
            assert!(e.genome.is_topological(&p));
            assert_eq!(e.steps.len(), 3);
            assert!(e.genome.assignment[1].is_empty());
        }
    }

    #[test]
    fn test_rewards_sum_to_negative_score() {
        let p = problem();
        let config = OptimizerConfig::default();
        let ctx = SearchContext {
            config: &config,
            evaluator: config.evaluator(),
            cancel: CancelToken::new(),
            pool: None,
        };
        let genome = ScheduleGenome::random_init(&p, 4);
        let (schedule, report) = ctx.score(&genome, &p);
        let rewards = step_rewards(&schedule, &report, &p, &ctx.evaluator, 0.0);
        let total: f64 = rewards.iter().sum();
        assert!((total + report.score).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_charged_to_causing_step() {
        // C demands more crew than exists and overlaps A; B uses nothing.
        let tasks = vec![
            Task::new("A", 2).requires("CREW", ResourceKind::Labor, 1),
            Task::new("B", 1),
            Task::new("C", 2).requires("CREW", ResourceKind::Labor, 2),
        ];
        let p = ProblemModel::load(tasks, vec![Resource::labor("CREW")], vec![]).expect("valid");
        let config = OptimizerConfig::default();
        let ctx = SearchContext {
            config: &config,
            evaluator: config.evaluator(),
            cancel: CancelToken::new(),
            pool: None,
        };
        let genome = ScheduleGenome {
            order: vec![0, 1, 2],
            assignment: vec![vec![0], vec![], vec![0]],
            fitness: f64::INFINITY,
        };
        let (schedule, report) = ctx.score(&genome, &p);
        assert_eq!(report.overloaded_slices, 2);

        let rewards = step_rewards(&schedule, &report, &p, &ctx.evaluator, 0.0);
        assert!(rewards[0] > -1.0);
        assert!(rewards[1] > -1.0);
        assert!(rewards[2] < -report.penalty + 1e-9);
        let total: f64 = rewards.iter().sum();
        assert!((total + report.score).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_bonus() {
        let p = problem();
        let config = OptimizerConfig::default();
        let ctx = SearchContext {
            config: &config,
            evaluator: config.evaluator(),
            cancel: CancelToken::new(),
            pool: None,
        };
        let genome = ScheduleGenome::random_init(&p, 4);
        let (schedule, report) = ctx.score(&genome, &p);
        let plain = step_rewards(&schedule, &report, &p, &ctx.evaluator, 0.0);
        let bonus = step_rewards(&schedule, &report, &p, &ctx.evaluator, 1.0);
        let expected = p.reference_scales().makespan / schedule.makespan() as f64;
        assert!((bonus[2] - plain[2] - expected).abs() < 1e-12);
        assert_eq!(bonus[0], plain[0]);
    }

    #[test]
    fn test_baseline_advantage() {
        let mut b = Baseline::new(1);
        assert_eq!(b.advantage(0, -4.0), 0.0);
        assert!((b.advantage(0, -2.0) - 2.0).abs() < 1e-12);
        // Mean is now −3.
        assert!((b.advantage(0, -100.0) + ADVANTAGE_CLIP).abs() < 1e-12);
    }

    #[test]
    fn test_best_never_regresses() {
        let out = run(&small_config(), CancelToken::new());
        assert!(!out.trace.is_empty());
        for w in out.trace.windows(2) {
            assert!(w[1].best_score <= w[0].best_score);
        }
        assert!(out.report.is_feasible());
        assert!((out.best.fitness - out.report.score).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic() {
        let a = run(&small_config(), CancelToken::new());
        let b = run(&small_config(), CancelToken::new());
        assert_eq!(a.best, b.best);
        assert_eq!(a.trace, b.trace);
    }

    #[test]
    fn test_cancel_after_first_batch() {
        let token = CancelToken::new();
        token.cancel();
        let out = run(&small_config(), token);
        assert!(out.cancelled);
        assert_eq!(out.trace.len(), 1);
        assert_eq!(out.schedule.assignment_count(), 3);
    }

    #[test]
    fn test_learns_low_emission_plant_in_eco_mode() {
        let cfg = OptimizerConfig {
            eco_mode: true,
            population_size: 20,
            generations: 40,
            stagnation_limit: 0,
            ..OptimizerConfig::default()
        };
        let p = problem();
        let out = run(&cfg, CancelToken::new());
        let electric = p.resource_index("ELECTRIC").unwrap();
        // Best schedule puts both plant demands on the electric unit.
        for id in ["A", "C"] {
            assert_eq!(uses_of(&out.schedule, id), vec![(electric, 1)]);
        }
    }
}
