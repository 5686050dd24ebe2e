//! Constraint-aware fitness evaluation.
//!
//! Scores a decoded [`Schedule`] against its [`ProblemModel`]:
//!
//! ```text
//! score = w_time · makespan / M₀
//!       + w_cost · cost / C₀
//!       + w_em · emissions / E₀
//!       + penalty
//!
//! penalty = overload · overloaded_slices
//!         + precedence · precedence_violations
//!         + deadline · tardiness
//!         + cost_overrun · max(0, cost / ceiling − 1)
//! ```
//!
//! `M₀`, `C₀`, `E₀` are the problem's [`ReferenceScales`](crate::models::ReferenceScales).
//! Lower is better. Evaluation is a pure function of its inputs; no state
//! is kept between calls, so the evaluator can be shared across threads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{Assignment, ProblemModel, Schedule};

/// Relative weights of the three objectives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectiveWeights {
    /// Weight of normalised makespan.
    pub time: f64,
    /// Weight of normalised cost.
    pub cost: f64,
    /// Weight of normalised emissions.
    pub emissions: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            time: 1.0 / 3.0,
            cost: 1.0 / 3.0,
            emissions: 1.0 / 3.0,
        }
    }
}

/// Multipliers for constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PenaltyWeights {
    /// Per overloaded time slice.
    pub overload: f64,
    /// Per residual precedence violation or missed pinned start.
    pub precedence: f64,
    /// Per time unit of deadline tardiness.
    pub deadline: f64,
    /// Per unit of relative budget overrun.
    pub cost_overrun: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            overload: 1000.0,
            precedence: 1000.0,
            deadline: 10.0,
            cost_overrun: 1000.0,
        }
    }
}

/// Objectives, violations, and score of one schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessReport {
    /// Latest finish time.
    pub makespan: i64,
    /// Σ quantity × unit cost × duration.
    pub cost: f64,
    /// Σ quantity × emission factor × duration.
    pub emissions: f64,
    /// Time slices in which at least one resource is over capacity.
    pub overloaded_slices: i64,
    /// Residual precedence violations plus missed pinned starts.
    pub precedence_violations: usize,
    /// Σ max(0, finish − deadline).
    pub tardiness: i64,
    /// Weighted constraint penalty.
    pub penalty: f64,
    /// Composite score (lower = better).
    pub score: f64,
}

impl FitnessReport {
    /// Report for a schedule that could not be scored.
    pub fn degenerate() -> Self {
        Self {
            makespan: 0,
            cost: 0.0,
            emissions: 0.0,
            overloaded_slices: 0,
            precedence_violations: 0,
            tardiness: 0,
            penalty: f64::MAX,
            score: f64::MAX,
        }
    }

    /// No overloaded slice and no precedence violation.
    ///
    /// Deadlines and the budget are soft: they raise the penalty but do
    /// not make a schedule infeasible.
    pub fn is_feasible(&self) -> bool {
        self.overloaded_slices == 0 && self.precedence_violations == 0 && self.score < f64::MAX
    }
}

/// Pure scoring function over (schedule, problem, weights).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitnessEvaluator {
    weights: ObjectiveWeights,
    penalties: PenaltyWeights,
}

impl FitnessEvaluator {
    /// Creates an evaluator.
    pub fn new(weights: ObjectiveWeights, penalties: PenaltyWeights) -> Self {
        Self { weights, penalties }
    }

    /// Objective weights in use.
    pub fn weights(&self) -> ObjectiveWeights {
        self.weights
    }

    /// Penalty multipliers in use.
    pub fn penalties(&self) -> PenaltyWeights {
        self.penalties
    }

    /// Scores a schedule.
    ///
    /// A schedule that does not hold exactly one assignment per task is
    /// scored [`FitnessReport::degenerate`].
    pub fn evaluate(&self, schedule: &Schedule, problem: &ProblemModel) -> FitnessReport {
        let n = problem.task_count();
        let mut start = vec![None; n];
        let mut finish = vec![0i64; n];
        for a in &schedule.assignments {
            if a.task_index >= n || start[a.task_index].is_some() || a.finish < a.start {
                return FitnessReport::degenerate();
            }
            start[a.task_index] = Some(a.start);
            finish[a.task_index] = a.finish;
        }
        if start.iter().any(Option::is_none) {
            return FitnessReport::degenerate();
        }

        let resources = problem.resources();
        let mut cost = 0.0;
        let mut emissions = 0.0;
        for a in &schedule.assignments {
            let duration = a.duration() as f64;
            for u in &a.resources {
                let Some(r) = resources.get(u.resource_index) else {
                    return FitnessReport::degenerate();
                };
                cost += u.quantity as f64 * r.unit_cost * duration;
                emissions += u.quantity as f64 * r.emission_factor * duration;
            }
        }

        let makespan = schedule.makespan();
        let overloaded_slices = overloaded_slices(&schedule.assignments, problem);

        let mut precedence_violations = 0usize;
        let mut tardiness = 0i64;
        for t in 0..n {
            let s = start[t].unwrap_or_default();
            precedence_violations += problem
                .predecessors(t)
                .iter()
                .filter(|l| s < finish[l.task] + l.lag)
                .count();
            if problem.fixed_start(t).is_some_and(|pin| s != pin) {
                precedence_violations += 1;
            }
            if let Some(deadline) = problem.deadline(t) {
                tardiness += (finish[t] - deadline).max(0);
            }
        }

        let overrun = match problem.cost_ceiling() {
            Some(ceiling) if cost > ceiling => cost / ceiling - 1.0,
            _ => 0.0,
        };

        let p = &self.penalties;
        let penalty = p.overload * overloaded_slices as f64
            + p.precedence * precedence_violations as f64
            + p.deadline * tardiness as f64
            + p.cost_overrun * overrun;

        let scales = problem.reference_scales();
        let w = &self.weights;
        let score = w.time * makespan as f64 / scales.makespan
            + w.cost * cost / scales.cost
            + w.emissions * emissions / scales.emissions
            + penalty;

        FitnessReport {
            makespan,
            cost,
            emissions,
            overloaded_slices,
            precedence_violations,
            tardiness,
            penalty: if penalty.is_finite() { penalty } else { f64::MAX },
            score: if score.is_finite() { score } else { f64::MAX },
        }
    }

    /// Splits the penalty of a decoded schedule across its assignments.
    ///
    /// Assignments are taken in schedule order. Each is charged its own
    /// tardiness and precedence or fixed-start violations, plus the
    /// overloaded time and budget overrun it adds to the assignments before
    /// it. For a complete schedule the shares sum to the penalty of
    /// [`evaluate`](Self::evaluate).
    pub fn penalty_shares(&self, schedule: &Schedule, problem: &ProblemModel) -> Vec<f64> {
        let n = problem.task_count();
        let assignments = &schedule.assignments;
        let mut finish = vec![None; n];
        for a in assignments {
            if let Some(f) = finish.get_mut(a.task_index) {
                *f = Some(a.finish);
            }
        }

        let resources = problem.resources();
        let p = &self.penalties;
        let ceiling = problem.cost_ceiling();
        let overrun = |cost: f64| match ceiling {
            Some(c) if cost > c => cost / c - 1.0,
            _ => 0.0,
        };
        // Overload only grows as assignments are added.
        let total_overload = overloaded_slices(assignments, problem);
        let mut overloaded = 0i64;
        let mut cost = 0.0;

        assignments
            .iter()
            .enumerate()
            .map(|(k, a)| {
                let t = a.task_index;
                if t >= n {
                    return 0.0;
                }
                let mut violations = problem
                    .predecessors(t)
                    .iter()
                    .filter(|l| finish[l.task].is_some_and(|f| a.start < f + l.lag))
                    .count();
                if problem.fixed_start(t).is_some_and(|pin| a.start != pin) {
                    violations += 1;
                }
                let late = problem.deadline(t).map_or(0, |d| (a.finish - d).max(0));

                let before = cost;
                let duration = a.duration() as f64;
                cost += a
                    .resources
                    .iter()
                    .filter_map(|u| {
                        resources
                            .get(u.resource_index)
                            .map(|r| u.quantity as f64 * r.unit_cost * duration)
                    })
                    .sum::<f64>();

                let added = if total_overload == 0 || a.resources.is_empty() {
                    0
                } else {
                    let now = overloaded_slices(&assignments[..=k], problem);
                    let added = now - overloaded;
                    overloaded = now;
                    added
                };

                p.overload * added as f64
                    + p.precedence * violations as f64
                    + p.deadline * late as f64
                    + p.cost_overrun * (overrun(cost) - overrun(before))
            })
            .collect()
    }
}

/// Length of the union, over resources, of intervals where usage exceeds
/// capacity.
///
/// Sweeps the elementary intervals between consecutive assignment and
/// capacity-window boundaries; within one interval every usage and
/// capacity is constant.
fn overloaded_slices(assignments: &[Assignment], problem: &ProblemModel) -> i64 {
    let resources = problem.resources();
    let mut deltas: Vec<BTreeMap<i64, i64>> = vec![BTreeMap::new(); resources.len()];
    let mut points: BTreeSet<i64> = BTreeSet::new();
    for a in assignments {
        if a.finish <= a.start {
            continue;
        }
        for u in &a.resources {
            if u.quantity == 0 || u.resource_index >= resources.len() {
                continue;
            }
            *deltas[u.resource_index].entry(a.start).or_insert(0) += u.quantity;
            *deltas[u.resource_index].entry(a.finish).or_insert(0) -= u.quantity;
            points.insert(a.start);
            points.insert(a.finish);
        }
    }
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return 0;
    };
    for r in resources {
        points.extend(r.profile.boundaries().filter(|&b| b > first && b < last));
    }

    let mut level = vec![0i64; resources.len()];
    let mut overloaded = 0;
    let mut iter = points.iter().copied().peekable();
    while let Some(p) = iter.next() {
        for (r, d) in deltas.iter().enumerate() {
            if let Some(delta) = d.get(&p) {
                level[r] += delta;
            }
        }
        let Some(&next) = iter.peek() else { break };
        let over = level
            .iter()
            .enumerate()
            .any(|(r, &used)| used > 0 && used > resources[r].capacity_at(p));
        if over {
            overloaded += next - p;
        }
    }
    overloaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assignment, Constraint, Resource, ResourceKind, Task};

    fn problem() -> ProblemModel {
        let tasks = vec![
            Task::new("A", 2).requires("CREW", ResourceKind::Labor, 1),
            Task::new("B", 3)
                .with_predecessor("A")
                .requires("CREW", ResourceKind::Labor, 1),
        ];
        let resources = vec![Resource::labor("CREW")
            .with_capacity(1)
            .with_unit_cost(10.0)
            .with_emission_factor(2.0)];
        ProblemModel::load(tasks, resources, vec![]).expect("valid")
    }

    fn schedule(a: (i64, i64), b: (i64, i64)) -> Schedule {
        let mut s = Schedule::new();
        s.add_assignment(Assignment::new("A", 0, a.0, a.1).with_resource("CREW", 0, 1));
        s.add_assignment(Assignment::new("B", 1, b.0, b.1).with_resource("CREW", 0, 1));
        s
    }

    #[test]
    fn test_objectives() {
        let p = problem();
        let r = FitnessEvaluator::default().evaluate(&schedule((0, 2), (2, 5)), &p);
        assert_eq!(r.makespan, 5);
        assert!((r.cost - 50.0).abs() < 1e-10);
        assert!((r.emissions - 10.0).abs() < 1e-10);
        assert_eq!(r.overloaded_slices, 0);
        assert_eq!(r.precedence_violations, 0);
        assert_eq!(r.penalty, 0.0);
        assert!(r.is_feasible());
        // Reference scales: makespan 5, cost 50, emissions 10 → each term 1/3.
        assert!((r.score - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_overload_and_precedence_penalised() {
        let p = problem();
        // B overlaps A on [1, 2) and starts before A finishes.
        let r = FitnessEvaluator::default().evaluate(&schedule((0, 2), (1, 4)), &p);
        assert_eq!(r.overloaded_slices, 1);
        assert_eq!(r.precedence_violations, 1);
        assert!((r.penalty - 2000.0).abs() < 1e-10);
        assert!(!r.is_feasible());
    }

    #[test]
    fn test_overload_union_across_resources() {
        let tasks = vec![
            Task::new("A", 4)
                .requires("X", ResourceKind::Labor, 1)
                .requires("Y", ResourceKind::Equipment, 1),
            Task::new("B", 4)
                .requires("X", ResourceKind::Labor, 1)
                .requires("Y", ResourceKind::Equipment, 1),
        ];
        let resources = vec![Resource::labor("X"), Resource::equipment("Y")];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        let mut s = Schedule::new();
        s.add_assignment(
            Assignment::new("A", 0, 0, 4)
                .with_resource("X", 0, 1)
                .with_resource("Y", 1, 1),
        );
        s.add_assignment(
            Assignment::new("B", 1, 2, 6)
                .with_resource("X", 0, 1)
                .with_resource("Y", 1, 1),
        );
        // Both resources overloaded on [2, 4): counted once.
        assert_eq!(overloaded_slices(&s.assignments, &p), 2);
    }

    #[test]
    fn test_capacity_window_overload() {
        let tasks = vec![Task::new("A", 4).requires("X", ResourceKind::Labor, 1)];
        let resources = vec![Resource::labor("X").with_capacity_window(1, 3, 0)];
        let p = ProblemModel::load(tasks, resources, vec![]).expect("valid");
        let mut s = Schedule::new();
        s.add_assignment(Assignment::new("A", 0, 0, 4).with_resource("X", 0, 1));
        assert_eq!(overloaded_slices(&s.assignments, &p), 2);
    }

    #[test]
    fn test_deadline_and_budget() {
        let tasks = vec![Task::new("A", 5)
            .with_deadline(3)
            .requires("CREW", ResourceKind::Labor, 1)];
        let resources = vec![Resource::labor("CREW").with_unit_cost(100.0)];
        let p = ProblemModel::load(tasks, resources, vec![Constraint::cost_ceiling(250.0)])
            .expect("valid");
        let mut s = Schedule::new();
        s.add_assignment(Assignment::new("A", 0, 0, 5).with_resource("CREW", 0, 1));
        let r = FitnessEvaluator::default().evaluate(&s, &p);
        assert_eq!(r.tardiness, 2);
        // 10 × 2 + 1000 × (500 / 250 − 1)
        assert!((r.penalty - 1020.0).abs() < 1e-9);
        assert!(r.is_feasible());
    }

    #[test]
    fn test_penalty_shares_charge_the_causing_assignment() {
        let p = problem();
        let s = schedule((0, 2), (1, 4));
        let eval = FitnessEvaluator::default();
        let shares = eval.penalty_shares(&s, &p);
        // B adds the overloaded slice and breaks its own precedence link.
        assert_eq!(shares, vec![0.0, 2000.0]);
        let total: f64 = shares.iter().sum();
        assert!((total - eval.evaluate(&s, &p).penalty).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_shares_budget_overrun_marginal() {
        let tasks = vec![
            Task::new("A", 2).requires("CREW", ResourceKind::Labor, 1),
            Task::new("B", 3)
                .with_deadline(4)
                .requires("CREW", ResourceKind::Labor, 1),
        ];
        let resources = vec![Resource::labor("CREW").with_unit_cost(10.0)];
        let p = ProblemModel::load(tasks, resources, vec![Constraint::cost_ceiling(30.0)])
            .expect("valid");
        let s = schedule((0, 2), (2, 5));
        let eval = FitnessEvaluator::default();
        let shares = eval.penalty_shares(&s, &p);
        // A stays within budget (20 of 30); B pushes it to 50 and is late by 1.
        assert_eq!(shares[0], 0.0);
        assert!((shares[1] - (1000.0 * (50.0 / 30.0 - 1.0) + 10.0)).abs() < 1e-9);
        assert!((shares.iter().sum::<f64>() - eval.evaluate(&s, &p).penalty).abs() < 1e-9);
    }

    #[test]
    fn test_missing_task_is_degenerate() {
        let p = problem();
        let mut s = Schedule::new();
        s.add_assignment(Assignment::new("A", 0, 0, 2));
        let r = FitnessEvaluator::default().evaluate(&s, &p);
        assert_eq!(r.score, f64::MAX);
        assert!(!r.is_feasible());
    }

    #[test]
    fn test_weights_shift_score() {
        let p = problem();
        let s = schedule((0, 2), (2, 5));
        let time_only = FitnessEvaluator::new(
            ObjectiveWeights {
                time: 1.0,
                cost: 0.0,
                emissions: 0.0,
            },
            PenaltyWeights::default(),
        );
        assert!((time_only.evaluate(&s, &p).score - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_evaluation_is_pure() {
        let p = problem();
        let s = schedule((0, 2), (2, 5));
        let e = FitnessEvaluator::default();
        assert_eq!(e.evaluate(&s, &p), e.evaluate(&s, &p));
    }
}
