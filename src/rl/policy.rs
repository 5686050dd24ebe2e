//! Tabular softmax policy for schedule construction.
//!
//! Two preference tables:
//! - **Task selection**: `θ[prev + 1][next]`, where row 0 is the episode
//!   start. Among ready tasks, `P(next) ∝ exp(θ[prev + 1][next])`.
//! - **Resource selection**: `φ[task][demand][candidate]`.
//!
//! Updates follow the REINFORCE gradient of the log-softmax:
//! `θ[a] += α · A · (1[a = chosen] − P(a))`.
//!
//! # Reference
//! Williams (1992), "Simple statistical gradient-following algorithms for
//! connectionist reinforcement learning"; Sutton & Barto (2018), Ch. 13

use rand::Rng;

use crate::models::ProblemModel;

/// Softmax preference tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    n: usize,
    task_prefs: Vec<f64>,
    resource_prefs: Vec<Vec<Vec<f64>>>,
}

impl Policy {
    /// Uniform policy (all preferences zero).
    pub fn new(problem: &ProblemModel) -> Self {
        let n = problem.task_count();
        let resource_prefs = (0..n)
            .map(|t| {
                problem
                    .demands(t)
                    .iter()
                    .map(|slot| vec![0.0; slot.candidates.len()])
                    .collect()
            })
            .collect();
        Self {
            n,
            task_prefs: vec![0.0; (n + 1) * n],
            resource_prefs,
        }
    }

    fn row(&self, prev: Option<usize>) -> usize {
        prev.map_or(0, |p| p + 1) * self.n
    }

    /// Selection probabilities over `ready` after `prev`.
    pub fn task_probabilities(&self, prev: Option<usize>, ready: &[usize]) -> Vec<f64> {
        let row = self.row(prev);
        softmax(ready.iter().map(|&t| self.task_prefs[row + t]))
    }

    /// Selection probabilities over the candidates of one demand.
    pub fn resource_probabilities(&self, task: usize, demand: usize) -> Vec<f64> {
        softmax(self.resource_prefs[task][demand].iter().copied())
    }

    /// Samples a position in `ready`.
    pub fn sample_task<R: Rng>(&self, prev: Option<usize>, ready: &[usize], rng: &mut R) -> usize {
        sample(&self.task_probabilities(prev, ready), rng)
    }

    /// Samples a candidate index for one demand.
    pub fn sample_resource<R: Rng>(&self, task: usize, demand: usize, rng: &mut R) -> usize {
        sample(&self.resource_probabilities(task, demand), rng)
    }

    /// Policy-gradient step for a task choice.
    pub fn update_task(
        &mut self,
        prev: Option<usize>,
        ready: &[usize],
        chosen: usize,
        step: f64,
    ) {
        let probs = self.task_probabilities(prev, ready);
        let row = self.row(prev);
        for (pos, (&t, p)) in ready.iter().zip(probs).enumerate() {
            let indicator = if pos == chosen { 1.0 } else { 0.0 };
            self.task_prefs[row + t] += step * (indicator - p);
        }
    }

    /// Policy-gradient step for a resource choice.
    pub fn update_resource(&mut self, task: usize, demand: usize, chosen: usize, step: f64) {
        let probs = self.resource_probabilities(task, demand);
        for (c, (pref, p)) in self.resource_prefs[task][demand]
            .iter_mut()
            .zip(probs)
            .enumerate()
        {
            let indicator = if c == chosen { 1.0 } else { 0.0 };
            *pref += step * (indicator - p);
        }
    }
}

fn softmax(prefs: impl Iterator<Item = f64>) -> Vec<f64> {
    let prefs: Vec<f64> = prefs.collect();
    let max = prefs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = prefs.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![1.0 / prefs.len().max(1) as f64; prefs.len()]
    }
}

fn sample<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
    let r: f64 = rng.random();
    let mut acc = 0.0;
    for (i, p) in probs.iter().enumerate() {
        acc += p;
        if r < acc {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, ResourceDemand, ResourceKind, Task};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn problem() -> ProblemModel {
        let tasks = vec![
            Task::new("A", 1).with_demand(ResourceDemand::new(ResourceKind::Labor, 1)),
            Task::new("B", 1),
            Task::new("C", 1),
        ];
        let resources = vec![Resource::labor("C1"), Resource::labor("C2")];
        ProblemModel::load(tasks, resources, vec![]).expect("valid")
    }

    #[test]
    fn test_uniform_start() {
        let policy = Policy::new(&problem());
        let probs = policy.task_probabilities(None, &[0, 1, 2]);
        for p in probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
        let r = policy.resource_probabilities(0, 0);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_positive_update_raises_probability() {
        let mut policy = Policy::new(&problem());
        policy.update_task(Some(0), &[1, 2], 1, 1.0);
        let probs = policy.task_probabilities(Some(0), &[1, 2]);
        assert!(probs[1] > probs[0]);
        // Other contexts are untouched.
        let start = policy.task_probabilities(None, &[1, 2]);
        assert!((start[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_update_lowers_probability() {
        let mut policy = Policy::new(&problem());
        policy.update_resource(0, 0, 0, -1.0);
        let probs = policy.resource_probabilities(0, 0);
        assert!(probs[0] < probs[1]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sampling_follows_preferences() {
        let mut policy = Policy::new(&problem());
        for _ in 0..50 {
            policy.update_resource(0, 0, 1, 1.0);
        }
        let mut rng = StdRng::seed_from_u64(3);
        let picks_c2 = (0..200)
            .filter(|_| policy.sample_resource(0, 0, &mut rng) == 1)
            .count();
        assert!(picks_c2 > 180);
    }

    #[test]
    fn test_softmax_stable_for_large_values() {
        let probs = softmax([1e6, 1e6 - 1.0].into_iter());
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
    }
}
