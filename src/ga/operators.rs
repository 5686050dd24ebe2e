//! Configurable genetic operators for schedule genomes.
//!
//! Provides runtime-selectable crossover and mutation strategies via
//! [`GeneticOperators`], plus tournament selection.
//!
//! All order operators produce permutations; they may break precedence,
//! so offspring are repaired before evaluation.
//!
//! # Usage
//!
//! ```
//! use u_construct::ga::{CrossoverType, GeneticOperators, MutationType};
//!
//! let ops = GeneticOperators::default();
//! assert_eq!(ops.crossover_type, CrossoverType::Order);
//! assert_eq!(ops.mutation_type, MutationType::Swap);
//! ```

use std::collections::HashSet;

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::encoding::ScheduleGenome;
use crate::models::ProblemModel;

/// Crossover strategy for the task order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrossoverType {
    /// Order crossover: contiguous segment from one parent, rest in the
    /// other parent's order (Davis, 1985).
    #[default]
    Order,
    /// Precedence-preserving crossover: positions of a random task subset
    /// from one parent (Bierwirth et al., 1996).
    Precedence,
}

/// Mutation strategy for the task order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationType {
    /// Swap two positions.
    #[default]
    Swap,
    /// Remove and reinsert at another position.
    Insert,
    /// Reverse a segment.
    Invert,
}

/// Runtime-selectable genetic operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneticOperators {
    /// Crossover strategy.
    pub crossover_type: CrossoverType,
    /// Order mutation strategy.
    pub mutation_type: MutationType,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
}

impl Default for GeneticOperators {
    fn default() -> Self {
        Self {
            crossover_type: CrossoverType::Order,
            mutation_type: MutationType::Swap,
            mutation_rate: 0.1,
        }
    }
}

impl GeneticOperators {
    /// Recombines two parents into two children.
    ///
    /// Orders use the configured strategy; assignments are mixed by a
    /// per-task coin flip.
    pub fn crossover<R: Rng>(
        &self,
        p1: &ScheduleGenome,
        p2: &ScheduleGenome,
        rng: &mut R,
    ) -> (ScheduleGenome, ScheduleGenome) {
        let (o1, o2) = match self.crossover_type {
            CrossoverType::Order => order_crossover(&p1.order, &p2.order, rng),
            CrossoverType::Precedence => precedence_crossover(&p1.order, &p2.order, rng),
        };
        let (a1, a2) = uniform_assignment_crossover(&p1.assignment, &p2.assignment, rng);
        (
            ScheduleGenome {
                order: o1,
                assignment: a1,
                fitness: f64::INFINITY,
            },
            ScheduleGenome {
                order: o2,
                assignment: a2,
                fitness: f64::INFINITY,
            },
        )
    }

    /// Mutates a genome in place.
    ///
    /// Each order position triggers the configured move with probability
    /// `mutation_rate`; each demand is independently reassigned with the
    /// same probability.
    pub fn mutate<R: Rng>(&self, genome: &mut ScheduleGenome, problem: &ProblemModel, rng: &mut R) {
        let len = genome.order.len();
        if len >= 2 {
            for i in 0..len {
                if !rng.random_bool(self.mutation_rate) {
                    continue;
                }
                let j = rng.random_range(0..len);
                match self.mutation_type {
                    MutationType::Swap => genome.order.swap(i, j),
                    MutationType::Insert => {
                        let task = genome.order.remove(i);
                        genome.order.insert(j, task);
                    }
                    MutationType::Invert => genome.order[i.min(j)..=i.max(j)].reverse(),
                }
            }
        }
        reassign_mutation(genome, problem, self.mutation_rate, rng);
        genome.fitness = f64::INFINITY;
    }
}

/// Order crossover on task permutations.
///
/// A random segment `[i, j]` is copied position-for-position from one
/// parent; the remaining positions are filled left to right with the
/// missing tasks in the other parent's order.
pub fn order_crossover<R: Rng>(a: &[usize], b: &[usize], rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let len = a.len();
    if len < 2 {
        return (a.to_vec(), b.to_vec());
    }
    let mut i = rng.random_range(0..len);
    let mut j = rng.random_range(0..len);
    if i > j {
        std::mem::swap(&mut i, &mut j);
    }
    (ox_child(a, b, i, j), ox_child(b, a, i, j))
}

fn ox_child(keep: &[usize], fill: &[usize], i: usize, j: usize) -> Vec<usize> {
    let segment: HashSet<usize> = keep[i..=j].iter().copied().collect();
    let mut donor = fill.iter().copied().filter(|t| !segment.contains(t));
    keep.iter()
        .enumerate()
        .map(|(pos, &t)| {
            if pos >= i && pos <= j {
                t
            } else {
                donor.next().unwrap_or(t)
            }
        })
        .collect()
}

/// Precedence-preserving crossover (POX) on task permutations.
///
/// A random non-empty task subset keeps its positions from one parent;
/// the other positions are filled with the remaining tasks in the other
/// parent's order.
///
/// # Reference
/// Bierwirth, Mattfeld & Kopfer (1996)
pub fn precedence_crossover<R: Rng>(
    a: &[usize],
    b: &[usize],
    rng: &mut R,
) -> (Vec<usize>, Vec<usize>) {
    let len = a.len();
    if len < 2 {
        return (a.to_vec(), b.to_vec());
    }
    let size = rng.random_range(1..=len);
    let selected: HashSet<usize> = index::sample(rng, len, size)
        .into_iter()
        .map(|k| a[k])
        .collect();
    (pox_child(a, b, &selected), pox_child(b, a, &selected))
}

fn pox_child(template: &[usize], donor: &[usize], selected: &HashSet<usize>) -> Vec<usize> {
    let mut fill = donor.iter().copied().filter(|t| !selected.contains(t));
    template
        .iter()
        .map(|&t| {
            if selected.contains(&t) {
                t
            } else {
                fill.next().unwrap_or(t)
            }
        })
        .collect()
}

/// Per-task coin flip between the parents' resource choices.
pub fn uniform_assignment_crossover<R: Rng>(
    a: &[Vec<usize>],
    b: &[Vec<usize>],
    rng: &mut R,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            if rng.random_bool(0.5) {
                (x.clone(), y.clone())
            } else {
                (y.clone(), x.clone())
            }
        })
        .unzip()
}

/// Reassigns each demand with probability `rate` to a different candidate.
pub fn reassign_mutation<R: Rng>(
    genome: &mut ScheduleGenome,
    problem: &ProblemModel,
    rate: f64,
    rng: &mut R,
) {
    for (t, choice) in genome.assignment.iter_mut().enumerate() {
        for (c, slot) in choice.iter_mut().zip(problem.demands(t)) {
            let k = slot.candidates.len();
            if k < 2 || !rng.random_bool(rate) {
                continue;
            }
            // Uniform over the other k − 1 candidates.
            let pick = rng.random_range(0..k - 1);
            *c = if pick >= *c { pick + 1 } else { pick };
        }
    }
}

/// Tournament selection over scores (lower = better).
///
/// Samples `k` distinct indices; the lowest score wins, ties going to the
/// lowest index.
pub fn tournament_select<R: Rng>(scores: &[f64], k: usize, rng: &mut R) -> usize {
    let n = scores.len();
    if n == 0 {
        return 0;
    }
    index::sample(rng, n, k.clamp(1, n))
        .into_iter()
        .min_by(|&x, &y| scores[x].total_cmp(&scores[y]).then(x.cmp(&y)))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, ResourceDemand, ResourceKind, Task};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    fn problem() -> ProblemModel {
        let tasks = (0..6)
            .map(|i| {
                Task::new(format!("T{i}"), 2)
                    .with_demand(ResourceDemand::new(ResourceKind::Labor, 1))
            })
            .collect();
        let resources = vec![
            Resource::labor("C1"),
            Resource::labor("C2"),
            Resource::labor("C3"),
        ];
        ProblemModel::load(tasks, resources, vec![]).expect("valid")
    }

    #[test]
    fn test_default_operators() {
        let ops = GeneticOperators::default();
        assert_eq!(ops.crossover_type, CrossoverType::Order);
        assert_eq!(ops.mutation_type, MutationType::Swap);
    }

    #[test]
    fn test_order_crossover_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = vec![0, 1, 2, 3, 4, 5];
        let b = vec![5, 4, 3, 2, 1, 0];
        for _ in 0..50 {
            let (c1, c2) = order_crossover(&a, &b, &mut rng);
            assert!(is_permutation(&c1, 6));
            assert!(is_permutation(&c2, 6));
        }
    }

    #[test]
    fn test_ox_child_keeps_segment() {
        // Segment [2, 3] from keep, rest in fill order.
        let child = ox_child(&[0, 1, 2, 3, 4, 5], &[5, 4, 3, 2, 1, 0], 2, 3);
        assert_eq!(child, vec![5, 4, 2, 3, 1, 0]);
    }

    #[test]
    fn test_precedence_crossover_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = vec![0, 1, 2, 3, 4, 5];
        let b = vec![3, 5, 1, 0, 4, 2];
        for _ in 0..50 {
            let (c1, c2) = precedence_crossover(&a, &b, &mut rng);
            assert!(is_permutation(&c1, 6));
            assert!(is_permutation(&c2, 6));
        }
    }

    #[test]
    fn test_pox_child_keeps_selected_positions() {
        let selected: HashSet<usize> = [1, 4].into_iter().collect();
        let child = pox_child(&[0, 1, 2, 3, 4, 5], &[5, 4, 3, 2, 1, 0], &selected);
        assert_eq!(child, vec![5, 1, 3, 2, 4, 0]);
    }

    #[test]
    fn test_uniform_assignment_crossover() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = vec![vec![0], vec![0], vec![0]];
        let b = vec![vec![1], vec![1], vec![1]];
        let (c1, c2) = uniform_assignment_crossover(&a, &b, &mut rng);
        for t in 0..3 {
            assert_ne!(c1[t], c2[t]);
        }
    }

    #[test]
    fn test_mutation_keeps_permutation() {
        let p = problem();
        let mut rng = StdRng::seed_from_u64(11);
        for mutation_type in [MutationType::Swap, MutationType::Insert, MutationType::Invert] {
            let ops = GeneticOperators {
                mutation_type,
                mutation_rate: 0.5,
                ..GeneticOperators::default()
            };
            let mut g = ScheduleGenome::random_init(&p, 1);
            for _ in 0..20 {
                ops.mutate(&mut g, &p, &mut rng);
                assert!(is_permutation(&g.order, 6));
                assert!(g.is_valid(&p));
            }
        }
    }

    #[test]
    fn test_reassign_always_changes_at_rate_one() {
        let p = problem();
        let mut rng = StdRng::seed_from_u64(5);
        let mut g = ScheduleGenome::random_init(&p, 2);
        let before = g.assignment.clone();
        reassign_mutation(&mut g, &p, 1.0, &mut rng);
        for t in 0..6 {
            assert_ne!(g.assignment[t], before[t]);
            assert!(g.assignment[t][0] < 3);
        }
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let p = problem();
        let mut rng = StdRng::seed_from_u64(5);
        let ops = GeneticOperators {
            mutation_rate: 0.0,
            ..GeneticOperators::default()
        };
        let mut g = ScheduleGenome::random_init(&p, 3);
        let before = g.clone();
        ops.mutate(&mut g, &p, &mut rng);
        assert_eq!(g, before);
    }

    #[test]
    fn test_tournament_picks_best_of_sample() {
        let mut rng = StdRng::seed_from_u64(1);
        let scores = [5.0, 1.0, 3.0];
        // Sampling the whole population always finds the best.
        for _ in 0..20 {
            assert_eq!(tournament_select(&scores, 3, &mut rng), 1);
        }
    }

    #[test]
    fn test_tournament_tie_lowest_index() {
        let mut rng = StdRng::seed_from_u64(1);
        let scores = [2.0, 2.0, 2.0, 2.0];
        assert_eq!(tournament_select(&scores, 4, &mut rng), 0);
    }
}
