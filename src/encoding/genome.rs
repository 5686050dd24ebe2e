//! Order/assignment dual-vector genome.
//!
//! # Encoding
//!
//! The genome consists of two vectors:
//! - **Order**: permutation of task indices. Decoding places tasks in this
//!   order, so earlier tasks win contested resources.
//! - **Assignment**: indexed by task; `assignment[t][d]` picks a candidate
//!   (index into `demands(t)[d].candidates`) for each demand of task `t`.
//!
//! A genome is *topological* when every task appears after all of its
//! predecessors. Initialisation only produces topological genomes;
//! [`ScheduleGenome::repair`] restores the property after crossover and
//! mutation.
//!
//! # Reference
//! Hartmann (1998), "A competitive genetic algorithm for resource-constrained
//! project scheduling"; Bierwirth (1995), "A generalized permutation approach
//! to JSSP"

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::ProblemModel;

/// Order/assignment genome for construction scheduling.
///
/// Lower fitness = better schedule (minimization convention).
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleGenome {
    /// Task indices in placement order.
    pub order: Vec<usize>,
    /// Candidate choice per task per demand.
    pub assignment: Vec<Vec<usize>>,
    /// Composite score (lower = better); `INFINITY` until evaluated.
    pub fitness: f64,
}

impl ScheduleGenome {
    /// Random topological genome from a seed.
    pub fn random_init(problem: &ProblemModel, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::random(problem, &mut rng)
    }

    /// Random topological order with random resource choices.
    pub fn random<R: Rng>(problem: &ProblemModel, rng: &mut R) -> Self {
        let order = random_topological_order(problem, rng);
        let assignment = (0..problem.task_count())
            .map(|t| {
                problem
                    .demands(t)
                    .iter()
                    .map(|slot| rng.random_range(0..slot.candidates.len()))
                    .collect()
            })
            .collect();
        Self {
            order,
            assignment,
            fitness: f64::INFINITY,
        }
    }

    /// Random topological order with least-loaded resource choices.
    ///
    /// Load is accumulated as quantity × base duration in topological
    /// order; ties go to the lower candidate index.
    pub fn with_load_balancing<R: Rng>(problem: &ProblemModel, rng: &mut R) -> Self {
        let order = random_topological_order(problem, rng);
        let assignment = least_loaded_assignment(problem, &order);
        Self {
            order,
            assignment,
            fitness: f64::INFINITY,
        }
    }

    /// Priority-rule genome: longest remaining path first.
    ///
    /// Among ready tasks, the one with the longest tail (own duration plus
    /// the longest lagged path through its successors) is placed first.
    /// Ties go to the lower task index.
    ///
    /// # Reference
    /// Kolisch (1996), "Serial and parallel resource-constrained project
    /// scheduling methods revisited" (LPF / critical-path rules)
    pub fn critical_path_seed(problem: &ProblemModel) -> Self {
        let tails = tail_lengths(problem);
        let n = problem.task_count();
        let mut remaining: Vec<usize> = (0..n).map(|t| problem.predecessors(t).len()).collect();
        let mut ready: Vec<usize> = (0..n).filter(|&t| remaining[t] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while !ready.is_empty() {
            let Some(pos) = ready
                .iter()
                .enumerate()
                .max_by(|&(_, &a), &(_, &b)| tails[a].cmp(&tails[b]).then(b.cmp(&a)))
                .map(|(pos, _)| pos)
            else {
                break;
            };
            let t = ready.swap_remove(pos);
            order.push(t);
            for &s in problem.successors(t) {
                remaining[s] -= 1;
                if remaining[s] == 0 {
                    ready.push(s);
                }
            }
        }

        let assignment = least_loaded_assignment(problem, &order);
        Self {
            order,
            assignment,
            fitness: f64::INFINITY,
        }
    }

    /// Whether every task appears after all its predecessors.
    pub fn is_topological(&self, problem: &ProblemModel) -> bool {
        let positions = positions(&self.order, problem.task_count());
        self.order.iter().enumerate().all(|(i, &t)| {
            problem
                .predecessors(t)
                .iter()
                .all(|l| positions[l.task] < i)
        })
    }

    /// Structural check: order is a permutation and every choice is in range.
    pub fn is_valid(&self, problem: &ProblemModel) -> bool {
        let n = problem.task_count();
        if self.order.len() != n || self.assignment.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &t in &self.order {
            if t >= n || seen[t] {
                return false;
            }
            seen[t] = true;
        }
        self.assignment.iter().enumerate().all(|(t, choice)| {
            let slots = problem.demands(t);
            choice.len() == slots.len()
                && choice
                    .iter()
                    .zip(slots)
                    .all(|(&c, slot)| c < slot.candidates.len())
        })
    }

    /// Repaired copy of this genome. See [`repair_in_place`](Self::repair_in_place).
    pub fn repair(&self, problem: &ProblemModel) -> Self {
        let mut g = self.clone();
        g.repair_in_place(problem);
        g
    }

    /// Restores precedence feasibility of the order.
    ///
    /// Scans left to right; a task with a predecessor placed after it is
    /// moved to just after its latest-placed predecessor, and the scan
    /// re-examines the position it vacated. Out-of-range resource choices
    /// are clamped. Repairing a repaired genome changes nothing.
    ///
    /// Assumes `order` is a permutation of the task indices.
    pub fn repair_in_place(&mut self, problem: &ProblemModel) {
        let n = self.order.len();
        let mut pos = positions(&self.order, problem.task_count());

        let mut i = 0;
        while i < n {
            let t = self.order[i];
            let latest = problem
                .predecessors(t)
                .iter()
                .map(|l| pos[l.task])
                .filter(|&p| p > i && p < n)
                .max();
            match latest {
                None => i += 1,
                Some(p) => {
                    self.order[i..=p].rotate_left(1);
                    for (k, &task) in self.order.iter().enumerate().take(p + 1).skip(i) {
                        pos[task] = k;
                    }
                }
            }
        }

        self.assignment.resize(problem.task_count(), Vec::new());
        for (t, choice) in self.assignment.iter_mut().enumerate() {
            let slots = problem.demands(t);
            choice.resize(slots.len(), 0);
            for (c, slot) in choice.iter_mut().zip(slots) {
                if *c >= slot.candidates.len() {
                    *c = slot.candidates.len() - 1;
                }
            }
        }
    }
}

/// Random topological permutation: repeated uniform choice among ready tasks.
fn random_topological_order<R: Rng>(problem: &ProblemModel, rng: &mut R) -> Vec<usize> {
    let n = problem.task_count();
    let mut remaining: Vec<usize> = (0..n).map(|t| problem.predecessors(t).len()).collect();
    let mut ready: Vec<usize> = (0..n).filter(|&t| remaining[t] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while !ready.is_empty() {
        let pick = rng.random_range(0..ready.len());
        let t = ready.swap_remove(pick);
        order.push(t);
        for &s in problem.successors(t) {
            remaining[s] -= 1;
            if remaining[s] == 0 {
                ready.push(s);
            }
        }
    }
    order
}

fn least_loaded_assignment(problem: &ProblemModel, order: &[usize]) -> Vec<Vec<usize>> {
    let mut load = vec![0i64; problem.resources().len()];
    let mut assignment = vec![Vec::new(); problem.task_count()];
    for &t in order {
        let duration = problem.base_duration(t);
        assignment[t] = problem
            .demands(t)
            .iter()
            .map(|slot| {
                match slot.candidates.iter().enumerate().min_by_key(|&(_, &r)| load[r]) {
                    Some((best, &r)) => {
                        load[r] += slot.quantity * duration;
                        best
                    }
                    None => 0,
                }
            })
            .collect();
    }
    assignment
}

fn tail_lengths(problem: &ProblemModel) -> Vec<i64> {
    let mut tails = vec![0i64; problem.task_count()];
    for &t in problem.topological_order().iter().rev() {
        let after = problem
            .successors(t)
            .iter()
            .map(|&s| {
                let lag = problem
                    .predecessors(s)
                    .iter()
                    .find(|l| l.task == t)
                    .map_or(0, |l| l.lag);
                lag + tails[s]
            })
            .max()
            .unwrap_or(0);
        tails[t] = problem.base_duration(t) + after;
    }
    tails
}

fn positions(order: &[usize], n: usize) -> Vec<usize> {
    let mut pos = vec![usize::MAX; n];
    for (i, &t) in order.iter().enumerate() {
        if t < n {
            pos[t] = i;
        }
    }
    pos
}
