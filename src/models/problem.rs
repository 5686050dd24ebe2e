//! Validated, immutable problem instance.
//!
//! [`ProblemModel::load`] validates tasks, resources, and constraints
//! once, then resolves every string reference into indices so the search
//! loop never touches a hash map. After loading the model is read-only
//! and shared freely between worker threads.

use std::collections::HashMap;

use serde::Serialize;

use super::{Constraint, Resource, ResourceKind, Task};
use crate::validation::{topological_order, validate_input, ValidationError};

/// A precedence edge into a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredecessorLink {
    /// Predecessor task index.
    pub task: usize,
    /// Minimum time between predecessor finish and successor start.
    pub lag: i64,
}

/// A resolved resource demand: quantity plus candidate resource indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSlot {
    /// Required kind.
    pub kind: ResourceKind,
    /// Units drawn.
    pub quantity: i64,
    /// Resource indices allowed to fill the demand (never empty).
    pub candidates: Vec<usize>,
}

/// Normalisation constants for the composite score.
///
/// Each objective is divided by its reference so that equal weights mean
/// equal influence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceScales {
    /// Critical-path length at nominal efficiency (≥ 1).
    pub makespan: f64,
    /// Cost at mean candidate rates (> 0).
    pub cost: f64,
    /// Emissions at mean candidate rates (> 0).
    pub emissions: f64,
}

/// Validated construction scheduling problem.
#[derive(Debug, Clone)]
pub struct ProblemModel {
    tasks: Vec<Task>,
    resources: Vec<Resource>,
    constraints: Vec<Constraint>,
    task_index: HashMap<String, usize>,
    resource_index: HashMap<String, usize>,
    predecessors: Vec<Vec<PredecessorLink>>,
    successors: Vec<Vec<usize>>,
    topo_order: Vec<usize>,
    base_durations: Vec<i64>,
    demands: Vec<Vec<DemandSlot>>,
    release: Vec<i64>,
    deadlines: Vec<Option<i64>>,
    cost_ceiling: Option<f64>,
    scales: ReferenceScales,
}

impl ProblemModel {
    /// Validates the input and builds the model.
    ///
    /// # Errors
    /// Every detected issue, e.g. `CyclicPrecedence` when the task graph
    /// has a cycle.
    pub fn load(
        tasks: Vec<Task>,
        resources: Vec<Resource>,
        constraints: Vec<Constraint>,
    ) -> Result<Self, Vec<ValidationError>> {
        validate_input(&tasks, &resources, &constraints)?;

        let task_index: HashMap<String, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        let resource_index: HashMap<String, usize> = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let n = tasks.len();
        let mut predecessors: Vec<Vec<PredecessorLink>> = vec![Vec::new(); n];
        let mut release: Vec<i64> = tasks.iter().map(|t| t.fixed_start.unwrap_or(0)).collect();
        let mut deadlines: Vec<Option<i64>> = tasks.iter().map(|t| t.deadline).collect();
        let mut cost_ceiling: Option<f64> = None;

        for (i, task) in tasks.iter().enumerate() {
            for pred in &task.predecessors {
                add_link(&mut predecessors[i], task_index[pred.as_str()], 0);
            }
        }
        for c in &constraints {
            match c {
                Constraint::Precedence { before, after, lag } => {
                    add_link(
                        &mut predecessors[task_index[after.as_str()]],
                        task_index[before.as_str()],
                        *lag,
                    );
                }
                Constraint::Release {
                    task_id,
                    earliest_start,
                } => {
                    let i = task_index[task_id.as_str()];
                    release[i] = release[i].max(*earliest_start);
                }
                Constraint::Deadline {
                    task_id,
                    latest_finish,
                } => {
                    let i = task_index[task_id.as_str()];
                    deadlines[i] = Some(deadlines[i].map_or(*latest_finish, |d| d.min(*latest_finish)));
                }
                Constraint::CostCeiling { max_cost } => {
                    cost_ceiling = Some(cost_ceiling.map_or(*max_cost, |c: f64| c.min(*max_cost)));
                }
            }
        }

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, links) in predecessors.iter().enumerate() {
            for link in links {
                successors[link.task].push(i);
            }
        }

        let pred_lists: Vec<Vec<usize>> = predecessors
            .iter()
            .map(|links| links.iter().map(|l| l.task).collect())
            .collect();
        // Validation already rejected cycles.
        let topo_order = topological_order(&pred_lists).unwrap_or_else(|_| (0..n).collect());

        let base_durations: Vec<i64> = tasks.iter().map(Task::base_duration).collect();

        let demands: Vec<Vec<DemandSlot>> = tasks
            .iter()
            .map(|task| {
                task.demands
                    .iter()
                    .map(|d| {
                        let candidates = if d.candidates.is_empty() {
                            resources
                                .iter()
                                .enumerate()
                                .filter(|(_, r)| r.kind == d.kind)
                                .map(|(i, _)| i)
                                .collect()
                        } else {
                            d.candidates
                                .iter()
                                .map(|c| resource_index[c.as_str()])
                                .collect()
                        };
                        DemandSlot {
                            kind: d.kind,
                            quantity: d.quantity,
                            candidates,
                        }
                    })
                    .collect()
            })
            .collect();

        let mut model = Self {
            tasks,
            resources,
            constraints,
            task_index,
            resource_index,
            predecessors,
            successors,
            topo_order,
            base_durations,
            demands,
            release,
            deadlines,
            cost_ceiling,
            scales: ReferenceScales {
                makespan: 1.0,
                cost: 1.0,
                emissions: 1.0,
            },
        };
        model.scales = model.compute_scales();
        Ok(model)
    }

    /// All tasks in input order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// All resources in input order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Constraints as supplied to `load`.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Number of tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Index of a task by ID.
    pub fn task_index(&self, id: &str) -> Option<usize> {
        self.task_index.get(id).copied()
    }

    /// Index of a resource by ID.
    pub fn resource_index(&self, id: &str) -> Option<usize> {
        self.resource_index.get(id).copied()
    }

    /// Resource by ID.
    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resource_index(id).map(|i| &self.resources[i])
    }

    /// Capacity of a resource at time `t`. `None` for unknown IDs.
    pub fn capacity_at(&self, resource_id: &str, t: i64) -> Option<i64> {
        self.resource(resource_id).map(|r| r.capacity_at(t))
    }

    /// Tasks in topological order (lowest index first among ready tasks).
    pub fn topological_order(&self) -> &[usize] {
        &self.topo_order
    }

    /// Incoming precedence links of a task.
    pub fn predecessors(&self, task: usize) -> &[PredecessorLink] {
        &self.predecessors[task]
    }

    /// Direct successors of a task.
    pub fn successors(&self, task: usize) -> &[usize] {
        &self.successors[task]
    }

    /// Resolved demands of a task.
    pub fn demands(&self, task: usize) -> &[DemandSlot] {
        &self.demands[task]
    }

    /// Base duration of a task at nominal efficiency.
    pub fn base_duration(&self, task: usize) -> i64 {
        self.base_durations[task]
    }

    /// Earliest allowed start of a task (pinned start or release date).
    pub fn release(&self, task: usize) -> i64 {
        self.release[task]
    }

    /// Effective deadline of a task.
    pub fn deadline(&self, task: usize) -> Option<i64> {
        self.deadlines[task]
    }

    /// Pinned start of a task.
    pub fn fixed_start(&self, task: usize) -> Option<i64> {
        self.tasks[task].fixed_start
    }

    /// Project budget, if any.
    pub fn cost_ceiling(&self) -> Option<f64> {
        self.cost_ceiling
    }

    /// Normalisation constants for the composite score.
    pub fn reference_scales(&self) -> ReferenceScales {
        self.scales
    }

    /// Duration of a task under a resource choice.
    ///
    /// `choice[d]` indexes into `demands(task)[d].candidates`. The slowest
    /// assigned labor or equipment resource sets the pace:
    /// `ceil(base / min efficiency)`.
    pub fn effective_duration(&self, task: usize, choice: &[usize]) -> i64 {
        let base = self.base_durations[task];
        if base == 0 {
            return 0;
        }
        let slowest = self.demands[task]
            .iter()
            .zip(choice)
            .filter(|(slot, _)| slot.kind.drives_duration() && slot.quantity > 0)
            .filter_map(|(slot, &c)| slot.candidates.get(c))
            .map(|&r| self.resources[r].efficiency)
            .fold(f64::INFINITY, f64::min);
        if slowest.is_finite() {
            (base as f64 / slowest).ceil() as i64
        } else {
            base
        }
    }

    fn compute_scales(&self) -> ReferenceScales {
        // Longest path with lags and release dates.
        let mut earliest_finish = vec![0i64; self.task_count()];
        for &t in &self.topo_order {
            let ready = self.predecessors[t]
                .iter()
                .map(|l| earliest_finish[l.task] + l.lag)
                .fold(self.release[t], i64::max);
            earliest_finish[t] = ready + self.base_durations[t];
        }
        let critical_path = earliest_finish.iter().copied().max().unwrap_or(0);

        let mut cost = 0.0;
        let mut emissions = 0.0;
        for (t, slots) in self.demands.iter().enumerate() {
            let duration = self.base_durations[t] as f64;
            for slot in slots {
                let k = slot.candidates.len().max(1) as f64;
                let mean_cost: f64 = slot
                    .candidates
                    .iter()
                    .map(|&r| self.resources[r].unit_cost)
                    .sum::<f64>()
                    / k;
                let mean_emission: f64 = slot
                    .candidates
                    .iter()
                    .map(|&r| self.resources[r].emission_factor)
                    .sum::<f64>()
                    / k;
                cost += slot.quantity as f64 * duration * mean_cost;
                emissions += slot.quantity as f64 * duration * mean_emission;
            }
        }

        ReferenceScales {
            makespan: (critical_path as f64).max(1.0),
            cost: if cost > 0.0 { cost } else { 1.0 },
            emissions: if emissions > 0.0 { emissions } else { 1.0 },
        }
    }
}

fn add_link(links: &mut Vec<PredecessorLink>, task: usize, lag: i64) {
    match links.iter_mut().find(|l| l.task == task) {
        Some(existing) => existing.lag = existing.lag.max(lag),
        None => links.push(PredecessorLink { task, lag }),
    }
}
