//! Project performance indicators.
//!
//! Computed once for the final schedule of a run, for reporting.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest finish time |
//! | Cost | Σ quantity × unit cost × duration |
//! | Emissions | Σ quantity × emission factor × duration (kg CO₂e) |
//! | Total / Max Tardiness | Σ / max of max(0, finish − deadline) |
//! | On-Time Rate | Fraction of tasks meeting their deadline |
//! | Utilization | Unit-time used / (base capacity × makespan) |
//! | Avg Flow Time | Mean of (finish − release) |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{ProblemModel, Schedule};

/// Project performance indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectKpi {
    /// Latest finish time.
    pub makespan: i64,
    /// Total cost.
    pub cost: f64,
    /// Total emissions.
    pub emissions: f64,
    /// Emissions per unit of makespan.
    pub emissions_per_time_unit: f64,
    /// Sum of tardiness across all tasks.
    pub total_tardiness: i64,
    /// Maximum tardiness of any single task.
    pub max_tardiness: i64,
    /// Fraction of tasks finishing on time (0.0..1.0).
    pub on_time_rate: f64,
    /// Mean utilization over resources that appear in the schedule.
    pub avg_utilization: f64,
    /// Per-resource utilization.
    pub utilization_by_resource: HashMap<String, f64>,
    /// Mean of (finish − release).
    pub avg_flow_time: f64,
}

impl ProjectKpi {
    /// Computes KPIs for a schedule of `problem`.
    pub fn calculate(schedule: &Schedule, problem: &ProblemModel) -> Self {
        let makespan = schedule.makespan();
        let mut total_tardiness = 0i64;
        let mut max_tardiness = 0i64;
        let mut on_time = 0usize;
        let mut total_flow = 0.0;
        let mut cost = 0.0;
        let mut emissions = 0.0;

        let mut counted = 0usize;

        // Assignments naming tasks or resources outside `problem` are skipped.
        for a in &schedule.assignments {
            let t = a.task_index;
            if t >= problem.task_count() {
                continue;
            }
            counted += 1;
            total_flow += (a.finish - problem.release(t)) as f64;
            match problem.deadline(t) {
                Some(deadline) if a.finish > deadline => {
                    let late = a.finish - deadline;
                    total_tardiness += late;
                    max_tardiness = max_tardiness.max(late);
                }
                _ => on_time += 1,
            }
            for u in &a.resources {
                let Some(r) = problem.resources().get(u.resource_index) else {
                    continue;
                };
                cost += u.quantity as f64 * r.unit_cost * a.duration() as f64;
                emissions += u.quantity as f64 * r.emission_factor * a.duration() as f64;
            }
        }

        let utilization_by_resource: HashMap<String, f64> = schedule
            .all_usages()
            .into_iter()
            .map(|(id, used)| {
                let available = problem
                    .resource(&id)
                    .map_or(0, |r| r.capacity)
                    .saturating_mul(makespan);
                let u = if available > 0 {
                    used as f64 / available as f64
                } else {
                    0.0
                };
                (id, u)
            })
            .collect();
        let avg_utilization = if utilization_by_resource.is_empty() {
            0.0
        } else {
            utilization_by_resource.values().sum::<f64>() / utilization_by_resource.len() as f64
        };

        Self {
            makespan,
            cost,
            emissions,
            emissions_per_time_unit: if makespan > 0 {
                emissions / makespan as f64
            } else {
                0.0
            },
            total_tardiness,
            max_tardiness,
            on_time_rate: if counted == 0 {
                1.0
            } else {
                on_time as f64 / counted as f64
            },
            avg_utilization,
            utilization_by_resource,
            avg_flow_time: if counted == 0 {
                0.0
            } else {
                total_flow / counted as f64
            },
        }
    }

    /// Whether the project meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_tardiness: i64, min_utilization: f64) -> bool {
        self.max_tardiness <= max_tardiness && self.avg_utilization >= min_utilization
    }
}
