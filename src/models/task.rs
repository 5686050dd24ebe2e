//! Task model.
//!
//! A task is one unit of construction work (pour slab, erect steel, fit
//! out floor 3). It has a duration estimate, resource demands, precedence
//! links to other tasks, and optional pinned start / deadline.
//!
//! # Duration Estimates
//!
//! Durations are either fixed or a PERT three-point estimate. The
//! scheduled base duration of a three-point estimate is its rounded-up
//! mean `(O + 4M + P) / 6`.
//!
//! # Reference
//! Malcolm et al. (1959), "Application of a technique for R&D program evaluation" (PERT)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ResourceKind;

/// A construction task to be scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Duration estimate (time units at efficiency 1.0).
    pub duration: DurationEstimate,
    /// Resources the task draws while running.
    pub demands: Vec<ResourceDemand>,
    /// IDs of tasks that must finish before this one starts.
    pub predecessors: Vec<String>,
    /// Pinned start time. `None` = free.
    pub fixed_start: Option<i64>,
    /// Latest completion time. `None` = no deadline.
    pub deadline: Option<i64>,
    /// Domain-specific key-value metadata.
    pub attributes: HashMap<String, String>,
}

impl Task {
    /// Creates a new task with the given ID and fixed duration.
    pub fn new(id: impl Into<String>, duration: i64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            duration: DurationEstimate::Fixed(duration),
            demands: Vec::new(),
            predecessors: Vec::new(),
            fixed_start: None,
            deadline: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets the task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the duration with a three-point estimate.
    pub fn with_pert(mut self, optimistic: i64, most_likely: i64, pessimistic: i64) -> Self {
        self.duration =
            DurationEstimate::ThreePoint(PertEstimate::new(optimistic, most_likely, pessimistic));
        self
    }

    /// Adds a resource demand.
    pub fn with_demand(mut self, demand: ResourceDemand) -> Self {
        self.demands.push(demand);
        self
    }

    /// Adds a demand for `quantity` units of one specific resource.
    pub fn requires(self, resource_id: impl Into<String>, kind: ResourceKind, quantity: i64) -> Self {
        self.with_demand(
            ResourceDemand::new(kind, quantity).with_candidates(vec![resource_id.into()]),
        )
    }

    /// Adds a predecessor task ID.
    pub fn with_predecessor(mut self, predecessor_id: impl Into<String>) -> Self {
        self.predecessors.push(predecessor_id.into());
        self
    }

    /// Pins the start time.
    pub fn with_fixed_start(mut self, start: i64) -> Self {
        self.fixed_start = Some(start);
        self
    }

    /// Sets the deadline (latest completion time).
    pub fn with_deadline(mut self, deadline: i64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Adds a domain-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Base duration at nominal efficiency.
    pub fn base_duration(&self) -> i64 {
        self.duration.base_units()
    }
}

/// How long a task takes at nominal resource efficiency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DurationEstimate {
    /// Deterministic duration.
    Fixed(i64),
    /// PERT three-point estimate.
    ThreePoint(PertEstimate),
}

impl DurationEstimate {
    /// Scheduled duration in whole time units.
    pub fn base_units(&self) -> i64 {
        match self {
            Self::Fixed(d) => *d,
            Self::ThreePoint(p) => p.mean().ceil() as i64,
        }
    }

    /// Smallest value the estimate mentions (for sign checks).
    pub fn min_units(&self) -> i64 {
        match self {
            Self::Fixed(d) => *d,
            Self::ThreePoint(p) => p.optimistic.min(p.most_likely).min(p.pessimistic),
        }
    }
}

impl Default for DurationEstimate {
    fn default() -> Self {
        Self::Fixed(0)
    }
}

/// PERT three-point duration estimate.
///
/// Mean = (O + 4M + P) / 6, StdDev = (P - O) / 6
///
/// # References
///
/// Malcolm et al. (1959), Clark (1962)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PertEstimate {
    /// Optimistic duration.
    pub optimistic: i64,
    /// Most likely duration.
    pub most_likely: i64,
    /// Pessimistic duration.
    pub pessimistic: i64,
}

impl PertEstimate {
    /// Creates a new PERT estimate.
    pub fn new(optimistic: i64, most_likely: i64, pessimistic: i64) -> Self {
        Self {
            optimistic,
            most_likely,
            pessimistic,
        }
    }

    /// Creates from percentage spread.
    ///
    /// E.g., `from_variance(10, 0.2)` creates O=8, M=10, P=12.
    pub fn from_variance(base: i64, variance_ratio: f64) -> Self {
        let spread = (base as f64 * variance_ratio) as i64;
        Self::new(base - spread, base, base + spread)
    }

    /// PERT mean (expected duration): `(O + 4M + P) / 6`.
    pub fn mean(&self) -> f64 {
        (self.optimistic as f64 + 4.0 * self.most_likely as f64 + self.pessimistic as f64) / 6.0
    }

    /// PERT standard deviation: `(P - O) / 6`.
    pub fn std_dev(&self) -> f64 {
        (self.pessimistic - self.optimistic) as f64 / 6.0
    }
}

/// A resource demand of a task.
///
/// The task needs `quantity` units of one resource of `kind` for its whole
/// duration. Which resource fills the demand is a search decision: the
/// genome picks one entry of `candidates` (empty = every declared resource
/// of that kind).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDemand {
    /// Required resource kind.
    pub kind: ResourceKind,
    /// Units drawn simultaneously.
    pub quantity: i64,
    /// Resource IDs allowed to fill the demand.
    pub candidates: Vec<String>,
}

impl ResourceDemand {
    /// Creates a demand open to any resource of `kind`.
    pub fn new(kind: ResourceKind, quantity: i64) -> Self {
        Self {
            kind,
            quantity,
            candidates: Vec::new(),
        }
    }

    /// Restricts the demand to the given resources.
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = Task::new("FND", 5)
            .with_name("Foundations")
            .with_predecessor("EXC")
            .with_fixed_start(3)
            .with_deadline(20)
            .requires("CREW", ResourceKind::Labor, 4)
            .with_attribute("zone", "A");

        assert_eq!(task.id, "FND");
        assert_eq!(task.name, "Foundations");
        assert_eq!(task.base_duration(), 5);
        assert_eq!(task.predecessors, vec!["EXC"]);
        assert_eq!(task.fixed_start, Some(3));
        assert_eq!(task.deadline, Some(20));
        assert_eq!(task.demands.len(), 1);
        assert_eq!(task.demands[0].quantity, 4);
        assert_eq!(task.demands[0].candidates, vec!["CREW"]);
        assert_eq!(task.attributes.get("zone"), Some(&"A".to_string()));
    }

    #[test]
    fn test_pert_calculation() {
        let pert = PertEstimate::new(4, 6, 14);

        // Mean = (4 + 4*6 + 14) / 6 = 42/6 = 7
        assert!((pert.mean() - 7.0).abs() < 1e-10);
        // StdDev = (14 - 4) / 6
        assert!((pert.std_dev() - 10.0 / 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_pert_base_units_round_up() {
        // (2 + 12 + 5) / 6 = 3.1666.. → 4
        let task = Task::new("T", 0).with_pert(2, 3, 5);
        assert_eq!(task.base_duration(), 4);
    }

    #[test]
    fn test_pert_from_variance() {
        let pert = PertEstimate::from_variance(10, 0.2);
        assert_eq!(pert.optimistic, 8);
        assert_eq!(pert.most_likely, 10);
        assert_eq!(pert.pessimistic, 12);
    }

    #[test]
    fn test_min_units() {
        assert_eq!(DurationEstimate::Fixed(-1).min_units(), -1);
        let d = DurationEstimate::ThreePoint(PertEstimate::new(-2, 3, 5));
        assert_eq!(d.min_units(), -2);
    }
}
