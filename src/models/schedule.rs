//! Schedule (solution) model.
//!
//! A schedule is the decoded timeline of one candidate: every task with
//! its start, finish, and the resource units it draws. Constraint
//! violations found while decoding are reported alongside, never dropped.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A complete schedule (timeline of one candidate solution).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Task assignments in decode order.
    pub assignments: Vec<Assignment>,
    /// Constraint violations detected while decoding.
    pub violations: Vec<Violation>,
}

/// A task-time-resources assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Assigned task ID.
    pub task_id: String,
    /// Index of the task in the problem model.
    pub task_index: usize,
    /// Start time.
    pub start: i64,
    /// Finish time (exclusive).
    pub finish: i64,
    /// Resource units drawn over `[start, finish)`.
    pub resources: Vec<ResourceUse>,
}

/// Units of one resource drawn by an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUse {
    /// Resource ID.
    pub resource_id: String,
    /// Index of the resource in the problem model.
    pub resource_index: usize,
    /// Units drawn.
    pub quantity: i64,
}

/// A constraint violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related entity ID (task or resource).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
    /// Severity (0-100, higher = worse).
    pub severity: i32,
}

/// Classification of constraint violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Task completed after its deadline.
    DeadlineMiss,
    /// Resource demand beyond capacity in some time slice.
    CapacityExceeded,
    /// Task started before a predecessor finished.
    PrecedenceViolation,
    /// Pinned task could not start at its pinned time.
    FixedStartMissed,
}

impl Assignment {
    /// Creates a new assignment without resources.
    pub fn new(task_id: impl Into<String>, task_index: usize, start: i64, finish: i64) -> Self {
        Self {
            task_id: task_id.into(),
            task_index,
            start,
            finish,
            resources: Vec::new(),
        }
    }

    /// Adds a resource use.
    pub fn with_resource(
        mut self,
        resource_id: impl Into<String>,
        resource_index: usize,
        quantity: i64,
    ) -> Self {
        self.resources.push(ResourceUse {
            resource_id: resource_id.into(),
            resource_index,
            quantity,
        });
        self
    }

    /// Duration (finish - start).
    #[inline]
    pub fn duration(&self) -> i64 {
        self.finish - self.start
    }
}

impl Violation {
    /// Creates a deadline miss violation.
    pub fn deadline_miss(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::DeadlineMiss,
            entity_id: task_id.into(),
            message: message.into(),
            severity: 80,
        }
    }

    /// Creates a capacity exceeded violation.
    pub fn capacity_exceeded(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::CapacityExceeded,
            entity_id: resource_id.into(),
            message: message.into(),
            severity: 90,
        }
    }

    /// Creates a precedence violation.
    pub fn precedence_violation(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::PrecedenceViolation,
            entity_id: task_id.into(),
            message: message.into(),
            severity: 95,
        }
    }

    /// Creates a missed pinned-start violation.
    pub fn fixed_start_missed(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::FixedStartMissed,
            entity_id: task_id.into(),
            message: message.into(),
            severity: 85,
        }
    }
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an assignment.
    pub fn add_assignment(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    /// Adds a violation.
    pub fn add_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Whether the schedule has no violations.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations of one type.
    pub fn violation_count(&self, violation_type: ViolationType) -> usize {
        self.violations
            .iter()
            .filter(|v| v.violation_type == violation_type)
            .count()
    }

    /// Makespan: latest finish across all assignments.
    pub fn makespan(&self) -> i64 {
        self.assignments.iter().map(|a| a.finish).max().unwrap_or(0)
    }

    /// Finds the assignment for a given task.
    pub fn assignment_for_task(&self, task_id: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.task_id == task_id)
    }

    /// Start time of a task.
    pub fn start_of(&self, task_id: &str) -> Option<i64> {
        self.assignment_for_task(task_id).map(|a| a.start)
    }

    /// Finish time of a task.
    pub fn finish_of(&self, task_id: &str) -> Option<i64> {
        self.assignment_for_task(task_id).map(|a| a.finish)
    }

    /// Unit-time usage for every resource that appears in the schedule.
    pub fn all_usages(&self) -> HashMap<String, i64> {
        let mut usage: HashMap<String, i64> = HashMap::new();
        for a in &self.assignments {
            for r in &a.resources {
                *usage.entry(r.resource_id.clone()).or_insert(0) += r.quantity * a.duration();
            }
        }
        usage
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schedule() -> Schedule {
        let mut s = Schedule::new();
        s.add_assignment(Assignment::new("EXC", 0, 0, 5).with_resource("DIGGER", 0, 1));
        s.add_assignment(
            Assignment::new("FND", 1, 5, 8)
                .with_resource("CREW", 1, 3)
                .with_resource("DIGGER", 0, 1),
        );
        s.add_assignment(Assignment::new("SITE", 2, 0, 2).with_resource("CREW", 1, 2));
        s
    }

    #[test]
    fn test_schedule_makespan() {
        assert_eq!(sample_schedule().makespan(), 8);
    }

    #[test]
    fn test_schedule_is_valid() {
        let s = sample_schedule();
        assert!(s.is_valid());

        let mut s2 = sample_schedule();
        s2.add_violation(Violation::deadline_miss("FND", "late by 1"));
        assert!(!s2.is_valid());
        assert_eq!(s2.violation_count(ViolationType::DeadlineMiss), 1);
        assert_eq!(s2.violation_count(ViolationType::CapacityExceeded), 0);
    }

    #[test]
    fn test_lookup_by_task() {
        let s = sample_schedule();
        assert_eq!(s.start_of("FND"), Some(5));
        assert_eq!(s.finish_of("FND"), Some(8));
        assert!(s.assignment_for_task("NOPE").is_none());
        assert_eq!(s.assignment_for_task("EXC").map(|a| a.duration()), Some(5));
    }

    #[test]
    fn test_resource_usage() {
        let s = sample_schedule();
        let all = s.all_usages();
        assert_eq!(all["DIGGER"], 8);
        // CREW: 3 units × 3 + 2 units × 2
        assert_eq!(all["CREW"], 13);
    }

    #[test]
    fn test_empty_schedule() {
        let s = Schedule::new();
        assert_eq!(s.makespan(), 0);
        assert!(s.is_valid());
        assert_eq!(s.assignment_count(), 0);
    }

    #[test]
    fn test_violation_factories() {
        let v1 = Violation::capacity_exceeded("CREW", "over");
        assert_eq!(v1.violation_type, ViolationType::CapacityExceeded);
        assert_eq!(v1.entity_id, "CREW");

        let v2 = Violation::precedence_violation("FND", "early");
        assert_eq!(v2.violation_type, ViolationType::PrecedenceViolation);

        let v3 = Violation::fixed_start_missed("FND", "pinned at 3");
        assert_eq!(v3.violation_type, ViolationType::FixedStartMissed);
    }
}
