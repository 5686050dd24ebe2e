//! Project-level scheduling constraints.
//!
//! Constraints supplement the task definitions: extra precedence links
//! with lags (curing time between pour and strip), release dates (permit
//! granted, site handed over), deadlines, and an overall budget.
//!
//! # Reference
//! Brucker (2007), "Scheduling Algorithms", Ch. 2

use serde::{Deserialize, Serialize};

/// A project scheduling constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Constraint {
    /// Task `after` cannot start until `before` finishes + `lag`.
    ///
    /// # Reference
    /// Pinedo (2016), "Scheduling", precedence constraints (Ch. 2.1)
    Precedence {
        before: String,
        after: String,
        lag: i64,
    },

    /// Task cannot start before `earliest_start`.
    Release { task_id: String, earliest_start: i64 },

    /// Task should finish by `latest_finish` (soft, penalised per unit late).
    Deadline { task_id: String, latest_finish: i64 },

    /// Total project cost should not exceed `max_cost` (soft).
    CostCeiling { max_cost: f64 },
}

impl Constraint {
    /// Creates a zero-lag precedence constraint.
    pub fn precedence(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self::Precedence {
            before: before.into(),
            after: after.into(),
            lag: 0,
        }
    }

    /// Creates a precedence constraint with a minimum lag.
    pub fn precedence_with_lag(
        before: impl Into<String>,
        after: impl Into<String>,
        lag: i64,
    ) -> Self {
        Self::Precedence {
            before: before.into(),
            after: after.into(),
            lag,
        }
    }

    /// Creates a release-date constraint.
    pub fn release(task_id: impl Into<String>, earliest_start: i64) -> Self {
        Self::Release {
            task_id: task_id.into(),
            earliest_start,
        }
    }

    /// Creates a deadline constraint.
    pub fn deadline(task_id: impl Into<String>, latest_finish: i64) -> Self {
        Self::Deadline {
            task_id: task_id.into(),
            latest_finish,
        }
    }

    /// Creates a budget constraint.
    pub fn cost_ceiling(max_cost: f64) -> Self {
        Self::CostCeiling { max_cost }
    }

    /// Task IDs this constraint refers to.
    pub fn task_refs(&self) -> Vec<&str> {
        match self {
            Self::Precedence { before, after, .. } => vec![before.as_str(), after.as_str()],
            Self::Release { task_id, .. } | Self::Deadline { task_id, .. } => {
                vec![task_id.as_str()]
            }
            Self::CostCeiling { .. } => Vec::new(),
        }
    }
}
