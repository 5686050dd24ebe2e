//! Construction scheduling domain models.
//!
//! Provides the input types (tasks, resources, constraints), the
//! validated [`ProblemModel`] built from them, and the [`Schedule`]
//! output type.
//!
//! # Domain Mappings
//!
//! | u-construct | Site term | Scheduling term |
//! |-------------|-----------|-----------------|
//! | Task | Work package | Activity |
//! | Resource (Labor) | Crew / trade | Renewable resource |
//! | Resource (Equipment) | Plant | Renewable resource |
//! | Resource (Material) | Supply line | Rate-limited resource |
//! | Schedule | Programme | Solution |

mod capacity;
mod constraint;
mod problem;
mod resource;
mod schedule;
mod task;

pub use capacity::{CapacityProfile, CapacityWindow, TimeWindow};
pub use constraint::Constraint;
pub use problem::{DemandSlot, PredecessorLink, ProblemModel, ReferenceScales};
pub use resource::{Resource, ResourceKind};
pub use schedule::{Assignment, ResourceUse, Schedule, Violation, ViolationType};
pub use task::{DurationEstimate, PertEstimate, ResourceDemand, Task};
