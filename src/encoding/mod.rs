//! Schedule representation.
//!
//! A candidate solution is a [`ScheduleGenome`]: a task order plus a
//! resource choice per demand. [`decode`] turns it into a concrete
//! [`Schedule`](crate::models::Schedule) using a capacity-aware serial
//! placement.

mod decode;
mod genome;

pub use decode::decode;
pub use genome::ScheduleGenome;
