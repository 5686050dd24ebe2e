//! Fitness evaluation and project KPIs.
//!
//! - [`FitnessEvaluator`]: composite score used by every search engine
//! - [`ProjectKpi`]: reporting metrics for the final schedule

mod evaluator;
mod kpi;

pub use evaluator::{FitnessEvaluator, FitnessReport, ObjectiveWeights, PenaltyWeights};
pub use kpi::ProjectKpi;
