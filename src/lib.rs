//! Construction resource optimizer.
//!
//! Allocates crews, plant, and materials across a construction programme,
//! trading project duration and cost against carbon emissions under
//! precedence and resource-capacity constraints.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Task`, `Resource`, `Constraint`,
//!   `ProblemModel`, `Schedule`
//! - **`validation`**: Input integrity checks (duplicate IDs, DAG cycles, resource refs)
//! - **`encoding`**: `ScheduleGenome` (task order + resource choice), decode, repair
//! - **`fitness`**: Composite score (makespan, cost, emissions, penalty) and KPIs
//! - **`ga`**: Genetic-algorithm search engine and operators
//! - **`rl`**: Policy-gradient search engine
//! - **`search`**: Shared engine contract, diagnostics, cancellation
//! - **`config`**: Run configuration
//! - **`controller`**: Run orchestration
//! - **`error`**: Error taxonomy
//!
//! # Architecture
//!
//! ```text
//! ProblemModel → ScheduleGenome population → FitnessEvaluator
//!      ↑                   ↓                        ↓
//!  validation         SearchEngine (GA | RL) ← scores
//!                          ↓
//!              OptimizationController → OptimizationResult
//! ```
//!
//! Parsing of task files, CLI handling, and report rendering live outside
//! this crate; it consumes typed inputs and returns typed results.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Kolisch & Hartmann (1999), "Heuristic algorithms for the
//!   resource-constrained project scheduling problem"
//! - Hartmann (1998), "A competitive genetic algorithm for
//!   resource-constrained project scheduling"

pub mod config;
pub mod controller;
pub mod encoding;
pub mod error;
pub mod fitness;
pub mod ga;
pub mod models;
pub mod rl;
pub mod search;
pub mod validation;

pub use config::{OptimizerConfig, SearchMode};
pub use controller::{optimize, OptimizationController, OptimizationResult};
pub use error::{ConfigurationError, InfeasibleProblemError, OptimizeError};
