//! GA-based schedule optimization.
//!
//! Evolves [`ScheduleGenome`](crate::encoding::ScheduleGenome)s with
//! tournament selection, order-based crossover, per-gene mutation,
//! repair, and single-individual elitism.
//!
//! # Submodules
//!
//! - [`operators`]: Runtime-selectable crossover and mutation strategies
//!
//! # Reference
//! - Hartmann (1998), "A competitive genetic algorithm for
//!   resource-constrained project scheduling"
//! - Bierwirth (1995), "A generalized permutation approach to JSSP"

mod engine;
pub mod operators;

pub use engine::GeneticSearch;
pub use operators::{
    order_crossover, precedence_crossover, reassign_mutation, tournament_select,
    uniform_assignment_crossover, CrossoverType, GeneticOperators, MutationType,
};
