//! Reinforcement-learning search.
//!
//! An alternative [`SearchEngine`](crate::search::SearchEngine) that
//! replaces population breeding with a policy learned over construction
//! episodes. It shares the decoder and evaluator with the GA.
//!
//! # Submodules
//!
//! - [`policy`]: tabular softmax preferences and their gradient updates

mod engine;
pub mod policy;

pub use engine::PolicySearch;
pub use policy::Policy;
