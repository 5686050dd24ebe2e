//! Run configuration.
//!
//! [`OptimizerConfig`] deserializes from camelCase keys with every field
//! optional:
//!
//! ```
//! use u_construct::config::{OptimizerConfig, SearchMode};
//!
//! let cfg = OptimizerConfig {
//!     population_size: 20,
//!     search_mode: SearchMode::Reinforcement,
//!     ..OptimizerConfig::default()
//! };
//! assert!(cfg.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::fitness::{FitnessEvaluator, ObjectiveWeights, PenaltyWeights};
use crate::ga::{CrossoverType, GeneticOperators, MutationType};

/// Which search engine drives the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
    /// Population-based genetic algorithm.
    #[default]
    Genetic,
    /// Policy-gradient construction agent.
    Reinforcement,
}

/// Options for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerConfig {
    /// Individuals per generation (episodes per batch in RL mode).
    pub population_size: usize,
    /// Maximum number of generations after the initial one.
    pub generations: usize,
    /// Probability that a selected pair is recombined.
    pub crossover_rate: f64,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    /// Candidates sampled per tournament.
    pub tournament_size: usize,
    /// Generations without improvement before stopping (0 = never).
    pub stagnation_limit: usize,
    /// Minimum score decrease that counts as improvement.
    pub stagnation_epsilon: f64,
    /// Objective weights.
    pub weights: ObjectiveWeights,
    /// Amplify the emissions weight by `eco_multiplier`.
    pub eco_mode: bool,
    /// Emissions weight factor applied in eco mode.
    pub eco_multiplier: f64,
    /// Random seed.
    pub seed: u64,
    /// Search engine.
    pub search_mode: SearchMode,
    /// Evaluation threads (0 = one per core).
    pub workers: usize,
    /// Constraint penalty multipliers.
    pub penalty: PenaltyWeights,
    /// Largest penalty accepted for an infeasible best schedule.
    pub acceptable_penalty: f64,
    /// Order crossover strategy.
    pub crossover: CrossoverType,
    /// Order mutation strategy.
    pub mutation: MutationType,
    /// Policy-gradient step size (RL mode).
    pub learning_rate: f64,
    /// Reward discount factor (RL mode).
    pub discount: f64,
    /// Scale of the terminal makespan bonus (RL mode).
    pub makespan_bonus: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            crossover_rate: 0.7,
            mutation_rate: 0.1,
            tournament_size: 3,
            stagnation_limit: 20,
            stagnation_epsilon: 1e-9,
            weights: ObjectiveWeights::default(),
            eco_mode: false,
            eco_multiplier: 4.0,
            seed: 42,
            search_mode: SearchMode::Genetic,
            workers: 0,
            penalty: PenaltyWeights::default(),
            acceptable_penalty: 0.0,
            crossover: CrossoverType::Order,
            mutation: MutationType::Swap,
            learning_rate: 0.1,
            discount: 0.95,
            makespan_bonus: 1.0,
        }
    }
}

impl OptimizerConfig {
    /// Checks every option, returning the first out-of-range one.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.population_size < 2 {
            return Err(ConfigurationError::new(
                "populationSize",
                format!("must be at least 2, got {}", self.population_size),
            ));
        }
        unit_interval("crossoverRate", self.crossover_rate)?;
        unit_interval("mutationRate", self.mutation_rate)?;
        if self.tournament_size < 2 || self.tournament_size > self.population_size {
            return Err(ConfigurationError::new(
                "tournamentSize",
                format!(
                    "must be in [2, populationSize = {}], got {}",
                    self.population_size, self.tournament_size
                ),
            ));
        }
        non_negative("stagnationEpsilon", self.stagnation_epsilon)?;

        let w = &self.weights;
        non_negative("weights.time", w.time)?;
        non_negative("weights.cost", w.cost)?;
        non_negative("weights.emissions", w.emissions)?;
        if w.time + w.cost + w.emissions <= 0.0 {
            return Err(ConfigurationError::new("weights", "at least one weight must be positive"));
        }
        if !self.eco_multiplier.is_finite() || self.eco_multiplier < 1.0 {
            return Err(ConfigurationError::new(
                "ecoMultiplier",
                format!("must be a finite value ≥ 1, got {}", self.eco_multiplier),
            ));
        }

        let p = &self.penalty;
        non_negative("penalty.overload", p.overload)?;
        non_negative("penalty.precedence", p.precedence)?;
        non_negative("penalty.deadline", p.deadline)?;
        non_negative("penalty.costOverrun", p.cost_overrun)?;
        if self.acceptable_penalty.is_nan() || self.acceptable_penalty < 0.0 {
            return Err(ConfigurationError::new(
                "acceptablePenalty",
                format!("must be ≥ 0, got {}", self.acceptable_penalty),
            ));
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigurationError::new(
                "learningRate",
                format!("must be a finite value > 0, got {}", self.learning_rate),
            ));
        }
        unit_interval("discount", self.discount)?;
        non_negative("makespanBonus", self.makespan_bonus)?;
        Ok(())
    }

    /// Objective weights after applying eco mode.
    pub fn effective_weights(&self) -> ObjectiveWeights {
        let mut w = self.weights;
        if self.eco_mode {
            w.emissions *= self.eco_multiplier;
        }
        w
    }

    /// Evaluator for this configuration.
    pub fn evaluator(&self) -> FitnessEvaluator {
        FitnessEvaluator::new(self.effective_weights(), self.penalty)
    }

    /// Genetic operators for this configuration.
    pub fn operators(&self) -> GeneticOperators {
        GeneticOperators {
            crossover_type: self.crossover,
            mutation_type: self.mutation,
            mutation_rate: self.mutation_rate,
        }
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::new(field, format!("must be in [0, 1], got {value}")))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::new(field, format!("must be a finite value ≥ 0, got {value}")))
    }
}
