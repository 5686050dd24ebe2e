//! Error taxonomy.
//!
//! | Error | Raised | Recoverable |
//! |-------|--------|-------------|
//! | [`ValidationError`] | `ProblemModel::load`, before any search | No |
//! | [`ConfigurationError`] | `OptimizerConfig::validate`, before run start | No |
//! | [`InfeasibleProblemError`] | end of run, penalty above threshold | Carries best-effort result |

use thiserror::Error;

use crate::controller::OptimizationResult;
pub use crate::validation::ValidationError;

/// Out-of-range run parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration `{field}`: {reason}")]
pub struct ConfigurationError {
    /// Offending option (camelCase, as in serialized config).
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ConfigurationError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Search budget exhausted without an acceptable schedule.
///
/// The best schedule found is attached so callers can still inspect or
/// report it.
#[derive(Debug, Clone, Error)]
#[error(
    "no acceptable schedule: best penalty {} exceeds threshold {}",
    .best.report.penalty,
    .acceptable_penalty
)]
pub struct InfeasibleProblemError {
    /// Best-effort result of the run.
    pub best: Box<OptimizationResult>,
    /// Threshold the penalty had to meet.
    pub acceptable_penalty: f64,
}

/// Any failure of an optimization run.
#[derive(Debug, Clone, Error)]
pub enum OptimizeError {
    /// Problem input rejected at load time.
    #[error("invalid problem ({} issue(s)): {}", .0.len(), first_message(.0))]
    Validation(Vec<ValidationError>),
    /// Run configuration rejected before start.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// No acceptable schedule within budget.
    #[error(transparent)]
    Infeasible(#[from] InfeasibleProblemError),
}

impl From<Vec<ValidationError>> for OptimizeError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Validation(errors)
    }
}

fn first_message(errors: &[ValidationError]) -> String {
    errors.first().map(ToString::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_configuration_error_display() {
        let e = ConfigurationError::new("populationSize", "must be at least 2, got 0");
        assert_eq!(
            e.to_string(),
            "invalid configuration `populationSize`: must be at least 2, got 0"
        );
    }

    #[test]
    fn test_validation_variant_display() {
        let errors = vec![ValidationError {
            kind: ValidationErrorKind::CyclicPrecedence,
            message: "A → B → A".into(),
        }];
        let e = OptimizeError::from(errors);
        let msg = e.to_string();
        assert!(msg.contains("1 issue"));
        assert!(msg.contains("CyclicPrecedence"));
    }

    #[test]
    fn test_configuration_converts() {
        let e: OptimizeError = ConfigurationError::new("seed", "x").into();
        assert!(matches!(e, OptimizeError::Configuration(_)));
    }
}
