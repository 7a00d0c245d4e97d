//! Error types
//!
//! Only caller-visible failure kinds live here. "Nothing to trade" is not an
//! error and is modelled by [`crate::types::Signal`].

use serde::Serialize;
use thiserror::Error;

/// Rejected probability value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbabilityError {
    #[error("probability {value} from {source_model} is outside (0, 1)")]
    OutOfRange { value: f64, source_model: String },

    #[error("probability from {source_model} is not finite")]
    NonFinite { source_model: String },
}

/// Mean-variance solver failures.
///
/// Every variant degrades to equal weighting in
/// [`crate::portfolio::PortfolioOptimizer::optimize_weights`]; the variant is
/// kept on the result so callers can tell them apart.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerError {
    #[error("no assets to optimize")]
    Empty,

    #[error("dimension mismatch: {returns} expected returns vs {rows}x{cols} correlation matrix")]
    DimensionMismatch {
        returns: usize,
        rows: usize,
        cols: usize,
    },

    #[error("non-finite value in solver input")]
    NonFiniteInput,

    #[error("solver did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("solver produced non-finite weights")]
    NonFiniteOutput,
}

impl OptimizerError {
    /// True for failures caused by malformed input rather than the solve itself
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            OptimizerError::Empty
                | OptimizerError::DimensionMismatch { .. }
                | OptimizerError::NonFiniteInput
        )
    }
}

/// Malformed correlation matrix
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    #[error("correlation matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("{labels} labels for a {size}x{size} matrix")]
    LabelMismatch { labels: usize, size: usize },

    #[error("entry ({row}, {col}) = {value} is outside [-1, 1]")]
    OutOfRange { row: usize, col: usize, value: f64 },

    #[error("diagonal entry {index} = {value}, expected 1")]
    NonUnitDiagonal { index: usize, value: f64 },
}

/// Configuration validation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_error_kinds() {
        assert!(OptimizerError::Empty.is_invalid_input());
        assert!(OptimizerError::DimensionMismatch {
            returns: 2,
            rows: 3,
            cols: 3
        }
        .is_invalid_input());
        assert!(!OptimizerError::NonConvergence { iterations: 10 }.is_invalid_input());
        assert!(!OptimizerError::NonFiniteOutput.is_invalid_input());
    }

    #[test]
    fn test_error_messages() {
        let e = ProbabilityError::OutOfRange {
            value: 1.2,
            source_model: "llm".to_string(),
        };
        assert!(e.to_string().contains("1.2"));
        let e = ConfigError::InvalidValue {
            field: "sizing.min_bet",
            reason: "must be positive".to_string(),
        };
        assert_eq!(e.to_string(), "invalid value for sizing.min_bet: must be positive");
    }
}
