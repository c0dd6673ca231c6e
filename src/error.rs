//! Error types shared by every module of the crate

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GlmError>;

/// Structural failures.
///
/// Slow or failed numerical convergence is never reported through this type;
/// it is recorded in the solver trace instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlmError {
    /// Unsupported or conflicting configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Shapes of data, weights or parameters do not agree
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    /// Penalty parameter arrays of the wrong length
    #[error("shape error: {0}")]
    Shape(String),

    /// `gradient` called on a non-smooth function
    #[error("{0} is not smooth and has no gradient")]
    NotSmooth(&'static str),

    /// `prox` called on a function without an analytic proximal operator
    #[error("{0} has no proximal operator")]
    NotProximable(&'static str),

    /// A numerical primitive could not produce a result
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl GlmError {
    pub(crate) fn dims(what: &'static str, expected: impl ToString, found: impl ToString) -> Self {
        GlmError::DimensionMismatch {
            what,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        GlmError::Configuration(msg.into())
    }
}
