//! Error types for the kinetica physics engine.
//!
//! The taxonomy distinguishes errors that abort a single collision record
//! (numerical noise that self-corrects next step) from errors that prevent
//! forward progress of the whole simulation. Callers observe `step()` either
//! succeeding with an updated state or failing with an error naming the stage
//! that gave up; the simulation remains usable in either case.

use thiserror::Error;

/// Result type alias for engine operations.
pub type SimResult<T> = Result<T, SimError>;

/// Error kinds for the collision engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Geometry that cannot form a valid body: arc endpoints not equidistant
    /// from the center, zero-length segment used as a normal direction.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Non-finite distance, zero-vector normalization, or NaN reaching the
    /// impulse matrix. Aborts the current collision record only.
    #[error("numerical failure in {context}: {details}")]
    NumericalFailure {
        /// Operation that produced the bad value.
        context: &'static str,
        /// Description of the offending value.
        details: String,
    },

    /// The impulse system has no consistent solution: the right-hand side is
    /// outside the column space of the collision matrix.
    #[error("singular matrix: right-hand side inconsistent at row {row}")]
    SingularMatrix {
        /// Row at which inconsistency was detected, after pivoting.
        row: usize,
    },

    /// Event bracketing did not converge within the bisection budget.
    #[error("collision bracketing did not converge within {steps} bisection steps")]
    BisectionExhausted {
        /// Number of bisection steps attempted.
        steps: usize,
    },

    /// The serial collision handler kept producing ricochets beyond its
    /// iteration budget.
    #[error("collision handling stalled after {iterations} iterations")]
    StallDetected {
        /// Number of handler iterations attempted.
        iterations: usize,
    },

    /// An operation was requested on an object that does not support it.
    #[error("object does not support {operation}")]
    CapabilityMismatch {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// A configuration value is outside its documented range.
    #[error("invalid configuration: {parameter} must satisfy {constraint}")]
    InvalidConfiguration {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Constraint the value violates.
        constraint: &'static str,
    },
}

impl SimError {
    /// Creates a numerical failure error.
    pub fn numerical(context: &'static str, details: impl Into<String>) -> Self {
        Self::NumericalFailure {
            context,
            details: details.into(),
        }
    }

    /// Creates an invalid geometry error.
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::geometry("arc endpoints not equidistant from center");
        assert!(err.to_string().contains("invalid geometry"));
    }

    #[test]
    fn test_singular_matrix_names_row() {
        let err = SimError::SingularMatrix { row: 3 };
        assert!(err.to_string().contains("row 3"));
    }
}
