//! # Error Types
//!
//! Structured error types for kt_core. Every variant carries enough context
//! to tell the caller which input, series or lookup key needs fixing.
//!
//! ## Taxonomy
//!
//! | Variant              | Stage            | Policy                                   |
//! |----------------------|------------------|------------------------------------------|
//! | `Configuration`      | classify / plan  | fatal, caller must fix input             |
//! | `IncompleteResult`   | extraction       | aborts that configuration only           |
//! | `SolverDivergence`   | solve            | aborts that configuration only           |
//! | `MissingFactor`      | margin           | fatal for the margin step only           |
//!
//! Out-of-range interpolation is not an error; see [`AnalysisWarning`].
//!
//! ## Example
//!
//! ```rust
//! use kt_core::errors::{KtError, KtResult};
//!
//! fn validate_thickness(th: f64) -> KtResult<()> {
//!     if th <= 0.0 {
//!         return Err(KtError::invalid_input("th", th.to_string(), "Thickness must be positive"));
//!     }
//!     Ok(())
//! }
//! assert!(validate_thickness(-1.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for kt_core operations
pub type KtResult<T> = Result<T, KtError>;

/// Structured error type for analysis operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum KtError {
    /// Ambiguous or contradictory load/geometry input
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// An input value is invalid (out of range, wrong sign, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// Solver output is missing a case or has the wrong sample count
    #[error("Incomplete result for '{series}': {reason}")]
    IncompleteResult { series: String, reason: String },

    /// The external solver failed to converge
    #[error("Solver divergence in solution '{solution}': {reason}")]
    SolverDivergence { solution: String, reason: String },

    /// A parameter name was not recognized by the solver model
    #[error("Parameter not found: {name}")]
    ParameterNotFound { name: String },

    /// A correction-factor table has no entry for the requested key
    #[error("Missing correction factor {factor} for key '{key}'")]
    MissingFactor { factor: String, key: String },

    /// The solver round-trip did not signal completion in time
    #[error("Solver timed out after {seconds} s")]
    SolverTimeout { seconds: u64 },

    /// Another solver session is already open against this coupon snapshot
    #[error("Solver session already active for coupon {coupon_id}")]
    SessionBusy { coupon_id: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl KtError {
    /// Create a Configuration error
    pub fn configuration(reason: impl Into<String>) -> Self {
        KtError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        KtError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an IncompleteResult error
    pub fn incomplete(series: impl Into<String>, reason: impl Into<String>) -> Self {
        KtError::IncompleteResult {
            series: series.into(),
            reason: reason.into(),
        }
    }

    /// Create a SolverDivergence error
    pub fn divergence(solution: impl Into<String>, reason: impl Into<String>) -> Self {
        KtError::SolverDivergence {
            solution: solution.into(),
            reason: reason.into(),
        }
    }

    /// Create a ParameterNotFound error
    pub fn parameter_not_found(name: impl Into<String>) -> Self {
        KtError::ParameterNotFound { name: name.into() }
    }

    /// Create a MissingFactor error
    pub fn missing_factor(factor: impl Into<String>, key: impl Into<String>) -> Self {
        KtError::MissingFactor {
            factor: factor.into(),
            key: key.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        KtError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if the caller may retry the same request unchanged.
    ///
    /// Solver-side failures may be retried once by the external caller; the
    /// core itself never retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KtError::SolverDivergence { .. } | KtError::SolverTimeout { .. } | KtError::SessionBusy { .. }
        )
    }

    /// True when the failure only invalidates one configuration (print or
    /// repair) and the pipeline may continue with the others.
    pub fn aborts_case_only(&self) -> bool {
        matches!(
            self,
            KtError::IncompleteResult { .. }
                | KtError::SolverDivergence { .. }
                | KtError::SolverTimeout { .. }
                | KtError::ParameterNotFound { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            KtError::Configuration { .. } => "CONFIGURATION_ERROR",
            KtError::InvalidInput { .. } => "INVALID_INPUT",
            KtError::IncompleteResult { .. } => "INCOMPLETE_RESULT",
            KtError::SolverDivergence { .. } => "SOLVER_DIVERGENCE",
            KtError::ParameterNotFound { .. } => "PARAMETER_NOT_FOUND",
            KtError::MissingFactor { .. } => "MISSING_FACTOR",
            KtError::SolverTimeout { .. } => "SOLVER_TIMEOUT",
            KtError::SessionBusy { .. } => "SESSION_BUSY",
            KtError::FileError { .. } => "FILE_ERROR",
            KtError::SerializationError { .. } => "SERIALIZATION_ERROR",
            KtError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

/// A recoverable condition attached to a result instead of aborting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum AnalysisWarning {
    /// Interpolation input outside its nominal range; the value was clamped
    OutOfRange {
        quantity: String,
        value: f64,
        clamped_to: f64,
        min: f64,
        max: f64,
    },
    /// Kc/Kt could not be computed (zero peak stress)
    UndefinedRatio { quantity: String },
    /// Solution error at or above the acceptance threshold
    SolutionError { error_pct: f64, threshold_pct: f64 },
    /// Adjusted Kts is zero, so no margin can be formed
    ZeroDemand,
    /// Peak stress is compressive; the fatigue margin covers tensile demand only
    CompressiveDemand { kts_adjusted: f64 },
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisWarning::OutOfRange {
                quantity,
                value,
                clamped_to,
                min,
                max,
            } => write!(
                f,
                "{} = {:.4} outside [{}, {}], clamped to {}",
                quantity, value, min, max, clamped_to
            ),
            AnalysisWarning::UndefinedRatio { quantity } => write!(f, "{} is undefined", quantity),
            AnalysisWarning::SolutionError {
                error_pct,
                threshold_pct,
            } => write!(
                f,
                "solution error {:.2}% is not below {:.2}%",
                error_pct, threshold_pct
            ),
            AnalysisWarning::ZeroDemand => write!(f, "adjusted Kts is zero"),
            AnalysisWarning::CompressiveDemand { kts_adjusted } => {
                write!(f, "adjusted Kts {:.1} is compressive, no margin", kts_adjusted)
            }
        }
    }
}
