//! # Analysis Errors
//!
//! Every fallible operation in the crate returns [`AnalysisError`]. Validation
//! problems (too few samples, unordered timestamps, bad parameters) are raised
//! before any computation starts. Numeric degeneracies inside rolling windows
//! are recovered point by point and reported alongside the result as
//! [`AnalysisError::DegenerateSeries`] values rather than aborting the run.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors produced by the tide analysis components.
///
/// Each variant carries enough context (operation, row index or timestamp)
/// for the caller to report the problem without re-deriving it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Not enough samples (or clean rows) for the requested operation
    #[error("insufficient data for {operation}: need at least {required}, got {available}")]
    InsufficientData {
        operation: &'static str,
        required: usize,
        available: usize,
    },

    /// The series covers too little time to resolve the slowest constituent
    #[error(
        "insufficient time span for {operation}: need {required_hours:.2} h, \
         series covers {available_hours:.2} h"
    )]
    InsufficientSpan {
        operation: &'static str,
        required_hours: f64,
        available_hours: f64,
    },

    /// Timestamps must be strictly increasing; the core never sorts input
    #[error("timestamp at row {index} ({timestamp}) does not follow the previous row")]
    UnorderedTimestamps {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Height is NaN or infinite
    #[error("non-finite height at row {index} ({timestamp})")]
    NonFiniteHeight {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A configuration value is out of range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Zero variance where a division by the spread was required
    #[error("degenerate window at row {index} ({timestamp}): zero variance")]
    DegenerateSeries {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A joint least-squares design whose columns cannot be separated
    #[error("{operation} is rank deficient ({columns} columns)")]
    RankDeficient {
        operation: &'static str,
        columns: usize,
    },

    /// Forecast requested without a usable fitted model
    #[error("model not fitted: {reason}")]
    ModelNotFitted { reason: String },

    /// The regressor could not be trained
    #[error("model training failed: {reason} (rows: {rows:?})")]
    ModelTraining { rows: Vec<usize>, reason: String },
}

impl AnalysisError {
    /// Shorthand for [`AnalysisError::InvalidParameter`].
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// True for the "not enough data" family (sample count or time span).
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. } | AnalysisError::InsufficientSpan { .. }
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AnalysisError>;
