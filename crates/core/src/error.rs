//! Errors raised while wrapping a unit of work
//!
//! Failures of the wrapped unit itself are never converted into these types;
//! they reach the caller unchanged.

use instrumentor_common::{
    CommonError, ErrorCategory, ErrorClassification, ErrorSeverity, MetricsError,
};
use thiserror::Error;

/// Result type for instrumentor operations
pub type InstrumentorResult<T> = Result<T, InstrumentorError>;

/// Errors raised by [`Instrumentor`](crate::Instrumentor) construction and
/// wrapping
#[derive(Debug, Error)]
pub enum InstrumentorError {
    /// Instrumented names must be non-empty
    #[error("Instrumented unit names must not be empty")]
    InvalidName,

    /// Error thresholds are finite, non-negative ratios
    #[error("Error threshold must be a finite, non-negative ratio, got {0}")]
    InvalidThreshold(f64),

    /// A derived metric could not be created or registered
    #[error("Metric registry error: {0}")]
    Registry(#[from] MetricsError),

    /// Invalid or unreadable configuration
    #[error(transparent)]
    Config(#[from] CommonError),
}

impl ErrorClassification for InstrumentorError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidName | Self::InvalidThreshold(_) | Self::Registry(_) => {
                ErrorCategory::Defect
            }
            Self::Config(err) => err.category(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(err) => err.severity(),
            _ => ErrorSeverity::Error,
        }
    }
}
