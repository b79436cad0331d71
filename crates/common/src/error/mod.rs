//! Common error types and the error classification contract
//!
//! Two families of errors live here:
//!
//! 1. **`MetricsError`**: failures raised by the registries themselves
//!    (duplicate registration, a name already holding a metric of another
//!    kind, an empty name).
//!
//! 2. **`CommonError`**: general-purpose error variants (configuration,
//!    validation, internal) that callers can embed in their own error enums.
//!
//! ## ErrorClassification
//!
//! Instrumented units of work report failures through their own error types.
//! The instrumentation layer never inspects a concrete error type; it asks
//! the failure to classify itself through [`ErrorClassification`]:
//!
//! - **`category()`**: is this an *expected* failure (a remote call failed,
//!   a file was missing) or a *defect* (an invariant was broken, the caller
//!   passed garbage)? Exception filters decide what counts toward the error
//!   rate from this value.
//! - **`severity()`**, **`is_retryable()`**, **`is_critical()`**: optional
//!   refinements for custom filters.
//!
//! ```rust,ignore
//! use instrumentor_common::{ErrorCategory, ErrorClassification};
//!
//! #[derive(Debug, thiserror::Error)]
//! pub enum FetchError {
//!     #[error("upstream unavailable")]
//!     Upstream,
//!     #[error("malformed request: {0}")]
//!     Malformed(String),
//! }
//!
//! impl ErrorClassification for FetchError {
//!     fn category(&self) -> ErrorCategory {
//!         match self {
//!             Self::Upstream => ErrorCategory::Expected,
//!             Self::Malformed(_) => ErrorCategory::Defect,
//!         }
//!     }
//! }
//! ```

use std::convert::Infallible;
use std::fmt;

use thiserror::Error;

use crate::metrics::MetricKind;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Result type for registry operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised by metric and health-check registries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    /// The name is already taken in the registry
    #[error("A {kind} named '{name}' already exists")]
    AlreadyExists { name: String, kind: MetricKind },

    /// A health check is already registered under the name
    #[error("A health check named '{name}' already exists")]
    HealthCheckExists { name: String },

    /// The name holds a metric of a different kind than the one requested
    #[error("'{name}' is already registered as a {found}, not a {expected}")]
    TypeMismatch { name: String, expected: MetricKind, found: MetricKind },

    /// Names must be non-empty
    #[error("Metric names must not be empty")]
    InvalidName,
}

impl MetricsError {
    /// True for the benign "someone else registered it first" outcome
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::HealthCheckExists { .. })
    }
}

/// Common error variants that appear across multiple modules
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Validation errors
    Validation { field: String, message: String, value: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error in field '{}': {}", field, message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Validation { field, message, value } => {
                if let Some(value) = value {
                    write!(
                        f,
                        "Validation error for field '{}' (value: '{}'): {}",
                        field, value, message
                    )
                } else {
                    write!(f, "Validation error for field '{}': {}", field, message)
                }
            }
            Self::Internal { message, context } => {
                if let Some(ctx) = context {
                    write!(f, "Internal error in '{}': {}", ctx, message)
                } else {
                    write!(f, "Internal error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error tied to a field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a serialization error naming the format
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a validation error carrying the offending value
    pub fn validation_with_value<F: Into<String>, M: Into<String>, V: Into<String>>(
        field: F,
        message: M,
        value: V,
    ) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: Some(value.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }
}

/// What kind of failure an error represents
///
/// This is the explicit replacement for a checked/unchecked exception split:
/// the error type itself says whether the failure is an anticipated outcome
/// of doing the work or a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorCategory {
    /// Anticipated failure of the work itself (I/O, remote dependency,
    /// business rule rejection)
    #[default]
    Expected,
    /// Programming error or broken invariant (includes panics)
    Defect,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected => write!(f, "EXPECTED"),
            Self::Defect => write!(f, "DEFECT"),
        }
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    #[default]
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Error classification contract consulted by exception filters
///
/// The trait is object safe so filters can take `&dyn ErrorClassification`
/// regardless of the concrete error type a unit of work returns. Every
/// method has a default; `impl ErrorClassification for MyError {}` classifies
/// all variants as expected errors.
pub trait ErrorClassification {
    /// Whether the failure is expected or a defect
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Expected
    }

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Expected => ErrorSeverity::Error,
            ErrorCategory::Defect => ErrorSeverity::Critical,
        }
    }

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

impl ErrorClassification for CommonError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::Internal { .. } => ErrorCategory::Defect,
            Self::Config { .. } | Self::Serialization { .. } => ErrorCategory::Expected,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Config { .. } | Self::Serialization { .. } | Self::Validation { .. } => {
                ErrorSeverity::Error
            }
        }
    }
}

impl ErrorClassification for MetricsError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Defect
    }
}

impl ErrorClassification for std::io::Error {
    fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::WouldBlock
        )
    }
}

impl ErrorClassification for Box<dyn std::error::Error + Send + Sync> {}

impl ErrorClassification for String {}

impl ErrorClassification for str {}

impl ErrorClassification for Infallible {}

impl<T: ErrorClassification + ?Sized> ErrorClassification for &T {
    fn category(&self) -> ErrorCategory {
        (**self).category()
    }

    fn severity(&self) -> ErrorSeverity {
        (**self).severity()
    }

    fn is_retryable(&self) -> bool {
        (**self).is_retryable()
    }

    fn is_critical(&self) -> bool {
        (**self).is_critical()
    }
}
