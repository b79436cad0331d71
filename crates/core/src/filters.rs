//! Exception filters decide which failures count toward a name's error rate
//!
//! A filter sees every failure of a wrapped unit as a
//! `&dyn ErrorClassification`. Panics reach filters classified as
//! [`ErrorCategory::Defect`].
//!
//! Any `Fn(&dyn ErrorClassification) -> bool` closure is a filter:
//!
//! ```rust
//! use instrumentor_common::ErrorClassification;
//! use instrumentor_core::Instrumentor;
//!
//! let retryable_only = |error: &dyn ErrorClassification| error.is_retryable();
//! let instrumentor = Instrumentor::builder().exception_filter(retryable_only).build().unwrap();
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use instrumentor_common::{CommonError, ErrorCategory, ErrorClassification};
use serde::{Deserialize, Serialize};

/// Predicate over a failure: `true` marks the error meter
pub trait ExceptionFilter: Send + Sync {
    fn should_mark(&self, error: &dyn ErrorClassification) -> bool;
}

impl<F> ExceptionFilter for F
where
    F: Fn(&dyn ErrorClassification) -> bool + Send + Sync,
{
    fn should_mark(&self, error: &dyn ErrorClassification) -> bool {
        self(error)
    }
}

/// Every failure counts as an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkAll;

impl ExceptionFilter for MarkAll {
    fn should_mark(&self, _error: &dyn ErrorClassification) -> bool {
        true
    }
}

/// Only expected failures count; defects (including panics) are skipped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkExpectedOnly;

impl ExceptionFilter for MarkExpectedOnly {
    fn should_mark(&self, error: &dyn ErrorClassification) -> bool {
        error.category() == ErrorCategory::Expected
    }
}

/// The built-in filters, selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionPolicy {
    /// [`MarkAll`]
    #[default]
    MarkAll,
    /// [`MarkExpectedOnly`]
    MarkExpectedOnly,
}

impl ExceptionPolicy {
    /// The filter implementing this policy
    pub fn filter(self) -> Arc<dyn ExceptionFilter> {
        match self {
            Self::MarkAll => Arc::new(MarkAll),
            Self::MarkExpectedOnly => Arc::new(MarkExpectedOnly),
        }
    }

    /// Configuration spelling of the policy
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarkAll => "mark_all",
            Self::MarkExpectedOnly => "mark_expected_only",
        }
    }
}

impl fmt::Display for ExceptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExceptionPolicy {
    type Err = CommonError;

    /// Accepts snake_case or kebab-case, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mark_all" => Ok(Self::MarkAll),
            "mark_expected_only" => Ok(Self::MarkExpectedOnly),
            _ => Err(CommonError::validation_with_value(
                "exception_policy",
                "expected one of: mark_all, mark_expected_only",
                s,
            )),
        }
    }
}
