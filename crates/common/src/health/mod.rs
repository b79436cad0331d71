//! Health checks and the health-check registry
//!
//! A [`HealthCheck`] produces a [`HealthCheckResult`] on demand. Checks live
//! in a [`HealthCheckRegistry`] under unique names; running the registry
//! evaluates every check and never propagates a panicking check to the
//! caller.

use std::fmt;
use std::time::SystemTime;

pub mod registry;

pub use registry::{HealthCheckRegistry, InMemoryHealthCheckRegistry};

/// Outcome of a single health check
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub message: Option<String>,
    pub timestamp: SystemTime,
}

impl HealthCheckResult {
    /// A healthy result without a message
    pub fn healthy() -> Self {
        Self { healthy: true, message: None, timestamp: SystemTime::now() }
    }

    /// A healthy result carrying a message
    pub fn healthy_with_message<M: Into<String>>(message: M) -> Self {
        Self { healthy: true, message: Some(message.into()), timestamp: SystemTime::now() }
    }

    /// An unhealthy result explaining what is wrong
    pub fn unhealthy<M: Into<String>>(message: M) -> Self {
        Self { healthy: false, message: Some(message.into()), timestamp: SystemTime::now() }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for HealthCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.healthy { "HEALTHY" } else { "UNHEALTHY" };
        match &self.message {
            Some(message) => write!(f, "{}: {}", status, message),
            None => write!(f, "{}", status),
        }
    }
}

/// A check reporting whether some component is healthy
pub trait HealthCheck: Send + Sync {
    fn check(&self) -> HealthCheckResult;
}

impl<F> HealthCheck for F
where
    F: Fn() -> HealthCheckResult + Send + Sync,
{
    fn check(&self) -> HealthCheckResult {
        self()
    }
}
