//! Name-keyed registry of health checks

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{HealthCheck, HealthCheckResult};
use crate::error::{MetricsError, MetricsResult};

/// Store of named health checks
pub trait HealthCheckRegistry: Send + Sync {
    /// Register a check; fails with `HealthCheckExists` when `name` is taken
    fn register(&self, name: &str, check: Arc<dyn HealthCheck>) -> MetricsResult<()>;

    /// Remove a check, returning whether one was registered
    fn unregister(&self, name: &str) -> bool;

    /// Whether a check is registered under `name`
    fn contains(&self, name: &str) -> bool;

    /// All registered names, sorted
    fn names(&self) -> Vec<String>;

    /// Run one check; `None` when no check has that name
    fn run_health_check(&self, name: &str) -> Option<HealthCheckResult>;

    /// Run every registered check
    fn run_health_checks(&self) -> BTreeMap<String, HealthCheckResult>;
}

/// In-process [`HealthCheckRegistry`]
///
/// Checks run outside the registry lock. A check that panics is reported as
/// unhealthy.
#[derive(Default)]
pub struct InMemoryHealthCheckRegistry {
    checks: RwLock<BTreeMap<String, Arc<dyn HealthCheck>>>,
}

impl InMemoryHealthCheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.checks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.read().is_empty()
    }
}

fn run_guarded(name: &str, check: &dyn HealthCheck) -> HealthCheckResult {
    match panic::catch_unwind(AssertUnwindSafe(|| check.check())) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(health_check = name, reason = %reason, "Health check panicked");
            HealthCheckResult::unhealthy(format!("health check panicked: {}", reason))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for InMemoryHealthCheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryHealthCheckRegistry").field("names", &self.names()).finish()
    }
}

impl HealthCheckRegistry for InMemoryHealthCheckRegistry {
    fn register(&self, name: &str, check: Arc<dyn HealthCheck>) -> MetricsResult<()> {
        if name.is_empty() {
            return Err(MetricsError::InvalidName);
        }

        match self.checks.write().entry(name.to_string()) {
            Entry::Occupied(_) => Err(MetricsError::HealthCheckExists { name: name.to_string() }),
            Entry::Vacant(entry) => {
                debug!(health_check = name, "Registering health check");
                entry.insert(check);
                Ok(())
            }
        }
    }

    fn unregister(&self, name: &str) -> bool {
        self.checks.write().remove(name).is_some()
    }

    fn contains(&self, name: &str) -> bool {
        self.checks.read().contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.checks.read().keys().cloned().collect()
    }

    fn run_health_check(&self, name: &str) -> Option<HealthCheckResult> {
        let check = self.checks.read().get(name).cloned()?;
        Some(run_guarded(name, check.as_ref()))
    }

    fn run_health_checks(&self) -> BTreeMap<String, HealthCheckResult> {
        let checks: Vec<(String, Arc<dyn HealthCheck>)> = self
            .checks
            .read()
            .iter()
            .map(|(name, check)| (name.clone(), Arc::clone(check)))
            .collect();

        checks
            .into_iter()
            .map(|(name, check)| {
                let result = run_guarded(&name, check.as_ref());
                (name, result)
            })
            .collect()
    }
}
