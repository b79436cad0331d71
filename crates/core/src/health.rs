//! Threshold health checks over gauges
//!
//! Evaluation order for a gauge value `v`:
//!
//! 1. `v` is whitelisted: healthy
//! 2. no ceiling configured: healthy
//! 3. `v < ceiling`: healthy
//! 4. otherwise unhealthy with message `value=<v>&ceiling=<ceiling>`
//!
//! A value equal to the ceiling is unhealthy.

use std::fmt;
use std::sync::Arc;

use instrumentor_common::{Gauge, HealthCheck, HealthCheckResult};

/// Health check comparing a gauge against an optional ceiling
pub struct GaugeHealthCheck<T> {
    gauge: Arc<dyn Gauge<T>>,
    ceiling: Option<T>,
    whitelist: Vec<T>,
}

impl<T> GaugeHealthCheck<T>
where
    T: PartialOrd + fmt::Debug,
{
    /// Check reading `gauge`; without a ceiling every value is healthy
    pub fn new(gauge: Arc<dyn Gauge<T>>, ceiling: Option<T>) -> Self {
        Self { gauge, ceiling, whitelist: Vec::new() }
    }

    /// Values that are always healthy
    ///
    /// Values unequal to themselves (`NaN`) match each other.
    #[must_use]
    pub fn with_whitelist(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.whitelist.extend(values);
        self
    }

    /// Values at or above the ceiling are unhealthy
    pub fn ceiling(&self) -> Option<&T> {
        self.ceiling.as_ref()
    }

    fn is_whitelisted(&self, value: &T) -> bool {
        #[allow(clippy::eq_op)]
        let unordered = |v: &T| v != v;
        self.whitelist
            .iter()
            .any(|allowed| allowed == value || (unordered(allowed) && unordered(value)))
    }

    /// Evaluate `value` against the whitelist and ceiling
    pub fn evaluate(&self, value: &T) -> HealthCheckResult {
        if self.is_whitelisted(value) {
            return HealthCheckResult::healthy();
        }
        match &self.ceiling {
            None => HealthCheckResult::healthy(),
            Some(ceiling) if value < ceiling => HealthCheckResult::healthy(),
            Some(ceiling) => {
                HealthCheckResult::unhealthy(format!("value={:?}&ceiling={:?}", value, ceiling))
            }
        }
    }
}

impl<T> HealthCheck for GaugeHealthCheck<T>
where
    T: PartialOrd + fmt::Debug + Send + Sync,
{
    fn check(&self) -> HealthCheckResult {
        self.evaluate(&self.gauge.value())
    }
}

impl<T: fmt::Debug> fmt::Debug for GaugeHealthCheck<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaugeHealthCheck")
            .field("ceiling", &self.ceiling)
            .field("whitelist", &self.whitelist)
            .finish_non_exhaustive()
    }
}

/// Health check over any ordered gauge, no whitelist
pub fn for_gauge<T>(gauge: Arc<dyn Gauge<T>>, ceiling: Option<T>) -> GaugeHealthCheck<T>
where
    T: PartialOrd + fmt::Debug,
{
    GaugeHealthCheck::new(gauge, ceiling)
}

/// Health check over an `f64` gauge that reports `NaN` as healthy
pub fn for_double_gauge(gauge: Arc<dyn Gauge<f64>>, ceiling: Option<f64>) -> GaugeHealthCheck<f64> {
    GaugeHealthCheck::new(gauge, ceiling).with_whitelist([f64::NAN])
}
