//! Per-name metric bundle and its derived gauges and health check
//!
//! The metric registry is the source of truth for which metrics exist. A
//! context is a handle onto metrics that live in the registry; resolving the
//! same name twice yields handles onto the same counters.
//!
//! Gauge and health-check registration is best-effort idempotent: an
//! existence check comes first, and an "already exists" failure from a lost
//! race is swallowed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use instrumentor_common::{
    Counter, ErrorCategory, ErrorClassification, HealthCheckRegistry, Meter, MetricKind,
    MetricRegistry, MetricsError, MetricsResult, Timer,
};
use tracing::{debug, trace, warn};

use crate::filters::ExceptionFilter;
use crate::gauges::{RateAccessor, RatioGauge};
use crate::{health, names};

/// The metrics instrumenting one name
#[derive(Clone)]
pub struct InstrumentationContext {
    name: String,
    timer: Arc<dyn Timer>,
    errors: Arc<dyn Meter>,
    in_flight: Arc<dyn Counter>,
    total: Option<Arc<dyn Meter>>,
    success: Option<Arc<dyn Meter>>,
}

/// Failure value handed to exception filters when a unit panics
struct Panicked;

impl ErrorClassification for Panicked {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Defect
    }
}

impl InstrumentationContext {
    /// Get or create the metrics for `name`; `extended` adds the `.total`
    /// and `.success` meters
    pub fn resolve(
        registry: &dyn MetricRegistry,
        name: &str,
        extended: bool,
    ) -> MetricsResult<Self> {
        let timer = registry.timer(name)?;
        let errors = registry.meter(&names::errors(name))?;
        let in_flight = registry.counter(&names::in_flight(name))?;
        let (total, success) = if extended {
            (
                Some(registry.meter(&names::total(name))?),
                Some(registry.meter(&names::success(name))?),
            )
        } else {
            (None, None)
        };

        Ok(Self { name: name.to_string(), timer, errors, in_flight, total, success })
    }

    /// Name the metrics are derived from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timer registered under the bare name
    pub fn timer(&self) -> &Arc<dyn Timer> {
        &self.timer
    }

    /// Meter of counted failures (`<name>.errors`)
    pub fn errors(&self) -> &Arc<dyn Meter> {
        &self.errors
    }

    /// Calls currently inside the measured section (`<name>.inFlight`)
    pub fn in_flight(&self) -> &Arc<dyn Counter> {
        &self.in_flight
    }

    /// Started calls (`<name>.total`), extended mode only
    pub fn total(&self) -> Option<&Arc<dyn Meter>> {
        self.total.as_ref()
    }

    /// Successful calls (`<name>.success`), extended mode only
    pub fn success(&self) -> Option<&Arc<dyn Meter>> {
        self.success.as_ref()
    }

    /// Error meter over timer, read through `accessor`
    pub fn error_ratio(&self, accessor: RateAccessor) -> RatioGauge<dyn Meter, dyn Timer> {
        RatioGauge::new(Arc::clone(&self.errors), Arc::clone(&self.timer), accessor)
    }

    /// Register the five error-ratio gauges that are not registered yet
    ///
    /// Fails only when a derived name already holds a metric that is not a
    /// gauge.
    pub fn register_gauges(&self, registry: &dyn MetricRegistry) -> MetricsResult<()> {
        for accessor in RateAccessor::ALL {
            let gauge_name = names::error_ratio(&self.name, accessor);
            match registry.kind_of(&gauge_name) {
                Some(MetricKind::Gauge) => continue,
                Some(found) => return Err(gauge_conflict(gauge_name, found)),
                None => {}
            }

            match registry.register_gauge(&gauge_name, Arc::new(self.error_ratio(accessor))) {
                Ok(()) => debug!(gauge = %gauge_name, "Registered error ratio gauge"),
                Err(MetricsError::AlreadyExists { kind: MetricKind::Gauge, .. }) => {
                    debug!(gauge = %gauge_name, "Error ratio gauge registered concurrently");
                }
                Err(MetricsError::AlreadyExists { kind, .. }) => {
                    return Err(gauge_conflict(gauge_name, kind));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Register a health check on the fifteen-minute error ratio unless one
    /// already exists under this name
    pub fn register_health_check(
        &self,
        registry: &dyn HealthCheckRegistry,
        ceiling: f64,
    ) -> MetricsResult<()> {
        if registry.contains(&self.name) {
            return Ok(());
        }

        let check = health::for_double_gauge(
            Arc::new(self.error_ratio(RateAccessor::FifteenMinute)),
            Some(ceiling),
        );
        match registry.register(&self.name, Arc::new(check)) {
            Ok(()) => {
                debug!(health_check = %self.name, ceiling, "Registered error rate health check");
                Ok(())
            }
            Err(err) if err.is_already_exists() => {
                debug!(health_check = %self.name, "Health check registered concurrently");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Run `work` inside the measured section
    ///
    /// In-flight is incremented and the total meter marked before the timer
    /// starts. The timer stops before the outcome is recorded, and in-flight
    /// is decremented last. A panic is recorded as a [`ErrorCategory::Defect`]
    /// failure and then resumed.
    pub fn measure<T, E, W>(&self, filter: &dyn ExceptionFilter, work: W) -> Result<T, E>
    where
        E: ErrorClassification,
        W: FnOnce() -> Result<T, E>,
    {
        self.in_flight.inc();
        if let Some(total) = &self.total {
            total.mark();
        }

        let scope = self.timer.time();
        let outcome = panic::catch_unwind(AssertUnwindSafe(work));
        let elapsed = scope.stop();

        match &outcome {
            Ok(Ok(_)) => {
                if let Some(success) = &self.success {
                    success.mark();
                }
            }
            Ok(Err(error)) => self.record_failure(filter, error, elapsed),
            Err(_) => self.record_failure(filter, &Panicked, elapsed),
        }

        self.in_flight.dec();
        trace!(name = %self.name, ?elapsed, ok = matches!(outcome, Ok(Ok(_))), "Measured call");

        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn record_failure(
        &self,
        filter: &dyn ExceptionFilter,
        error: &dyn ErrorClassification,
        elapsed: Duration,
    ) {
        let mark = panic::catch_unwind(AssertUnwindSafe(|| filter.should_mark(error)))
            .unwrap_or_else(|_| {
                warn!(name = %self.name, "Exception filter panicked; failure not counted");
                false
            });
        if mark {
            self.errors.mark();
        }
        trace!(name = %self.name, ?elapsed, category = %error.category(), counted = mark, "Failure");
    }
}

fn gauge_conflict(name: String, found: MetricKind) -> MetricsError {
    warn!(metric = %name, %found, "Derived gauge name already holds another metric kind");
    MetricsError::TypeMismatch { name, expected: MetricKind::Gauge, found }
}

impl std::fmt::Debug for InstrumentationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentationContext")
            .field("name", &self.name)
            .field("in_flight", &self.in_flight.count())
            .field("calls", &self.timer.count())
            .field("errors", &self.errors.count())
            .field("extended", &self.total.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use instrumentor_common::{
        HealthCheckResult, InMemoryHealthCheckRegistry, InMemoryMetricRegistry,
    };

    use super::*;
    use crate::filters::{MarkAll, MarkExpectedOnly};

    #[test]
    fn test_resolve_creates_metric_family() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();

        assert_eq!(ctx.name(), "svc.op");
        assert_eq!(registry.names(), vec!["svc.op", "svc.op.errors", "svc.op.inFlight"]);
        assert!(ctx.total().is_none());
        assert!(ctx.success().is_none());
    }

    #[test]
    fn test_resolve_extended_adds_meters() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", true).unwrap();

        assert!(ctx.total().is_some());
        assert_eq!(registry.kind_of("svc.op.total"), Some(MetricKind::Meter));
        assert_eq!(registry.kind_of("svc.op.success"), Some(MetricKind::Meter));
    }

    #[test]
    fn test_resolve_twice_shares_metrics() {
        let registry = InMemoryMetricRegistry::new();
        let first = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();
        let second = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();

        assert!(Arc::ptr_eq(first.errors(), second.errors()));
        assert!(Arc::ptr_eq(first.in_flight(), second.in_flight()));
    }

    #[test]
    fn test_register_gauges_is_idempotent() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();

        ctx.register_gauges(&registry).unwrap();
        ctx.register_gauges(&registry).unwrap();

        assert_eq!(registry.len(), 3 + 5);
        for accessor in RateAccessor::ALL {
            let name = names::error_ratio("svc.op", accessor);
            assert_eq!(registry.kind_of(&name), Some(MetricKind::Gauge), "{name}");
        }
    }

    #[test]
    fn test_gauge_name_held_by_other_kind_is_rejected() {
        let registry = InMemoryMetricRegistry::new();
        registry.counter("svc.op.errors.m5_pct").unwrap();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();

        let err = ctx.register_gauges(&registry).unwrap_err();
        assert_eq!(
            err,
            MetricsError::TypeMismatch {
                name: "svc.op.errors.m5_pct".to_string(),
                expected: MetricKind::Gauge,
                found: MetricKind::Counter,
            }
        );
    }

    #[test]
    fn test_existing_health_check_is_kept() {
        let metrics = InMemoryMetricRegistry::new();
        let health = InMemoryHealthCheckRegistry::new();
        health.register("svc.op", Arc::new(|| HealthCheckResult::unhealthy("custom"))).unwrap();

        let ctx = InstrumentationContext::resolve(&metrics, "svc.op", false).unwrap();
        ctx.register_health_check(&health, 0.1).unwrap();

        let result = health.run_health_check("svc.op").unwrap();
        assert_eq!(result.message(), Some("custom"));
    }

    #[test]
    fn test_measure_success_and_failure() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", true).unwrap();

        let ok: Result<u32, String> = ctx.measure(&MarkAll, || Ok(7));
        assert_eq!(ok, Ok(7));
        let failed: Result<u32, String> = ctx.measure(&MarkAll, || Err("nope".to_string()));
        assert_eq!(failed, Err("nope".to_string()));

        assert_eq!(ctx.timer().count(), 2);
        assert_eq!(ctx.errors().count(), 1);
        assert_eq!(ctx.total().unwrap().count(), 2);
        assert_eq!(ctx.success().unwrap().count(), 1);
        assert_eq!(ctx.in_flight().count(), 0);
    }

    #[test]
    fn test_measure_respects_filter() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();

        let _ = ctx.measure(&MarkExpectedOnly, || {
            Err::<(), _>(instrumentor_common::CommonError::internal("bug"))
        });
        assert_eq!(ctx.errors().count(), 0);
        assert_eq!(ctx.timer().count(), 1);
    }

    #[test]
    fn test_panicking_filter_does_not_count() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();
        let filter = |_: &dyn ErrorClassification| -> bool { panic!("filter bug") };

        let result: Result<(), &str> = ctx.measure(&filter, || Err("real failure"));
        assert_eq!(result, Err("real failure"));
        assert_eq!(ctx.errors().count(), 0);
        assert_eq!(ctx.in_flight().count(), 0);
    }

    #[test]
    fn test_measure_panic_is_recorded_and_resumed() {
        let registry = InMemoryMetricRegistry::new();
        let ctx = InstrumentationContext::resolve(&registry, "svc.op", false).unwrap();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), String> = ctx.measure(&MarkAll, || panic!("unit exploded"));
        }));

        let payload = caught.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"unit exploded"));
        assert_eq!(ctx.errors().count(), 1);
        assert_eq!(ctx.timer().count(), 1);
        assert_eq!(ctx.in_flight().count(), 0);
    }
}
