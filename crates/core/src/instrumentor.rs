//! The instrumentor: wraps units of work so every call is measured
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use instrumentor_common::{
//!     InMemoryHealthCheckRegistry, InMemoryMetricRegistry, Metered, MetricRegistry,
//! };
//! use instrumentor_core::Instrumentor;
//!
//! let metrics = Arc::new(InMemoryMetricRegistry::new());
//! let instrumentor = Instrumentor::builder()
//!     .metric_registry(metrics.clone())
//!     .health_check_registry(Arc::new(InMemoryHealthCheckRegistry::new()))
//!     .build()
//!     .unwrap();
//!
//! let fetch = instrumentor
//!     .wrap(|| Err::<u32, String>("upstream unavailable".into()), "svc.fetch", Some(0.25))
//!     .unwrap();
//! assert!(fetch.call().is_err());
//! assert_eq!(metrics.meter("svc.fetch.errors").unwrap().count(), 1);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use instrumentor_common::{
    ErrorClassification, HealthCheckRegistry, InMemoryMetricRegistry, MetricRegistry,
};
use tracing::debug;

use crate::config::InstrumentorConfig;
use crate::context::InstrumentationContext;
use crate::error::{InstrumentorError, InstrumentorResult};
use crate::filters::{ExceptionFilter, ExceptionPolicy, MarkAll};

/// Wraps units of work with timing, in-flight, error-rate and health
/// instrumentation
///
/// Cloning is cheap; clones share registries and filter.
#[derive(Clone)]
pub struct Instrumentor {
    metrics: Arc<dyn MetricRegistry>,
    health: Option<Arc<dyn HealthCheckRegistry>>,
    filter: Arc<dyn ExceptionFilter>,
    extended: bool,
    default_threshold: Option<f64>,
}

impl Instrumentor {
    /// Start configuring an instrumentor
    pub fn builder() -> InstrumentorBuilder {
        InstrumentorBuilder::default()
    }

    /// Instrumentor over `metrics` with default settings and no health checks
    pub fn new(metrics: Arc<dyn MetricRegistry>) -> Self {
        Self {
            metrics,
            health: None,
            filter: Arc::new(MarkAll),
            extended: false,
            default_threshold: None,
        }
    }

    /// Build an instrumentor from configuration
    ///
    /// `health` is ignored when the configuration disables health checks.
    pub fn from_config(
        config: &InstrumentorConfig,
        metrics: Arc<dyn MetricRegistry>,
        health: Option<Arc<dyn HealthCheckRegistry>>,
    ) -> InstrumentorResult<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .metric_registry(metrics)
            .exception_policy(config.exception_policy)
            .extended(config.extended);
        if let Some(health) = health.filter(|_| config.health_checks) {
            builder = builder.health_check_registry(health);
        }
        if let Some(threshold) = config.default_error_threshold {
            builder = builder.default_error_threshold(threshold);
        }
        builder.build()
    }

    /// Registry that wrapped units report into
    pub fn metric_registry(&self) -> &Arc<dyn MetricRegistry> {
        &self.metrics
    }

    /// Registry that receives error-rate health checks, if attached
    pub fn health_check_registry(&self) -> Option<&Arc<dyn HealthCheckRegistry>> {
        self.health.as_ref()
    }

    /// Whether `.total` and `.success` meters are maintained
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Wrap `unit` under `name`
    ///
    /// Resolves the metrics for `name`, registers the error-ratio gauges, and
    /// registers a health check when a threshold is given (or configured as
    /// the default) and a health-check registry is attached. Registration
    /// happens once per name no matter how often the name is wrapped.
    ///
    /// # Errors
    /// - [`InstrumentorError::InvalidName`] for an empty name
    /// - [`InstrumentorError::InvalidThreshold`] for a negative or non-finite
    ///   threshold
    /// - [`InstrumentorError::Registry`] when a derived name is held by a
    ///   metric of another kind
    ///
    /// Validation errors are raised before any metric is touched.
    pub fn wrap<F>(
        &self,
        unit: F,
        name: &str,
        error_threshold: Option<f64>,
    ) -> InstrumentorResult<Instrumented<F>> {
        self.wrap_with_filter(unit, name, error_threshold, Arc::clone(&self.filter))
    }

    /// [`wrap`](Self::wrap) with a filter overriding the instrumentor's own
    pub fn wrap_with_filter<F>(
        &self,
        unit: F,
        name: &str,
        error_threshold: Option<f64>,
        filter: Arc<dyn ExceptionFilter>,
    ) -> InstrumentorResult<Instrumented<F>> {
        let context = self.prepare(name, error_threshold)?;
        Ok(Instrumented { unit, context, filter })
    }

    /// Wrap a fallible unit and call it once
    ///
    /// The outer result reports wrapping errors; the inner one is the unit's
    /// own outcome.
    pub fn call<T, E, F>(
        &self,
        unit: F,
        name: &str,
        error_threshold: Option<f64>,
    ) -> InstrumentorResult<Result<T, E>>
    where
        E: ErrorClassification,
        F: FnOnce() -> Result<T, E>,
    {
        let context = self.prepare(name, error_threshold)?;
        Ok(context.measure(self.filter.as_ref(), unit))
    }

    /// Wrap an infallible unit and run it once
    ///
    /// As with [`Instrumented::run`], a returned `Err` is not a failure; use
    /// [`call`](Self::call) for fallible units.
    pub fn run<T, F>(
        &self,
        unit: F,
        name: &str,
        error_threshold: Option<f64>,
    ) -> InstrumentorResult<T>
    where
        F: FnOnce() -> T,
    {
        let context = self.prepare(name, error_threshold)?;
        Ok(run_measured(&context, self.filter.as_ref(), unit))
    }

    fn prepare(
        &self,
        name: &str,
        error_threshold: Option<f64>,
    ) -> InstrumentorResult<InstrumentationContext> {
        if name.is_empty() {
            return Err(InstrumentorError::InvalidName);
        }
        let threshold = error_threshold.or(self.default_threshold);
        if let Some(threshold) = threshold {
            validate_threshold(threshold)?;
        }

        let context = InstrumentationContext::resolve(self.metrics.as_ref(), name, self.extended)?;
        context.register_gauges(self.metrics.as_ref())?;
        if let (Some(health), Some(ceiling)) = (&self.health, threshold) {
            context.register_health_check(health.as_ref(), ceiling)?;
        }

        debug!(name, threshold = ?threshold, extended = self.extended, "Instrumented unit of work");
        Ok(context)
    }
}

fn validate_threshold(threshold: f64) -> InstrumentorResult<()> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(())
    } else {
        Err(InstrumentorError::InvalidThreshold(threshold))
    }
}

fn run_measured<T, F>(context: &InstrumentationContext, filter: &dyn ExceptionFilter, unit: F) -> T
where
    F: FnOnce() -> T,
{
    match context.measure(filter, || Ok::<T, Infallible>(unit())) {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

impl Default for Instrumentor {
    /// Instrumentor over a fresh in-memory metric registry
    fn default() -> Self {
        Self::new(Arc::new(InMemoryMetricRegistry::new()))
    }
}

impl fmt::Debug for Instrumentor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentor")
            .field("metrics", &self.metrics.len())
            .field("health_checks", &self.health.is_some())
            .field("extended", &self.extended)
            .field("default_threshold", &self.default_threshold)
            .finish_non_exhaustive()
    }
}

/// A unit of work whose every invocation is measured
///
/// Metric handles are resolved once at wrap time and reused by every call.
#[derive(Clone)]
pub struct Instrumented<F> {
    unit: F,
    context: InstrumentationContext,
    filter: Arc<dyn ExceptionFilter>,
}

impl<F> Instrumented<F> {
    /// Name the unit is instrumented under
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// Metrics this unit reports into
    pub fn context(&self) -> &InstrumentationContext {
        &self.context
    }

    /// Unwrap the original unit of work
    pub fn into_inner(self) -> F {
        self.unit
    }
}

impl<F, T, E> Instrumented<F>
where
    F: Fn() -> Result<T, E>,
    E: ErrorClassification,
{
    /// Invoke a fallible unit; its result is returned unchanged
    pub fn call(&self) -> Result<T, E> {
        self.context.measure(self.filter.as_ref(), || (self.unit)())
    }
}

impl<F, T> Instrumented<F>
where
    F: Fn() -> T,
{
    /// Invoke an infallible unit; a panic counts as a failure and is resumed
    ///
    /// Only a panic is a failure here. A unit returning `Result` run this way
    /// hands back its `Err` as an ordinary value and the error meter is not
    /// marked; use [`call`](Self::call) for fallible units.
    pub fn run(&self) -> T {
        run_measured(&self.context, self.filter.as_ref(), || (self.unit)())
    }
}

impl<F> fmt::Debug for Instrumented<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumented").field("context", &self.context).finish_non_exhaustive()
    }
}

/// Builder for [`Instrumentor`]
#[derive(Default)]
pub struct InstrumentorBuilder {
    metrics: Option<Arc<dyn MetricRegistry>>,
    health: Option<Arc<dyn HealthCheckRegistry>>,
    filter: Option<Arc<dyn ExceptionFilter>>,
    extended: bool,
    default_threshold: Option<f64>,
}

impl InstrumentorBuilder {
    /// Registry to report into; a fresh in-memory registry when omitted
    #[must_use]
    pub fn metric_registry(mut self, metrics: Arc<dyn MetricRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registry receiving error-rate health checks; none are created when
    /// omitted
    #[must_use]
    pub fn health_check_registry(mut self, health: Arc<dyn HealthCheckRegistry>) -> Self {
        self.health = Some(health);
        self
    }

    #[must_use]
    pub fn exception_filter<X: ExceptionFilter + 'static>(mut self, filter: X) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    #[must_use]
    pub fn exception_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.filter = Some(policy.filter());
        self
    }

    /// Also maintain `.total` and `.success` meters
    #[must_use]
    pub fn extended(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    /// Threshold applied when `wrap` is given none
    #[must_use]
    pub fn default_error_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = Some(threshold);
        self
    }

    /// # Errors
    /// [`InstrumentorError::InvalidThreshold`] for an invalid default
    /// threshold
    pub fn build(self) -> InstrumentorResult<Instrumentor> {
        if let Some(threshold) = self.default_threshold {
            validate_threshold(threshold)?;
        }

        Ok(Instrumentor {
            metrics: self.metrics.unwrap_or_else(|| Arc::new(InMemoryMetricRegistry::new())),
            health: self.health,
            filter: self.filter.unwrap_or_else(|| Arc::new(MarkAll)),
            extended: self.extended,
            default_threshold: self.default_threshold,
        })
    }
}

impl fmt::Debug for InstrumentorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentorBuilder")
            .field("extended", &self.extended)
            .field("default_threshold", &self.default_threshold)
            .finish_non_exhaustive()
    }
}
