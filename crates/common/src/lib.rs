//! Metric and health-check primitives shared by the instrumentor crates.
//!
//! # Modules
//!
//! - [`clock`]: time source abstraction (`SystemClock`, `MockClock`)
//! - [`error`]: common errors and the `ErrorClassification` trait
//! - [`metrics`]: counters, meters, timers, gauges and the metric registry
//! - [`health`]: health checks and the health-check registry
//! - `testing` (feature `test-utils`): spy registry for call-order tests
//!
//! Every primitive is safe to share across threads without external
//! locking. Registries are plain values owned by the host process and
//! passed around as `Arc<dyn ...>`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod clock;
pub mod error;
pub mod health;
pub mod metrics;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{
    CommonError, CommonResult, ErrorCategory, ErrorClassification, ErrorSeverity, MetricsError,
    MetricsResult,
};
pub use health::{
    HealthCheck, HealthCheckRegistry, HealthCheckResult, InMemoryHealthCheckRegistry,
};
pub use metrics::{
    AtomicCounter, Counter, EwmaMeter, Gauge, Histogram, HistogramSnapshot, HistogramTimer,
    InMemoryMetricRegistry, Meter, Metered, Metric, MetricKind, MetricRegistry, Timer,
    TimerContext,
};
