//! # Instrumentor Core
//!
//! Wraps units of work with automatic instrumentation: execution timing,
//! in-flight counts, error counting, derived error-rate gauges, and an
//! optional error-rate health check.
//!
//! For an instrumented name `n` the metric registry holds:
//!
//! - `n` (timer), `n.errors` (meter), `n.inFlight` (counter)
//! - `n.total` and `n.success` (meters, extended mode only)
//! - `n.errors.{total,mean,m1,m5,m15}_pct` (error/call ratio gauges)
//!
//! and, when a threshold and a health-check registry are supplied, the
//! health-check registry holds `n`, which turns unhealthy once the
//! fifteen-minute error ratio reaches the threshold.
//!
//! ## Architecture Principles
//! - Only depends on `instrumentor-common`
//! - Registries are injected; nothing is global
//! - Wrapped units run synchronously on the caller's thread
//! - Failures of wrapped units reach the caller unchanged

pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod gauges;
pub mod health;
pub mod instrumentor;
pub mod names;

pub use config::InstrumentorConfig;
pub use context::InstrumentationContext;
pub use error::{InstrumentorError, InstrumentorResult};
pub use filters::{ExceptionFilter, ExceptionPolicy, MarkAll, MarkExpectedOnly};
pub use gauges::{ratio_of, ratio_of_fns, RateAccessor, RatioGauge};
pub use health::GaugeHealthCheck;
pub use instrumentor::{Instrumented, Instrumentor, InstrumentorBuilder};
