//! Testing utilities
//!
//! Available to downstream crates through the `test-utils` feature:
//!
//! - **[`recording`]**: a metric registry whose metrics append every
//!   mutation to a shared, ordered event log, for asserting the exact order
//!   in which instrumentation touches its metrics
//! - **[`MockClock`]**: re-exported so tests can drive meter ticks
//!
//! ```rust,ignore
//! use instrumentor_common::testing::{MetricEvent, RecordingMetricRegistry};
//!
//! let registry = RecordingMetricRegistry::new();
//! registry.counter("op.inFlight")?.inc();
//! assert_eq!(registry.events(), vec![MetricEvent::counter("op.inFlight", 1)]);
//! ```

pub mod recording;

pub use recording::{MetricEvent, RecordingMetricRegistry};

pub use crate::clock::{Clock, MockClock, SystemClock};
