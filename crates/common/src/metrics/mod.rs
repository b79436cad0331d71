//! Metric primitives and the metric registry
//!
//! The primitives are traits so a registry can hand out spies or adapters to
//! an external metrics backend; the default implementations in this module
//! are lock-free (counters) or take short internal locks only when a rate
//! window ticks (meters, timers).
//!
//! | Trait | Default implementation | Purpose |
//! |-------|------------------------|---------|
//! | [`Counter`] | [`AtomicCounter`] | signed up/down count (in-flight calls) |
//! | [`Meter`] | [`EwmaMeter`] | event count + mean and 1/5/15-minute rates |
//! | [`Timer`] | [`HistogramTimer`] | latency distribution + completion rate |
//! | [`Gauge`] | any `Fn() -> T` | value computed on demand |

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod counter;
mod ewma;
pub mod histogram;
pub mod meter;
pub mod registry;
pub mod timer;

pub use counter::AtomicCounter;
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::EwmaMeter;
pub use registry::{InMemoryMetricRegistry, MetricRegistry};
pub use timer::HistogramTimer;

/// A signed counter that can move up and down
pub trait Counter: Send + Sync {
    /// Add `n` (negative values decrement)
    fn inc_by(&self, n: i64);

    /// Current value
    fn count(&self) -> i64;

    /// Increment by one
    fn inc(&self) {
        self.inc_by(1);
    }

    /// Decrement by one
    fn dec(&self) {
        self.inc_by(-1);
    }

    /// Subtract `n`
    fn dec_by(&self, n: i64) {
        self.inc_by(-n);
    }
}

/// Anything that reports an event count and event rates
///
/// All rates are events per second.
pub trait Metered: Send + Sync {
    /// Total number of events
    fn count(&self) -> u64;

    /// Events per second since creation
    fn mean_rate(&self) -> f64;

    /// One-minute exponentially-weighted moving average rate
    fn one_minute_rate(&self) -> f64;

    /// Five-minute exponentially-weighted moving average rate
    fn five_minute_rate(&self) -> f64;

    /// Fifteen-minute exponentially-weighted moving average rate
    fn fifteen_minute_rate(&self) -> f64;
}

/// A meter marks occurrences of an event
pub trait Meter: Metered {
    /// Mark `n` occurrences
    fn mark_n(&self, n: u64);

    /// Mark one occurrence
    fn mark(&self) {
        self.mark_n(1);
    }
}

/// A timer records durations and meters how often a timed scope completes
pub trait Timer: Metered {
    /// Record a duration
    fn update(&self, elapsed: Duration);

    /// Latency distribution recorded so far
    fn snapshot(&self) -> HistogramSnapshot;

    /// Current instant on the timer's clock
    fn now(&self) -> Instant {
        Instant::now()
    }

    /// Instant a new timed scope starts at
    ///
    /// Called once per [`TimerContext`]; implementations may override it to
    /// observe scope starts.
    fn start(&self) -> Instant {
        self.now()
    }
}

impl<'a> dyn Timer + 'a {
    /// Open a timed scope; the duration is recorded when the returned
    /// context is stopped or dropped
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext::new(self)
    }
}

/// A running timed scope
///
/// Records its elapsed time into the owning timer exactly once, either on
/// [`TimerContext::stop`] or when dropped.
#[must_use = "a timer context records nothing useful if dropped immediately"]
pub struct TimerContext<'a> {
    timer: &'a dyn Timer,
    start: Instant,
    stopped: bool,
}

impl<'a> TimerContext<'a> {
    /// Start a scope on `timer`
    pub fn new(timer: &'a dyn Timer) -> Self {
        Self { start: timer.start(), timer, stopped: false }
    }

    /// Stop the scope, record and return the elapsed time
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        if self.stopped {
            return Duration::ZERO;
        }
        self.stopped = true;
        let elapsed = self.timer.now().saturating_duration_since(self.start);
        self.timer.update(elapsed);
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

impl fmt::Debug for TimerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerContext")
            .field("start", &self.start)
            .field("stopped", &self.stopped)
            .finish()
    }
}

/// A read-only value computed on demand
pub trait Gauge<T>: Send + Sync {
    /// Current value
    fn value(&self) -> T;
}

impl<T, F> Gauge<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn value(&self) -> T {
        self()
    }
}

/// The kind of metric stored under a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    Counter,
    Meter,
    Timer,
    Gauge,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Meter => write!(f, "meter"),
            Self::Timer => write!(f, "timer"),
            Self::Gauge => write!(f, "gauge"),
        }
    }
}

/// A metric held by a registry
#[derive(Clone)]
pub enum Metric {
    Counter(Arc<dyn Counter>),
    Meter(Arc<dyn Meter>),
    Timer(Arc<dyn Timer>),
    Gauge(Arc<dyn Gauge<f64>>),
}

impl Metric {
    /// The kind of this metric
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Meter(_) => MetricKind::Meter,
            Self::Timer(_) => MetricKind::Timer,
            Self::Gauge(_) => MetricKind::Gauge,
        }
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter(c) => f.debug_tuple("Counter").field(&c.count()).finish(),
            Self::Meter(m) => f.debug_tuple("Meter").field(&m.count()).finish(),
            Self::Timer(t) => f.debug_tuple("Timer").field(&t.count()).finish(),
            Self::Gauge(g) => f.debug_tuple("Gauge").field(&g.value()).finish(),
        }
    }
}
