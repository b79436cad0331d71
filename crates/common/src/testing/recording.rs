//! Metric registry that records every metric mutation in order

#![allow(clippy::missing_errors_doc)]

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::{Clock, MockClock};
use crate::error::MetricsResult;
use crate::metrics::{
    AtomicCounter, Counter, EwmaMeter, Gauge, HistogramSnapshot, HistogramTimer,
    InMemoryMetricRegistry, Meter, Metered, Metric, MetricKind, MetricRegistry, Timer,
};

type EventLog = Arc<Mutex<Vec<MetricEvent>>>;

/// One observed metric mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    /// A counter moved by `delta`
    Counter { name: String, delta: i64 },
    /// A meter was marked `n` times
    Mark { name: String, n: u64 },
    /// A timed scope started
    TimerStart { name: String },
    /// A timed scope stopped after `elapsed`
    TimerStop { name: String, elapsed: Duration },
}

impl MetricEvent {
    pub fn counter(name: &str, delta: i64) -> Self {
        Self::Counter { name: name.to_string(), delta }
    }

    pub fn mark(name: &str) -> Self {
        Self::Mark { name: name.to_string(), n: 1 }
    }

    pub fn timer_start(name: &str) -> Self {
        Self::TimerStart { name: name.to_string() }
    }

    /// Name of the metric the event touched
    pub fn name(&self) -> &str {
        match self {
            Self::Counter { name, .. }
            | Self::Mark { name, .. }
            | Self::TimerStart { name }
            | Self::TimerStop { name, .. } => name,
        }
    }

    /// Whether this is a stop of the timer `name`, regardless of duration
    pub fn is_timer_stop(&self, name: &str) -> bool {
        matches!(self, Self::TimerStop { name: n, .. } if n == name)
    }
}

impl fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter { name, delta } => write!(f, "{} {:+}", name, delta),
            Self::Mark { name, n } => write!(f, "{} mark({})", name, n),
            Self::TimerStart { name } => write!(f, "{} start", name),
            Self::TimerStop { name, .. } => write!(f, "{} stop", name),
        }
    }
}

/// [`MetricRegistry`] that wraps every counter, meter and timer it creates so
/// that mutations are appended to one shared log
///
/// Reads (counts, rates, snapshots) are not logged. Gauges are stored
/// unwrapped.
pub struct RecordingMetricRegistry {
    inner: InMemoryMetricRegistry,
    log: EventLog,
}

impl RecordingMetricRegistry {
    /// Registry on a fresh [`MockClock`]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MockClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryMetricRegistry::with_clock(clock),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every event recorded so far, in order
    pub fn events(&self) -> Vec<MetricEvent> {
        self.log.lock().clone()
    }

    /// Events rendered with `Display`, convenient for order assertions
    pub fn event_lines(&self) -> Vec<String> {
        self.log.lock().iter().map(ToString::to_string).collect()
    }

    /// Events touching metrics whose name starts with `prefix`
    pub fn events_for(&self, prefix: &str) -> Vec<MetricEvent> {
        self.log.lock().iter().filter(|event| event.name().starts_with(prefix)).cloned().collect()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Default for RecordingMetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordingMetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingMetricRegistry")
            .field("metrics", &self.inner.names())
            .field("events", &self.log.lock().len())
            .finish()
    }
}

impl MetricRegistry for RecordingMetricRegistry {
    fn counter(&self, name: &str) -> MetricsResult<Arc<dyn Counter>> {
        self.inner.get_or_create(
            name,
            MetricKind::Counter,
            |metric| match metric {
                Metric::Counter(counter) => Some(Arc::clone(counter)),
                _ => None,
            },
            || {
                Metric::Counter(Arc::new(RecordingCounter {
                    name: name.to_string(),
                    inner: AtomicCounter::new(),
                    log: Arc::clone(&self.log),
                }))
            },
        )
    }

    fn meter(&self, name: &str) -> MetricsResult<Arc<dyn Meter>> {
        self.inner.get_or_create(
            name,
            MetricKind::Meter,
            |metric| match metric {
                Metric::Meter(meter) => Some(Arc::clone(meter)),
                _ => None,
            },
            || {
                Metric::Meter(Arc::new(RecordingMeter {
                    name: name.to_string(),
                    inner: EwmaMeter::with_clock(self.inner.clock()),
                    log: Arc::clone(&self.log),
                }))
            },
        )
    }

    fn timer(&self, name: &str) -> MetricsResult<Arc<dyn Timer>> {
        self.inner.get_or_create(
            name,
            MetricKind::Timer,
            |metric| match metric {
                Metric::Timer(timer) => Some(Arc::clone(timer)),
                _ => None,
            },
            || {
                Metric::Timer(Arc::new(RecordingTimer {
                    name: name.to_string(),
                    inner: HistogramTimer::with_clock(self.inner.clock()),
                    log: Arc::clone(&self.log),
                }))
            },
        )
    }

    fn register_gauge(&self, name: &str, gauge: Arc<dyn Gauge<f64>>) -> MetricsResult<()> {
        self.inner.register_gauge(name, gauge)
    }

    fn get(&self, name: &str) -> Option<Metric> {
        self.inner.get(name)
    }

    fn remove(&self, name: &str) -> Option<Metric> {
        self.inner.remove(name)
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }
}

struct RecordingCounter {
    name: String,
    inner: AtomicCounter,
    log: EventLog,
}

impl Counter for RecordingCounter {
    fn inc_by(&self, n: i64) {
        self.log.lock().push(MetricEvent::Counter { name: self.name.clone(), delta: n });
        self.inner.inc_by(n);
    }

    fn count(&self) -> i64 {
        self.inner.count()
    }
}

struct RecordingMeter {
    name: String,
    inner: EwmaMeter,
    log: EventLog,
}

impl Metered for RecordingMeter {
    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn mean_rate(&self) -> f64 {
        self.inner.mean_rate()
    }

    fn one_minute_rate(&self) -> f64 {
        self.inner.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.inner.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.inner.fifteen_minute_rate()
    }
}

impl Meter for RecordingMeter {
    fn mark_n(&self, n: u64) {
        self.log.lock().push(MetricEvent::Mark { name: self.name.clone(), n });
        self.inner.mark_n(n);
    }
}

struct RecordingTimer {
    name: String,
    inner: HistogramTimer,
    log: EventLog,
}

impl Metered for RecordingTimer {
    fn count(&self) -> u64 {
        self.inner.count()
    }

    fn mean_rate(&self) -> f64 {
        self.inner.mean_rate()
    }

    fn one_minute_rate(&self) -> f64 {
        self.inner.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.inner.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.inner.fifteen_minute_rate()
    }
}

impl Timer for RecordingTimer {
    fn update(&self, elapsed: Duration) {
        self.log.lock().push(MetricEvent::TimerStop { name: self.name.clone(), elapsed });
        self.inner.update(elapsed);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        self.inner.snapshot()
    }

    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn start(&self) -> Instant {
        self.log.lock().push(MetricEvent::TimerStart { name: self.name.clone() });
        self.inner.now()
    }
}
