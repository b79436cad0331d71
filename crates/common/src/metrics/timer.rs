//! Timer combining a latency histogram with a completion-rate meter

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::histogram::{Histogram, HistogramSnapshot};
use super::meter::EwmaMeter;
use super::{Meter, Metered, Timer};
use crate::clock::{Clock, SystemClock};

/// Default [`Timer`]: every recorded duration lands in a [`Histogram`] and
/// marks an [`EwmaMeter`], so the timer's rates are rates of completed
/// scopes
pub struct HistogramTimer {
    histogram: Histogram,
    meter: EwmaMeter,
    clock: Arc<dyn Clock>,
}

impl HistogramTimer {
    /// Create a timer on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a timer reading time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            histogram: Histogram::new(),
            meter: EwmaMeter::with_clock(Arc::clone(&clock)),
            clock,
        }
    }
}

impl Default for HistogramTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HistogramTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramTimer")
            .field("summary", &self.histogram.snapshot().summary())
            .field("meter", &self.meter)
            .finish()
    }
}

impl Metered for HistogramTimer {
    fn count(&self) -> u64 {
        self.meter.count()
    }

    fn mean_rate(&self) -> f64 {
        self.meter.mean_rate()
    }

    fn one_minute_rate(&self) -> f64 {
        self.meter.one_minute_rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.meter.five_minute_rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.meter.fifteen_minute_rate()
    }
}

impl Timer for HistogramTimer {
    fn update(&self, elapsed: Duration) {
        self.histogram.record(elapsed);
        self.meter.mark();
    }

    fn snapshot(&self) -> HistogramSnapshot {
        self.histogram.snapshot()
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }
}
