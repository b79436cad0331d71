//! Meter with mean and exponentially-weighted moving average rates

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::ewma::{Ewma, TICK_INTERVAL};
use super::{Meter, Metered};
use crate::clock::{Clock, SystemClock};

/// Upper bound on ticks replayed after a long idle period; beyond this the
/// averages have decayed below any representable difference anyway
const MAX_CATCH_UP_TICKS: u64 = 10_000;

/// Meter tracking a total count, the mean rate since creation, and 1/5/15
/// minute moving averages
///
/// Rate windows tick lazily: every mark and every rate read first replays
/// the 5-second ticks that elapsed since the last one. Exactly one caller
/// wins the compare-and-swap on `last_tick` and performs the replay.
pub struct EwmaMeter {
    count: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    clock: Arc<dyn Clock>,
    start: Instant,
    /// Nanoseconds since `start` of the most recent tick boundary
    last_tick: AtomicU64,
}

impl EwmaMeter {
    /// Create a meter on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a meter reading time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let start = clock.now();
        Self {
            count: AtomicU64::new(0),
            m1: Ewma::one_minute(),
            m5: Ewma::five_minutes(),
            m15: Ewma::fifteen_minutes(),
            clock,
            start,
            last_tick: AtomicU64::new(0),
        }
    }

    fn elapsed_nanos(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.start);
        u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
    }

    fn tick_if_necessary(&self) {
        let tick_nanos = TICK_INTERVAL.as_nanos() as u64;
        let old_tick = self.last_tick.load(Ordering::Acquire);
        let now = self.elapsed_nanos();
        let age = now.saturating_sub(old_tick);
        if age < tick_nanos {
            return;
        }

        let new_tick = now - age % tick_nanos;
        if self
            .last_tick
            .compare_exchange(old_tick, new_tick, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let required = (age / tick_nanos).min(MAX_CATCH_UP_TICKS);
            for _ in 0..required {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Default for EwmaMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EwmaMeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EwmaMeter")
            .field("count", &self.count.load(Ordering::Acquire))
            .field("m1", &self.m1.rate())
            .field("m5", &self.m5.rate())
            .field("m15", &self.m15.rate())
            .finish()
    }
}

impl Meter for EwmaMeter {
    fn mark_n(&self, n: u64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::AcqRel);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }
}

impl Metered for EwmaMeter {
    fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn mean_rate(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed_secs = self.elapsed_nanos() as f64 / 1e9;
        if elapsed_secs == 0.0 {
            return 0.0;
        }
        count as f64 / elapsed_secs
    }

    fn one_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    fn five_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    fn fifteen_minute_rate(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
    }

    fn meter() -> (MockClock, EwmaMeter) {
        let clock = MockClock::new();
        let meter = EwmaMeter::with_clock(Arc::new(clock.clone()));
        (clock, meter)
    }

    #[test]
    fn test_new_meter_is_idle() {
        let (_clock, meter) = meter();
        assert_eq!(meter.count(), 0);
        assert_eq!(meter.mean_rate(), 0.0);
        assert_eq!(meter.one_minute_rate(), 0.0);
        assert_eq!(meter.fifteen_minute_rate(), 0.0);
    }

    #[test]
    fn test_mark_counts() {
        let (_clock, meter) = meter();
        meter.mark();
        meter.mark_n(4);
        assert_eq!(meter.count(), 5);
    }

    #[test]
    fn test_mean_rate() {
        let (clock, meter) = meter();
        meter.mark_n(10);
        clock.advance_secs(5);
        assert_close(meter.mean_rate(), 2.0);
    }

    #[test]
    fn test_rates_appear_after_first_tick() {
        let (clock, meter) = meter();
        meter.mark_n(5);

        // no tick boundary crossed yet
        assert_eq!(meter.one_minute_rate(), 0.0);

        clock.advance_secs(5);
        assert_close(meter.one_minute_rate(), 1.0);
        assert_close(meter.five_minute_rate(), 1.0);
        assert_close(meter.fifteen_minute_rate(), 1.0);
    }

    #[test]
    fn test_rates_decay_when_idle() {
        let (clock, meter) = meter();
        meter.mark_n(5);
        clock.advance_secs(5);
        let seeded = meter.one_minute_rate();

        clock.advance_secs(60);

        assert_close(meter.one_minute_rate(), seeded * (-1.0f64).exp());
        assert!(meter.fifteen_minute_rate() > meter.one_minute_rate());
    }

    #[test]
    fn test_reads_do_not_double_tick() {
        let (clock, meter) = meter();
        meter.mark_n(5);
        clock.advance_secs(5);

        let first = meter.one_minute_rate();
        let second = meter.one_minute_rate();
        assert_eq!(first, second);
    }

    #[test]
    fn test_long_idle_period_is_bounded() {
        let (clock, meter) = meter();
        meter.mark_n(5);
        clock.advance_secs(60 * 60 * 24 * 365);
        assert!(meter.fifteen_minute_rate() < 1e-6);
    }
}
