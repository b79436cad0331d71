//! Exponentially-weighted moving average over fixed tick intervals

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

/// Interval between rate ticks
pub(crate) const TICK_INTERVAL: Duration = Duration::from_secs(5);

const SECONDS_PER_MINUTE: f64 = 60.0;

#[derive(Debug, Default)]
struct EwmaState {
    rate: f64,
    initialized: bool,
}

/// Moving average of events per second
///
/// Events are accumulated lock-free in `uncounted`; the lock is only taken
/// on [`Ewma::tick`] and reads.
#[derive(Debug)]
pub(crate) struct Ewma {
    alpha: f64,
    uncounted: AtomicU64,
    state: Mutex<EwmaState>,
}

impl Ewma {
    fn over_minutes(minutes: f64) -> Self {
        let tick_secs = TICK_INTERVAL.as_secs_f64();
        let alpha = 1.0 - (-tick_secs / SECONDS_PER_MINUTE / minutes).exp();
        Self { alpha, uncounted: AtomicU64::new(0), state: Mutex::new(EwmaState::default()) }
    }

    pub(crate) fn one_minute() -> Self {
        Self::over_minutes(1.0)
    }

    pub(crate) fn five_minutes() -> Self {
        Self::over_minutes(5.0)
    }

    pub(crate) fn fifteen_minutes() -> Self {
        Self::over_minutes(15.0)
    }

    pub(crate) fn update(&self, n: u64) {
        self.uncounted.fetch_add(n, Ordering::AcqRel);
    }

    /// Fold the events seen since the previous tick into the average
    pub(crate) fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::AcqRel);
        let instant_rate = count as f64 / TICK_INTERVAL.as_secs_f64();

        let mut state = self.state.lock();
        if state.initialized {
            state.rate += self.alpha * (instant_rate - state.rate);
        } else {
            state.rate = instant_rate;
            state.initialized = true;
        }
    }

    /// Events per second
    pub(crate) fn rate(&self) -> f64 {
        self.state.lock().rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_first_tick_seeds_rate() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();
        assert_close(ewma.rate(), 0.6);
    }

    #[test]
    fn test_idle_ticks_decay() {
        let ewma = Ewma::one_minute();
        ewma.update(3);
        ewma.tick();

        for _ in 0..12 {
            ewma.tick();
        }

        // one minute of silence decays a one-minute average by 1/e
        assert_close(ewma.rate(), 0.6 * (-1.0f64).exp());
    }

    #[test]
    fn test_longer_windows_decay_slower() {
        let m1 = Ewma::one_minute();
        let m15 = Ewma::fifteen_minutes();
        for ewma in [&m1, &m15] {
            ewma.update(5);
            ewma.tick();
            ewma.tick();
        }
        assert!(m15.rate() > m1.rate());
    }

    #[test]
    fn test_no_events_is_zero() {
        let ewma = Ewma::five_minutes();
        assert_eq!(ewma.rate(), 0.0);
        ewma.tick();
        assert_eq!(ewma.rate(), 0.0);
    }
}
