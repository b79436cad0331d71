//! Ratio gauges derived from two metered sources
//!
//! A ratio is recomputed on every read; nothing is cached. A denominator of
//! zero, NaN or infinity yields `NaN`, which downstream health checks treat
//! as "no traffic yet".

use std::fmt;
use std::sync::Arc;

use instrumentor_common::{Gauge, Metered};

/// Which reading of a [`Metered`] source a ratio compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAccessor {
    /// Total event count
    Count,
    /// Mean rate since creation
    Mean,
    OneMinute,
    FiveMinute,
    FifteenMinute,
}

impl RateAccessor {
    /// Every accessor, in gauge registration order
    pub const ALL: [Self; 5] =
        [Self::Count, Self::Mean, Self::OneMinute, Self::FiveMinute, Self::FifteenMinute];

    /// Name suffix of the error-ratio gauge using this accessor
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Count => "total_pct",
            Self::Mean => "mean_pct",
            Self::OneMinute => "m1_pct",
            Self::FiveMinute => "m5_pct",
            Self::FifteenMinute => "m15_pct",
        }
    }

    /// Read `source` through this accessor
    pub fn read<M: Metered + ?Sized>(self, source: &M) -> f64 {
        match self {
            Self::Count => source.count() as f64,
            Self::Mean => source.mean_rate(),
            Self::OneMinute => source.one_minute_rate(),
            Self::FiveMinute => source.five_minute_rate(),
            Self::FifteenMinute => source.fifteen_minute_rate(),
        }
    }
}

/// `numerator / denominator`, or `NaN` when the denominator is zero, NaN or
/// infinite
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return f64::NAN;
    }
    numerator / denominator
}

/// Gauge reading `numerator / denominator` through one [`RateAccessor`]
pub struct RatioGauge<N: ?Sized, D: ?Sized> {
    numerator: Arc<N>,
    denominator: Arc<D>,
    accessor: RateAccessor,
}

impl<N, D> RatioGauge<N, D>
where
    N: Metered + ?Sized,
    D: Metered + ?Sized,
{
    /// Ratio of `numerator` over `denominator` read through `accessor`
    pub fn new(numerator: Arc<N>, denominator: Arc<D>, accessor: RateAccessor) -> Self {
        Self { numerator, denominator, accessor }
    }

    /// Reading both sources are compared by
    pub fn accessor(&self) -> RateAccessor {
        self.accessor
    }
}

impl<N, D> Gauge<f64> for RatioGauge<N, D>
where
    N: Metered + ?Sized,
    D: Metered + ?Sized,
{
    fn value(&self) -> f64 {
        ratio(self.accessor.read(&*self.numerator), self.accessor.read(&*self.denominator))
    }
}

impl<N: ?Sized, D: ?Sized> Clone for RatioGauge<N, D> {
    fn clone(&self) -> Self {
        Self {
            numerator: Arc::clone(&self.numerator),
            denominator: Arc::clone(&self.denominator),
            accessor: self.accessor,
        }
    }
}

impl<N: ?Sized, D: ?Sized> fmt::Debug for RatioGauge<N, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatioGauge").field("accessor", &self.accessor).finish_non_exhaustive()
    }
}

/// Ratio of two metered sources under `accessor`
pub fn ratio_of<N, D>(numerator: Arc<N>, denominator: Arc<D>, accessor: RateAccessor) -> RatioGauge<N, D>
where
    N: Metered + ?Sized,
    D: Metered + ?Sized,
{
    RatioGauge::new(numerator, denominator, accessor)
}

/// Ratio of two arbitrary value sources
pub fn ratio_of_fns<N, D>(numerator: N, denominator: D) -> impl Fn() -> f64 + Send + Sync
where
    N: Fn() -> f64 + Send + Sync,
    D: Fn() -> f64 + Send + Sync,
{
    move || ratio(numerator(), denominator())
}

#[cfg(test)]
mod tests {
    use instrumentor_common::{EwmaMeter, HistogramTimer, Meter, MockClock, Timer};

    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_ratio_rules() {
        assert_close(ratio(1.0, 4.0), 0.25);
        assert_close(ratio(0.0, 4.0), 0.0);
        assert!(ratio(1.0, 0.0).is_nan());
        assert!(ratio(0.0, 0.0).is_nan());
        assert!(ratio(1.0, f64::NAN).is_nan());
        assert!(ratio(1.0, f64::INFINITY).is_nan());
        assert!(ratio(1.0, f64::NEG_INFINITY).is_nan());
    }

    #[test]
    fn test_count_ratio_over_meter_and_timer() {
        let clock = MockClock::new();
        let errors: Arc<dyn Meter> = Arc::new(EwmaMeter::with_clock(Arc::new(clock.clone())));
        let timer: Arc<dyn Timer> = Arc::new(HistogramTimer::with_clock(Arc::new(clock.clone())));
        let gauge = ratio_of(Arc::clone(&errors), Arc::clone(&timer), RateAccessor::Count);

        assert!(gauge.value().is_nan());

        for _ in 0..4 {
            timer.update(std::time::Duration::from_millis(1));
        }
        errors.mark();
        assert_close(gauge.value(), 0.25);
    }

    #[test]
    fn test_windowed_ratio_is_nan_before_first_tick() {
        let clock = MockClock::new();
        let errors = Arc::new(EwmaMeter::with_clock(Arc::new(clock.clone())));
        let calls = Arc::new(EwmaMeter::with_clock(Arc::new(clock.clone())));
        let gauge = ratio_of(Arc::clone(&errors), Arc::clone(&calls), RateAccessor::FifteenMinute);

        calls.mark_n(10);
        errors.mark_n(5);
        assert!(gauge.value().is_nan());

        clock.advance_secs(5);
        assert_close(gauge.value(), 0.5);
    }

    #[test]
    fn test_ratio_is_pull_based() {
        let clock = MockClock::new();
        let errors = Arc::new(EwmaMeter::with_clock(Arc::new(clock.clone())));
        let calls = Arc::new(EwmaMeter::with_clock(Arc::new(clock)));
        let gauge: Arc<dyn Gauge<f64>> =
            Arc::new(ratio_of(Arc::clone(&errors), Arc::clone(&calls), RateAccessor::Count));

        calls.mark_n(2);
        assert_close(gauge.value(), 0.0);
        errors.mark();
        assert_close(gauge.value(), 0.5);
    }

    #[test]
    fn test_ratio_of_fns() {
        let gauge = ratio_of_fns(|| 3.0, || 4.0);
        assert_close(gauge.value(), 0.75);
        assert!(ratio_of_fns(|| 3.0, || 0.0).value().is_nan());
    }

    #[test]
    fn test_suffixes() {
        let suffixes: Vec<&str> = RateAccessor::ALL.iter().map(|a| a.suffix()).collect();
        assert_eq!(suffixes, vec!["total_pct", "mean_pct", "m1_pct", "m5_pct", "m15_pct"]);
    }
}
