//! Latency distribution for timers
//!
//! Durations land in logarithmic buckets spanning 1µs to one hour, so a
//! fixed 50-slot array covers everything a timed unit of work can report.
//! Recording is lock-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

const NUM_BUCKETS: usize = 50;
const MIN_MICROS: u64 = 1;
const MAX_MICROS: u64 = 3_600_000_000;

/// Lock-free latency histogram
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; NUM_BUCKETS],
    count: AtomicU64,
    sum_micros: AtomicU64,
    min_micros: AtomicU64,
    max_micros: AtomicU64,
}

impl Histogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            min_micros: AtomicU64::new(u64::MAX),
            max_micros: AtomicU64::new(0),
        }
    }

    /// Record a duration
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros().min(u128::from(MAX_MICROS)) as u64;

        self.buckets[bucket_for(micros)].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        saturating_fetch_add(&self.sum_micros, micros);
        self.min_micros.fetch_min(micros, Ordering::AcqRel);
        self.max_micros.fetch_max(micros, Ordering::AcqRel);
    }

    /// Number of recorded durations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Copy the current state into an immutable snapshot
    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut buckets = [0u64; NUM_BUCKETS];
        for (slot, bucket) in buckets.iter_mut().zip(self.buckets.iter()) {
            *slot = bucket.load(Ordering::Acquire);
        }
        let min_micros = self.min_micros.load(Ordering::Acquire);

        HistogramSnapshot {
            buckets,
            count: self.count.load(Ordering::Acquire),
            sum_micros: self.sum_micros.load(Ordering::Acquire),
            min_micros: if min_micros == u64::MAX { 0 } else { min_micros },
            max_micros: self.max_micros.load(Ordering::Acquire),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of a histogram
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    buckets: [u64; NUM_BUCKETS],
    count: u64,
    sum_micros: u64,
    min_micros: u64,
    max_micros: u64,
}

impl HistogramSnapshot {
    /// Number of recorded durations
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean duration, `None` when empty
    pub fn mean(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_micros(self.sum_micros / self.count))
    }

    /// Shortest duration, `None` when empty
    pub fn min(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_micros(self.min_micros))
    }

    /// Longest duration, `None` when empty
    pub fn max(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_micros(self.max_micros))
    }

    /// Approximate duration below which fraction `p` (0.0..=1.0) of the
    /// recorded durations fall
    ///
    /// Resolution is one logarithmic bucket; the result is clamped to the
    /// observed min/max.
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.count == 0 || !(0.0..=1.0).contains(&p) {
            return None;
        }

        // a snapshot taken mid-record can see min before max is raised
        let ceiling = self.max_micros.max(self.min_micros);
        let rank = ((self.count - 1) as f64 * p).ceil() as u64;
        let mut seen = 0u64;
        for (index, &hits) in self.buckets.iter().enumerate() {
            seen += hits;
            if seen > rank {
                let micros = bucket_midpoint(index).clamp(self.min_micros, ceiling);
                return Some(Duration::from_micros(micros));
            }
        }
        self.max()
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        if self.count == 0 {
            return "No measurements recorded".to_string();
        }
        let fmt = |d: Option<Duration>| {
            d.map(|d| format!("{:.2?}", d)).unwrap_or_else(|| "N/A".to_string())
        };
        format!(
            "count={}, mean={}, min={}, max={}, p50={}, p99={}",
            self.count,
            fmt(self.mean()),
            fmt(self.min()),
            fmt(self.max()),
            fmt(self.percentile(0.5)),
            fmt(self.percentile(0.99)),
        )
    }
}

fn growth() -> (f64, f64) {
    static SCALARS: OnceLock<(f64, f64)> = OnceLock::new();
    *SCALARS.get_or_init(|| {
        let ratio =
            (MAX_MICROS as f64 / MIN_MICROS as f64).powf(1.0 / (NUM_BUCKETS as f64 - 1.0));
        (ratio, ratio.ln())
    })
}

fn bucket_for(micros: u64) -> usize {
    if micros == 0 {
        return 0;
    }
    let (_, ratio_ln) = growth();
    let clamped = micros.clamp(MIN_MICROS, MAX_MICROS) as f64;
    let index = ((clamped / MIN_MICROS as f64).ln() / ratio_ln).floor() as usize;
    index.min(NUM_BUCKETS - 1)
}

fn bucket_midpoint(index: usize) -> u64 {
    if index == 0 {
        return MIN_MICROS;
    }
    let (ratio, _) = growth();
    (MIN_MICROS as f64 * ratio.powf(index as f64 + 0.5)).round() as u64
}

fn saturating_fetch_add(target: &AtomicU64, value: u64) {
    let mut current = target.load(Ordering::Relaxed);
    loop {
        let next = current.saturating_add(value);
        match target.compare_exchange_weak(current, next, Ordering::Release, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}
