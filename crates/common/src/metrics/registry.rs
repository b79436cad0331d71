//! Metric registry: the process-wide, name-keyed home of every metric
//!
//! The registry is the source of truth for "does this metric exist". Counters,
//! meters and timers are get-or-create; gauges are registered explicitly and
//! a second registration under a taken name fails with
//! [`MetricsError::AlreadyExists`].

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{
    AtomicCounter, Counter, EwmaMeter, Gauge, HistogramTimer, Meter, Metric, MetricKind, Timer,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{MetricsError, MetricsResult};

/// Name-keyed metric store shared by every instrumented unit of work
///
/// Implementations must be safe for concurrent use: two callers racing to
/// create the same name must both receive the same instance.
pub trait MetricRegistry: Send + Sync {
    /// Get or create the counter named `name`
    fn counter(&self, name: &str) -> MetricsResult<Arc<dyn Counter>>;

    /// Get or create the meter named `name`
    fn meter(&self, name: &str) -> MetricsResult<Arc<dyn Meter>>;

    /// Get or create the timer named `name`
    fn timer(&self, name: &str) -> MetricsResult<Arc<dyn Timer>>;

    /// Register a gauge; fails with `AlreadyExists` when `name` is taken
    fn register_gauge(&self, name: &str, gauge: Arc<dyn Gauge<f64>>) -> MetricsResult<()>;

    /// Look up a metric of any kind
    fn get(&self, name: &str) -> Option<Metric>;

    /// Remove and return a metric
    fn remove(&self, name: &str) -> Option<Metric>;

    /// All registered names, sorted
    fn names(&self) -> Vec<String>;

    /// Whether any metric is registered under `name`
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Kind of the metric registered under `name`
    fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.get(name).map(|metric| metric.kind())
    }

    /// The gauge registered under `name`, if that name holds a gauge
    fn gauge(&self, name: &str) -> Option<Arc<dyn Gauge<f64>>> {
        match self.get(name) {
            Some(Metric::Gauge(gauge)) => Some(gauge),
            _ => None,
        }
    }

    /// Number of registered metrics
    fn len(&self) -> usize {
        self.names().len()
    }

    /// Whether the registry holds no metrics
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process [`MetricRegistry`] backed by a sorted map
///
/// Lookups take a read lock; creation takes the write lock and re-checks the
/// entry, so concurrent get-or-create calls for one name converge on a
/// single instance.
pub struct InMemoryMetricRegistry {
    metrics: RwLock<BTreeMap<String, Metric>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMetricRegistry {
    /// Create an empty registry on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry whose meters and timers read `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { metrics: RwLock::new(BTreeMap::new()), clock }
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Return the metric under `name`, inserting `create()` when absent
    pub(crate) fn get_or_create<T>(
        &self,
        name: &str,
        expected: MetricKind,
        extract: impl Fn(&Metric) -> Option<T>,
        create: impl FnOnce() -> Metric,
    ) -> MetricsResult<T> {
        if name.is_empty() {
            return Err(MetricsError::InvalidName);
        }

        if let Some(existing) = self.metrics.read().get(name) {
            return extract(existing).ok_or_else(|| mismatch(name, expected, existing.kind()));
        }

        let mut metrics = self.metrics.write();
        match metrics.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                extract(existing).ok_or_else(|| mismatch(name, expected, existing.kind()))
            }
            Entry::Vacant(entry) => {
                debug!(metric = name, kind = %expected, "Creating metric");
                let created = entry.insert(create());
                extract(created).ok_or_else(|| mismatch(name, expected, created.kind()))
            }
        }
    }
}

fn mismatch(name: &str, expected: MetricKind, found: MetricKind) -> MetricsError {
    warn!(metric = name, %expected, %found, "Metric name already used by a different kind");
    MetricsError::TypeMismatch { name: name.to_string(), expected, found }
}

impl Default for InMemoryMetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryMetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetricRegistry").field("metrics", &*self.metrics.read()).finish()
    }
}

impl MetricRegistry for InMemoryMetricRegistry {
    fn counter(&self, name: &str) -> MetricsResult<Arc<dyn Counter>> {
        self.get_or_create(
            name,
            MetricKind::Counter,
            |metric| match metric {
                Metric::Counter(counter) => Some(Arc::clone(counter)),
                _ => None,
            },
            || Metric::Counter(Arc::new(AtomicCounter::new())),
        )
    }

    fn meter(&self, name: &str) -> MetricsResult<Arc<dyn Meter>> {
        self.get_or_create(
            name,
            MetricKind::Meter,
            |metric| match metric {
                Metric::Meter(meter) => Some(Arc::clone(meter)),
                _ => None,
            },
            || Metric::Meter(Arc::new(EwmaMeter::with_clock(Arc::clone(&self.clock)))),
        )
    }

    fn timer(&self, name: &str) -> MetricsResult<Arc<dyn Timer>> {
        self.get_or_create(
            name,
            MetricKind::Timer,
            |metric| match metric {
                Metric::Timer(timer) => Some(Arc::clone(timer)),
                _ => None,
            },
            || Metric::Timer(Arc::new(HistogramTimer::with_clock(Arc::clone(&self.clock)))),
        )
    }

    fn register_gauge(&self, name: &str, gauge: Arc<dyn Gauge<f64>>) -> MetricsResult<()> {
        if name.is_empty() {
            return Err(MetricsError::InvalidName);
        }

        match self.metrics.write().entry(name.to_string()) {
            Entry::Occupied(entry) => Err(MetricsError::AlreadyExists {
                name: name.to_string(),
                kind: entry.get().kind(),
            }),
            Entry::Vacant(entry) => {
                debug!(metric = name, "Registering gauge");
                entry.insert(Metric::Gauge(gauge));
                Ok(())
            }
        }
    }

    fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).cloned()
    }

    fn remove(&self, name: &str) -> Option<Metric> {
        self.metrics.write().remove(name)
    }

    fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.metrics.read().contains_key(name)
    }

    fn len(&self) -> usize {
        self.metrics.read().len()
    }
}
