//! Lock-free counter

use std::sync::atomic::{AtomicI64, Ordering};

use super::Counter;

/// Counter backed by a single atomic
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicI64,
}

impl AtomicCounter {
    /// Create a counter at zero
    pub fn new() -> Self {
        Self { value: AtomicI64::new(0) }
    }
}

impl Counter for AtomicCounter {
    fn inc_by(&self, n: i64) {
        self.value.fetch_add(n, Ordering::AcqRel);
    }

    fn count(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }
}
