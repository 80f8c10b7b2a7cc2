//! Shared counters for attempts, saves and trials.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Clonable handle to a shared atomic counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the new value.
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
    }

    pub fn same_as(&self, other: &Counter) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

/// Several counters incremented together as one logical event.
#[derive(Debug, Clone, Default)]
pub struct CompoundCounter {
    counters: Vec<Counter>,
}

impl CompoundCounter {
    pub fn new(counters: Vec<Counter>) -> Self {
        Self { counters }
    }

    pub fn increment(&self) {
        for counter in &self.counters {
            counter.increment();
        }
    }

    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }
}
