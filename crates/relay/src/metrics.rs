//! Per-sink delivery metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful deliveries
    delivery_count: AtomicU64,
    /// Total delivery failures
    failure_count: AtomicU64,
    /// Total rows handed to the sink with a resolved timestamp
    row_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total delivery count
    pub fn delivery_count(&self) -> u64 {
        self.delivery_count.load(Ordering::Relaxed)
    }

    /// Increment delivery count
    pub fn inc_delivery_count(&self) {
        self.delivery_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get row count
    pub fn row_count(&self) -> u64 {
        self.row_count.load(Ordering::Relaxed)
    }

    /// Add delivered rows
    pub fn add_rows(&self, rows: u64) {
        self.row_count.fetch_add(rows, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            delivery_count: self.delivery_count(),
            failure_count: self.failure_count(),
            row_count: self.row_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub delivery_count: u64,
    pub failure_count: u64,
    pub row_count: u64,
}
