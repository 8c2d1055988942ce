//! Host-level relay metrics
//!
//! Run lifecycle counters plus an in-memory aggregator for end-of-run
//! summaries. Per-batch pipeline counters are emitted by the relay
//! itself; this module covers what the embedding host records.

use std::collections::HashMap;

use ::metrics::{counter, gauge};

/// Record a run start.
pub fn record_run_started() {
    counter!("relay_runs_started_total").increment(1);
}

/// Record a run completion with its verdict.
pub fn record_run_completed(verdict: &str) {
    counter!("relay_runs_completed_total", "verdict" => verdict.to_string()).increment(1);
}

/// Record one sink delivery outcome.
pub fn record_sink_delivery(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "relay_sink_deliveries_total",
        "sink" => sink_name.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the current number of open aggregation streams.
pub fn record_open_streams(count: usize) {
    gauge!("relay_open_streams").set(count as f64);
}

/// In-memory aggregation over one run, for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct RelayRunAggregator {
    /// Batches accepted into the pipeline
    pub total_batches: u64,

    /// Rows handed to sinks with a resolved timestamp
    pub total_rows: u64,

    /// Rows dropped for lack of a timestamp
    pub total_ignored: u64,

    /// Delivery failures per sink
    pub failure_counts: HashMap<String, u64>,

    /// Rows-per-batch distribution
    pub batch_size_stats: RunningStats,
}

impl RelayRunAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one normalized batch.
    pub fn record_batch(&mut self, rows: u64, ignored: u64) {
        self.total_batches += 1;
        self.total_rows += rows;
        self.total_ignored += ignored;
        self.batch_size_stats.push(rows as f64);
    }

    /// Account one sink delivery failure.
    pub fn record_failure(&mut self, sink_name: &str) {
        *self.failure_counts.entry(sink_name.to_string()).or_insert(0) += 1;
    }

    /// Produce the summary report.
    pub fn summary(&self) -> RunSummary {
        let published = self.total_rows + self.total_ignored;
        RunSummary {
            total_batches: self.total_batches,
            total_rows: self.total_rows,
            total_ignored: self.total_ignored,
            ignore_rate: if published > 0 {
                self.total_ignored as f64 / published as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_size_stats),
            sink_failure_counts: self.failure_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_batches: u64,
    pub total_rows: u64,
    pub total_ignored: u64,
    pub ignore_rate: f64,
    pub batch_size: StatsSummary,
    pub sink_failure_counts: HashMap<String, u64>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Run Summary ===")?;
        writeln!(f, "Batches published: {}", self.total_batches)?;
        writeln!(f, "Rows dispatched: {}", self.total_rows)?;
        writeln!(
            f,
            "Rows ignored: {} ({:.2}%)",
            self.total_ignored, self.ignore_rate
        )?;
        writeln!(f, "Rows per batch: {}", self.batch_size)?;

        if !self.sink_failure_counts.is_empty() {
            writeln!(f, "Sink failures:")?;
            for (sink, count) in &self.sink_failure_counts {
                writeln!(f, "  {}: {}", sink, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
