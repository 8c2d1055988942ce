//! ResultSink trait - relay output interface
//!
//! Defines the abstract interface for sinks.

use chrono::{DateTime, Utc};

use crate::{PlanRun, RelayError, ResultBatch, Row, RunContext, StepRun, TagSet};

/// One normalized batch handed to every configured sink.
///
/// `rows` and `timestamps` are index-aligned; a `None` timestamp marks a
/// row that timestamp-consuming sinks must drop.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub batch: ResultBatch,
    pub rows: Vec<Row>,
    pub timestamps: Vec<Option<DateTime<Utc>>>,
    pub tags: TagSet,
    pub step_run: StepRun,
    /// Rows with no resolvable timestamp, already reported upstream.
    pub dropped: usize,
}

impl Delivery {
    /// Rows paired with their resolved timestamps.
    pub fn timestamped_rows(&self) -> impl Iterator<Item = (&Row, DateTime<Utc>)> {
        self.rows
            .iter()
            .zip(self.timestamps.iter())
            .filter_map(|(row, ts)| ts.map(|ts| (row, ts)))
    }
}

/// Delivery target trait
///
/// All sink implementations must implement this trait. Failures are
/// isolated per sink by the relay; `deliver` errors never abort the run.
#[trait_variant::make(ResultSink: Send)]
pub trait LocalResultSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Acquire per-run resources; called once at run start.
    async fn open(&mut self, plan_run: &PlanRun, ctx: &RunContext) -> Result<(), RelayError>;

    /// Consume one normalized batch.
    ///
    /// # Errors
    /// Returns delivery error (should include context)
    async fn deliver(&mut self, delivery: &Delivery, ctx: &RunContext) -> Result<(), RelayError>;

    /// Flush state accumulated over the run; called once at run completion.
    async fn complete(&mut self, plan_run: &PlanRun, ctx: &RunContext) -> Result<(), RelayError>;

    /// Release sink resources.
    async fn close(&mut self) -> Result<(), RelayError>;
}
