//! Sink implementations
//!
//! Contains LogSink, MultiCsvSink, PushSink, and TimeSeriesSink.

mod log;
mod multi_csv;
mod push;
mod time_series;

pub use self::log::LogSink;
pub use self::multi_csv::MultiCsvSink;
pub use self::push::PushSink;
pub use self::time_series::TimeSeriesSink;

use contracts::{Delivery, PlanRun, RelayError, ResultSink, RunContext, SinkConfig};

/// One configured delivery target.
///
/// Closed set of sink strategies behind the [`ResultSink`] capability
/// interface; constructed from [`SinkConfig`].
pub enum SinkKind {
    TimeSeries(TimeSeriesSink),
    Push(PushSink),
    MultiCsv(MultiCsvSink),
    Log(LogSink),
}

impl SinkKind {
    /// Create a sink from configuration.
    ///
    /// `set_execution_id` and `replacement` are relay-level settings
    /// shared by every sink.
    pub fn from_config(
        config: &SinkConfig,
        set_execution_id: bool,
        replacement: &str,
    ) -> Result<Self, RelayError> {
        match config {
            SinkConfig::TimeSeries(c) => Ok(SinkKind::TimeSeries(TimeSeriesSink::new(
                c.clone(),
                replacement,
            ))),
            SinkConfig::Push(c) => Ok(SinkKind::Push(PushSink::new(c.clone()))),
            SinkConfig::MultiCsv(c) => Ok(SinkKind::MultiCsv(MultiCsvSink::new(
                c.clone(),
                set_execution_id,
                replacement,
            ))),
            SinkConfig::Log(c) => Ok(SinkKind::Log(LogSink::new(&c.name))),
        }
    }
}

impl ResultSink for SinkKind {
    fn name(&self) -> &str {
        match self {
            SinkKind::TimeSeries(s) => s.name(),
            SinkKind::Push(s) => s.name(),
            SinkKind::MultiCsv(s) => s.name(),
            SinkKind::Log(s) => s.name(),
        }
    }

    async fn open(&mut self, plan_run: &PlanRun, ctx: &RunContext) -> Result<(), RelayError> {
        match self {
            SinkKind::TimeSeries(s) => s.open(plan_run, ctx).await,
            SinkKind::Push(s) => s.open(plan_run, ctx).await,
            SinkKind::MultiCsv(s) => s.open(plan_run, ctx).await,
            SinkKind::Log(s) => s.open(plan_run, ctx).await,
        }
    }

    async fn deliver(&mut self, delivery: &Delivery, ctx: &RunContext) -> Result<(), RelayError> {
        match self {
            SinkKind::TimeSeries(s) => s.deliver(delivery, ctx).await,
            SinkKind::Push(s) => s.deliver(delivery, ctx).await,
            SinkKind::MultiCsv(s) => s.deliver(delivery, ctx).await,
            SinkKind::Log(s) => s.deliver(delivery, ctx).await,
        }
    }

    async fn complete(&mut self, plan_run: &PlanRun, ctx: &RunContext) -> Result<(), RelayError> {
        match self {
            SinkKind::TimeSeries(s) => s.complete(plan_run, ctx).await,
            SinkKind::Push(s) => s.complete(plan_run, ctx).await,
            SinkKind::MultiCsv(s) => s.complete(plan_run, ctx).await,
            SinkKind::Log(s) => s.complete(plan_run, ctx).await,
        }
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        match self {
            SinkKind::TimeSeries(s) => s.close().await,
            SinkKind::Push(s) => s.close().await,
            SinkKind::MultiCsv(s) => s.close().await,
            SinkKind::Log(s) => s.close().await,
        }
    }
}
