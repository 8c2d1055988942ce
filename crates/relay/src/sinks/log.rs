//! LogSink - logs batch summary via tracing

use contracts::{Delivery, PlanRun, RelayError, ResultSink, RunContext};
use tracing::{debug, info, instrument};

/// Sink that logs batch summaries for debugging
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_delivery_summary(&self, delivery: &Delivery) {
        info!(
            sink = %self.name,
            table = delivery.batch.name(),
            step = %delivery.step_run.step_name,
            rows = delivery.rows.len(),
            dropped = delivery.dropped,
            tags = delivery.tags.len(),
            "Batch received"
        );
    }
}

impl ResultSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_open", skip_all, fields(sink = %self.name))]
    async fn open(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        Ok(())
    }

    #[instrument(
        name = "log_sink_deliver",
        skip(self, delivery, _ctx),
        fields(sink = %self.name, table = delivery.batch.name())
    )]
    async fn deliver(&mut self, delivery: &Delivery, _ctx: &RunContext) -> Result<(), RelayError> {
        self.log_delivery_summary(delivery);
        Ok(())
    }

    #[instrument(name = "log_sink_complete", skip_all, fields(sink = %self.name))]
    async fn complete(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        // Nothing accumulated
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), RelayError> {
        debug!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
