//! ResultRelay - run lifecycle and per-batch dispatch

use chrono::{DateTime, Utc};
use contracts::{
    Delivery, PlanRun, RelayBlueprint, RelayError, ResultBatch, ResultSink, Row, RunContext,
    StepRun, TimestampOverride, Value, Verdict,
};
use ::metrics::counter;
use observability::{record_run_completed, record_run_started, record_sink_delivery};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::classify::{classify, Published};
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::SinkKind;
use crate::tags::{inject_column, MetadataTagger, ITERATION_COLUMN_NAME};
use crate::timestamp::{find_override, resolve};

/// The pipeline entry point.
///
/// Driven by the host engine through the run lifecycle: `on_run_start`,
/// `on_step_run_start` and `on_result_published` any number of times,
/// then `on_run_completed`. All calls arrive on one logical thread.
pub struct ResultRelay {
    set_execution_id: bool,
    add_iteration: bool,
    tagger: MetadataTagger,
    overrides: Vec<TimestampOverride>,
    sinks: Vec<(SinkKind, SinkMetrics)>,
    ctx: Option<RunContext>,
    step_runs: Vec<StepRun>,
}

impl ResultRelay {
    /// Build the relay from a loaded configuration blueprint.
    pub fn from_blueprint(blueprint: &RelayBlueprint) -> Result<Self, RelayError> {
        let tagger = MetadataTagger::new(
            &blueprint.station,
            blueprint.set_execution_id,
            blueprint.sanitize_replacement.clone(),
        );

        let mut sinks = Vec::with_capacity(blueprint.sinks.len());
        for config in &blueprint.sinks {
            let sink = SinkKind::from_config(
                config,
                blueprint.set_execution_id,
                &blueprint.sanitize_replacement,
            )?;
            sinks.push((sink, SinkMetrics::new()));
        }

        Ok(Self {
            set_execution_id: blueprint.set_execution_id,
            add_iteration: blueprint.add_iteration,
            tagger,
            overrides: blueprint.timestamp_overrides.clone(),
            sinks,
            ctx: None,
            step_runs: Vec::new(),
        })
    }

    /// Currently active run context, if a run is open.
    pub fn run_context(&self) -> Option<&RunContext> {
        self.ctx.as_ref()
    }

    /// Per-sink delivery metrics, keyed by sink name.
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|(sink, metrics)| (sink.name().to_string(), metrics.snapshot()))
            .collect()
    }

    /// Assign the externally provided execution id for the active run.
    /// Blank ids are rejected with an error log; the run continues.
    pub fn set_execution_id(&mut self, id: &str) {
        let Some(ctx) = self.ctx.as_mut() else {
            error!("Execution Id set outside of an active run");
            return;
        };
        if id.trim().is_empty() {
            error!("Execution Id cannot be blank");
            return;
        }
        ctx.execution_id = id.to_string();
        info!(execution_id = %id, "Execution Id assigned");
    }

    /// Open every sink and start a fresh run context.
    #[instrument(name = "relay_run_start", skip_all, fields(run = %plan_run.id))]
    pub async fn on_run_start(&mut self, plan_run: PlanRun) -> Result<(), RelayError> {
        let ctx = RunContext::new(plan_run.clone());
        for (sink, _) in &mut self.sinks {
            if let Err(e) = sink.open(&plan_run, &ctx).await {
                error!(sink = sink.name(), error = %e, "Sink failed to open");
            }
        }
        self.ctx = Some(ctx);
        self.step_runs.clear();
        record_run_started();
        info!("Run started");
        Ok(())
    }

    /// Register a step run so its published results can be attributed.
    pub fn on_step_run_start(&mut self, step_run: StepRun) {
        self.step_runs.push(step_run);
    }

    /// Normalize one published batch and fan it out to every sink.
    ///
    /// Iteration marks advance the run counter and are swallowed.
    /// Sink delivery errors are logged and counted, never propagated.
    ///
    /// # Errors
    /// `NoActiveRun`, `UnknownStepRun`, or `BatchShape` for a malformed
    /// iteration mark.
    #[instrument(name = "relay_result_published", skip(self, batch), fields(table = batch.name()))]
    pub async fn on_result_published(
        &mut self,
        step_run_id: Uuid,
        batch: ResultBatch,
    ) -> Result<(), RelayError> {
        if self.ctx.is_none() {
            return Err(RelayError::NoActiveRun);
        }

        let batch = match classify(batch)? {
            Published::IterationMark(iteration) => {
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.iteration = iteration;
                }
                return Ok(());
            }
            Published::Normal(batch) => batch,
        };

        let step_run = self
            .step_runs
            .iter()
            .find(|step| step.id == step_run_id)
            .cloned()
            .ok_or(RelayError::UnknownStepRun { id: step_run_id })?;

        let Some(ctx) = self.ctx.as_mut() else {
            return Err(RelayError::NoActiveRun);
        };

        if self.set_execution_id && !ctx.has_execution_id() && !ctx.execution_id_warned {
            warn!("Results published before setting Execution Id");
            ctx.execution_id_warned = true;
        }

        let batch = if self.add_iteration {
            inject_column(&batch, ITERATION_COLUMN_NAME, Value::Int(ctx.iteration))?
        } else {
            batch
        };

        let rows: Vec<Row> = batch.rows().collect();
        let rule = find_override(&self.overrides, batch.name());
        let timestamps: Vec<Option<DateTime<Utc>>> =
            rows.iter().map(|row| resolve(row, rule)).collect();

        let total = rows.len();
        let dropped = timestamps.iter().filter(|ts| ts.is_none()).count();
        if dropped > 0 {
            warn!(
                table = batch.name(),
                "Ignored {dropped}/{total} results from table"
            );
        }

        counter!("relay_batches_published_total").increment(1);
        counter!("relay_rows_dispatched_total").increment((total - dropped) as u64);
        counter!("relay_rows_ignored_total").increment(dropped as u64);

        let tags = self.tagger.tags(ctx, &[])?;
        let delivery = Delivery {
            batch,
            rows,
            timestamps,
            tags,
            step_run,
            dropped,
        };

        let ctx = self.ctx.as_ref().ok_or(RelayError::NoActiveRun)?;
        for (sink, metrics) in &mut self.sinks {
            match sink.deliver(&delivery, ctx).await {
                Ok(()) => {
                    metrics.inc_delivery_count();
                    metrics.add_rows((total - dropped) as u64);
                    record_sink_delivery(sink.name(), true);
                }
                Err(e) => {
                    metrics.inc_failure_count();
                    counter!("relay_sink_failures_total").increment(1);
                    record_sink_delivery(sink.name(), false);
                    error!(sink = sink.name(), error = %e, "Sink delivery failed");
                }
            }
        }
        Ok(())
    }

    /// Record the final verdict, flush and close every sink, and clear
    /// the run state.
    #[instrument(name = "relay_run_completed", skip_all, fields(verdict = %verdict))]
    pub async fn on_run_completed(&mut self, verdict: Verdict) -> Result<(), RelayError> {
        let Some(mut ctx) = self.ctx.take() else {
            return Err(RelayError::NoActiveRun);
        };
        ctx.plan_run.verdict = verdict;

        for (sink, metrics) in &mut self.sinks {
            if let Err(e) = sink.complete(&ctx.plan_run, &ctx).await {
                metrics.inc_failure_count();
                counter!("relay_sink_failures_total").increment(1);
                error!(sink = sink.name(), error = %e, "Sink failed to complete");
            }
            if let Err(e) = sink.close().await {
                error!(sink = sink.name(), error = %e, "Sink failed to close");
            }
        }

        self.step_runs.clear();
        record_run_completed(&verdict.to_string());
        info!("Run completed");
        Ok(())
    }
}
