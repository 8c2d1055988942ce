//! MultiCsvSink - per-table CSV aggregation, flushed at run completion

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{
    Delivery, MultiCsvSinkConfig, PlanRun, RelayError, ResultSink, RunContext, Value,
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::tags::sanitize;

const RESULT_MACRO: &str = "{ResultType}";
const IDENTIFIER_MACRO: &str = "{Identifier}";
const VERDICT_MACRO: &str = "{Verdict}";
const DATE_MACRO: &str = "{Date}";

/// Identifier stand-in while no execution id has been set.
const UNDEFINED_ID: &str = "[UNDEFINED_ID]";

const EXECUTION_ID_COLUMN: &str = "ExecutionId";

/// Filesystem-safe run start time, e.g. "2024-01-01 13-30-00"
const DATE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Rows accumulated for one result table over the run.
#[derive(Debug, Default)]
struct AggregatedStream {
    /// Column order fixed by the first batch of the stream
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Step runs that contributed rows to this stream
    step_run_ids: Vec<Uuid>,
}

/// Sink that aggregates each result table into its own CSV file.
///
/// Nothing touches the filesystem until run completion; `complete`
/// writes one file per stream.
pub struct MultiCsvSink {
    name: String,
    config: MultiCsvSinkConfig,
    set_execution_id: bool,
    replacement: String,
    /// Keyed by raw table name, insertion order preserved
    streams: Vec<(String, AggregatedStream)>,
}

impl MultiCsvSink {
    /// Create a new MultiCsvSink
    pub fn new(
        config: MultiCsvSinkConfig,
        set_execution_id: bool,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: config.name.clone(),
            config,
            set_execution_id,
            replacement: replacement.into(),
            streams: Vec::new(),
        }
    }

    fn stream_mut(&mut self, key: &str) -> &mut AggregatedStream {
        let index = match self.streams.iter().position(|(name, _)| name == key) {
            Some(index) => index,
            None => {
                self.streams
                    .push((key.to_string(), AggregatedStream::default()));
                self.streams.len() - 1
            }
        };
        &mut self.streams[index].1
    }

    fn output_path(&self, table: &str, plan_run: &PlanRun, ctx: &RunContext) -> PathBuf {
        let mut path = self
            .config
            .path_template
            .replace(RESULT_MACRO, &self.sanitized(table))
            .replace(VERDICT_MACRO, &plan_run.verdict.to_string())
            .replace(DATE_MACRO, &plan_run.start_time.format(DATE_FORMAT).to_string());

        // The identifier macro only participates when execution-id
        // tagging is on; otherwise the template text is left alone.
        if self.set_execution_id {
            let identifier = if ctx.has_execution_id() {
                self.sanitized(&ctx.execution_id)
            } else {
                warn!(sink = %self.name, "Results identifier not set");
                self.sanitized(UNDEFINED_ID)
            };
            path = path.replace(IDENTIFIER_MACRO, &identifier);
        }

        PathBuf::from(path)
    }

    fn sanitized(&self, value: &str) -> String {
        sanitize(value, &self.replacement)
    }

    fn write_stream(
        &self,
        path: &Path,
        stream: &AggregatedStream,
    ) -> Result<(), RelayError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
                info!(sink = %self.name, folder = %parent.display(), "Created folder");
            }
        }

        let separator = self.config.separator.as_str();
        let mut out = String::new();
        out.push_str(&stream.header.join(separator));
        out.push('\n');
        for row in &stream.rows {
            out.push_str(&row.join(separator));
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }
}

fn render_cell(value: Option<&Value>, separator: &str, replacement: Option<&str>) -> String {
    let text = match value {
        Some(value) => value.to_string(),
        None => String::new(),
    };
    match replacement {
        Some(replacement) => text.replace(separator, replacement),
        None => text,
    }
}

impl ResultSink for MultiCsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "multi_csv_sink_open", skip_all, fields(sink = %self.name))]
    async fn open(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        self.streams.clear();
        Ok(())
    }

    #[instrument(
        name = "multi_csv_sink_deliver",
        skip(self, delivery, ctx),
        fields(sink = %self.name, table = delivery.batch.name())
    )]
    async fn deliver(&mut self, delivery: &Delivery, ctx: &RunContext) -> Result<(), RelayError> {
        // Identifier travels inside the data so late-arriving ids are
        // visible per row, not just per file name.
        let batch = if self.set_execution_id {
            let id = if ctx.has_execution_id() {
                ctx.execution_id.clone()
            } else {
                UNDEFINED_ID.to_string()
            };
            crate::tags::inject_column(&delivery.batch, EXECUTION_ID_COLUMN, Value::Str(id))?
        } else {
            delivery.batch.clone()
        };

        let key = batch.name().to_string();
        let separator = self.config.separator.as_str();
        let replacement = self.config.separator_replacement.clone();
        let header: Vec<String> = batch
            .columns()
            .iter()
            .map(|column| column.name.clone())
            .collect();

        let step_run_id = delivery.step_run.id;
        let stream = self.stream_mut(&key);
        if stream.header.is_empty() {
            stream.header = header.clone();
        }
        if !stream.step_run_ids.contains(&step_run_id) {
            stream.step_run_ids.push(step_run_id);
        }

        // Later batches may reorder or drop columns; realign to the
        // stream header, missing cells become empty.
        for row in batch.rows() {
            let cells: Vec<String> = if header == stream.header {
                row.iter()
                    .map(|(_, value)| render_cell(value, separator, replacement.as_deref()))
                    .collect()
            } else {
                stream
                    .header
                    .iter()
                    .map(|name| match row.cell(name) {
                        Some(value) => render_cell(value.as_ref(), separator, replacement.as_deref()),
                        None => String::new(),
                    })
                    .collect()
            };
            stream.rows.push(cells);
        }

        observability::record_open_streams(self.streams.len());
        debug!(
            sink = %self.name,
            table = %key,
            rows = batch.row_count(),
            "Rows aggregated"
        );
        Ok(())
    }

    #[instrument(name = "multi_csv_sink_complete", skip_all, fields(sink = %self.name))]
    async fn complete(&mut self, plan_run: &PlanRun, ctx: &RunContext) -> Result<(), RelayError> {
        if ctx.has_execution_id() {
            info!(
                sink = %self.name,
                identifier = %ctx.execution_id,
                "Marking results with identifier"
            );
        }

        let streams = std::mem::take(&mut self.streams);
        for (table, stream) in &streams {
            let path = self.output_path(table, plan_run, ctx);
            info!(
                sink = %self.name,
                rows = stream.rows.len(),
                steps = stream.step_run_ids.len(),
                file = %path.display(),
                "Saving {table} results to file"
            );
            // One unwritable path must not lose the remaining tables.
            if let Err(e) = self.write_stream(&path, stream) {
                error!(
                    sink = %self.name,
                    file = %path.display(),
                    error = %e,
                    "Failed to save {table} results"
                );
            }
        }

        observability::record_open_streams(0);
        info!(sink = %self.name, "All results saved.");
        Ok(())
    }

    #[instrument(name = "multi_csv_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), RelayError> {
        self.streams.clear();
        Ok(())
    }
}
