//! TimeSeriesSink - line-protocol batch writes to a time-series database

use contracts::{
    Delivery, PlanRun, RelayError, ResultSink, RunContext, Row, TagSet, TimeSeriesSinkConfig,
    Value,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

use crate::tags::sanitize;

/// Invalid-measurement sentinel emitted by some source instruments.
const INVALID_MEASUREMENT: f64 = 9.91e37;

/// Sink that writes one line-protocol point per row, one write per batch
pub struct TimeSeriesSink {
    name: String,
    config: TimeSeriesSinkConfig,
    replacement: String,
    client: Option<reqwest::Client>,
}

impl TimeSeriesSink {
    /// Create a new TimeSeriesSink
    pub fn new(config: TimeSeriesSinkConfig, replacement: impl Into<String>) -> Self {
        Self {
            name: config.name.clone(),
            config,
            replacement: replacement.into(),
            client: None,
        }
    }

    fn client(&self) -> Result<&reqwest::Client, RelayError> {
        self.client
            .as_ref()
            .ok_or_else(|| RelayError::sink_write(&self.name, "client not opened"))
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.config.url.trim_end_matches('/'))
    }

    /// Submit one batch of lines as a single write. Failures are logged
    /// with the offending payload fragment; the run continues.
    async fn write_lines(&self, lines: &[String]) {
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                error!(sink = %self.name, error = %e, "Write skipped");
                return;
            }
        };

        let body = lines.join("\n");
        let request = client
            .post(self.write_url())
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Authorization", format!("Token {}", self.config.token))
            .body(body);

        match request.send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                let status = response.status();
                let message = response.text().await.unwrap_or_default();
                error!(sink = %self.name, %status, "WriteError: {message}");
                if let Some(line) = lines.first() {
                    debug!(sink = %self.name, "Point data: {line}");
                }
            }
            Err(e) => {
                error!(sink = %self.name, error = %e, "Write request failed");
            }
        }
    }
}

impl ResultSink for TimeSeriesSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "time_series_sink_open", skip_all, fields(sink = %self.name))]
    async fn open(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        self.client = Some(reqwest::Client::new());
        debug!(sink = %self.name, url = %self.config.url, "TimeSeriesSink opened");
        Ok(())
    }

    #[instrument(
        name = "time_series_sink_deliver",
        skip(self, delivery, _ctx),
        fields(sink = %self.name, table = delivery.batch.name())
    )]
    async fn deliver(&mut self, delivery: &Delivery, _ctx: &RunContext) -> Result<(), RelayError> {
        let measurement = sanitize(delivery.batch.name(), &self.replacement);

        let lines: Vec<String> = delivery
            .timestamped_rows()
            .map(|(row, ts)| encode_point(&measurement, &delivery.tags, row, ts))
            .collect();

        if measurement != delivery.batch.name() {
            info!(
                sink = %self.name,
                table = delivery.batch.name(),
                rows = lines.len(),
                "Sending results as '{measurement}'"
            );
        } else {
            info!(sink = %self.name, table = delivery.batch.name(), rows = lines.len(), "Sending results");
        }

        if lines.is_empty() {
            return Ok(());
        }

        self.write_lines(&lines).await;
        Ok(())
    }

    #[instrument(name = "time_series_sink_complete", skip_all, fields(sink = %self.name))]
    async fn complete(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        // Writes go out per batch; nothing buffered
        Ok(())
    }

    #[instrument(name = "time_series_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), RelayError> {
        self.client = None;
        debug!(sink = %self.name, "TimeSeriesSink closed");
        Ok(())
    }
}

/// One line-protocol point:
/// `measurement,tag=v field=v,field=v timestamp_ms`
fn encode_point(measurement: &str, tags: &TagSet, row: &Row, ts: DateTime<Utc>) -> String {
    let mut line = escape_measurement(measurement);

    for (key, value) in tags.iter() {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    let fields: Vec<String> = row
        .iter()
        // Null (unsent) values appear as empty columns
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        // Avoid sending invalid values to the database
        .filter(|(_, value)| !is_invalid_sentinel(value))
        .map(|(name, value)| format!("{}={}", escape_tag(name), encode_field_value(value)))
        .collect();

    line.push(' ');
    line.push_str(&fields.join(","));
    line.push(' ');
    line.push_str(&ts.timestamp_millis().to_string());
    line
}

fn is_invalid_sentinel(value: &Value) -> bool {
    match value {
        Value::Float(f) => f.is_infinite() || *f == INVALID_MEASUREMENT,
        Value::Str(s) => s == "9.91E+37" || s == "Infinity",
        _ => false,
    }
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn encode_field_value(value: &Value) -> String {
    match value {
        Value::Int(v) => format!("{v}i"),
        Value::UInt(v) => format!("{v}u"),
        Value::Float(v) => format!("{v}"),
        Value::Bool(v) => format!("{v}"),
        Value::Str(v) => format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}
