//! PushSink - JSON publication to an external push endpoint

use chrono::SecondsFormat;
use contracts::{
    Delivery, PlanRun, PushFieldRule, PushSinkConfig, RelayError, ResultSink, RunContext, Value,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// One published measurement record.
#[derive(Debug, Serialize)]
pub struct PushRecord<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,

    #[serde(skip_serializing_if = "str::is_empty")]
    pub unit: &'a str,

    #[serde(skip_serializing_if = "str::is_empty")]
    pub origin: &'a str,

    /// RFC 3339, millisecond precision
    pub timestamp: String,

    pub value: &'a Value,
}

/// Request envelope posted to `<url>/publish`.
#[derive(Debug, Serialize)]
struct PushEnvelope<'a> {
    category: &'static str,
    data: Vec<PushRecord<'a>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    experiment_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_case_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    testbed_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    netapp_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PushReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// Sink that publishes allow-listed cells as JSON records
pub struct PushSink {
    name: String,
    config: PushSinkConfig,
    client: Option<reqwest::Client>,
}

impl PushSink {
    /// Create a new PushSink
    pub fn new(config: PushSinkConfig) -> Self {
        Self {
            name: config.name.clone(),
            config,
            client: None,
        }
    }

    fn publish_url(&self) -> String {
        format!("{}/publish", self.config.url.trim_end_matches('/'))
    }

    fn find_rule(&self, result_name: &str, column: &str) -> Option<&PushFieldRule> {
        self.config
            .fields
            .iter()
            .find(|rule| rule.result_name == result_name && rule.column == column)
    }

    /// Collect records for every allow-listed cell of every
    /// timestamped row. Unmatched columns and null cells are skipped.
    fn build_records<'a>(&'a self, delivery: &'a Delivery) -> Vec<PushRecord<'a>> {
        let mut records = Vec::new();
        for (row, ts) in delivery.timestamped_rows() {
            let timestamp = ts.to_rfc3339_opts(SecondsFormat::Millis, true);
            for (column, value) in row.iter() {
                let Some(value) = value else { continue };
                let Some(rule) = self.find_rule(delivery.batch.name(), column) else {
                    continue;
                };

                let kind = if rule.type_override.is_empty() {
                    column
                } else {
                    rule.type_override.as_str()
                };

                records.push(PushRecord {
                    kind,
                    unit: &rule.unit,
                    origin: &rule.origin,
                    timestamp: timestamp.clone(),
                    value,
                });
            }
        }
        records
    }

    async fn publish(&self, envelope: &PushEnvelope<'_>) {
        let Some(client) = self.client.as_ref() else {
            error!(sink = %self.name, "Publish skipped, client not opened");
            return;
        };

        match client.post(self.publish_url()).json(envelope).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(sink = %self.name, records = envelope.data.len(), "Published");
            }
            Ok(response) => {
                let status = response.status();
                let reply: PushReply = response.json().await.unwrap_or(PushReply {
                    status: String::new(),
                    message: String::new(),
                });
                error!(
                    sink = %self.name,
                    reply_status = %reply.status,
                    "Exception while connecting with Publisher ({status}): {}",
                    reply.message
                );
            }
            Err(e) => {
                error!(sink = %self.name, error = %e, "Exception while connecting with Publisher");
            }
        }
    }
}

impl ResultSink for PushSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "push_sink_open", skip_all, fields(sink = %self.name))]
    async fn open(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        self.client = Some(reqwest::Client::new());
        debug!(sink = %self.name, url = %self.config.url, "PushSink opened");
        Ok(())
    }

    #[instrument(
        name = "push_sink_deliver",
        skip(self, delivery, ctx),
        fields(sink = %self.name, table = delivery.batch.name())
    )]
    async fn deliver(&mut self, delivery: &Delivery, ctx: &RunContext) -> Result<(), RelayError> {
        let metadata = self.config.metadata.as_ref();

        // The metadata-aware variant refuses to publish unidentified data.
        if metadata.is_some() && !ctx.has_execution_id() {
            error!(
                sink = %self.name,
                table = delivery.batch.name(),
                "Results cannot be published without an Execution Id"
            );
            return Ok(());
        }

        let records = self.build_records(delivery);
        if records.is_empty() {
            warn!(
                sink = %self.name,
                "Could not retrieve any publishable results from {} table",
                delivery.batch.name()
            );
            return Ok(());
        }

        info!(
            sink = %self.name,
            table = delivery.batch.name(),
            records = records.len(),
            "Publishing results"
        );

        let execution_id = ctx.has_execution_id().then_some(ctx.execution_id.as_str());
        let envelope = PushEnvelope {
            category: "experiment",
            data: records,
            experiment_id: metadata.and(execution_id),
            use_case_id: metadata.and_then(|m| m.use_case_id.as_deref()),
            testbed_id: metadata.and_then(|m| m.testbed_id.as_deref()),
            scenario_id: metadata.and_then(|m| m.scenario_id.as_deref()),
            netapp_id: metadata.and_then(|m| m.netapp_id.as_deref()),
        };

        self.publish(&envelope).await;
        Ok(())
    }

    #[instrument(name = "push_sink_complete", skip_all, fields(sink = %self.name))]
    async fn complete(&mut self, _plan_run: &PlanRun, _ctx: &RunContext) -> Result<(), RelayError> {
        // Records go out per batch; nothing buffered
        Ok(())
    }

    #[instrument(name = "push_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), RelayError> {
        self.client = None;
        debug!(sink = %self.name, "PushSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contracts::{ResultBatch, ResultColumn, Row, StepRun, TagSet};

    fn config(fields: Vec<PushFieldRule>) -> PushSinkConfig {
        PushSinkConfig {
            name: "push".into(),
            url: "http://localhost:9000".into(),
            fields,
            metadata: None,
        }
    }

    fn rule(result_name: &str, column: &str, type_override: &str) -> PushFieldRule {
        PushFieldRule {
            result_name: result_name.into(),
            column: column.into(),
            type_override: type_override.into(),
            unit: "ms".into(),
            origin: "bench".into(),
        }
    }

    fn delivery() -> Delivery {
        let batch = ResultBatch::new(
            "Latency",
            vec![
                ResultColumn::from_values("RTT", vec![Value::Float(12.5), Value::Float(13.0)]),
                ResultColumn::from_values("Seq", vec![Value::Int(1), Value::Int(2)]),
            ],
        )
        .unwrap();
        let rows: Vec<Row> = batch.rows().collect();
        let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        Delivery {
            batch,
            rows,
            timestamps: vec![Some(ts), None],
            tags: TagSet::new(),
            step_run: StepRun::new("ping"),
            dropped: 1,
        }
    }

    #[test]
    fn test_build_records_applies_allow_list() {
        let sink = PushSink::new(config(vec![rule("Latency", "RTT", "")]));
        let delivery = delivery();
        let records = sink.build_records(&delivery);

        // Only the timestamped row, only the allow-listed column.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "RTT");
        assert_eq!(records[0].unit, "ms");
        assert_eq!(records[0].timestamp, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_type_override_renames_record() {
        let sink = PushSink::new(config(vec![rule("Latency", "RTT", "round_trip")]));
        let delivery = delivery();
        let records = sink.build_records(&delivery);
        assert_eq!(records[0].kind, "round_trip");
    }

    #[test]
    fn test_rule_must_match_result_name() {
        let sink = PushSink::new(config(vec![rule("OtherTable", "RTT", "")]));
        let delivery = delivery();
        assert!(sink.build_records(&delivery).is_empty());
    }

    #[test]
    fn test_record_serialization_skips_empty_optionals() {
        let record = PushRecord {
            kind: "RTT",
            unit: "",
            origin: "",
            timestamp: "2023-11-14T22:13:20.000Z".into(),
            value: &Value::Float(12.5),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "RTT");
        assert!(json.get("unit").is_none());
        assert!(json.get("origin").is_none());
        assert_eq!(json["value"], 12.5);
    }

    #[tokio::test]
    async fn test_metadata_variant_requires_execution_id() {
        let mut cfg = config(vec![rule("Latency", "RTT", "")]);
        cfg.metadata = Some(Default::default());
        let mut sink = PushSink::new(cfg);

        let ctx = RunContext::new(contracts::PlanRun::new(Utc::now()));
        // No client opened; the early rejection path must not touch it.
        let result = sink.deliver(&delivery(), &ctx).await;
        assert!(result.is_ok());
    }
}
