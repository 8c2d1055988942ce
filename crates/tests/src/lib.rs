//! # Integration Tests
//!
//! End-to-end coverage of the result relay:
//! - configuration loading into a running relay
//! - full run lifecycle with CSV aggregation on disk
//! - iteration marks, execution ids and timestamp drops

#[cfg(test)]
mod contract_tests {
    use contracts::{ResultBatch, ResultColumn, Value};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_batch_round_trips_rows() {
        let batch = ResultBatch::new(
            "Temp",
            vec![ResultColumn::from_values(
                "Value",
                vec![Value::Float(1.0), Value::Float(2.0)],
            )],
        )
        .unwrap();
        assert_eq!(batch.rows().count(), 2);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;

    use chrono::{TimeZone, Utc};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{PlanRun, ResultBatch, ResultColumn, StepRun, Value, Verdict};
    use observability::RelayRunAggregator;
    use relay::{ResultRelay, ITERATION_COLUMN_NAME, MARKER_COLUMN_NAME, MARKER_RESULT_NAME};
    use tempfile::TempDir;

    fn relay_config(csv_template: &str) -> String {
        format!(
            r#"
set_execution_id = true
add_iteration = true

[station]
facility = "lab"
host_ip = "10.0.0.5"
station_name = "bench"
app_version = "TAP (9.18.2)"

[[sinks]]
sink_type = "multi_csv"
name = "csv"
path_template = "{csv_template}"

[[sinks]]
sink_type = "log"
name = "dbg"
"#
        )
    }

    fn measurement(name: &str, timestamp: i64, value: f64) -> ResultBatch {
        ResultBatch::new(
            name,
            vec![
                ResultColumn::from_values("Timestamp", vec![Value::Int(timestamp)]),
                ResultColumn::from_values("Value", vec![Value::Float(value)]),
            ],
        )
        .unwrap()
    }

    fn iteration_mark(iteration: i64) -> ResultBatch {
        ResultBatch::new(
            MARKER_RESULT_NAME,
            vec![ResultColumn::from_values(
                MARKER_COLUMN_NAME,
                vec![Value::Int(iteration)],
            )],
        )
        .unwrap()
    }

    /// Config file -> relay -> run lifecycle -> CSV on disk.
    ///
    /// Verifies execution-id injection, iteration tagging, name
    /// sanitization in the file path and the end-of-run flush.
    #[tokio::test]
    async fn test_e2e_run_to_csv() {
        let dir = TempDir::new().unwrap();
        let template = dir
            .path()
            .join("{ResultType}-{Identifier}-{Verdict}.csv")
            .to_string_lossy()
            .into_owned();

        let blueprint =
            ConfigLoader::load_from_str(&relay_config(&template), ConfigFormat::Toml).unwrap();
        let mut relay = ResultRelay::from_blueprint(&blueprint).unwrap();

        let plan_run = PlanRun::new(Utc.with_ymd_and_hms(2024, 1, 1, 13, 30, 0).unwrap());
        relay.on_run_start(plan_run).await.unwrap();
        let step = StepRun::new("measure");
        relay.on_step_run_start(step.clone());

        // First batch arrives before the execution id is known.
        relay
            .on_result_published(step.id, measurement("Power Meter", 1_700_000_000_000, 1.5))
            .await
            .unwrap();

        relay.set_execution_id("exp-1");
        relay
            .on_result_published(step.id, iteration_mark(2))
            .await
            .unwrap();
        relay
            .on_result_published(step.id, measurement("Power Meter", 1_700_000_000_500, 2.5))
            .await
            .unwrap();

        relay.on_run_completed(Verdict::Pass).await.unwrap();

        // Table name sanitized in the path, identifier filled in.
        let path = dir.path().join("Power_Meter-exp-1-Pass.csv");
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            format!(
                "ExecutionId,{col},Timestamp,Value\n\
                 [UNDEFINED_ID],0,1700000000000,1.5\n\
                 exp-1,2,1700000000500,2.5\n",
                col = ITERATION_COLUMN_NAME
            )
        );

        let metrics = relay.metrics();
        let csv = metrics.iter().find(|(name, _)| name == "csv").unwrap();
        assert_eq!(csv.1.delivery_count, 2);
        assert_eq!(csv.1.failure_count, 0);
    }

    /// Rows without a resolvable timestamp are excluded from dispatch
    /// accounting but still reach the CSV aggregation.
    #[tokio::test]
    async fn test_rows_without_timestamps_still_aggregate() {
        let dir = TempDir::new().unwrap();
        let template = dir
            .path()
            .join("{ResultType}-{Identifier}.csv")
            .to_string_lossy()
            .into_owned();

        let blueprint =
            ConfigLoader::load_from_str(&relay_config(&template), ConfigFormat::Toml).unwrap();
        let mut relay = ResultRelay::from_blueprint(&blueprint).unwrap();

        relay.on_run_start(PlanRun::new(Utc::now())).await.unwrap();
        let step = StepRun::new("measure");
        relay.on_step_run_start(step.clone());
        relay.set_execution_id("exp-2");

        let batch = ResultBatch::new(
            "Notes",
            vec![ResultColumn::from_values(
                "Comment",
                vec![Value::Str("no clock".into()), Value::Str("here".into())],
            )],
        )
        .unwrap();
        relay.on_result_published(step.id, batch).await.unwrap();
        relay.on_run_completed(Verdict::Inconclusive).await.unwrap();

        let path = dir.path().join("Notes-exp-2.csv");
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);

        let metrics = relay.metrics();
        let csv = metrics.iter().find(|(name, _)| name == "csv").unwrap();
        // Delivered once, but no timestamped rows counted.
        assert_eq!(csv.1.delivery_count, 1);
        assert_eq!(csv.1.row_count, 0);
    }

    /// Consecutive runs start from a clean context.
    #[tokio::test]
    async fn test_back_to_back_runs_reset_state() {
        let dir = TempDir::new().unwrap();
        let template = dir
            .path()
            .join("{Identifier}-{ResultType}.csv")
            .to_string_lossy()
            .into_owned();

        let blueprint =
            ConfigLoader::load_from_str(&relay_config(&template), ConfigFormat::Toml).unwrap();
        let mut relay = ResultRelay::from_blueprint(&blueprint).unwrap();

        relay.on_run_start(PlanRun::new(Utc::now())).await.unwrap();
        let step = StepRun::new("first");
        relay.on_step_run_start(step.clone());
        relay.set_execution_id("exp-a");
        relay
            .on_result_published(step.id, iteration_mark(5))
            .await
            .unwrap();
        relay
            .on_result_published(step.id, measurement("Temp", 1_700_000_000_000, 1.0))
            .await
            .unwrap();
        relay.on_run_completed(Verdict::Pass).await.unwrap();

        relay.on_run_start(PlanRun::new(Utc::now())).await.unwrap();
        let ctx = relay.run_context().unwrap();
        assert_eq!(ctx.iteration, 0);
        assert!(!ctx.has_execution_id());

        // Step runs from the previous run are forgotten.
        let result = relay
            .on_result_published(step.id, measurement("Temp", 1_700_000_000_000, 2.0))
            .await;
        assert!(result.is_err());
        relay.on_run_completed(Verdict::Aborted).await.unwrap();
    }

    #[test]
    fn test_run_summary_from_relay_metrics() {
        let mut aggregator = RelayRunAggregator::new();
        aggregator.record_batch(2, 0);
        aggregator.record_batch(1, 1);

        let summary = aggregator.summary();
        assert_eq!(summary.total_batches, 2);
        assert_eq!(summary.total_rows, 3);
        assert!(summary.to_string().contains("Rows dispatched: 3"));
    }
}
