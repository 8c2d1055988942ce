//! Metadata tagging: name sanitization, the run TagSet, column injection

use contracts::{
    RelayError, ResultBatch, ResultColumn, RunContext, StationConfig, TagSet, Value,
};

/// Column injected into every batch when iteration tagging is enabled.
pub const ITERATION_COLUMN_NAME: &str = "_iteration_";

/// Tag added when execution-id tagging is enabled and an id is set.
pub const EXECUTION_ID_TAG: &str = "ExecutionId";

/// Replace every character outside `[A-Za-z0-9_-]` with the replacement
/// token. Used for measurement names, file-path fragments and stream keys.
pub fn sanitize(value: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push_str(replacement);
        }
    }
    out
}

/// Return a new batch with an extra column prepended, the same value
/// repeated for every row (length 1 when the source has zero columns).
/// Pure; the input batch is not mutated.
pub fn inject_column(
    batch: &ResultBatch,
    name: &str,
    value: Value,
) -> Result<ResultBatch, RelayError> {
    let rows = if batch.columns().is_empty() {
        1
    } else {
        batch.row_count()
    };

    let mut columns = Vec::with_capacity(batch.columns().len() + 1);
    columns.push(ResultColumn::new(name, vec![Some(value); rows]));
    columns.extend(batch.columns().iter().cloned());

    ResultBatch::new(batch.name(), columns)
}

/// Computes the shared tag/metadata set for a run.
#[derive(Debug, Clone)]
pub struct MetadataTagger {
    base: TagSet,
    set_execution_id: bool,
    replacement: String,
}

impl MetadataTagger {
    pub fn new(
        station: &StationConfig,
        set_execution_id: bool,
        replacement: impl Into<String>,
    ) -> Self {
        let mut base = TagSet::new();
        base.insert("appname", &station.app_version);
        base.insert("facility", &station.facility);
        base.insert("host", &station.host_ip);
        base.insert("hostname", &station.station_name);

        Self {
            base,
            set_execution_id,
            replacement: replacement.into(),
        }
    }

    pub fn sanitize(&self, value: &str) -> String {
        sanitize(value, &self.replacement)
    }

    /// Base TagSet, plus flat extra key/value tokens (extras overwrite
    /// base), plus the `ExecutionId` tag when enabled and set.
    ///
    /// # Errors
    /// `ConfigValidation` for an odd number of extra tokens.
    pub fn tags(&self, ctx: &RunContext, extra: &[&str]) -> Result<TagSet, RelayError> {
        if extra.len() % 2 != 0 {
            return Err(RelayError::config_validation(
                "tags",
                "odd number of tokens",
            ));
        }

        let mut tags = self.base.clone();
        for pair in extra.chunks_exact(2) {
            tags.insert(pair[0], pair[1]);
        }
        if self.set_execution_id && ctx.has_execution_id() {
            tags.insert(EXECUTION_ID_TAG, &ctx.execution_id);
        }
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::PlanRun;

    fn tagger(set_execution_id: bool) -> MetadataTagger {
        MetadataTagger::new(
            &StationConfig {
                facility: "lab".into(),
                host_ip: "10.0.0.5".into(),
                station_name: "bench".into(),
                app_version: "TAP (9.18.2)".into(),
            },
            set_execution_id,
            "_",
        )
    }

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize("Thro ugh/put (avg)", "_"), "Thro_ugh_put__avg_");
        assert_eq!(sanitize("already-ok_09", "_"), "already-ok_09");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize("a b:c%d", "_");
        assert_eq!(sanitize(&once, "_"), once);
        assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_tags_base_set() {
        let ctx = RunContext::new(PlanRun::new(Utc::now()));
        let tags = tagger(false).tags(&ctx, &[]).unwrap();
        assert_eq!(tags.get("facility"), Some("lab"));
        assert_eq!(tags.get("hostname"), Some("bench"));
        assert_eq!(tags.get(EXECUTION_ID_TAG), None);
    }

    #[test]
    fn test_tags_extras_overwrite_base() {
        let ctx = RunContext::new(PlanRun::new(Utc::now()));
        let tags = tagger(false)
            .tags(&ctx, &["facility", "field", "severity", "INFO"])
            .unwrap();
        assert_eq!(tags.get("facility"), Some("field"));
        assert_eq!(tags.get("severity"), Some("INFO"));
    }

    #[test]
    fn test_tags_odd_token_count_fails() {
        let ctx = RunContext::new(PlanRun::new(Utc::now()));
        let result = tagger(false).tags(&ctx, &["only-key"]);
        assert!(matches!(result, Err(RelayError::ConfigValidation { .. })));
    }

    #[test]
    fn test_execution_id_tag_requires_id() {
        let mut ctx = RunContext::new(PlanRun::new(Utc::now()));
        let tagger = tagger(true);

        assert_eq!(tagger.tags(&ctx, &[]).unwrap().get(EXECUTION_ID_TAG), None);

        ctx.execution_id = "exp-42".into();
        assert_eq!(
            tagger.tags(&ctx, &[]).unwrap().get(EXECUTION_ID_TAG),
            Some("exp-42")
        );
    }

    #[test]
    fn test_inject_column_prepends_repeated_value() {
        let batch = ResultBatch::new(
            "Temp",
            vec![ResultColumn::from_values(
                "Value",
                vec![Value::Float(1.0), Value::Float(2.0)],
            )],
        )
        .unwrap();

        let injected = inject_column(&batch, ITERATION_COLUMN_NAME, Value::Int(3)).unwrap();
        assert_eq!(injected.columns().len(), 2);
        assert_eq!(injected.columns()[0].name, ITERATION_COLUMN_NAME);
        assert_eq!(
            injected.columns()[0].values,
            vec![Some(Value::Int(3)), Some(Value::Int(3))]
        );
        // source batch untouched
        assert_eq!(batch.columns().len(), 1);
    }

    #[test]
    fn test_inject_column_into_zero_column_batch() {
        let batch = ResultBatch::new("empty", vec![]).unwrap();
        let injected = inject_column(&batch, "ExecutionId", Value::Str("id".into())).unwrap();
        assert_eq!(injected.row_count(), 1);
    }
}
