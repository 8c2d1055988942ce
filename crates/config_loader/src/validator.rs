//! Configuration validation
//!
//! Validation rules:
//! - sink names unique and non-empty
//! - time-series / push URLs present and parseable
//! - override rules carry result_name, column1 and format1;
//!   column2 and format2 come in pairs
//! - multi-CSV path templates contain {ResultType}, and {Identifier}
//!   when set_execution_id is enabled

use std::collections::HashSet;

use contracts::{RelayBlueprint, RelayError, SinkConfig};

const RESULT_TYPE_MACRO: &str = "{ResultType}";
const IDENTIFIER_MACRO: &str = "{Identifier}";

/// Validate a RelayBlueprint.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), RelayError> {
    validate_sink_names(blueprint)?;
    validate_sink_endpoints(blueprint)?;
    validate_overrides(blueprint)?;
    validate_path_templates(blueprint)?;
    Ok(())
}

fn validate_sink_names(blueprint: &RelayBlueprint) -> Result<(), RelayError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name().is_empty() {
            return Err(RelayError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name()) {
            return Err(RelayError::config_validation(
                format!("sinks[name={}]", sink.name()),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

fn validate_sink_endpoints(blueprint: &RelayBlueprint) -> Result<(), RelayError> {
    for sink in &blueprint.sinks {
        let url = match sink {
            SinkConfig::TimeSeries(c) => Some(&c.url),
            SinkConfig::Push(c) => Some(&c.url),
            _ => None,
        };

        if let Some(url) = url {
            if url.trim().is_empty() {
                return Err(RelayError::config_validation(
                    format!("sinks[name={}].url", sink.name()),
                    "please select an address",
                ));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RelayError::config_validation(
                    format!("sinks[name={}].url", sink.name()),
                    format!("expected http(s) URL, got '{url}'"),
                ));
            }
        }

        if let SinkConfig::TimeSeries(c) = sink {
            if c.bucket.trim().is_empty() {
                return Err(RelayError::config_validation(
                    format!("sinks[name={}].bucket", sink.name()),
                    "bucket cannot be empty",
                ));
            }
        }
    }
    Ok(())
}

fn validate_overrides(blueprint: &RelayBlueprint) -> Result<(), RelayError> {
    for (idx, rule) in blueprint.timestamp_overrides.iter().enumerate() {
        let field = |name: &str| format!("timestamp_overrides[{idx}].{name}");

        if rule.result_name.trim().is_empty() {
            return Err(RelayError::config_validation(
                field("result_name"),
                "result_name cannot be empty",
            ));
        }
        if rule.column1.trim().is_empty() {
            return Err(RelayError::config_validation(
                field("column1"),
                "column1 cannot be empty",
            ));
        }
        if rule.format1.trim().is_empty() {
            return Err(RelayError::config_validation(
                field("format1"),
                "format1 cannot be empty",
            ));
        }
        if rule.column2.trim().is_empty() != rule.format2.trim().is_empty() {
            return Err(RelayError::config_validation(
                field("column2"),
                "column2 and format2 must be set together",
            ));
        }
    }
    Ok(())
}

fn validate_path_templates(blueprint: &RelayBlueprint) -> Result<(), RelayError> {
    for sink in &blueprint.sinks {
        if let SinkConfig::MultiCsv(csv) = sink {
            if !csv.path_template.contains(RESULT_TYPE_MACRO) {
                return Err(RelayError::config_validation(
                    format!("sinks[name={}].path_template", sink.name()),
                    format!("{RESULT_TYPE_MACRO} must be included on the file path"),
                ));
            }
            if blueprint.set_execution_id && !csv.path_template.contains(IDENTIFIER_MACRO) {
                return Err(RelayError::config_validation(
                    format!("sinks[name={}].path_template", sink.name()),
                    format!("{IDENTIFIER_MACRO} must be included on the file path"),
                ));
            }
        }
    }
    Ok(())
}
