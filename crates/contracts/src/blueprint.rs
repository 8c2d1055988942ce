//! RelayBlueprint - Config Loader output
//!
//! Describes the full relay configuration: station identity, metadata
//! tagging switches, timestamp-override rules, and sink routing.

use serde::{Deserialize, Serialize};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Station identity used for the base tag set
    #[serde(default)]
    pub station: StationConfig,

    /// Tag results with the externally assigned execution id
    #[serde(default)]
    pub set_execution_id: bool,

    /// Inject the `_iteration_` column into every batch
    #[serde(default)]
    pub add_iteration: bool,

    /// Replacement token used by name sanitization
    #[serde(default = "default_replacement")]
    pub sanitize_replacement: String,

    /// Column-based timestamp overrides, declaration order = precedence
    #[serde(default)]
    pub timestamp_overrides: Vec<TimestampOverride>,

    /// Sink routing configuration
    pub sinks: Vec<SinkConfig>,
}

fn default_replacement() -> String {
    "_".to_string()
}

/// Static station identity; becomes the per-run base tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub facility: String,

    #[serde(default)]
    pub host_ip: String,

    #[serde(default)]
    pub station_name: String,

    /// Application/version string, e.g. "TAP (9.18.2)"
    #[serde(default)]
    pub app_version: String,
}

/// Column-based timestamp override rule.
///
/// Matches a batch by exact result name; the first matching rule in
/// declaration order wins. Formats are chrono `strftime` patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampOverride {
    pub result_name: String,

    pub column1: String,
    pub format1: String,

    #[serde(default)]
    pub column2: String,
    #[serde(default)]
    pub format2: String,
}

/// Sink routing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "sink_type", rename_all = "snake_case")]
pub enum SinkConfig {
    TimeSeries(TimeSeriesSinkConfig),
    Push(PushSinkConfig),
    MultiCsv(MultiCsvSinkConfig),
    Log(LogSinkConfig),
}

impl SinkConfig {
    pub fn name(&self) -> &str {
        match self {
            SinkConfig::TimeSeries(c) => &c.name,
            SinkConfig::Push(c) => &c.name,
            SinkConfig::MultiCsv(c) => &c.name,
            SinkConfig::Log(c) => &c.name,
        }
    }
}

/// Time-series database writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesSinkConfig {
    pub name: String,

    /// Base URL, e.g. "http://localhost:8086"
    pub url: String,

    pub bucket: String,

    #[serde(default)]
    pub org: String,

    #[serde(default)]
    pub token: String,
}

/// Push/publish endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSinkConfig {
    pub name: String,

    /// Base URL; records are posted to `<url>/publish`
    pub url: String,

    /// Field allow-list; unmatched columns are never sent
    #[serde(default)]
    pub fields: Vec<PushFieldRule>,

    /// Present = metadata-aware variant (identifier envelope + strict
    /// execution-id requirement)
    #[serde(default)]
    pub metadata: Option<PushMetadata>,
}

/// Allow-list entry keyed by (result name, column name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFieldRule {
    pub result_name: String,
    pub column: String,

    /// Overrides the record `type`; blank = use the raw column name
    #[serde(default)]
    pub type_override: String,

    #[serde(default)]
    pub unit: String,

    #[serde(default)]
    pub origin: String,
}

/// Envelope identifiers for the metadata-aware push variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushMetadata {
    #[serde(default)]
    pub use_case_id: Option<String>,

    #[serde(default)]
    pub testbed_id: Option<String>,

    #[serde(default)]
    pub scenario_id: Option<String>,

    #[serde(default)]
    pub netapp_id: Option<String>,
}

/// Multi-CSV aggregation sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiCsvSinkConfig {
    pub name: String,

    /// Output path template; recognizes {ResultType}, {Identifier},
    /// {Verdict} and {Date}
    #[serde(default = "default_path_template")]
    pub path_template: String,

    #[serde(default)]
    pub separator: CsvSeparator,

    /// Substituted for the separator when found inside values;
    /// `None` disables the replacement
    #[serde(default = "default_separator_replacement")]
    pub separator_replacement: Option<String>,
}

fn default_path_template() -> String {
    "Results/{Date}-{ResultType}-{Verdict}.csv".to_string()
}

fn default_separator_replacement() -> Option<String> {
    Some(";".to_string())
}

/// Debug log sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSinkConfig {
    pub name: String,
}

/// CSV column separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvSeparator {
    #[default]
    Comma,
    Tab,
    Semicolon,
}

impl CsvSeparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            CsvSeparator::Comma => ",",
            CsvSeparator::Semicolon => ";",
            CsvSeparator::Tab => "\t",
        }
    }

    /// Replacement that cannot collide with the separator itself.
    pub fn default_replacement(&self) -> &'static str {
        match self {
            CsvSeparator::Semicolon => ",",
            _ => ";",
        }
    }
}
