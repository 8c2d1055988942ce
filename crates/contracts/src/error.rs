//! Layered error definitions
//!
//! Categorized by source: config / batch / run protocol / sink

use thiserror::Error;
use uuid::Uuid;

/// Unified error type
#[derive(Debug, Error)]
pub enum RelayError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Batch Errors =====
    /// Result table violates its shape invariants
    #[error("batch shape error: {message}")]
    BatchShape { message: String },

    // ===== Run Protocol Errors =====
    /// Result referenced a step run the relay never saw
    #[error("unknown step run: {id}")]
    UnknownStepRun { id: Uuid },

    /// Pipeline call outside an active run
    #[error("no active run")]
    NoActiveRun,

    // ===== Sink Errors =====
    /// Sink delivery error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create batch shape error
    pub fn batch_shape(message: impl Into<String>) -> Self {
        Self::BatchShape {
            message: message.into(),
        }
    }

    /// Create sink delivery error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
