//! # Relay
//!
//! Result normalization and multi-sink dispatch pipeline.
//!
//! The host engine invokes the relay once per published result batch;
//! the relay classifies it (iteration marks are swallowed), extracts
//! rows, resolves per-row timestamps, applies metadata tagging, and
//! fans the normalized batch out to every configured sink. Sink
//! failures are isolated: one sink failing never blocks the others.

mod classify;
mod metrics;
mod relay;
mod tags;
mod timestamp;

pub mod sinks;

pub use classify::{classify, Published, MARKER_COLUMN_NAME, MARKER_RESULT_NAME};
pub use crate::metrics::{MetricsSnapshot, SinkMetrics};
pub use relay::ResultRelay;
pub use tags::{inject_column, sanitize, MetadataTagger, ITERATION_COLUMN_NAME};
pub use timestamp::{find_override, resolve};
