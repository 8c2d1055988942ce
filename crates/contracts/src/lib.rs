//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Per-row timestamps are resolved to UTC (`chrono::DateTime<Utc>`)
//! - Integer `Timestamp` columns carry Unix epoch milliseconds, floats epoch seconds

mod batch;
mod blueprint;
mod error;
mod run;
mod sink;
mod tags;
mod value;

pub use batch::*;
pub use blueprint::*;
pub use error::*;
pub use run::*;
pub use sink::*;
pub use tags::TagSet;
pub use value::Value;
