//! Run lifecycle types: plan run, step run, verdict, per-run context

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final verdict of a plan run, as reported by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    #[default]
    NotSet,
    Pass,
    Inconclusive,
    Fail,
    Aborted,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::NotSet => "NotSet",
            Verdict::Pass => "Pass",
            Verdict::Inconclusive => "Inconclusive",
            Verdict::Fail => "Fail",
            Verdict::Aborted => "Aborted",
            Verdict::Error => "Error",
        };
        f.write_str(name)
    }
}

/// One test-plan run as seen by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRun {
    pub id: Uuid,
    /// Run start, UTC.
    pub start_time: DateTime<Utc>,
    pub verdict: Verdict,
}

impl PlanRun {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            verdict: Verdict::NotSet,
        }
    }
}

/// One step execution within a run; results reference it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    pub id: Uuid,
    pub step_name: String,
}

impl StepRun {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_name: step_name.into(),
        }
    }
}

/// Per-run mutable state threaded through every pipeline call.
///
/// Created at run start, cleared at run end; only ever mutated by the
/// single invoking thread.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub plan_run: PlanRun,
    /// Externally assigned run identifier; empty until set.
    pub execution_id: String,
    /// Monotonic iteration counter; 0 while idle.
    pub iteration: i64,
    /// One-shot flag for the "published before setting Execution Id" warning.
    pub execution_id_warned: bool,
}

impl RunContext {
    pub fn new(plan_run: PlanRun) -> Self {
        Self {
            plan_run,
            execution_id: String::new(),
            iteration: 0,
            execution_id_warned: false,
        }
    }

    pub fn has_execution_id(&self) -> bool {
        !self.execution_id.trim().is_empty()
    }
}
