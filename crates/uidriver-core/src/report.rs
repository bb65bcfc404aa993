//! Per-perform execution reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one sequence run, emitted to the log at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Unique id of this run (not of the sequence; re-performing mints a
    /// fresh id).
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Steps that ran to completion before the run ended.
    pub steps_executed: usize,
    pub passed: bool,
}

impl SequenceReport {
    pub fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps_executed: 0,
            passed: false,
        }
    }

    pub fn finish(mut self, steps_executed: usize, passed: bool) -> Self {
        self.steps_executed = steps_executed;
        self.passed = passed;
        self
    }
}
