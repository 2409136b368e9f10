// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run: a batch of URLs submitted together; parent of many Findings.

use crate::id::RunId;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a Run (§3). Never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// How a Run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Manual,
    Scheduled,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub run_type: RunType,
    pub submitted_at_ms: i64,
    pub started_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub url_count: u32,
    pub finding_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    pub fn new(
        id: RunId,
        run_type: RunType,
        url_count: u32,
        payload: Option<serde_json::Value>,
        submitted_at_ms: i64,
    ) -> Self {
        Self {
            id,
            status: RunStatus::Queued,
            run_type,
            submitted_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
            url_count,
            finding_count: 0,
            payload,
            error: None,
        }
    }

    /// Transition `queued -> in_progress` the first time a child job is
    /// enqueued. A no-op once already in progress or past it.
    pub fn mark_in_progress(&mut self, now_ms: i64) {
        if self.status == RunStatus::Queued {
            self.status = RunStatus::InProgress;
            self.started_at_ms = Some(now_ms);
        }
    }

    /// Transition to `completed`. Never moves a Run backward: a Run already
    /// in a terminal state is left untouched.
    pub fn mark_completed(&mut self, now_ms: i64) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Completed;
            self.completed_at_ms = Some(now_ms);
        }
    }

    pub fn mark_failed(&mut self, now_ms: i64, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Failed;
            self.completed_at_ms = Some(now_ms);
            self.error = Some(error.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_queued() {
        let run = Run::new(RunId::generate(), RunType::Manual, 3, None, 1000);
        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.url_count, 3);
    }

    #[test]
    fn mark_in_progress_is_idempotent() {
        let mut run = Run::new(RunId::generate(), RunType::Manual, 1, None, 1000);
        run.mark_in_progress(1500);
        run.mark_in_progress(2000);
        assert_eq!(run.started_at_ms, Some(1500));
    }

    #[test]
    fn completed_run_never_moves_backward() {
        let mut run = Run::new(RunId::generate(), RunType::Manual, 1, None, 1000);
        run.mark_in_progress(1100);
        run.mark_completed(2000);
        run.mark_failed(3000, "late failure");
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.error, None);
    }
}
