// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reverify Attempt: audit trail for operator-driven re-verification (§3, §4.11).

use crate::id::{FindingId, JobId, ReverifyAttemptId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverifySource {
    Api,
    Slack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverifyResult {
    Ok,
    Duplicate,
    RateLimited,
    NotFound,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverifyAttempt {
    pub id: ReverifyAttemptId,
    pub finding_id: FindingId,
    pub requested_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_user_agent: Option<String>,
    pub source: ReverifySource,
    pub result: ReverifyResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}
