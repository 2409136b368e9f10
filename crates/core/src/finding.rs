// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finding: the durable record of one URL's scan attempt and its derived
//! state (§3).

use crate::id::{FindingId, RunId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Pending,
    Scanning,
    Processing,
    EvidenceCaptured,
    Suppressed,
    Failed,
    Completed,
    Resolved,
}

impl FindingStatus {
    /// Terminal for the purposes of Run rollup (§4.10). `Suppressed` is
    /// deliberately excluded: suppression is reversible via re-verification,
    /// and a Run should not close around a Finding that might still need
    /// evidence captured.
    pub fn counts_as_terminal_for_run(self) -> bool {
        matches!(
            self,
            FindingStatus::EvidenceCaptured
                | FindingStatus::Completed
                | FindingStatus::Failed
                | FindingStatus::Resolved
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub run_id: Option<RunId>,
    pub url: String,
    pub status: FindingStatus,
    pub finding_type: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub false_positive: bool,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Finding {
    pub fn new_pending(
        id: FindingId,
        run_id: Option<RunId>,
        url: String,
        now_ms: i64,
    ) -> Self {
        Self {
            id,
            run_id,
            url,
            status: FindingStatus::Pending,
            finding_type: "url_scan".to_string(),
            severity: Severity::Low,
            title: None,
            description: None,
            detected_value: None,
            context: None,
            fingerprint: None,
            verified: false,
            false_positive: false,
            metadata: serde_json::Map::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn transition(&mut self, status: FindingStatus, now_ms: i64) {
        self.status = status;
        self.updated_at_ms = now_ms;
    }

    pub fn set_suppression_reason(&mut self, reason: &str, rule_id: Option<&str>) {
        self.metadata
            .insert("suppression_reason".to_string(), reason.into());
        if let Some(rule_id) = rule_id {
            self.metadata
                .insert("suppression_rule_id".to_string(), rule_id.into());
        }
    }

    pub fn suppression_reason(&self) -> Option<&str> {
        self.metadata.get("suppression_reason").and_then(|v| v.as_str())
    }

    pub fn set_fetch_latency_ms(&mut self, latency_ms: u64) {
        self.metadata
            .insert("fetch_latency_ms".to_string(), latency_ms.into());
    }

    pub fn set_breaker_state(&mut self, state: &str) {
        self.metadata
            .insert("breaker_state".to_string(), state.into());
    }
}
