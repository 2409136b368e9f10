// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact: an on-disk evidence file linked to a Finding (§3).

use crate::id::{ArtifactId, FindingId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Screenshot,
    Har,
    Html,
    ConsoleLogs,
}

impl ArtifactType {
    /// File name this artifact type is stored under, per the on-disk layout
    /// in §3: `<root>/<run_id>/<finding_id>/{screenshot.png,trace.har,page.html,console.json}`.
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactType::Screenshot => "screenshot.png",
            ArtifactType::Har => "trace.har",
            ArtifactType::Html => "page.html",
            ArtifactType::ConsoleLogs => "console.json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub finding_id: FindingId,
    pub artifact_type: ArtifactType,
    pub storage_path: String,
    pub size_bytes: u64,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

/// Default artifact retention window, per `RETENTION_DAYS` (§6).
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

impl Artifact {
    pub fn new(
        id: ArtifactId,
        finding_id: FindingId,
        artifact_type: ArtifactType,
        storage_path: String,
        size_bytes: u64,
        created_at_ms: i64,
        retention_days: i64,
    ) -> Self {
        let expires_at_ms = created_at_ms + retention_days * 24 * 60 * 60 * 1000;
        Self {
            id,
            finding_id,
            artifact_type,
            storage_path,
            size_bytes,
            created_at_ms,
            expires_at_ms,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_is_seven_days_by_default() {
        let artifact = Artifact::new(
            ArtifactId::generate(),
            FindingId::generate(),
            ArtifactType::Screenshot,
            "run/finding/screenshot.png".into(),
            1024,
            0,
            DEFAULT_RETENTION_DAYS,
        );
        assert_eq!(artifact.expires_at_ms, 7 * 24 * 60 * 60 * 1000);
        assert!(!artifact.is_expired(0));
        assert!(artifact.is_expired(artifact.expires_at_ms));
    }
}
