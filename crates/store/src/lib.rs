// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bc-store: the authoritative store for Runs, Findings, Artifacts, and
//! Reverify Attempts (§5: "SQL is authoritative for Runs, Findings,
//! Artifacts, Reverify Attempts"). [`Store`] is the persistence seam;
//! [`memory::InMemoryStore`] is the implementation used by the daemon and by
//! tests until a SQL-backed implementation is wired in.

pub mod memory;

use async_trait::async_trait;
use bc_core::{Artifact, ArtifactId, Finding, FindingId, ReverifyAttempt, ReverifyAttemptId, Run, RunId};
use thiserror::Error;

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Per-row upserts only — there is no cross-row transaction on the hot path
/// (§5).
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn insert_run(&self, run: Run) -> Result<(), StoreError>;
    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, StoreError>;
    async fn update_run(&self, run: Run) -> Result<(), StoreError>;

    async fn insert_finding(&self, finding: Finding) -> Result<(), StoreError>;
    async fn get_finding(&self, id: &FindingId) -> Result<Option<Finding>, StoreError>;
    async fn update_finding(&self, finding: Finding) -> Result<(), StoreError>;
    async fn list_findings_for_run(&self, run_id: &RunId) -> Result<Vec<Finding>, StoreError>;

    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), StoreError>;
    async fn list_artifacts_for_finding(&self, finding_id: &FindingId) -> Result<Vec<Artifact>, StoreError>;
    async fn list_expired_artifacts(&self, now_ms: i64) -> Result<Vec<Artifact>, StoreError>;
    async fn delete_artifact(&self, id: &ArtifactId) -> Result<(), StoreError>;

    async fn insert_reverify_attempt(&self, attempt: ReverifyAttempt) -> Result<(), StoreError>;
    async fn list_reverify_attempts_for_finding(&self, finding_id: &FindingId) -> Result<Vec<ReverifyAttempt>, StoreError>;
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
