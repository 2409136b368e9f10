// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process [`Store`] backed by `parking_lot`-guarded maps. Findings carry
//! a `null` run_id after their Run is deleted but remain queryable directly
//! by id, per the orphaned-Finding invariant (§4.10).

use crate::{Store, StoreError};
use async_trait::async_trait;
use bc_core::{Artifact, ArtifactId, Finding, FindingId, ReverifyAttempt, ReverifyAttemptId, Run, RunId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Tables {
    runs: HashMap<RunId, Run>,
    findings: HashMap<FindingId, Finding>,
    artifacts: HashMap<ArtifactId, Artifact>,
    reverify_attempts: HashMap<ReverifyAttemptId, ReverifyAttempt>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_run(&self, run: Run) -> Result<(), StoreError> {
        self.tables.write().runs.insert(run.id.clone(), run);
        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.tables.read().runs.get(id).cloned())
    }

    async fn update_run(&self, run: Run) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.runs.contains_key(&run.id) {
            return Err(StoreError::NotFound(format!("run {}", run.id)));
        }
        tables.runs.insert(run.id.clone(), run);
        Ok(())
    }

    async fn insert_finding(&self, finding: Finding) -> Result<(), StoreError> {
        self.tables.write().findings.insert(finding.id.clone(), finding);
        Ok(())
    }

    async fn get_finding(&self, id: &FindingId) -> Result<Option<Finding>, StoreError> {
        Ok(self.tables.read().findings.get(id).cloned())
    }

    async fn update_finding(&self, finding: Finding) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.findings.contains_key(&finding.id) {
            return Err(StoreError::NotFound(format!("finding {}", finding.id)));
        }
        tables.findings.insert(finding.id.clone(), finding);
        Ok(())
    }

    async fn list_findings_for_run(&self, run_id: &RunId) -> Result<Vec<Finding>, StoreError> {
        Ok(self
            .tables
            .read()
            .findings
            .values()
            .filter(|f| f.run_id.as_ref() == Some(run_id))
            .cloned()
            .collect())
    }

    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        self.tables.write().artifacts.insert(artifact.id.clone(), artifact);
        Ok(())
    }

    async fn list_artifacts_for_finding(&self, finding_id: &FindingId) -> Result<Vec<Artifact>, StoreError> {
        Ok(self
            .tables
            .read()
            .artifacts
            .values()
            .filter(|a| &a.finding_id == finding_id)
            .cloned()
            .collect())
    }

    async fn list_expired_artifacts(&self, now_ms: i64) -> Result<Vec<Artifact>, StoreError> {
        Ok(self
            .tables
            .read()
            .artifacts
            .values()
            .filter(|a| a.is_expired(now_ms))
            .cloned()
            .collect())
    }

    async fn delete_artifact(&self, id: &ArtifactId) -> Result<(), StoreError> {
        self.tables.write().artifacts.remove(id);
        Ok(())
    }

    async fn insert_reverify_attempt(&self, attempt: ReverifyAttempt) -> Result<(), StoreError> {
        self.tables.write().reverify_attempts.insert(attempt.id.clone(), attempt);
        Ok(())
    }

    async fn list_reverify_attempts_for_finding(&self, finding_id: &FindingId) -> Result<Vec<ReverifyAttempt>, StoreError> {
        let mut attempts: Vec<ReverifyAttempt> = self
            .tables
            .read()
            .reverify_attempts
            .values()
            .filter(|a| &a.finding_id == finding_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.requested_at_ms);
        Ok(attempts)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
