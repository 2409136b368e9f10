// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run/finding lifecycle (C10): creating a Run from a URL batch, and rolling
//! a Run's Findings up into a terminal Run status.

use crate::queue::{QueueError, ScanEnqueuer};
use async_trait::async_trait;
use bc_core::{Clock, Finding, FindingStatus, Run, RunId, RunType};
use bc_store::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct CreateRunOutcome {
    pub run: Run,
    pub findings: Vec<Finding>,
    pub jobs_enqueued: u32,
}

/// Validates a URL batch and creates the Run + pending Findings + scan jobs
/// for it (§4.10 "Create Run").
pub struct Lifecycle<St: Store, C: Clock, SQ: ScanEnqueuer> {
    store: Arc<St>,
    clock: Arc<C>,
    scan_queue: Arc<SQ>,
}

impl<St: Store, C: Clock, SQ: ScanEnqueuer> Lifecycle<St, C, SQ> {
    pub fn new(store: Arc<St>, clock: Arc<C>, scan_queue: Arc<SQ>) -> Self {
        Self { store, clock, scan_queue }
    }

    /// Rejects the whole batch if any URL fails to parse, inserts the Run and
    /// one `pending` Finding per URL with a random placeholder fingerprint
    /// (replaced once the scan job actually runs), and enqueues a scan job
    /// for each. Transitions the Run to `in_progress` once at least one job
    /// enqueued.
    pub async fn create_run(&self, urls: Vec<String>, payload: Option<serde_json::Value>) -> Result<CreateRunOutcome, LifecycleError> {
        if urls.is_empty() {
            return Err(LifecycleError::Validation("at least one url is required".to_string()));
        }
        for url in &urls {
            url::Url::parse(url).map_err(|e| LifecycleError::Validation(format!("invalid url {url}: {e}")))?;
        }

        let now_ms = self.clock.epoch_ms();
        let run_id = RunId::generate();
        let mut run = Run::new(run_id.clone(), RunType::Manual, urls.len() as u32, payload, now_ms);
        self.store.insert_run(run.clone()).await?;

        let mut findings = Vec::with_capacity(urls.len());
        let mut jobs_enqueued = 0u32;
        for url in urls {
            let finding_id = bc_core::FindingId::generate();
            let mut finding = Finding::new_pending(finding_id.clone(), Some(run_id.clone()), url.clone(), now_ms);
            finding.fingerprint = Some(uuid::Uuid::new_v4().to_string());
            self.store.insert_finding(finding.clone()).await?;

            match self.scan_queue.enqueue_scan(finding_id, url).await {
                Ok(_) => jobs_enqueued += 1,
                Err(QueueError::Closed) => {
                    tracing::warn!(run_id = %run_id, "scan queue closed, finding left pending without a job");
                }
            }
            findings.push(finding);
        }

        if jobs_enqueued > 0 {
            run.mark_in_progress(now_ms);
            self.store.update_run(run.clone()).await?;
        }

        Ok(CreateRunOutcome { run, findings, jobs_enqueued })
    }

    /// `checkAndUpdateRunStatus(run_id)` (§4.10 "Close Run"). A Run completes
    /// once every Finding attached to it is in a terminal status; `suppressed`
    /// is deliberately excluded (see `counts_as_terminal_for_run`).
    pub async fn check_and_update_run_status(&self, run_id: &RunId) -> Result<(), LifecycleError> {
        let findings = self.store.list_findings_for_run(run_id).await?;
        if findings.is_empty() || !findings.iter().all(|f| f.status.counts_as_terminal_for_run()) {
            return Ok(());
        }
        let Some(mut run) = self.store.get_run(run_id).await? else {
            return Ok(());
        };
        if !run.status.is_terminal() {
            run.mark_completed(self.clock.epoch_ms());
            self.store.update_run(run).await?;
        }
        Ok(())
    }
}

/// Seam so the render processor can trigger Run rollup without depending on
/// `Lifecycle`'s `ScanEnqueuer` generic parameter.
#[async_trait]
pub trait RunStatusChecker: Send + Sync + 'static {
    async fn check_and_update_run_status(&self, run_id: &RunId);
}

#[async_trait]
impl<St: Store, C: Clock, SQ: ScanEnqueuer> RunStatusChecker for Lifecycle<St, C, SQ> {
    async fn check_and_update_run_status(&self, run_id: &RunId) {
        if let Err(e) = Lifecycle::check_and_update_run_status(self, run_id).await {
            tracing::warn!(run_id = %run_id, error = %e, "failed to roll up run status");
        }
    }
}

/// Marks a Finding `failed`, used by both queues' `on_exhausted` hook (§4.9).
pub async fn mark_finding_failed<St: Store, C: Clock>(store: &St, clock: &C, finding_id: &bc_core::FindingId, reason: &str) {
    match store.get_finding(finding_id).await {
        Ok(Some(mut finding)) => {
            finding.transition(FindingStatus::Failed, clock.epoch_ms());
            finding.metadata.insert("failure_reason".to_string(), reason.into());
            if let Err(e) = store.update_finding(finding).await {
                tracing::warn!(finding_id = %finding_id, error = %e, "failed to persist failed finding status");
            }
        }
        Ok(None) => tracing::warn!(finding_id = %finding_id, "exhausted job for unknown finding"),
        Err(e) => tracing::warn!(finding_id = %finding_id, error = %e, "failed to load finding to mark it failed"),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
