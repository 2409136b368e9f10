// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two concrete [`JobProcessor`] implementations that give the scan and
//! render queues their §4.9 semantics: `ScanProcessor` runs the rules engine
//! (C6) and either suppresses or hands off to the render queue; `RenderProcessor`
//! drives the browser capture seam (C8's sibling for evidence) and persists
//! artifacts.

use crate::artifacts::ArtifactWriter;
use crate::capture::{RenderAdapter, RenderOptions};
use crate::lifecycle::{mark_finding_failed, RunStatusChecker};
use crate::queue::{Job, JobError, JobKind, JobProcessor, RenderEnqueuer};
use async_trait::async_trait;
use bc_adapters::seams::SuppressionChecker;
use bc_core::{ArtifactId, Clock, FindingStatus};
use bc_rules::ErrorType;
use bc_store::Store;
use std::sync::Arc;

/// Scan-job processing (§4.9): runs the rules engine for the URL treating
/// the scan itself as a neutral probe (`errorType=5xx, status=200`); if
/// suppressed, the Finding terminates at `suppressed` without enqueuing a
/// render job; otherwise a render job is enqueued.
pub struct ScanProcessor<St: Store, C: Clock> {
    store: Arc<St>,
    clock: Arc<C>,
    rules: Arc<dyn SuppressionChecker>,
    render_queue: Arc<dyn RenderEnqueuer>,
}

impl<St: Store, C: Clock> ScanProcessor<St, C> {
    pub fn new(store: Arc<St>, clock: Arc<C>, rules: Arc<dyn SuppressionChecker>, render_queue: Arc<dyn RenderEnqueuer>) -> Self {
        Self { store, clock, rules, render_queue }
    }
}

#[async_trait]
impl<St: Store, C: Clock> JobProcessor for ScanProcessor<St, C> {
    async fn process(&self, job: &Job) -> Result<(), JobError> {
        if job.kind != JobKind::Scan {
            return Err(JobError::Fatal("scan processor received a non-scan job".to_string()));
        }

        let Some(mut finding) = self
            .store
            .get_finding(&job.finding_id)
            .await
            .map_err(|e| JobError::Retryable(format!("store error loading finding: {e}")))?
        else {
            return Err(JobError::Fatal(format!("finding {} does not exist", job.finding_id)));
        };

        let now_ms = self.clock.epoch_ms();
        finding.transition(FindingStatus::Scanning, now_ms);
        self.store
            .update_finding(finding.clone())
            .await
            .map_err(|e| JobError::Retryable(format!("store error persisting scanning status: {e}")))?;

        let result = self
            .rules
            .check_suppression(&finding.url, ErrorType::FiveXx, Some(200), None, None)
            .await;

        finding.fingerprint = result.fingerprint.clone();

        if result.suppressed {
            finding.transition(FindingStatus::Suppressed, self.clock.epoch_ms());
            finding.set_suppression_reason(result.reason.unwrap_or("unknown"), None);
            self.store
                .update_finding(finding)
                .await
                .map_err(|e| JobError::Retryable(format!("store error persisting suppression: {e}")))?;
            return Ok(());
        }

        self.store
            .update_finding(finding.clone())
            .await
            .map_err(|e| JobError::Retryable(format!("store error persisting fingerprint: {e}")))?;

        self.render_queue
            .enqueue_render(job.finding_id.clone(), finding.url.clone())
            .await
            .map_err(|_| JobError::Retryable("render queue closed".to_string()))?;

        Ok(())
    }

    async fn on_exhausted(&self, job: &Job, error: &JobError) {
        tracing::warn!(finding_id = %job.finding_id, job_id = %job.id, error = %error, "scan job exhausted");
        mark_finding_failed(self.store.as_ref(), self.clock.as_ref(), &job.finding_id, &error.to_string()).await;
    }
}

/// Render-job processing (§4.9): captures evidence through the external
/// browser, persists artifacts (or a `console_logs` artifact carrying the
/// capture error on failure, then rethrows to retry), and triggers run
/// rollup on success.
pub struct RenderProcessor<St: Store, C: Clock> {
    store: Arc<St>,
    clock: Arc<C>,
    render_adapter: Arc<dyn RenderAdapter>,
    artifact_writer: ArtifactWriter,
    lifecycle: Arc<dyn RunStatusChecker>,
    retention_days: i64,
    options: RenderOptions,
}

impl<St: Store, C: Clock> RenderProcessor<St, C> {
    pub fn new(
        store: Arc<St>,
        clock: Arc<C>,
        render_adapter: Arc<dyn RenderAdapter>,
        artifact_writer: ArtifactWriter,
        lifecycle: Arc<dyn RunStatusChecker>,
        retention_days: i64,
    ) -> Self {
        Self {
            store,
            clock,
            render_adapter,
            artifact_writer,
            lifecycle,
            retention_days,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    async fn persist_artifact(&self, finding: &bc_core::Finding, artifact_type: bc_core::ArtifactType, bytes: &[u8]) {
        match self.artifact_writer.write(finding.run_id.as_ref(), &finding.id, artifact_type, bytes).await {
            Ok((path, size)) => {
                let artifact = bc_core::Artifact::new(
                    ArtifactId::generate(),
                    finding.id.clone(),
                    artifact_type,
                    path,
                    size,
                    self.clock.epoch_ms(),
                    self.retention_days,
                );
                if let Err(e) = self.store.insert_artifact(artifact).await {
                    tracing::warn!(finding_id = %finding.id, error = %e, "failed to record artifact row");
                }
            }
            Err(e) => tracing::warn!(finding_id = %finding.id, error = %e, "failed to write artifact to disk"),
        }
    }
}

#[async_trait]
impl<St: Store, C: Clock> JobProcessor for RenderProcessor<St, C> {
    async fn process(&self, job: &Job) -> Result<(), JobError> {
        if job.kind != JobKind::Render {
            return Err(JobError::Fatal("render processor received a non-render job".to_string()));
        }

        let Some(mut finding) = self
            .store
            .get_finding(&job.finding_id)
            .await
            .map_err(|e| JobError::Retryable(format!("store error loading finding: {e}")))?
        else {
            return Err(JobError::Fatal(format!("finding {} does not exist", job.finding_id)));
        };

        finding.transition(FindingStatus::Processing, self.clock.epoch_ms());
        self.store
            .update_finding(finding.clone())
            .await
            .map_err(|e| JobError::Retryable(format!("store error persisting processing status: {e}")))?;

        let capture = match self.render_adapter.capture(&finding.url, &self.options).await {
            Ok(output) => output,
            Err(e) => {
                self.persist_artifact(&finding, bc_core::ArtifactType::ConsoleLogs, e.to_string().as_bytes()).await;
                return Err(JobError::Retryable(format!("capture failed: {e}")));
            }
        };

        self.persist_artifact(&finding, bc_core::ArtifactType::Screenshot, &capture.screenshot).await;
        self.persist_artifact(&finding, bc_core::ArtifactType::Har, &capture.har).await;
        self.persist_artifact(&finding, bc_core::ArtifactType::Html, capture.html.as_bytes()).await;
        let console_json = serde_json::to_vec(&capture.console_logs).unwrap_or_default();
        self.persist_artifact(&finding, bc_core::ArtifactType::ConsoleLogs, &console_json).await;

        finding.transition(FindingStatus::EvidenceCaptured, self.clock.epoch_ms());
        let run_id = finding.run_id.clone();
        self.store
            .update_finding(finding)
            .await
            .map_err(|e| JobError::Retryable(format!("store error persisting evidence_captured: {e}")))?;

        if let Some(run_id) = run_id {
            self.lifecycle.check_and_update_run_status(&run_id).await;
        }

        Ok(())
    }

    async fn on_exhausted(&self, job: &Job, error: &JobError) {
        tracing::warn!(finding_id = %job.finding_id, job_id = %job.id, error = %error, "render job exhausted");
        mark_finding_failed(self.store.as_ref(), self.clock.as_ref(), &job.finding_id, &error.to_string()).await;
        if let Ok(Some(finding)) = self.store.get_finding(&job.finding_id).await {
            if let Some(run_id) = finding.run_id {
                self.lifecycle.check_and_update_run_status(&run_id).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "processors_tests.rs"]
mod tests;
