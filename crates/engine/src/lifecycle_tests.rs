// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use bc_core::FakeClock;
use bc_store::InMemoryStore;
use parking_lot::Mutex;

#[derive(Default)]
struct RecordingScanQueue {
    enqueued: Mutex<Vec<(FindingId, String)>>,
    reject: bool,
}

#[async_trait]
impl ScanEnqueuer for RecordingScanQueue {
    async fn enqueue_scan(&self, finding_id: FindingId, url: String) -> Result<bc_core::JobId, QueueError> {
        if self.reject {
            return Err(QueueError::Closed);
        }
        self.enqueued.lock().push((finding_id, url));
        Ok(bc_core::JobId::generate())
    }
}

fn harness() -> (Lifecycle<InMemoryStore, FakeClock, RecordingScanQueue>, Arc<InMemoryStore>, Arc<RecordingScanQueue>) {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FakeClock::default());
    let scan_queue = Arc::new(RecordingScanQueue::default());
    let lifecycle = Lifecycle::new(store.clone(), clock, scan_queue.clone());
    (lifecycle, store, scan_queue)
}

#[tokio::test]
async fn rejects_empty_url_batch() {
    let (lifecycle, _, _) = harness();
    let err = lifecycle.create_run(vec![], None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

#[tokio::test]
async fn rejects_unparseable_urls() {
    let (lifecycle, _, _) = harness();
    let err = lifecycle.create_run(vec!["not a url".to_string()], None).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Validation(_)));
}

#[tokio::test]
async fn creates_one_pending_finding_per_url_and_enqueues_a_scan_job_each() {
    let (lifecycle, store, scan_queue) = harness();
    let outcome = lifecycle
        .create_run(vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()], None)
        .await
        .unwrap();

    assert_eq!(outcome.findings.len(), 2);
    assert_eq!(outcome.jobs_enqueued, 2);
    assert!(outcome.findings.iter().all(|f| f.status == FindingStatus::Pending));
    assert_eq!(scan_queue.enqueued.lock().len(), 2);

    let run = store.get_run(&outcome.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, bc_core::RunStatus::InProgress);
    assert!(run.started_at_ms.is_some());
}

#[tokio::test]
async fn run_stays_queued_when_no_job_enqueues() {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(FakeClock::default());
    let scan_queue = Arc::new(RecordingScanQueue { reject: true, ..Default::default() });
    let lifecycle = Lifecycle::new(store.clone(), clock, scan_queue);

    let outcome = lifecycle.create_run(vec!["https://example.com/a".to_string()], None).await.unwrap();
    assert_eq!(outcome.jobs_enqueued, 0);
    let run = store.get_run(&outcome.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, bc_core::RunStatus::Queued);
}

#[tokio::test]
async fn run_completes_once_every_finding_reaches_a_terminal_status() {
    let (lifecycle, store, _) = harness();
    let outcome = lifecycle
        .create_run(vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()], None)
        .await
        .unwrap();

    lifecycle.check_and_update_run_status(&outcome.run.id).await.unwrap();
    let run = store.get_run(&outcome.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, bc_core::RunStatus::InProgress, "findings still pending, not terminal");

    for finding in &outcome.findings {
        let mut finding = finding.clone();
        finding.transition(FindingStatus::EvidenceCaptured, 1_000);
        store.update_finding(finding).await.unwrap();
    }

    lifecycle.check_and_update_run_status(&outcome.run.id).await.unwrap();
    let run = store.get_run(&outcome.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, bc_core::RunStatus::Completed);
    assert!(run.completed_at_ms.is_some());
}

#[tokio::test]
async fn suppressed_findings_do_not_count_as_terminal_for_rollup() {
    let (lifecycle, store, _) = harness();
    let outcome = lifecycle.create_run(vec!["https://example.com/a".to_string()], None).await.unwrap();

    let mut finding = outcome.findings[0].clone();
    finding.transition(FindingStatus::Suppressed, 1_000);
    store.update_finding(finding).await.unwrap();

    lifecycle.check_and_update_run_status(&outcome.run.id).await.unwrap();
    let run = store.get_run(&outcome.run.id).await.unwrap().unwrap();
    assert_eq!(run.status, bc_core::RunStatus::InProgress);
}

#[tokio::test]
async fn completed_run_never_reopens() {
    let (lifecycle, store, _) = harness();
    let outcome = lifecycle.create_run(vec!["https://example.com/a".to_string()], None).await.unwrap();
    let mut finding = outcome.findings[0].clone();
    finding.transition(FindingStatus::Completed, 1_000);
    store.update_finding(finding.clone()).await.unwrap();
    lifecycle.check_and_update_run_status(&outcome.run.id).await.unwrap();

    let completed_at = store.get_run(&outcome.run.id).await.unwrap().unwrap().completed_at_ms;

    lifecycle.check_and_update_run_status(&outcome.run.id).await.unwrap();
    let run = store.get_run(&outcome.run.id).await.unwrap().unwrap();
    assert_eq!(run.completed_at_ms, completed_at);
}

#[tokio::test]
async fn mark_finding_failed_transitions_status_and_records_reason() {
    let store = InMemoryStore::new();
    let clock = FakeClock::default();
    let finding = Finding::new_pending(FindingId::generate(), None, "https://example.com".into(), 0);
    store.insert_finding(finding.clone()).await.unwrap();

    mark_finding_failed(&store, &clock, &finding.id, "render attempts exhausted").await;

    let reloaded = store.get_finding(&finding.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, FindingStatus::Failed);
    assert_eq!(
        reloaded.metadata.get("failure_reason").and_then(|v| v.as_str()),
        Some("render attempts exhausted")
    );
}
