// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_core::{RunStatus, RunType};

fn run(id: RunId) -> Run {
    Run::new(id, RunType::Manual, 3, None, 0)
}

#[tokio::test]
async fn insert_and_get_run_round_trips() {
    let store = InMemoryStore::new();
    let id = RunId::generate();
    store.insert_run(run(id.clone())).await.unwrap();
    let fetched = store.get_run(&id).await.unwrap().unwrap();
    assert_eq!(fetched.status, RunStatus::Queued);
}

#[tokio::test]
async fn update_run_requires_existing_row() {
    let store = InMemoryStore::new();
    let id = RunId::generate();
    let err = store.update_run(run(id)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn update_run_persists_status_transition() {
    let store = InMemoryStore::new();
    let id = RunId::generate();
    let mut r = run(id.clone());
    store.insert_run(r.clone()).await.unwrap();
    r.mark_in_progress(10);
    store.update_run(r).await.unwrap();
    let fetched = store.get_run(&id).await.unwrap().unwrap();
    assert_eq!(fetched.status, RunStatus::InProgress);
}

#[tokio::test]
async fn list_findings_for_run_filters_by_run_id() {
    let store = InMemoryStore::new();
    let run_a = RunId::generate();
    let run_b = RunId::generate();
    let f1 = Finding::new_pending(FindingId::generate(), Some(run_a.clone()), "https://a/".to_string(), 0);
    let f2 = Finding::new_pending(FindingId::generate(), Some(run_b.clone()), "https://b/".to_string(), 0);
    store.insert_finding(f1).await.unwrap();
    store.insert_finding(f2).await.unwrap();

    let for_a = store.list_findings_for_run(&run_a).await.unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].url, "https://a/");
}

#[tokio::test]
async fn list_expired_artifacts_only_returns_past_expiry() {
    let store = InMemoryStore::new();
    let finding_id = FindingId::generate();
    let fresh = Artifact::new(
        ArtifactId::generate(),
        finding_id.clone(),
        bc_core::ArtifactType::Screenshot,
        "fresh.png".to_string(),
        10,
        0,
        bc_core::DEFAULT_RETENTION_DAYS,
    );
    let expired = Artifact::new(
        ArtifactId::generate(),
        finding_id,
        bc_core::ArtifactType::Screenshot,
        "expired.png".to_string(),
        10,
        -2 * 7 * 24 * 60 * 60 * 1000,
        bc_core::DEFAULT_RETENTION_DAYS,
    );
    store.insert_artifact(fresh).await.unwrap();
    store.insert_artifact(expired.clone()).await.unwrap();

    let results = store.list_expired_artifacts(0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, expired.id);
}

#[tokio::test]
async fn reverify_attempts_are_returned_oldest_first() {
    let store = InMemoryStore::new();
    let finding_id = FindingId::generate();
    for ts in [300, 100, 200] {
        store
            .insert_reverify_attempt(ReverifyAttempt {
                id: ReverifyAttemptId::generate(),
                finding_id: finding_id.clone(),
                requested_at_ms: ts,
                requester_ip: None,
                requester_user_agent: None,
                source: bc_core::ReverifySource::Api,
                result: bc_core::ReverifyResult::Ok,
                job_id: None,
            })
            .await
            .unwrap();
    }
    let attempts = store.list_reverify_attempts_for_finding(&finding_id).await.unwrap();
    let timestamps: Vec<i64> = attempts.iter().map(|a| a.requested_at_ms).collect();
    assert_eq!(timestamps, vec![100, 200, 300]);
}
