// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_core::{Artifact, ArtifactId, ArtifactType, FakeClock, FindingId};
use bc_store::{InMemoryStore, Store};
use tempfile::tempdir;

#[tokio::test]
async fn sweep_deletes_expired_artifacts_and_their_files() {
    let dir = tempdir().unwrap();
    let writer = ArtifactWriter::new(dir.path());
    let store = InMemoryStore::new();
    let clock = FakeClock::new(0);
    let finding_id = FindingId::generate();

    let (path, size) = writer.write(None, &finding_id, ArtifactType::Screenshot, b"bytes").await.unwrap();
    let artifact = Artifact::new(ArtifactId::generate(), finding_id.clone(), ArtifactType::Screenshot, path.clone(), size, 0, 7);
    store.insert_artifact(artifact.clone()).await.unwrap();

    // Not yet expired.
    let deleted = sweep_once(&store, &clock, &writer).await;
    assert_eq!(deleted, 0);
    assert!(std::path::Path::new(&path).exists());

    clock.set_ms(artifact.expires_at_ms);
    let deleted = sweep_once(&store, &clock, &writer).await;
    assert_eq!(deleted, 1);
    assert!(!std::path::Path::new(&path).exists());
    assert!(store.list_artifacts_for_finding(&finding_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn sweep_is_a_noop_when_nothing_is_expired() {
    let dir = tempdir().unwrap();
    let writer = ArtifactWriter::new(dir.path());
    let store = InMemoryStore::new();
    let clock = FakeClock::new(0);

    assert_eq!(sweep_once(&store, &clock, &writer).await, 0);
}
