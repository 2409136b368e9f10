// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention sweep (§6): "Retention job deletes artifact rows and files
//! older than RETENTION_DAYS, then removes empty directories (not the
//! root)." Runs as a periodic background task started from `bc-daemon`'s
//! `main`; `sweep_once` is the unit a caller schedules on an interval.

use crate::artifacts::ArtifactWriter;
use bc_core::Clock;
use bc_store::Store;
use std::sync::Arc;

/// One pass: list every artifact whose `expires_at` has elapsed, delete its
/// file (and now-empty parent directory) and its row. Errors on individual
/// artifacts are logged and do not stop the sweep.
pub async fn sweep_once<St: Store, C: Clock>(store: &St, clock: &C, artifact_writer: &ArtifactWriter) -> usize {
    let now_ms = clock.epoch_ms();
    let expired = match store.list_expired_artifacts(now_ms).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "retention sweep failed to list expired artifacts");
            return 0;
        }
    };

    let mut deleted = 0;
    for artifact in expired {
        if let Err(e) = artifact_writer.delete(&artifact.storage_path).await {
            tracing::warn!(artifact_id = %artifact.id, error = %e, "retention sweep failed to delete artifact file");
            continue;
        }
        match store.delete_artifact(&artifact.id).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(artifact_id = %artifact.id, error = %e, "retention sweep failed to delete artifact row"),
        }
    }
    deleted
}

/// Runs [`sweep_once`] on `interval` forever. Intended to be spawned as its
/// own task; never returns.
pub async fn run_retention_loop<St: Store, C: Clock>(store: Arc<St>, clock: Arc<C>, artifact_writer: ArtifactWriter, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let deleted = sweep_once(store.as_ref(), clock.as_ref(), &artifact_writer).await;
        if deleted > 0 {
            tracing::info!(deleted, "retention sweep removed expired artifacts");
        }
    }
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
