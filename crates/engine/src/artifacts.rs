// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk artifact layout: `<root>/<run_id>/<finding_id>/<file>` (§6). Used
//! by the render processor to persist capture output and, on capture
//! failure, a `console_logs` artifact carrying the error.

use bc_core::{ArtifactType, FindingId, RunId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactWriteError {
    #[error("io error writing artifact: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn finding_dir(&self, run_id: Option<&RunId>, finding_id: &FindingId) -> PathBuf {
        let run_segment = run_id.map(|r| r.as_str().to_string()).unwrap_or_else(|| "orphaned".to_string());
        self.root.join(run_segment).join(finding_id.as_str())
    }

    /// Writes `bytes` under the finding's artifact directory, creating parent
    /// directories as needed, and returns the storage path and size.
    pub async fn write(
        &self,
        run_id: Option<&RunId>,
        finding_id: &FindingId,
        artifact_type: ArtifactType,
        bytes: &[u8],
    ) -> Result<(String, u64), ArtifactWriteError> {
        let dir = self.finding_dir(run_id, finding_id);
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(artifact_type.file_name());
        tokio::fs::write(&path, bytes).await?;
        Ok((path.to_string_lossy().to_string(), bytes.len() as u64))
    }

    /// Removes `storage_path` and, if its parent directory is now empty,
    /// removes that too — but never the artifact root itself (§6).
    pub async fn delete(&self, storage_path: &str) -> Result<(), ArtifactWriteError> {
        let path = PathBuf::from(storage_path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = path.parent() {
            if parent != self.root.as_path() && tokio::fs::read_dir(parent).await.map(|mut d| matches!(d.next_entry().await, Ok(None))).unwrap_or(false) {
                let _ = tokio::fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
