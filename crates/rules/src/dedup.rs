// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dedup store (C5): cooldown-based suppression of repeated findings sharing
//! a fingerprint, and an occurrence counter for observability.

use bc_core::Clock;
use bc_kv::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub fingerprint: String,
    pub url: String,
    pub occurrence_count: u64,
    pub first_seen_at_ms: i64,
    pub last_seen_at_ms: i64,
    pub status: Option<u16>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeduplicationCheck {
    pub suppressed: bool,
    pub reason: Option<String>,
    pub data: Option<FingerprintRecord>,
}

pub struct DedupStore<K: KvStore, C: Clock> {
    kv: Arc<K>,
    clock: Arc<C>,
}

impl<K: KvStore, C: Clock> DedupStore<K, C> {
    pub fn new(kv: Arc<K>, clock: Arc<C>) -> Self {
        Self { kv, clock }
    }

    fn cooldown_key(fingerprint: &str) -> String {
        format!("cooldown:{fingerprint}")
    }

    fn record_key(fingerprint: &str) -> String {
        format!("fingerprint:{fingerprint}")
    }

    /// `checkDeduplication(fingerprint, rule)`. Suppression is true iff the
    /// cooldown key exists.
    pub async fn check_deduplication(&self, fingerprint: &str) -> DeduplicationCheck {
        let cooldown_key = Self::cooldown_key(fingerprint);
        let suppressed = self.kv.exists(&cooldown_key).await.unwrap_or(false);
        if !suppressed {
            return DeduplicationCheck {
                suppressed: false,
                reason: None,
                data: None,
            };
        }
        let data = self
            .kv
            .get(&Self::record_key(fingerprint))
            .await
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok());
        DeduplicationCheck {
            suppressed: true,
            reason: Some("cooldown".to_string()),
            data,
        }
    }

    /// `recordFinding(fingerprint, url, rule, status?, error?)`: upserts the
    /// occurrence record and (re)arms the cooldown with the effective TTL.
    /// The cooldown SET races under concurrent duplicates — at most one
    /// extra occurrence may slip through, which is the documented acceptable
    /// window.
    pub async fn record_finding(
        &self,
        fingerprint: &str,
        url: &str,
        cooldown_seconds: u64,
        status: Option<u16>,
        error: Option<String>,
    ) {
        let record_key = Self::record_key(fingerprint);
        let existing: Option<FingerprintRecord> = self
            .kv
            .get(&record_key)
            .await
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok());
        let now_ms = self.clock.epoch_ms();
        let occurrence_count = existing.as_ref().map(|e| e.occurrence_count).unwrap_or(0) + 1;
        let first_seen_at_ms = existing.map(|e| e.first_seen_at_ms).unwrap_or(now_ms);
        let record = FingerprintRecord {
            fingerprint: fingerprint.to_string(),
            url: url.to_string(),
            occurrence_count,
            first_seen_at_ms,
            last_seen_at_ms: now_ms,
            status,
            error,
        };
        if let Ok(serialized) = serde_json::to_string(&record) {
            let _ = self.kv.set(&record_key, &serialized, None).await;
        }
        let _ = self
            .kv
            .set(&Self::cooldown_key(fingerprint), "1", Some(Duration::from_secs(cooldown_seconds.max(1))))
            .await;
    }
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
