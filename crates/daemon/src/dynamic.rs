// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime-selected backend wrappers (§9: "fetcher adapter polymorphism
//! should be a tagged variant or trait object with the same method set").
//! `bc-daemon` is the one place that needs to pick a concrete KV/store/fetch
//! backend from config, so the dynamic dispatch lives here rather than in
//! the library crates, which stay generic.

use async_trait::async_trait;
use bc_adapters::{FetchAdapter, FetchAdapterError, FetchRequest, RawResponse};
use bc_kv::{KvError, KvStore, MultiSetEntry};
use bc_store::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Erases `InMemoryKv` vs `RedisKv` behind one type, so `AppState`'s generic
/// parameters don't need to fork on the KV backend.
pub struct DynKv(pub Arc<dyn KvStore>);

#[async_trait]
impl KvStore for DynKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        self.0.set(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        self.0.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        self.0.expire(key, ttl).await
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.0.exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        self.0.ttl(key).await
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.0.del(key).await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.0.lpush(key, value).await
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.0.ltrim(key, start, stop).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        self.0.lrange(key, start, stop).await
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        self.0.scan(pattern).await
    }

    async fn multi_set(&self, entries: &[MultiSetEntry]) -> Result<(), KvError> {
        self.0.multi_set(entries).await
    }
}

/// Erases the store backend. Only `InMemoryStore` exists today; this wrapper
/// is the seam a SQL-backed `Store` impl would plug into without touching
/// `AppState`'s type parameters.
pub struct DynStore(pub Arc<dyn Store>);

#[async_trait]
impl Store for DynStore {
    async fn insert_run(&self, run: bc_core::Run) -> Result<(), StoreError> {
        self.0.insert_run(run).await
    }

    async fn get_run(&self, id: &bc_core::RunId) -> Result<Option<bc_core::Run>, StoreError> {
        self.0.get_run(id).await
    }

    async fn update_run(&self, run: bc_core::Run) -> Result<(), StoreError> {
        self.0.update_run(run).await
    }

    async fn insert_finding(&self, finding: bc_core::Finding) -> Result<(), StoreError> {
        self.0.insert_finding(finding).await
    }

    async fn get_finding(&self, id: &bc_core::FindingId) -> Result<Option<bc_core::Finding>, StoreError> {
        self.0.get_finding(id).await
    }

    async fn update_finding(&self, finding: bc_core::Finding) -> Result<(), StoreError> {
        self.0.update_finding(finding).await
    }

    async fn list_findings_for_run(&self, run_id: &bc_core::RunId) -> Result<Vec<bc_core::Finding>, StoreError> {
        self.0.list_findings_for_run(run_id).await
    }

    async fn insert_artifact(&self, artifact: bc_core::Artifact) -> Result<(), StoreError> {
        self.0.insert_artifact(artifact).await
    }

    async fn list_artifacts_for_finding(&self, finding_id: &bc_core::FindingId) -> Result<Vec<bc_core::Artifact>, StoreError> {
        self.0.list_artifacts_for_finding(finding_id).await
    }

    async fn list_expired_artifacts(&self, now_ms: i64) -> Result<Vec<bc_core::Artifact>, StoreError> {
        self.0.list_expired_artifacts(now_ms).await
    }

    async fn delete_artifact(&self, id: &bc_core::ArtifactId) -> Result<(), StoreError> {
        self.0.delete_artifact(id).await
    }

    async fn insert_reverify_attempt(&self, attempt: bc_core::ReverifyAttempt) -> Result<(), StoreError> {
        self.0.insert_reverify_attempt(attempt).await
    }

    async fn list_reverify_attempts_for_finding(&self, finding_id: &bc_core::FindingId) -> Result<Vec<bc_core::ReverifyAttempt>, StoreError> {
        self.0.list_reverify_attempts_for_finding(finding_id).await
    }
}

/// `Fetcher<A, S, K, C>` holds its adapter by value, not behind `Arc`, so it
/// can't be erased with a trait object the way the KV/store backends are —
/// a tagged variant carries both possible concrete adapters instead (§9).
pub enum AnyFetchAdapter {
    Direct(bc_adapters::ReqwestFetchAdapter),
    Proxy(bc_adapters::InMemoryFetchAdapter),
}

#[async_trait]
impl FetchAdapter for AnyFetchAdapter {
    async fn fetch_once(&self, url: &str, req: &FetchRequest) -> Result<RawResponse, FetchAdapterError> {
        match self {
            AnyFetchAdapter::Direct(adapter) => adapter.fetch_once(url, req).await,
            AnyFetchAdapter::Proxy(adapter) => adapter.fetch_once(url, req).await,
        }
    }
}

#[cfg(test)]
#[path = "dynamic_tests.rs"]
mod tests;
