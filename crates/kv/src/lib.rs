// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bc-kv: the shared key-value store used by the rules engine (C4, C5), the
//! circuit breaker (C7), the queue throughput cap (C9), and the re-verify
//! coordinator (C11) — a Redis-like surface of strings with TTL, counters,
//! bounded lists, and an atomic multi-set.
//!
//! [`memory::InMemoryKv`] backs tests and single-process deployments.
//! [`redis::RedisKv`] is the production adapter, selected at runtime by
//! `bc-daemon`'s config the same way the fetcher adapter is (§4.8, §6).

pub mod memory;
pub mod redis;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::InMemoryKv;
pub use redis::RedisKv;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("value is not an integer: {0}")]
    NotAnInteger(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A single entry for [`KvStore::multi_set`]: key, value, optional TTL.
pub type MultiSetEntry = (String, String, Option<Duration>);

/// The external key-value interface described in §4 and §5: strings with
/// TTL, an incrementing counter, bounded lists, and an atomic multi-set used
/// by the breaker when it transitions to `open`.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// `GET key`. Returns `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// `SET key value [EX ttl]`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// `INCR key`, creating the counter at 0 first if absent. Does not touch
    /// an existing TTL; callers that need "expire on first increment" (§4.11
    /// step 3) must call [`KvStore::expire`] themselves when the return value
    /// is `1`.
    async fn incr(&self, key: &str) -> Result<i64, KvError>;

    /// `EXPIRE key ttl`. A no-op if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    /// `EXISTS key`.
    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// `TTL key`. Returns `None` if the key is absent or carries no TTL.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError>;

    /// `DEL key`.
    async fn del(&self, key: &str) -> Result<(), KvError>;

    /// `LPUSH key value`.
    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// `LTRIM key start stop`, inclusive indices, Redis semantics (negative
    /// indices count from the list's tail).
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError>;

    /// `LRANGE key start stop`, inclusive indices, Redis semantics.
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError>;

    /// `KEYS pattern`, a `*`-glob scan. The in-memory backend and Redis
    /// backend both use a glob, not a full regex.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError>;

    /// Set several keys in a single atomic step. Used by the breaker's
    /// `open` transition to set `{state, opened_at, next_probe}` together
    /// (§5), and is implemented as a `MULTI`/`EXEC` pipeline against Redis.
    async fn multi_set(&self, entries: &[MultiSetEntry]) -> Result<(), KvError>;
}
