// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Call-recording [`KvStore`] for tests that need to assert on exactly which
//! keys a component touched (e.g. the breaker's atomic `open` transition),
//! not just the resulting state.

use crate::memory::InMemoryKv;
use crate::{KvError, KvStore, MultiSetEntry};
use async_trait::async_trait;
use bc_core::Clock;
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvCall {
    Get(String),
    Set(String),
    Incr(String),
    Expire(String),
    Del(String),
    LPush(String),
    LTrim(String),
    LRange(String),
    Scan(String),
    MultiSet(Vec<String>),
}

pub struct FakeKv<C: Clock> {
    inner: InMemoryKv<C>,
    calls: Mutex<Vec<KvCall>>,
}

impl<C: Clock> FakeKv<C> {
    pub fn new(clock: C) -> Self {
        Self {
            inner: InMemoryKv::new(clock),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<KvCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: KvCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl<C: Clock> KvStore for FakeKv<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.record(KvCall::Get(key.to_string()));
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        self.record(KvCall::Set(key.to_string()));
        self.inner.set(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        self.record(KvCall::Incr(key.to_string()));
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        self.record(KvCall::Expire(key.to_string()));
        self.inner.expire(key, ttl).await
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.inner.exists(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        self.inner.ttl(key).await
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        self.record(KvCall::Del(key.to_string()));
        self.inner.del(key).await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.record(KvCall::LPush(key.to_string()));
        self.inner.lpush(key, value).await
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        self.record(KvCall::LTrim(key.to_string()));
        self.inner.ltrim(key, start, stop).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        self.record(KvCall::LRange(key.to_string()));
        self.inner.lrange(key, start, stop).await
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        self.record(KvCall::Scan(pattern.to_string()));
        self.inner.scan(pattern).await
    }

    async fn multi_set(&self, entries: &[MultiSetEntry]) -> Result<(), KvError> {
        self.record(KvCall::MultiSet(entries.iter().map(|(k, _, _)| k.clone()).collect()));
        self.inner.multi_set(entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bc_core::FakeClock;

    #[tokio::test]
    async fn records_calls_in_order() {
        let fake = FakeKv::new(FakeClock::default());
        fake.set("k", "v", None).await.unwrap();
        fake.get("k").await.unwrap();
        assert_eq!(
            fake.calls(),
            vec![KvCall::Set("k".to_string()), KvCall::Get("k".to_string())]
        );
    }
}
