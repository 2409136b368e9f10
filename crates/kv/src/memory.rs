// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process [`KvStore`] backed by a `parking_lot` mutex. Used in tests and
//! for single-process deployments that don't need a shared Redis.

use crate::{KvError, KvStore, MultiSetEntry};
use async_trait::async_trait;
use bc_core::Clock;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use wildmatch::WildMatch;

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    List(VecDeque<String>),
}

struct Entry {
    value: Value,
    expires_at_ms: Option<i64>,
}

struct State {
    entries: HashMap<String, Entry>,
}

/// In-memory [`KvStore`]. Generic over the clock so tests can drive TTL
/// expiry deterministically with `FakeClock`.
pub struct InMemoryKv<C: Clock = bc_core::SystemClock> {
    clock: C,
    state: Mutex<State>,
}

impl<C: Clock> InMemoryKv<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: Mutex::new(State {
                entries: HashMap::new(),
            }),
        }
    }

    fn is_live(&self, entry: &Entry, now_ms: i64) -> bool {
        entry.expires_at_ms.map(|exp| now_ms < exp).unwrap_or(true)
    }

    fn get_scalar_locked(&self, state: &mut State, key: &str, now_ms: i64) -> Option<String> {
        match state.entries.get(key) {
            Some(entry) if self.is_live(entry, now_ms) => match &entry.value {
                Value::Scalar(s) => Some(s.clone()),
                Value::List(_) => None,
            },
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        }
    }
}

impl Default for InMemoryKv<bc_core::SystemClock> {
    fn default() -> Self {
        Self::new(bc_core::SystemClock)
    }
}

#[async_trait]
impl<C: Clock> KvStore for InMemoryKv<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        Ok(self.get_scalar_locked(&mut state, key, now_ms))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        state.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at_ms: ttl.map(|d| now_ms + d.as_millis() as i64),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, KvError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        let current = self
            .get_scalar_locked(&mut state, key, now_ms)
            .map(|s| s.parse::<i64>().map_err(|_| KvError::NotAnInteger(key.to_string())))
            .transpose()?
            .unwrap_or(0);
        let next = current + 1;
        let expires_at_ms = state.entries.get(key).and_then(|e| e.expires_at_ms);
        state.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(next.to_string()),
                expires_at_ms,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.expires_at_ms = Some(now_ms + ttl.as_millis() as i64);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        Ok(match state.entries.get(key) {
            Some(entry) if self.is_live(entry, now_ms) => true,
            Some(_) => {
                state.entries.remove(key);
                false
            }
            None => false,
        })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, KvError> {
        let now_ms = self.clock.epoch_ms();
        let state = self.state.lock();
        Ok(state.entries.get(key).and_then(|entry| {
            if !self.is_live(entry, now_ms) {
                return None;
            }
            entry
                .expires_at_ms
                .map(|exp| Duration::from_millis((exp - now_ms).max(0) as u64))
        }))
    }

    async fn del(&self, key: &str) -> Result<(), KvError> {
        let mut state = self.state.lock();
        state.entries.remove(key);
        Ok(())
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut state = self.state.lock();
        let entry = state.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::List(VecDeque::new()),
            expires_at_ms: None,
        });
        match &mut entry.value {
            Value::List(list) => {
                list.push_front(value.to_string());
                Ok(())
            }
            Value::Scalar(_) => Err(KvError::Backend(format!("{key} is not a list"))),
        }
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), KvError> {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            return Ok(());
        };
        match &mut entry.value {
            Value::List(list) => {
                let len = list.len() as i64;
                let (lo, hi) = resolve_range(start, stop, len);
                *list = match (lo, hi) {
                    (lo, hi) if lo <= hi && lo < len => {
                        list.iter().skip(lo as usize).take((hi - lo + 1) as usize).cloned().collect()
                    }
                    _ => VecDeque::new(),
                };
                Ok(())
            }
            Value::Scalar(_) => Err(KvError::Backend(format!("{key} is not a list"))),
        }
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, KvError> {
        let state = self.state.lock();
        let Some(entry) = state.entries.get(key) else {
            return Ok(Vec::new());
        };
        match &entry.value {
            Value::List(list) => {
                let len = list.len() as i64;
                let (lo, hi) = resolve_range(start, stop, len);
                if lo > hi || lo >= len {
                    return Ok(Vec::new());
                }
                Ok(list
                    .iter()
                    .skip(lo as usize)
                    .take((hi - lo + 1) as usize)
                    .cloned()
                    .collect())
            }
            Value::Scalar(_) => Err(KvError::Backend(format!("{key} is not a list"))),
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, KvError> {
        let now_ms = self.clock.epoch_ms();
        let matcher = WildMatch::new(pattern);
        let state = self.state.lock();
        Ok(state
            .entries
            .iter()
            .filter(|(k, entry)| self.is_live(entry, now_ms) && matcher.matches(k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn multi_set(&self, entries: &[MultiSetEntry]) -> Result<(), KvError> {
        let now_ms = self.clock.epoch_ms();
        let mut state = self.state.lock();
        for (key, value, ttl) in entries {
            state.entries.insert(
                key.clone(),
                Entry {
                    value: Value::Scalar(value.clone()),
                    expires_at_ms: ttl.map(|d| now_ms + d.as_millis() as i64),
                },
            );
        }
        Ok(())
    }
}

/// Redis-style `[start, stop]` inclusive range with negative indices counting
/// from the tail, clamped to `[0, len)`.
fn resolve_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
    let resolve = |idx: i64| -> i64 {
        if idx < 0 {
            (len + idx).max(0)
        } else {
            idx
        }
    };
    let lo = resolve(start);
    let hi = resolve(stop).min(len - 1);
    (lo, hi)
}

#[allow(dead_code)]
fn _assert_send_sync<T: Send + Sync>() {}
#[allow(dead_code)]
fn _assert<C: Clock>() {
    _assert_send_sync::<InMemoryKv<C>>();
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Shared constructor used by tests across the workspace that just want a
/// ready-to-use in-memory store over a [`bc_core::FakeClock`].
pub fn fake_clock_kv() -> (Arc<InMemoryKv<bc_core::FakeClock>>, bc_core::FakeClock) {
    let clock = bc_core::FakeClock::default();
    (Arc::new(InMemoryKv::new(clock.clone())), clock)
}
