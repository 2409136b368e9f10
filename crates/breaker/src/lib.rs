// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bc-breaker: the per-target circuit breaker (C7). State lives entirely in
//! KV so it's shared across worker processes; this crate only implements
//! the state machine and its read-then-write transitions.

use bc_core::Clock;
use bc_kv::{KvError, KvStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("kv error: {0}")]
    Kv(#[from] KvError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    HalfOpen,
    Open,
}

impl BreakerState {
    fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::HalfOpen => "half_open",
            BreakerState::Open => "open",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "half_open" => BreakerState::HalfOpen,
            "open" => BreakerState::Open,
            _ => BreakerState::Closed,
        }
    }
}

/// Tunables for the breaker. Defaults follow the daemon's documented
/// environment variables (`BREAKER_FAIL_THRESHOLD`, `BREAKER_WINDOW_SIZE`,
/// `BREAKER_FAILURE_RATE_THRESHOLD`, `BREAKER_OPEN_DURATION_MS`,
/// `BREAKER_HALF_OPEN_PROBE_DELAY_MS`).
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub fail_threshold: u32,
    pub window_size: u32,
    pub failure_rate_threshold: f64,
    pub open_duration_ms: i64,
    pub half_open_probe_delay_ms: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            fail_threshold: 5,
            window_size: 10,
            failure_rate_threshold: 0.5,
            open_duration_ms: 30_000,
            half_open_probe_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStats {
    pub target: String,
    pub state: BreakerState,
    pub fail_count: u32,
    pub next_probe_eta_ms: Option<i64>,
    pub opened_at_ms: Option<i64>,
    pub failure_rate: f64,
}

pub struct CircuitBreaker<K: KvStore, C: Clock> {
    kv: Arc<K>,
    clock: Arc<C>,
    config: BreakerConfig,
}

fn state_key(target: &str) -> String {
    format!("cb:{target}:state")
}
fn fail_count_key(target: &str) -> String {
    format!("cb:{target}:fail_count")
}
fn window_key(target: &str) -> String {
    format!("cb:{target}:window")
}
fn opened_at_key(target: &str) -> String {
    format!("cb:{target}:opened_at")
}
fn next_probe_key(target: &str) -> String {
    format!("cb:{target}:next_probe")
}

impl<K: KvStore, C: Clock> CircuitBreaker<K, C> {
    pub fn new(kv: Arc<K>, clock: Arc<C>, config: BreakerConfig) -> Self {
        Self { kv, clock, config }
    }

    /// `getState(target)`. Observes `open -> half_open` when `next_probe`
    /// has elapsed, performing that transition as a side effect.
    pub async fn get_state(&self, target: &str) -> Result<BreakerState, BreakerError> {
        let raw = self.kv.get(&state_key(target)).await?;
        let state = raw.as_deref().map(BreakerState::parse).unwrap_or(BreakerState::Closed);
        if state != BreakerState::Open {
            return Ok(state);
        }
        let next_probe: i64 = self
            .kv
            .get(&next_probe_key(target))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(i64::MAX);
        if self.clock.epoch_ms() >= next_probe {
            self.kv.set(&state_key(target), BreakerState::HalfOpen.as_str(), None).await?;
            return Ok(BreakerState::HalfOpen);
        }
        Ok(BreakerState::Open)
    }

    /// `shouldSkip(target)`: true while the breaker is open (observing the
    /// same `open -> half_open` transition as [`Self::get_state`]).
    pub async fn should_skip(&self, target: &str) -> Result<bool, BreakerError> {
        Ok(self.get_state(target).await? == BreakerState::Open)
    }

    async fn open(&self, target: &str, next_probe_delay_ms: i64) -> Result<(), BreakerError> {
        let now = self.clock.epoch_ms();
        self.kv
            .multi_set(&[
                (state_key(target), BreakerState::Open.as_str().to_string(), None),
                (opened_at_key(target), now.to_string(), None),
                (next_probe_key(target), (now + next_probe_delay_ms).to_string(), None),
            ])
            .await?;
        tracing::warn!(target, next_probe_delay_ms, "circuit breaker opened");
        Ok(())
    }

    async fn close(&self, target: &str) -> Result<(), BreakerError> {
        self.kv.set(&state_key(target), BreakerState::Closed.as_str(), None).await?;
        self.kv.del(&fail_count_key(target)).await?;
        self.kv.del(&window_key(target)).await?;
        self.kv.del(&opened_at_key(target)).await?;
        self.kv.del(&next_probe_key(target)).await?;
        Ok(())
    }

    /// Records a successful call against `target`.
    pub async fn record_success(&self, target: &str) -> Result<(), BreakerError> {
        let state = self.get_state(target).await?;
        if state == BreakerState::HalfOpen {
            self.close(target).await?;
            return Ok(());
        }
        self.kv.lpush(&window_key(target), "1").await?;
        self.kv
            .ltrim(&window_key(target), 0, self.config.window_size as i64 - 1)
            .await?;
        Ok(())
    }

    /// Records a failed call against `target`, opening the breaker if the
    /// failure-count or failure-rate threshold is crossed.
    pub async fn record_failure(&self, target: &str) -> Result<(), BreakerError> {
        let state = self.get_state(target).await?;
        if state == BreakerState::HalfOpen {
            self.open(target, self.config.half_open_probe_delay_ms).await?;
            return Ok(());
        }

        self.kv.lpush(&window_key(target), "0").await?;
        self.kv
            .ltrim(&window_key(target), 0, self.config.window_size as i64 - 1)
            .await?;
        let fail_count = self.kv.incr(&fail_count_key(target)).await?;

        let window = self.kv.lrange(&window_key(target), 0, -1).await?;
        let window_len = window.len() as u32;
        let failures_in_window = window.iter().filter(|v| v.as_str() == "0").count() as f64;
        let failure_rate = if window_len > 0 { failures_in_window / window_len as f64 } else { 0.0 };

        let should_open = fail_count as u32 >= self.config.fail_threshold
            || (window_len >= self.config.window_size && failure_rate >= self.config.failure_rate_threshold);

        if should_open {
            self.open(target, self.config.open_duration_ms).await?;
        }
        Ok(())
    }

    /// `getStats(target)`.
    pub async fn get_stats(&self, target: &str) -> Result<BreakerStats, BreakerError> {
        let state = self.get_state(target).await?;
        let fail_count: u32 = self
            .kv
            .get(&fail_count_key(target))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let opened_at_ms: Option<i64> = self.kv.get(&opened_at_key(target)).await?.and_then(|v| v.parse().ok());
        let next_probe_eta_ms: Option<i64> = self.kv.get(&next_probe_key(target)).await?.and_then(|v| v.parse().ok());
        let window = self.kv.lrange(&window_key(target), 0, -1).await?;
        let failure_rate = if window.is_empty() {
            0.0
        } else {
            window.iter().filter(|v| v.as_str() == "0").count() as f64 / window.len() as f64
        };
        Ok(BreakerStats {
            target: target.to_string(),
            state,
            fail_count,
            next_probe_eta_ms,
            opened_at_ms,
            failure_rate,
        })
    }

    /// `getAllStats()`: scans `cb:*:state` for known targets.
    pub async fn get_all_stats(&self) -> Result<Vec<BreakerStats>, BreakerError> {
        let keys = self.kv.scan("cb:*:state").await?;
        let mut stats = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(target) = key.strip_prefix("cb:").and_then(|s| s.strip_suffix(":state")) else {
                continue;
            };
            stats.push(self.get_stats(target).await?);
        }
        Ok(stats)
    }

    /// `reset(targetId)`: clears every key for the target, returning it to
    /// the implicit `closed` default.
    pub async fn reset(&self, target: &str) -> Result<(), BreakerError> {
        self.close(target).await
    }
}

#[allow(dead_code)]
fn _assert_send_sync<T: Send + Sync>() {}
#[allow(dead_code)]
fn _assert<K: KvStore, C: Clock>() {
    _assert_send_sync::<CircuitBreaker<K, C>>();
}

/// Derives a breaker target id from a URL's origin, so requests to the same
/// host share breaker state regardless of path.
pub fn target_id_for_url(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.origin().unicode_serialization())
        .unwrap_or_else(|_| url.to_string())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
