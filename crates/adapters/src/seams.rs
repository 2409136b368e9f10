// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin async-trait seams over `bc-breaker`'s [`CircuitBreaker`] and
//! `bc-rules`'s [`RulesEngine`] so [`crate::fetcher::Fetcher`] can hold them
//! as trait objects instead of threading their generic parameters through
//! every caller.

use async_trait::async_trait;
use bc_breaker::{BreakerStats, CircuitBreaker};
use bc_core::Clock;
use bc_kv::KvStore;
use bc_rules::{ErrorType, RobotsFetcher, RulesEngine, SuppressionResult};

#[async_trait]
pub trait BreakerGate: Send + Sync {
    async fn should_skip(&self, target: &str) -> bool;
    async fn record_success(&self, target: &str);
    async fn record_failure(&self, target: &str);
    async fn stats(&self, target: &str) -> Option<BreakerStats>;
}

#[async_trait]
impl<K: KvStore, C: Clock> BreakerGate for CircuitBreaker<K, C> {
    async fn should_skip(&self, target: &str) -> bool {
        CircuitBreaker::should_skip(self, target).await.unwrap_or_else(|e| {
            tracing::warn!(target, error = %e, "breaker should_skip failed, failing open");
            false
        })
    }

    async fn record_success(&self, target: &str) {
        if let Err(e) = CircuitBreaker::record_success(self, target).await {
            tracing::warn!(target, error = %e, "breaker record_success failed");
        }
    }

    async fn record_failure(&self, target: &str) {
        if let Err(e) = CircuitBreaker::record_failure(self, target).await {
            tracing::warn!(target, error = %e, "breaker record_failure failed");
        }
    }

    async fn stats(&self, target: &str) -> Option<BreakerStats> {
        CircuitBreaker::get_stats(self, target).await.ok()
    }
}

#[async_trait]
pub trait SuppressionChecker: Send + Sync {
    async fn check_suppression(
        &self,
        url: &str,
        error_type: ErrorType,
        status: Option<u16>,
        error: Option<&str>,
        latency_ms: Option<u64>,
    ) -> SuppressionResult;

    fn should_alert_latency(&self, url: &str, latency_ms: u64) -> bool;
}

#[async_trait]
impl<F: RobotsFetcher, K: KvStore, C: Clock> SuppressionChecker for RulesEngine<F, K, C> {
    async fn check_suppression(
        &self,
        url: &str,
        error_type: ErrorType,
        status: Option<u16>,
        error: Option<&str>,
        latency_ms: Option<u64>,
    ) -> SuppressionResult {
        RulesEngine::check_suppression(self, url, error_type, status, error, latency_ms).await
    }

    fn should_alert_latency(&self, url: &str, latency_ms: u64) -> bool {
        RulesEngine::should_alert_latency(self, url, latency_ms)
    }
}
