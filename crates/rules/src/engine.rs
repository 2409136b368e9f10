// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rules engine (C6): composes the allow-list (C2), robots cache (C3), rules
//! store (C4), and dedup store (C5) into a single ordered suppression
//! decision.

use crate::allowlist::AllowList;
use crate::dedup::DedupStore;
use crate::robots::{RobotsCache, RobotsFetcher};
use crate::store::RulesStore;
use bc_core::{fingerprint, latency_fingerprint, Clock};
use bc_kv::KvStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    #[serde(rename = "5xx")]
    FiveXx,
    Latency,
    Timeout,
    Network,
}

#[derive(Debug, Clone)]
pub struct SuppressionResult {
    pub suppressed: bool,
    pub reason: Option<&'static str>,
    pub fingerprint: Option<String>,
}

pub struct RulesEngine<F: RobotsFetcher, K: KvStore, C: Clock> {
    allow_list: AllowList,
    robots: RobotsCache<F, K>,
    rules_store: RwLock<RulesStore>,
    dedup: DedupStore<K, C>,
    clock: Arc<C>,
}

impl<F: RobotsFetcher, K: KvStore, C: Clock> RulesEngine<F, K, C> {
    pub fn new(allow_list: AllowList, robots: RobotsCache<F, K>, rules_store: RulesStore, kv: Arc<K>, clock: Arc<C>) -> Self {
        Self {
            allow_list,
            robots,
            rules_store: RwLock::new(rules_store),
            dedup: DedupStore::new(kv, clock.clone()),
            clock,
        }
    }

    pub fn reload_rules(&self, rules_store: RulesStore) {
        *self.rules_store.write() = rules_store;
    }

    pub fn reload_allow_list(&self, patterns: Vec<String>) {
        self.allow_list.reload(patterns);
    }

    fn fingerprint_for(&self, url: &str, error_type: ErrorType, status: Option<u16>, error: Option<&str>, latency_ms: Option<u64>) -> String {
        match error_type {
            ErrorType::Latency => latency_fingerprint(url, latency_ms.unwrap_or(0)),
            _ => fingerprint(url, status, error),
        }
    }

    /// `checkSuppression(url, errorType, status?, error?, latencyMs?)`.
    /// Ordered checks, first match wins: allow-list, maintenance window,
    /// robots (if the matched rule respects it), then dedup cooldown.
    pub async fn check_suppression(
        &self,
        url: &str,
        error_type: ErrorType,
        status: Option<u16>,
        error: Option<&str>,
        latency_ms: Option<u64>,
    ) -> SuppressionResult {
        if !self.allow_list.is_allowed(url) {
            return SuppressionResult {
                suppressed: true,
                reason: Some("allowlist"),
                fingerprint: None,
            };
        }

        let store = self.rules_store.read();
        let rule = store.find_matching_rule(url);
        let now = self.clock.now();

        if store.should_suppress_during_maintenance(rule, now) {
            return SuppressionResult {
                suppressed: true,
                reason: Some("maintenance"),
                fingerprint: None,
            };
        }

        let respect_robots = store.effective_respect_robots(rule);
        let cooldown_seconds = store.effective_cooldown_seconds(rule);
        drop(store);

        if respect_robots && !self.robots.is_allowed(url, "*").await {
            return SuppressionResult {
                suppressed: true,
                reason: Some("robots"),
                fingerprint: None,
            };
        }

        let fp = self.fingerprint_for(url, error_type, status, error, latency_ms);
        let dedup_check = self.dedup.check_deduplication(&fp).await;
        if dedup_check.suppressed {
            return SuppressionResult {
                suppressed: true,
                reason: Some("cooldown"),
                fingerprint: Some(fp),
            };
        }

        self.dedup
            .record_finding(&fp, url, cooldown_seconds, status, error.map(str::to_string))
            .await;
        SuppressionResult {
            suppressed: false,
            reason: None,
            fingerprint: Some(fp),
        }
    }

    /// `shouldAlertLatency(url, latencyMs)`.
    pub fn should_alert_latency(&self, url: &str, latency_ms: u64) -> bool {
        let store = self.rules_store.read();
        let rule = store.find_matching_rule(url);
        latency_ms > store.effective_latency_ms_threshold(rule)
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
