// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Re-verify coordinator (C11): idempotency-windowed, rate-limited
//! re-enqueue of a scan job for an existing Finding. Fail-open on KV errors
//! in the idempotency/rate-limit paths — a flaky KV must not block an
//! operator's re-verification (§4.11, §7).

use crate::queue::ScanEnqueuer;
use bc_core::{Clock, FindingId, ReverifyAttempt, ReverifyAttemptId, ReverifyResult, ReverifySource};
use bc_kv::KvStore;
use bc_store::Store;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(120);
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(3600);
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 5;

#[derive(Debug, Clone)]
pub struct ReverifyRequest {
    pub finding_id: FindingId,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub source: ReverifySource,
}

#[derive(Debug, Clone)]
pub struct ReverifyOutcome {
    pub ok: bool,
    pub result: ReverifyResult,
    pub job_id: Option<bc_core::JobId>,
    pub remaining_attempts: Option<u32>,
    pub message: Option<String>,
}

impl ReverifyOutcome {
    fn not_found() -> Self {
        Self {
            ok: false,
            result: ReverifyResult::NotFound,
            job_id: None,
            remaining_attempts: None,
            message: Some("finding not found".to_string()),
        }
    }

    fn duplicate(job_id: bc_core::JobId) -> Self {
        Self {
            ok: true,
            result: ReverifyResult::Duplicate,
            job_id: Some(job_id),
            remaining_attempts: None,
            message: None,
        }
    }

    fn rate_limited() -> Self {
        Self {
            ok: false,
            result: ReverifyResult::RateLimited,
            job_id: None,
            remaining_attempts: Some(0),
            message: Some("rate limit exceeded".to_string()),
        }
    }

    fn ok(job_id: bc_core::JobId, remaining_attempts: u32) -> Self {
        Self {
            ok: true,
            result: ReverifyResult::Ok,
            job_id: Some(job_id),
            remaining_attempts: Some(remaining_attempts),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: ReverifyResult::Error,
            job_id: None,
            remaining_attempts: None,
            message: Some(message.into()),
        }
    }
}

pub struct ReverifyCoordinator<St: Store, K: KvStore, C: Clock, SQ: ScanEnqueuer> {
    store: Arc<St>,
    kv: Arc<K>,
    clock: Arc<C>,
    scan_queue: Arc<SQ>,
    idempotency_ttl: Duration,
    rate_limit_window: Duration,
    rate_limit_max: u32,
}

impl<St: Store, K: KvStore, C: Clock, SQ: ScanEnqueuer> ReverifyCoordinator<St, K, C, SQ> {
    pub fn new(store: Arc<St>, kv: Arc<K>, clock: Arc<C>, scan_queue: Arc<SQ>) -> Self {
        Self {
            store,
            kv,
            clock,
            scan_queue,
            idempotency_ttl: DEFAULT_IDEMPOTENCY_TTL,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
        }
    }

    pub fn with_limits(mut self, idempotency_ttl: Duration, rate_limit_window: Duration, rate_limit_max: u32) -> Self {
        self.idempotency_ttl = idempotency_ttl;
        self.rate_limit_window = rate_limit_window;
        self.rate_limit_max = rate_limit_max;
        self
    }

    fn idempotency_key(finding_id: &FindingId) -> String {
        format!("reverify:idempotency:{finding_id}")
    }

    fn rate_key(finding_id: &FindingId) -> String {
        format!("reverify:count:{finding_id}")
    }

    async fn record_attempt(&self, req: &ReverifyRequest, result: ReverifyResult, job_id: Option<bc_core::JobId>) {
        let attempt = ReverifyAttempt {
            id: ReverifyAttemptId::generate(),
            finding_id: req.finding_id.clone(),
            requested_at_ms: self.clock.epoch_ms(),
            requester_ip: req.ip.clone(),
            requester_user_agent: req.user_agent.clone(),
            source: req.source,
            result,
            job_id,
        };
        if let Err(e) = self.store.insert_reverify_attempt(attempt).await {
            tracing::warn!(finding_id = %req.finding_id, error = %e, "failed to record reverify attempt");
        }
    }

    /// `reverifyFinding({findingId, ip?, userAgent?, source})`.
    pub async fn reverify(&self, req: ReverifyRequest) -> ReverifyOutcome {
        let finding = match self.store.get_finding(&req.finding_id).await {
            Ok(Some(finding)) => finding,
            Ok(None) => return ReverifyOutcome::not_found(),
            Err(e) => {
                tracing::warn!(finding_id = %req.finding_id, error = %e, "store error loading finding for reverify");
                return ReverifyOutcome::error(format!("store error: {e}"));
            }
        };

        let idempotency_key = Self::idempotency_key(&req.finding_id);
        match self.kv.get(&idempotency_key).await {
            Ok(Some(existing_job_id)) => {
                let job_id = bc_core::JobId::new(existing_job_id);
                self.record_attempt(&req, ReverifyResult::Duplicate, Some(job_id.clone())).await;
                return ReverifyOutcome::duplicate(job_id);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(finding_id = %req.finding_id, error = %e, "idempotency check failed, failing open");
            }
        }

        let rate_key = Self::rate_key(&req.finding_id);
        let current: i64 = match self.kv.get(&rate_key).await {
            Ok(Some(raw)) => raw.parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(finding_id = %req.finding_id, error = %e, "rate limit check failed, failing open");
                0
            }
        };
        if current >= self.rate_limit_max as i64 {
            self.record_attempt(&req, ReverifyResult::RateLimited, None).await;
            return ReverifyOutcome::rate_limited();
        }

        let new_count = match self.kv.incr(&rate_key).await {
            Ok(count) => {
                if count == 1 {
                    if let Err(e) = self.kv.expire(&rate_key, self.rate_limit_window).await {
                        tracing::warn!(finding_id = %req.finding_id, error = %e, "failed to arm rate limit window expiry");
                    }
                }
                count
            }
            Err(e) => {
                tracing::warn!(finding_id = %req.finding_id, error = %e, "rate limit increment failed, failing open");
                current + 1
            }
        };

        let job_id = match self.scan_queue.enqueue_scan(finding.id.clone(), finding.url.clone()).await {
            Ok(job_id) => job_id,
            Err(_) => {
                self.record_attempt(&req, ReverifyResult::Error, None).await;
                return ReverifyOutcome::error("scan queue closed");
            }
        };

        if let Err(e) = self.kv.set(&idempotency_key, job_id.as_str(), Some(self.idempotency_ttl)).await {
            tracing::warn!(finding_id = %req.finding_id, error = %e, "failed to arm idempotency window");
        }

        self.record_attempt(&req, ReverifyResult::Ok, Some(job_id.clone())).await;

        let remaining = (self.rate_limit_max as i64 - new_count).max(0) as u32;
        ReverifyOutcome::ok(job_id, remaining)
    }
}

#[cfg(test)]
#[path = "reverify_tests.rs"]
mod tests;
