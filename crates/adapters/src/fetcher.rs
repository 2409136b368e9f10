// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fetcher (C8): retrying, breaker-aware, rules-engine-integrated HTTP
//! fetch. Adapters are pluggable — a direct HTTP adapter for production and
//! an in-memory adapter for tests, both implementing [`FetchAdapter`].

use crate::alert::{AlertEmitter, AlertPayload, AlertSink};
use crate::seams::{BreakerGate, SuppressionChecker};
use async_trait::async_trait;
use bc_core::{Clock, FindingId};
use bc_kv::KvStore;
use bc_rules::ErrorType;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum FetchAdapterError {
    #[error("timeout")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("other error: {0}")]
    Other(String),
}

impl FetchAdapterError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchAdapterError::Timeout | FetchAdapterError::Network(_))
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout_ms: u64,
    pub follow_redirects: bool,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            timeout_ms: 30_000,
            follow_redirects: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<String>,
    pub headers: HashMap<String, String>,
}

/// A single HTTP attempt, independent of retry/breaker policy.
#[async_trait]
pub trait FetchAdapter: Send + Sync + 'static {
    async fn fetch_once(&self, url: &str, req: &FetchRequest) -> Result<RawResponse, FetchAdapterError>;
}

/// Production adapter: a direct HTTP request via `reqwest`.
pub struct ReqwestFetchAdapter {
    client: reqwest::Client,
}

impl ReqwestFetchAdapter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for ReqwestFetchAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchAdapter for ReqwestFetchAdapter {
    async fn fetch_once(&self, url: &str, req: &FetchRequest) -> Result<RawResponse, FetchAdapterError> {
        let method = reqwest::Method::from_bytes(req.method.as_bytes()).map_err(|e| FetchAdapterError::Other(e.to_string()))?;
        let mut builder = self.client.request(method, url).timeout(Duration::from_millis(req.timeout_ms));
        for (k, v) in &req.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = &req.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchAdapterError::Timeout
            } else if e.is_connect() {
                FetchAdapterError::Network(e.to_string())
            } else {
                FetchAdapterError::Other(e.to_string())
            }
        })?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = resp.text().await.ok();
        Ok(RawResponse { status, body, headers })
    }
}

/// In-memory stub adapter (test/through-proxy): returns canned responses by
/// URL, counting how many times each URL was requested.
#[derive(Default)]
pub struct InMemoryFetchAdapter {
    responses: parking_lot::Mutex<HashMap<String, Vec<Result<RawResponse, FetchAdapterError>>>>,
    calls: parking_lot::Mutex<HashMap<String, u32>>,
}

impl InMemoryFetchAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues outcomes for `url`, consumed in order, oldest first. Once
    /// exhausted, the last queued outcome repeats.
    pub fn queue(&self, url: impl Into<String>, outcomes: Vec<Result<RawResponse, FetchAdapterError>>) {
        self.responses.lock().insert(url.into(), outcomes);
    }

    pub fn call_count(&self, url: &str) -> u32 {
        *self.calls.lock().get(url).unwrap_or(&0)
    }
}

#[async_trait]
impl FetchAdapter for InMemoryFetchAdapter {
    async fn fetch_once(&self, url: &str, _req: &FetchRequest) -> Result<RawResponse, FetchAdapterError> {
        *self.calls.lock().entry(url.to_string()).or_insert(0) += 1;
        let mut responses = self.responses.lock();
        let Some(queued) = responses.get_mut(url) else {
            return Err(FetchAdapterError::Other(format!("no stubbed response for {url}")));
        };
        match queued.len() {
            0 => Err(FetchAdapterError::Other(format!("exhausted stubbed responses for {url}"))),
            1 => queued[0].clone(),
            _ => queued.remove(0),
        }
    }
}

impl Clone for RawResponse {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            body: self.body.clone(),
            headers: self.headers.clone(),
        }
    }
}

impl Clone for FetchAdapterError {
    fn clone(&self) -> Self {
        match self {
            FetchAdapterError::Timeout => FetchAdapterError::Timeout,
            FetchAdapterError::Network(s) => FetchAdapterError::Network(s.clone()),
            FetchAdapterError::Other(s) => FetchAdapterError::Other(s.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub request: FetchRequest,
    pub retries: u32,
    pub target_id: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request: FetchRequest::default(),
            retries: 3,
            target_id: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub error: Option<String>,
    pub latency_ms: u64,
    pub success: bool,
    pub attempts: u32,
    pub skipped: bool,
    pub reason: Option<String>,
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// `1s * 2^attempt`, doubling, capped at 20s: 1,2,4,8,16,20,20,... (§4.8 step
/// 3). Cap applies to the millisecond value so the sequence actually reaches
/// 20s instead of plateauing below it.
fn backoff_with_jitter(attempt: u32) -> Duration {
    let base_ms = 1000u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let capped_ms = base_ms.min(20_000);
    let jitter_frac = rand::rng().random_range(-0.25..=0.25);
    let jittered = (capped_ms as f64) * (1.0 + jitter_frac);
    Duration::from_millis(jittered.max(0.0) as u64)
}

/// Full C8 fetcher: breaker gate, retry/backoff, rules-engine integration,
/// and alert emission composed over a pluggable [`FetchAdapter`].
pub struct Fetcher<A: FetchAdapter, S: AlertSink, K: KvStore, C: Clock> {
    adapter: A,
    breaker: Option<Arc<dyn BreakerGate>>,
    rules: Arc<dyn SuppressionChecker>,
    alerts: AlertEmitter<S, K>,
    clock: Arc<C>,
}

impl<A: FetchAdapter, S: AlertSink, K: KvStore, C: Clock> Fetcher<A, S, K, C> {
    pub fn new(
        adapter: A,
        breaker: Option<Arc<dyn BreakerGate>>,
        rules: Arc<dyn SuppressionChecker>,
        alerts: AlertEmitter<S, K>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            adapter,
            breaker,
            rules,
            alerts,
            clock,
        }
    }

    /// `fetch(url, opts)`.
    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> FetchResult {
        if let Some(target) = &opts.target_id {
            if let Some(breaker) = &self.breaker {
                if breaker.should_skip(target).await {
                    return FetchResult {
                        status: None,
                        body: None,
                        headers: None,
                        error: None,
                        latency_ms: 0,
                        success: false,
                        attempts: 0,
                        skipped: true,
                        reason: Some("breaker_open".to_string()),
                    };
                }
            }
        }

        let max_attempts = 1 + opts.retries;
        let mut attempts = 0u32;
        let started = std::time::Instant::now();
        let mut last_error: Option<String> = None;
        let mut last_response: Option<RawResponse> = None;

        loop {
            attempts += 1;
            let attempt_started = std::time::Instant::now();
            let outcome = self.adapter.fetch_once(url, &opts.request).await;
            let attempt_latency_ms = attempt_started.elapsed().as_millis() as u64;

            let retryable = match &outcome {
                Ok(resp) => RETRYABLE_STATUSES.contains(&resp.status),
                Err(e) => e.is_retryable(),
            };

            match &outcome {
                Ok(resp) if is_success(resp.status) => {
                    last_response = Some(resp.clone());
                    last_error = None;
                    self.record_outcome(opts, true, ErrorType::FiveXx, Some(resp.status), None, attempt_latency_ms, url)
                        .await;
                    break;
                }
                Ok(resp) => {
                    last_response = Some(resp.clone());
                    last_error = Some(format!("HTTP_{}", resp.status));
                    let error_type = if resp.status >= 500 { ErrorType::FiveXx } else { ErrorType::Network };
                    self.record_outcome(opts, false, error_type, Some(resp.status), last_error.clone(), attempt_latency_ms, url)
                        .await;
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    let error_type = match e {
                        FetchAdapterError::Timeout => ErrorType::Timeout,
                        _ => ErrorType::Network,
                    };
                    self.record_outcome(opts, false, error_type, None, last_error.clone(), attempt_latency_ms, url)
                        .await;
                }
            }

            if !retryable || attempts >= max_attempts {
                break;
            }
            tokio::time::sleep(backoff_with_jitter(attempts - 1)).await;
        }

        let total_latency_ms = started.elapsed().as_millis() as u64;
        match last_response {
            Some(resp) if is_success(resp.status) => FetchResult {
                status: Some(resp.status),
                body: resp.body,
                headers: Some(resp.headers),
                error: None,
                latency_ms: total_latency_ms,
                success: true,
                attempts,
                skipped: false,
                reason: None,
            },
            Some(resp) => FetchResult {
                status: Some(resp.status),
                body: resp.body,
                headers: Some(resp.headers),
                error: last_error,
                latency_ms: total_latency_ms,
                success: false,
                attempts,
                skipped: false,
                reason: None,
            },
            None => FetchResult {
                status: None,
                body: None,
                headers: None,
                error: last_error,
                latency_ms: total_latency_ms,
                success: false,
                attempts,
                skipped: false,
                reason: None,
            },
        }
    }

    /// Records the attempt's outcome in the breaker, then (on failure)
    /// consults the rules engine and emits an alert if not suppressed.
    /// Latency alerts fire on successful responses exceeding the threshold.
    ///
    /// Per §4.8 step 4, the breaker only hears about 2xx successes and 5xx /
    /// network / timeout failures — a non-5xx 4xx (404, 401, ...) is a
    /// non-event for the breaker even though it's still alert-eligible.
    #[allow(clippy::too_many_arguments)]
    async fn record_outcome(
        &self,
        opts: &FetchOptions,
        success: bool,
        error_type: ErrorType,
        status: Option<u16>,
        error: Option<String>,
        latency_ms: u64,
        url: &str,
    ) {
        if let Some(target) = &opts.target_id {
            if let Some(breaker) = &self.breaker {
                if success {
                    breaker.record_success(target).await;
                } else if status.map(|s| s >= 500).unwrap_or(true) {
                    breaker.record_failure(target).await;
                }
            }
        }

        if success {
            if self.rules.should_alert_latency(url, latency_ms) {
                let result = self
                    .rules
                    .check_suppression(url, ErrorType::Latency, status, None, Some(latency_ms))
                    .await;
                if !result.suppressed {
                    self.alerts
                        .send_alert(&AlertPayload {
                            finding_id: FindingId::generate(),
                            url: url.to_string(),
                            error_type: ErrorType::Latency,
                            status,
                            latency_ms,
                            error: None,
                            timestamp_ms: self.clock.epoch_ms(),
                            fingerprint: result.fingerprint.unwrap_or_default(),
                            is_first_seen: None,
                            host: host_of(url),
                            path: path_of(url),
                        })
                        .await;
                }
            }
            return;
        }

        let result = self
            .rules
            .check_suppression(url, error_type, status, error.as_deref(), None)
            .await;
        if !result.suppressed {
            self.alerts
                .send_alert(&AlertPayload {
                    finding_id: FindingId::generate(),
                    url: url.to_string(),
                    error_type,
                    status,
                    latency_ms,
                    error,
                    timestamp_ms: self.clock.epoch_ms(),
                    fingerprint: result.fingerprint.unwrap_or_default(),
                    is_first_seen: None,
                    host: host_of(url),
                    path: path_of(url),
                })
                .await;
        }
    }
}

fn host_of(url: &str) -> String {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default()
}

fn path_of(url: &str) -> String {
    url::Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default()
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
