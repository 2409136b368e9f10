// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alert emitter (C12): posts a structured message to the configured chat
//! webhook, carrying re-verify and suppress-24h action links. Never blocks
//! the caller's flow — webhook failures are logged and dropped.

use async_trait::async_trait;
use bc_core::FindingId;
use bc_kv::KvStore;
use bc_rules::ErrorType;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("webhook post failed: {0}")]
    Post(String),
}

/// Everything C12 needs to format and dedupe a single alert.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub finding_id: FindingId,
    pub url: String,
    pub error_type: ErrorType,
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub timestamp_ms: i64,
    pub fingerprint: String,
    pub is_first_seen: Option<bool>,
    pub host: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
    blocks: Vec<serde_json::Value>,
}

/// Posts a pre-formatted message to a chat webhook. Production implements
/// this over HTTP; tests record messages instead of sending them.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn post(&self, message_json: &serde_json::Value) -> Result<(), AlertError>;
}

pub struct ReqwestAlertSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl ReqwestAlertSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl AlertSink for ReqwestAlertSink {
    async fn post(&self, message_json: &serde_json::Value) -> Result<(), AlertError> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .timeout(Duration::from_secs(10))
            .json(message_json)
            .send()
            .await
            .map_err(|e| AlertError::Post(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AlertError::Post(format!("status {}", resp.status())));
        }
        Ok(())
    }
}

fn emoji_for(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::FiveXx => ":rotating_light:",
        ErrorType::Latency => ":snail:",
        ErrorType::Timeout => ":hourglass:",
        ErrorType::Network => ":satellite_antenna:",
    }
}

fn label_for(error_type: ErrorType) -> &'static str {
    match error_type {
        ErrorType::FiveXx => "5xx error",
        ErrorType::Latency => "latency threshold exceeded",
        ErrorType::Timeout => "timeout",
        ErrorType::Network => "network error",
    }
}

/// Webhook alert emitter (C12), composed with a dedup-aware suppression
/// check against `suppress:fp:<fingerprint>`.
pub struct AlertEmitter<S: AlertSink, K: KvStore> {
    sink: S,
    kv: Arc<K>,
    action_token: String,
    action_base_url: String,
}

impl<S: AlertSink, K: KvStore> AlertEmitter<S, K> {
    pub fn new(sink: S, kv: Arc<K>, action_token: impl Into<String>, action_base_url: impl Into<String>) -> Self {
        Self {
            sink,
            kv,
            action_token: action_token.into(),
            action_base_url: action_base_url.into(),
        }
    }

    fn suppress_key(fingerprint: &str) -> String {
        format!("suppress:fp:{fingerprint}")
    }

    /// Both action links point at `GET /api/slack/actions` (§6), the one
    /// endpoint that accepts the shared `t` token and routes on `action`.
    fn reverify_link(&self, finding_id: &FindingId) -> String {
        format!(
            "{}/api/slack/actions?action=reverify&findingId={}&t={}",
            self.action_base_url, finding_id, self.action_token
        )
    }

    fn suppress_link(&self, finding_id: &FindingId, fingerprint: &str) -> String {
        format!(
            "{}/api/slack/actions?action=suppress24h&findingId={}&fingerprint={}&t={}",
            self.action_base_url, finding_id, fingerprint, self.action_token
        )
    }

    fn format(&self, payload: &AlertPayload) -> serde_json::Value {
        let text = format!(
            "{} *{}* on `{}{}` ({})",
            emoji_for(payload.error_type),
            label_for(payload.error_type),
            payload.host,
            payload.path,
            payload.status.map(|s| s.to_string()).unwrap_or_else(|| "no status".to_string()),
        );
        serde_json::json!({
            "text": text,
            "blocks": [
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": text },
                },
                {
                    "type": "section",
                    "fields": [
                        { "type": "mrkdwn", "text": format!("*URL:*\n{}", payload.url) },
                        { "type": "mrkdwn", "text": format!("*Latency:*\n{}ms", payload.latency_ms) },
                        { "type": "mrkdwn", "text": format!("*First seen:*\n{}", payload.is_first_seen.unwrap_or(true)) },
                        { "type": "mrkdwn", "text": format!("*Fingerprint:*\n{}", payload.fingerprint) },
                    ],
                },
                {
                    "type": "actions",
                    "elements": [
                        { "type": "button", "text": { "type": "plain_text", "text": "Re-verify" }, "url": self.reverify_link(&payload.finding_id) },
                        { "type": "button", "text": { "type": "plain_text", "text": "Suppress 24h" }, "url": self.suppress_link(&payload.finding_id, &payload.fingerprint) },
                    ],
                },
            ],
        })
    }

    /// `sendAlert(payload)`. Consults `suppress:fp:<fingerprint>` first and
    /// skips silently if present. Never propagates webhook errors — they are
    /// logged and dropped so a flaky chat integration can't stall scanning.
    pub async fn send_alert(&self, payload: &AlertPayload) {
        match self.kv.exists(&Self::suppress_key(&payload.fingerprint)).await {
            Ok(true) => {
                tracing::debug!(fingerprint = %payload.fingerprint, "alert suppressed");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "suppression check failed, sending alert anyway");
            }
            Ok(false) => {}
        }

        let message = self.format(payload);
        if let Err(e) = self.sink.post(&message).await {
            tracing::warn!(finding_id = %payload.finding_id, error = %e, "alert webhook post failed");
        }
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
