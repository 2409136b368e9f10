// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The render queue's browser-capture seam. Production wires this to an
//! external headless-browser process; tests drive [`InMemoryRenderAdapter`]
//! with pre-programmed outcomes, the same shape as
//! `bc_adapters::InMemoryFetchAdapter`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub timeout_ms: u64,
    pub wait_until: WaitUntil,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            wait_until: WaitUntil::Load,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOutput {
    pub screenshot: Vec<u8>,
    pub har: Vec<u8>,
    pub html: String,
    pub console_logs: Vec<String>,
}

#[derive(Debug, Error, Clone)]
pub enum CaptureError {
    #[error("capture timed out after {0:?}")]
    Timeout(Duration),
    #[error("capture failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait RenderAdapter: Send + Sync + 'static {
    async fn capture(&self, url: &str, options: &RenderOptions) -> Result<CaptureOutput, CaptureError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureRequestBody<'a> {
    url: &'a str,
    timeout_ms: u64,
    wait_until: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureResponseBody {
    screenshot_base64: String,
    har_base64: String,
    html: String,
    #[serde(default)]
    console_logs: Vec<String>,
}

/// Production adapter: posts a capture request to the external headless
/// browser process at `BROWSER_CAPTURE_URL` (§5/§9 place the browser process
/// itself out of scope; this is the HTTP boundary to it) and decodes its
/// base64-encoded screenshot/HAR payload.
pub struct HttpRenderAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RenderAdapter for HttpRenderAdapter {
    async fn capture(&self, url: &str, options: &RenderOptions) -> Result<CaptureOutput, CaptureError> {
        let wait_until = match options.wait_until {
            WaitUntil::Load => "load",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::NetworkIdle => "networkidle",
        };
        let body = CaptureRequestBody { url, timeout_ms: options.timeout_ms, wait_until };

        let resp = self
            .client
            .post(&self.base_url)
            .timeout(Duration::from_millis(options.timeout_ms + 5_000))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CaptureError::Timeout(Duration::from_millis(options.timeout_ms))
                } else {
                    CaptureError::Failed(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(CaptureError::Failed(format!("capture service returned status {}", resp.status())));
        }

        let parsed: CaptureResponseBody = resp.json().await.map_err(|e| CaptureError::Failed(e.to_string()))?;
        let screenshot = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &parsed.screenshot_base64)
            .map_err(|e| CaptureError::Failed(format!("invalid screenshot encoding: {e}")))?;
        let har = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &parsed.har_base64)
            .map_err(|e| CaptureError::Failed(format!("invalid HAR encoding: {e}")))?;

        Ok(CaptureOutput { screenshot, har, html: parsed.html, console_logs: parsed.console_logs })
    }
}

/// In-memory stub: queued outcomes by URL, consumed in order, last one
/// repeats once exhausted. Mirrors `InMemoryFetchAdapter`'s call-recording
/// shape so render-queue tests read the same way fetcher tests do.
#[derive(Default)]
pub struct InMemoryRenderAdapter {
    responses: parking_lot::Mutex<HashMap<String, Vec<Result<CaptureOutput, CaptureError>>>>,
    calls: parking_lot::Mutex<HashMap<String, u32>>,
}

impl InMemoryRenderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, url: impl Into<String>, outcomes: Vec<Result<CaptureOutput, CaptureError>>) {
        self.responses.lock().insert(url.into(), outcomes);
    }

    pub fn call_count(&self, url: &str) -> u32 {
        *self.calls.lock().get(url).unwrap_or(&0)
    }
}

#[async_trait]
impl RenderAdapter for InMemoryRenderAdapter {
    async fn capture(&self, url: &str, _options: &RenderOptions) -> Result<CaptureOutput, CaptureError> {
        *self.calls.lock().entry(url.to_string()).or_insert(0) += 1;
        let mut responses = self.responses.lock();
        let Some(queued) = responses.get_mut(url) else {
            return Err(CaptureError::Failed(format!("no stubbed capture for {url}")));
        };
        match queued.len() {
            0 => Err(CaptureError::Failed(format!("exhausted stubbed captures for {url}"))),
            1 => queued[0].clone(),
            _ => queued.remove(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_adapter_consumes_queued_outcomes_in_order() {
        let adapter = InMemoryRenderAdapter::new();
        adapter.queue(
            "https://example.com",
            vec![
                Err(CaptureError::Failed("first attempt fails".into())),
                Ok(CaptureOutput { screenshot: vec![1], har: vec![2], html: "<html/>".into(), console_logs: vec![] }),
            ],
        );

        let first = adapter.capture("https://example.com", &RenderOptions::default()).await;
        assert!(first.is_err());
        let second = adapter.capture("https://example.com", &RenderOptions::default()).await;
        assert!(second.is_ok());
        assert_eq!(adapter.call_count("https://example.com"), 2);
    }

    #[tokio::test]
    async fn in_memory_adapter_repeats_its_last_outcome_once_exhausted() {
        let adapter = InMemoryRenderAdapter::new();
        adapter.queue(
            "https://example.com",
            vec![Ok(CaptureOutput { screenshot: vec![], har: vec![], html: String::new(), console_logs: vec![] })],
        );
        adapter.capture("https://example.com", &RenderOptions::default()).await.unwrap();
        let third = adapter.capture("https://example.com", &RenderOptions::default()).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn http_adapter_fails_closed_when_the_capture_service_is_unreachable() {
        let adapter = HttpRenderAdapter::new("http://127.0.0.1:1/capture");
        let err = adapter.capture("https://example.com", &RenderOptions::default()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Failed(_) | CaptureError::Timeout(_)));
    }
}
