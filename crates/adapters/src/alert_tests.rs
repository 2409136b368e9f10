// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_core::FakeClock;
use bc_kv::memory::InMemoryKv;
use parking_lot::Mutex as PlMutex;

struct RecordingSink {
    messages: PlMutex<Vec<serde_json::Value>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            messages: PlMutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl AlertSink for RecordingSink {
    async fn post(&self, message_json: &serde_json::Value) -> Result<(), AlertError> {
        self.messages.lock().push(message_json.clone());
        Ok(())
    }
}

fn payload(fingerprint: &str) -> AlertPayload {
    AlertPayload {
        finding_id: FindingId::generate(),
        url: "https://example.com/checkout".to_string(),
        error_type: ErrorType::FiveXx,
        status: Some(500),
        latency_ms: 120,
        error: Some("boom".to_string()),
        timestamp_ms: 0,
        fingerprint: fingerprint.to_string(),
        is_first_seen: Some(true),
        host: "example.com".to_string(),
        path: "/checkout".to_string(),
    }
}

#[tokio::test]
async fn sends_alert_with_action_links() {
    let sink = RecordingSink::new();
    let kv = Arc::new(InMemoryKv::new(FakeClock::default()));
    let emitter = AlertEmitter::new(sink, kv, "tok123", "https://beacon.internal");
    emitter.send_alert(&payload("fp1")).await;

    let sent = emitter.sink.messages.lock();
    assert_eq!(sent.len(), 1);
    let rendered = sent[0].to_string();
    assert!(rendered.contains("tok123"));
    assert!(rendered.contains("reverify"));
    assert!(rendered.contains("suppress"));
}

#[tokio::test]
async fn suppressed_fingerprint_skips_silently() {
    let sink = RecordingSink::new();
    let kv = Arc::new(InMemoryKv::new(FakeClock::default()));
    kv.set("suppress:fp:fp1", "1", None).await.unwrap();
    let emitter = AlertEmitter::new(sink, kv, "tok123", "https://beacon.internal");
    emitter.send_alert(&payload("fp1")).await;
    assert!(emitter.sink.messages.lock().is_empty());
}
