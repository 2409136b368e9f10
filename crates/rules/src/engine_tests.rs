// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_core::FakeClock;
use bc_kv::memory::InMemoryKv;
use crate::robots::RobotsError;
use std::collections::HashMap;

struct StubRobots(HashMap<String, Option<String>>);

#[async_trait::async_trait]
impl RobotsFetcher for StubRobots {
    async fn fetch_robots_txt(&self, origin: &str) -> Result<Option<String>, RobotsError> {
        Ok(self.0.get(origin).cloned().flatten())
    }
}

fn no_robots() -> StubRobots {
    StubRobots(HashMap::new())
}

const DOC: &str = r#"{
  "defaults": {"cooldownSeconds": 60, "latencyMsThreshold": 1000, "respectRobots": false, "suppressDuringMaintenance": true},
  "rules": [{"id": "default", "pattern": ".*"}]
}"#;

fn engine(allow_patterns: Vec<String>, doc: &str, robots: StubRobots) -> RulesEngine<StubRobots, InMemoryKv<FakeClock>, FakeClock> {
    let clock = Arc::new(FakeClock::default());
    let kv = Arc::new(InMemoryKv::new((*clock).clone()));
    let store = RulesStore::load_from_str(doc).unwrap();
    RulesEngine::new(AllowList::new(allow_patterns), RobotsCache::new(robots, kv.clone()), store, kv, clock)
}

#[tokio::test]
async fn allowlist_suppresses_urls_outside_the_list() {
    let eng = engine(vec!["https://allowed.example.com/*".to_string()], DOC, no_robots());
    let result = eng
        .check_suppression("https://other.example.com/x", ErrorType::FiveXx, Some(500), None, None)
        .await;
    assert!(result.suppressed);
    assert_eq!(result.reason, Some("allowlist"));
}

#[tokio::test]
async fn maintenance_window_suppresses_before_robots_and_cooldown() {
    let doc = r#"{
      "defaults": {"suppressDuringMaintenance": true},
      "rules": [{
        "id": "r1", "pattern": ".*", "respectRobots": true,
        "maintenance": [{"start": "2023-11-14T21:00:00Z", "end": "2023-11-16T21:00:00Z"}]
      }]
    }"#;
    let eng = engine(vec![], doc, no_robots());
    let result = eng
        .check_suppression("https://example.com/x", ErrorType::FiveXx, Some(500), None, None)
        .await;
    assert!(result.suppressed);
    assert_eq!(result.reason, Some("maintenance"));
}

#[tokio::test]
async fn robots_disallow_suppresses_when_rule_respects_it() {
    let doc = r#"{"defaults": {"respectRobots": true}, "rules": [{"id": "r1", "pattern": ".*"}]}"#;
    let mut bodies = HashMap::new();
    bodies.insert(
        "https://example.com".to_string(),
        Some("User-agent: *\nDisallow: /\n".to_string()),
    );
    let eng = engine(vec![], doc, StubRobots(bodies));
    let result = eng
        .check_suppression("https://example.com/x", ErrorType::FiveXx, Some(500), None, None)
        .await;
    assert!(result.suppressed);
    assert_eq!(result.reason, Some("robots"));
}

#[tokio::test]
async fn first_occurrence_records_and_is_not_suppressed() {
    let eng = engine(vec![], DOC, no_robots());
    let result = eng
        .check_suppression("https://example.com/x", ErrorType::FiveXx, Some(500), Some("boom"), None)
        .await;
    assert!(!result.suppressed);
    assert!(result.fingerprint.is_some());
}

#[tokio::test]
async fn repeated_occurrence_is_suppressed_by_cooldown() {
    let eng = engine(vec![], DOC, no_robots());
    let first = eng
        .check_suppression("https://example.com/x", ErrorType::FiveXx, Some(500), Some("boom"), None)
        .await;
    assert!(!first.suppressed);
    let second = eng
        .check_suppression("https://example.com/x", ErrorType::FiveXx, Some(500), Some("boom"), None)
        .await;
    assert!(second.suppressed);
    assert_eq!(second.reason, Some("cooldown"));
    assert_eq!(second.fingerprint, first.fingerprint);
}

#[tokio::test]
async fn latency_error_type_uses_latency_fingerprint_bucketing() {
    let eng = engine(vec![], DOC, no_robots());
    let first = eng
        .check_suppression("https://example.com/x", ErrorType::Latency, None, None, Some(2150))
        .await;
    assert!(!first.suppressed);
    let second = eng
        .check_suppression("https://example.com/x", ErrorType::Latency, None, None, Some(2180))
        .await;
    assert!(second.suppressed, "2150ms and 2180ms share a 100ms bucket");
}

#[test]
fn should_alert_latency_compares_against_effective_threshold() {
    let eng = engine(vec![], DOC, no_robots());
    assert!(eng.should_alert_latency("https://example.com/x", 1500));
    assert!(!eng.should_alert_latency("https://example.com/x", 500));
}
