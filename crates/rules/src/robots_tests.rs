// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_kv::memory::InMemoryKv;
use bc_core::FakeClock;
use parking_lot::Mutex as PlMutex;
use std::collections::HashMap;

struct FakeFetcher {
    bodies: PlMutex<HashMap<String, Option<String>>>,
    calls: PlMutex<u32>,
}

impl FakeFetcher {
    fn new(bodies: HashMap<String, Option<String>>) -> Self {
        Self {
            bodies: PlMutex::new(bodies),
            calls: PlMutex::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait::async_trait]
impl RobotsFetcher for FakeFetcher {
    async fn fetch_robots_txt(&self, origin: &str) -> Result<Option<String>, RobotsError> {
        *self.calls.lock() += 1;
        Ok(self.bodies.lock().get(origin).cloned().flatten())
    }
}

fn kv() -> Arc<InMemoryKv<FakeClock>> {
    Arc::new(InMemoryKv::new(FakeClock::default()))
}

#[test]
fn parses_allow_and_disallow_for_matching_ua() {
    let robots = ParsedRobots::parse(
        "User-agent: *\nDisallow: /private\nAllow: /private/public-page\n",
    );
    assert!(!robots.is_allowed("/private/secret", "*"));
    assert!(robots.is_allowed("/private/public-page", "*"));
    assert!(robots.is_allowed("/anything-else", "*"));
}

#[test]
fn disallow_root_blocks_everything() {
    let robots = ParsedRobots::parse("User-agent: *\nDisallow: /\n");
    assert!(!robots.is_allowed("/", "*"));
    assert!(!robots.is_allowed("/page", "*"));
}

#[test]
fn allow_prefix_takes_precedence_over_disallow() {
    let robots = ParsedRobots::parse("User-agent: *\nDisallow: /\nAllow: /ok\n");
    assert!(robots.is_allowed("/ok/page", "*"));
    assert!(!robots.is_allowed("/blocked", "*"));
}

#[test]
fn falls_back_to_wildcard_ua_section() {
    let robots = ParsedRobots::parse("User-agent: Googlebot\nDisallow: /only-google\n\nUser-agent: *\nDisallow: /everyone\n");
    assert!(!robots.is_allowed("/everyone", "scanner-bot"));
    assert!(robots.is_allowed("/only-google", "scanner-bot"));
}

#[tokio::test]
async fn missing_robots_txt_allows_and_caches_negative_result() {
    let mut bodies = HashMap::new();
    bodies.insert("https://example.com".to_string(), None);
    let fetcher = FakeFetcher::new(bodies);
    let cache = RobotsCache::new(fetcher, kv());

    assert!(cache.is_allowed("https://example.com/anything", "*").await);
    assert!(cache.is_allowed("https://example.com/anything", "*").await);
    assert_eq!(cache.fetcher.call_count(), 1, "second lookup should hit the cache");
}

#[tokio::test]
async fn disallowed_path_is_blocked_and_cached() {
    let mut bodies = HashMap::new();
    bodies.insert(
        "https://example.com".to_string(),
        Some("User-agent: *\nDisallow: /blocked\n".to_string()),
    );
    let fetcher = FakeFetcher::new(bodies);
    let cache = RobotsCache::new(fetcher, kv());

    assert!(!cache.is_allowed("https://example.com/blocked/x", "*").await);
    assert!(cache.is_allowed("https://example.com/ok", "*").await);
    assert_eq!(cache.fetcher.call_count(), 1);
}

#[tokio::test]
async fn fetch_error_fails_open() {
    struct FailingFetcher;
    #[async_trait::async_trait]
    impl RobotsFetcher for FailingFetcher {
        async fn fetch_robots_txt(&self, _origin: &str) -> Result<Option<String>, RobotsError> {
            Err(RobotsError::Fetch("boom".to_string()))
        }
    }
    let cache = RobotsCache::new(FailingFetcher, kv());
    assert!(cache.is_allowed("https://example.com/blocked", "*").await);
}
