// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robots cache (C3): fetch-and-parse `robots.txt` on miss, cache the parsed
//! rules (or an explicit "nothing there" marker) in KV for 600 seconds.
//! Any fetch or parse failure fails open (allow).

use async_trait::async_trait;
use bc_kv::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const CACHE_TTL: Duration = Duration::from_secs(600);
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("kv error: {0}")]
    Kv(#[from] bc_kv::KvError),
}

/// Fetches the raw contents of `<origin>/robots.txt`. Production uses HTTP;
/// tests supply canned bodies.
#[async_trait]
pub trait RobotsFetcher: Send + Sync + 'static {
    /// Returns `Ok(None)` when the origin has no robots.txt (404 or similar).
    async fn fetch_robots_txt(&self, origin: &str) -> Result<Option<String>, RobotsError>;
}

/// Production fetcher: a direct HTTP GET with a 5-second timeout.
pub struct ReqwestRobotsFetcher {
    client: reqwest::Client,
}

impl ReqwestRobotsFetcher {
    pub fn new() -> Result<Self, RobotsError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| RobotsError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Default for ReqwestRobotsFetcher {
    fn default() -> Self {
        // A Client with no timeout is still a valid (if degenerate) fallback;
        // construction only fails on TLS backend init, which `new()` surfaces.
        Self::new().unwrap_or_else(|_| Self {
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl RobotsFetcher for ReqwestRobotsFetcher {
    async fn fetch_robots_txt(&self, origin: &str) -> Result<Option<String>, RobotsError> {
        let url = format!("{}/robots.txt", origin.trim_end_matches('/'));
        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => return Err(RobotsError::Fetch(e.to_string())),
        };
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(RobotsError::Fetch(format!("status {}", resp.status())));
        }
        resp.text().await.map(Some).map_err(|e| RobotsError::Fetch(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Directive {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RobotsRule {
    directive: Directive,
    path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Group {
    user_agents: Vec<String>,
    rules: Vec<RobotsRule>,
}

/// Parsed robots.txt, cached as JSON. `None` (the outer `Option` in the
/// cache) means "no robots.txt at this origin", which allows everything.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParsedRobots {
    groups: Vec<Group>,
}

impl ParsedRobots {
    pub fn parse(body: &str) -> Self {
        let mut groups: Vec<Group> = Vec::new();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules: Vec<RobotsRule> = Vec::new();
        let mut in_group = false;

        let flush = |groups: &mut Vec<Group>, agents: &mut Vec<String>, rules: &mut Vec<RobotsRule>| {
            if !agents.is_empty() {
                groups.push(Group {
                    user_agents: std::mem::take(agents),
                    rules: std::mem::take(rules),
                });
            }
        };

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim().to_string();
            match key.as_str() {
                "user-agent" => {
                    if in_group && !current_rules.is_empty() {
                        flush(&mut groups, &mut current_agents, &mut current_rules);
                        in_group = false;
                    }
                    current_agents.push(value.to_lowercase());
                    in_group = true;
                }
                "disallow" => {
                    in_group = true;
                    current_rules.push(RobotsRule {
                        directive: Directive::Disallow,
                        path: value,
                    });
                }
                "allow" => {
                    in_group = true;
                    current_rules.push(RobotsRule {
                        directive: Directive::Allow,
                        path: value,
                    });
                }
                _ => {}
            }
        }
        flush(&mut groups, &mut current_agents, &mut current_rules);
        Self { groups }
    }

    /// Selects the group for `user_agent`, falling back to `*`.
    fn group_for(&self, user_agent: &str) -> Option<&Group> {
        let ua = user_agent.to_lowercase();
        self.groups
            .iter()
            .find(|g| g.user_agents.iter().any(|a| a == &ua))
            .or_else(|| self.groups.iter().find(|g| g.user_agents.iter().any(|a| a == "*")))
    }

    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        let Some(group) = self.group_for(user_agent) else {
            return true;
        };
        let allowed = group
            .rules
            .iter()
            .any(|r| r.directive == Directive::Allow && !r.path.is_empty() && path.starts_with(&r.path));
        if allowed {
            return true;
        }
        let disallowed = group
            .rules
            .iter()
            .any(|r| r.directive == Directive::Disallow && !r.path.is_empty() && path.starts_with(&r.path));
        !disallowed
    }
}

fn origin_and_path(url: &str) -> Option<(String, String)> {
    let parsed = url::Url::parse(url).ok()?;
    let origin = parsed.origin().unicode_serialization();
    let path = if parsed.path().is_empty() { "/".to_string() } else { parsed.path().to_string() };
    Some((origin, path))
}

/// Caches parsed robots.txt per origin in KV for 600 seconds.
pub struct RobotsCache<F: RobotsFetcher, K: KvStore> {
    fetcher: F,
    kv: Arc<K>,
}

impl<F: RobotsFetcher, K: KvStore> RobotsCache<F, K> {
    pub fn new(fetcher: F, kv: Arc<K>) -> Self {
        Self { fetcher, kv }
    }

    fn cache_key(origin: &str) -> String {
        format!("robots:{origin}")
    }

    async fn load(&self, origin: &str) -> Option<ParsedRobots> {
        let key = Self::cache_key(origin);
        if let Ok(Some(cached)) = self.kv.get(&key).await {
            return if cached == "NONE" {
                None
            } else {
                serde_json::from_str(&cached).ok()
            };
        }

        let fetched = match self.fetcher.fetch_robots_txt(origin).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(origin, error = %e, "robots.txt fetch failed, failing open");
                return None;
            }
        };

        match fetched {
            Some(body) => {
                let parsed = ParsedRobots::parse(&body);
                if let Ok(serialized) = serde_json::to_string(&parsed) {
                    let _ = self.kv.set(&key, &serialized, Some(CACHE_TTL)).await;
                }
                Some(parsed)
            }
            None => {
                let _ = self.kv.set(&key, "NONE", Some(CACHE_TTL)).await;
                None
            }
        }
    }

    /// `isAllowedByRobots(url, userAgent)`. Any missing robots.txt, fetch
    /// error, or parse error allows the request.
    pub async fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let Some((origin, path)) = origin_and_path(url) else {
            return true;
        };
        match self.load(&origin).await {
            Some(parsed) => parsed.is_allowed(&path, user_agent),
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "robots_tests.rs"]
mod tests;
