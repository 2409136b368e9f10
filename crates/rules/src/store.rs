// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rules store (C4): loads and validates a rules document from disk, and
//! answers per-URL effective-value and maintenance-window questions.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read rules file: {0}")]
    Io(String),
    #[error("failed to parse rules document: {0}")]
    Parse(String),
    #[error("rule {0:?} has an empty id")]
    EmptyId(usize),
    #[error("rule {0} has an uncompilable pattern: {1}")]
    BadPattern(String, String),
    #[error("maintenance window in rule {0} has start >= end")]
    BadWindow(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default)]
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub latency_ms_threshold: u64,
    #[serde(default)]
    pub respect_robots: bool,
    #[serde(default)]
    pub suppress_during_maintenance: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    pub id: String,
    pub pattern: String,
    pub cooldown_seconds: Option<u64>,
    pub latency_ms_threshold: Option<u64>,
    pub respect_robots: Option<bool>,
    #[serde(default)]
    pub maintenance: Option<Vec<MaintenanceWindow>>,
    pub suppress_during_maintenance: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    pub defaults: Defaults,
    pub rules: Vec<RawRule>,
}

/// A rule with its pattern pre-compiled.
pub struct Rule {
    pub id: String,
    pattern: Regex,
    pub cooldown_seconds: Option<u64>,
    pub latency_ms_threshold: Option<u64>,
    pub respect_robots: Option<bool>,
    pub maintenance: Vec<MaintenanceWindow>,
    pub suppress_during_maintenance: Option<bool>,
}

impl Rule {
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

/// Validated, compiled rules document (C4).
pub struct RulesStore {
    pub defaults: Defaults,
    pub rules: Vec<Rule>,
}

impl RulesStore {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RulesError::Io(e.to_string()))?;
        Self::load_from_str(&raw)
    }

    pub fn load_from_str(raw: &str) -> Result<Self, RulesError> {
        let doc: RawDocument = serde_json::from_str(raw).map_err(|e| RulesError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    fn from_document(doc: RawDocument) -> Result<Self, RulesError> {
        let mut rules = Vec::with_capacity(doc.rules.len());
        for (idx, raw) in doc.rules.into_iter().enumerate() {
            if raw.id.trim().is_empty() {
                return Err(RulesError::EmptyId(idx));
            }
            let pattern = Regex::new(&raw.pattern).map_err(|e| RulesError::BadPattern(raw.id.clone(), e.to_string()))?;
            let maintenance = raw.maintenance.unwrap_or_default();
            for window in &maintenance {
                if window.start >= window.end {
                    return Err(RulesError::BadWindow(raw.id.clone()));
                }
            }
            rules.push(Rule {
                id: raw.id,
                pattern,
                cooldown_seconds: raw.cooldown_seconds,
                latency_ms_threshold: raw.latency_ms_threshold,
                respect_robots: raw.respect_robots,
                maintenance,
                suppress_during_maintenance: raw.suppress_during_maintenance,
            });
        }
        Ok(Self {
            defaults: doc.defaults,
            rules,
        })
    }

    /// `findMatchingRule(url)`: first rule (in document order) whose pattern
    /// matches, or `None`.
    pub fn find_matching_rule(&self, url: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(url))
    }

    pub fn effective_cooldown_seconds(&self, rule: Option<&Rule>) -> u64 {
        rule.and_then(|r| r.cooldown_seconds).unwrap_or(self.defaults.cooldown_seconds)
    }

    pub fn effective_latency_ms_threshold(&self, rule: Option<&Rule>) -> u64 {
        rule.and_then(|r| r.latency_ms_threshold)
            .unwrap_or(self.defaults.latency_ms_threshold)
    }

    pub fn effective_respect_robots(&self, rule: Option<&Rule>) -> bool {
        rule.and_then(|r| r.respect_robots).unwrap_or(self.defaults.respect_robots)
    }

    fn effective_suppress_during_maintenance(&self, rule: Option<&Rule>) -> bool {
        rule.and_then(|r| r.suppress_during_maintenance)
            .unwrap_or(self.defaults.suppress_during_maintenance)
    }

    /// `isInMaintenanceWindow(rule)`: true iff `now` falls in any of the
    /// rule's maintenance windows.
    pub fn is_in_maintenance_window(&self, rule: &Rule, now: DateTime<Utc>) -> bool {
        rule.maintenance.iter().any(|w| now >= w.start && now < w.end)
    }

    /// `shouldSuppressDuringMaintenance(rule)` = in-window AND the effective
    /// suppress flag.
    pub fn should_suppress_during_maintenance(&self, rule: Option<&Rule>, now: DateTime<Utc>) -> bool {
        let Some(rule) = rule else {
            return false;
        };
        self.is_in_maintenance_window(rule, now) && self.effective_suppress_during_maintenance(Some(rule))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
