// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allow-list matcher (C2): case-insensitive `*`-glob patterns, empty list
//! allows everything, reload swaps the list atomically.

use parking_lot::RwLock;
use wildmatch::WildMatch;

/// `*`-glob allow-list, reloadable without downtime.
pub struct AllowList {
    patterns: RwLock<Vec<WildMatch>>,
}

impl AllowList {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: RwLock::new(Self::compile(patterns)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn compile(patterns: Vec<String>) -> Vec<WildMatch> {
        patterns.iter().map(|p| WildMatch::new(&p.to_lowercase())).collect()
    }

    /// An empty allow-list allows everything, matching the "no restriction
    /// configured" default rather than "deny all".
    pub fn is_allowed(&self, url: &str) -> bool {
        let patterns = self.patterns.read();
        if patterns.is_empty() {
            return true;
        }
        let candidate = url.to_lowercase();
        patterns.iter().any(|p| p.matches(&candidate))
    }

    /// Atomically replaces the pattern set.
    pub fn reload(&self, patterns: Vec<String>) {
        *self.patterns.write() = Self::compile(patterns);
    }

    pub fn loaded_patterns_len(&self) -> usize {
        self.patterns.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allow_list_allows_everything() {
        let list = AllowList::empty();
        assert!(list.is_allowed("https://anything.example.com/path"));
    }

    #[test]
    fn wildcard_matches_case_insensitively() {
        let list = AllowList::new(vec!["https://*.Example.com/*".to_string()]);
        assert!(list.is_allowed("https://sub.example.com/path"));
        assert!(list.is_allowed("HTTPS://SUB.EXAMPLE.COM/PATH"));
        assert!(!list.is_allowed("https://other.com/path"));
    }

    #[test]
    fn reload_replaces_patterns_atomically() {
        let list = AllowList::new(vec!["https://a.example.com/*".to_string()]);
        assert!(list.is_allowed("https://a.example.com/x"));
        list.reload(vec!["https://b.example.com/*".to_string()]);
        assert!(!list.is_allowed("https://a.example.com/x"));
        assert!(list.is_allowed("https://b.example.com/x"));
    }
}
