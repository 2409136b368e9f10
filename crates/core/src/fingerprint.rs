// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprinter (C1): a stable 64-hex-char digest over a normalized URL,
//! status code, and error string. Used by the dedup store (C5) to decide
//! whether two scan outcomes are "the same finding happening again."

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::OnceLock;
use url::Url;

/// Compute the dedup fingerprint for a URL + optional status + optional error.
///
/// Deterministic: equal inputs produce an equal digest after normalization,
/// and errors differing only in volatile fields (timestamps, UUIDs, request
/// ids, byte addresses, source locations) normalize to the same placeholder
/// text, so repeated occurrences of "the same" failure collapse to one hash.
pub fn fingerprint(url: &str, status: Option<u16>, error: Option<&str>) -> String {
    let normalized_url = normalize_url(url);
    let status_part = status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "NO_STATUS".to_string());
    let error_part = error
        .map(normalize_error)
        .unwrap_or_else(|| "NO_ERROR".to_string());

    let payload = format!("{normalized_url}::{status_part}::{error_part}");
    hex_sha256(payload.as_bytes())
}

/// Fingerprint for a successful-but-slow response. Buckets latency into
/// 100ms windows so jittery repeats of the same slow endpoint collapse to
/// one fingerprint (Testable Property 2).
pub fn latency_fingerprint(url: &str, latency_ms: u64) -> String {
    let bucket = (latency_ms / 100) * 100;
    fingerprint(url, None, Some(&format!("LATENCY_{bucket}ms")))
}

/// Retain scheme + host + path, dropping query and fragment, lowercasing the
/// host, and dropping a single trailing `/` unless the path is empty.
pub fn normalize_url(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return raw.trim().to_lowercase();
    };

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let mut path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    match parsed.port() {
        Some(port) if !is_default_port(scheme, port) => {
            format!("{scheme}://{host}:{port}{path}")
        }
        _ => format!("{scheme}://{host}{path}"),
    }
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

/// Replace volatile substrings (timestamps, UUIDs, hex addresses, numeric
/// ids, `path:line` tokens) with stable placeholders, collapse whitespace,
/// and recognize a handful of well-known error shapes that get their own
/// fixed token instead of a normalized free-text string.
pub fn normalize_error(error: &str) -> String {
    let trimmed = error.trim();
    let lower = trimmed.to_lowercase();

    if lower == "timeout" || lower.contains("etimedout") || lower.contains("timed out") {
        return "TIMEOUT".to_string();
    }
    if lower.contains("econnrefused")
        || lower.contains("enotfound")
        || lower.contains("econnreset")
        || lower.contains("network error")
    {
        return "NETWORK_ERROR".to_string();
    }
    if let Some(caps) = http_status_re().captures(trimmed) {
        return format!("HTTP_{}", &caps[1]);
    }

    let mut normalized = trimmed.to_string();
    normalized = iso8601_re().replace_all(&normalized, "<TIMESTAMP>").into_owned();
    normalized = uuid_re().replace_all(&normalized, "<UUID>").into_owned();
    normalized = hex_addr_re().replace_all(&normalized, "<ADDR>").into_owned();
    normalized = numeric_id_re()
        .replace_all(&normalized, "id: <ID>")
        .into_owned();
    normalized = path_line_re()
        .replace_all(&normalized, "<LOCATION>")
        .into_owned();
    collapse_whitespace(&normalized)
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Allow expect here as each regex below is a compile-time constant pattern
// verified valid by its own unit test coverage.
#[allow(clippy::expect_used)]
fn http_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)HTTP[_ ](\d{3})").expect("constant regex pattern is valid"))
}

#[allow(clippy::expect_used)]
fn iso8601_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?")
            .expect("constant regex pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("constant regex pattern is valid")
    })
}

#[allow(clippy::expect_used)]
fn hex_addr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"0x[0-9a-fA-F]+").expect("constant regex pattern is valid"))
}

#[allow(clippy::expect_used)]
fn numeric_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)id:\s*\d{3,}").expect("constant regex pattern is valid"))
}

#[allow(clippy::expect_used)]
fn path_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w./\\-]*[./][\w-]+:\d+").expect("constant regex pattern is valid"))
}

fn hex_sha256(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
