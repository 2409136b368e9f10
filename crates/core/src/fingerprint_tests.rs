// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn normalize_url_drops_query_and_fragment() {
    assert_eq!(
        normalize_url("https://Example.com/a/b?x=1#frag"),
        "https://example.com/a/b"
    );
}

#[test]
fn normalize_url_drops_single_trailing_slash() {
    assert_eq!(normalize_url("https://example.com/a/"), "https://example.com/a");
    assert_eq!(normalize_url("https://example.com/"), "https://example.com");
}

#[test]
fn normalize_url_keeps_non_default_port() {
    assert_eq!(
        normalize_url("http://example.com:8080/a"),
        "http://example.com:8080/a"
    );
    assert_eq!(normalize_url("https://example.com:443/a"), "https://example.com/a");
}

#[test]
fn fingerprint_is_deterministic_for_equal_inputs() {
    let a = fingerprint("https://example.com/a", Some(500), Some("boom"));
    let b = fingerprint("https://example.com/a", Some(500), Some("boom"));
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
}

/// Scenario F from the spec: two errors embedding different UUIDs and
/// timestamps, same URL+status, must fingerprint identically.
#[test]
fn scenario_f_volatile_fields_collapse() {
    let err1 =
        "Request 550e8400-e29b-41d4-a716-446655440000 at 2025-01-01T10:00:00Z failed";
    let err2 =
        "Request 6ba7b810-9dad-11d1-80b4-00c04fd430c8 at 2025-12-31T23:59:59Z failed";
    let a = fingerprint("https://example.com/a", Some(500), Some(err1));
    let b = fingerprint("https://example.com/a", Some(500), Some(err2));
    assert_eq!(a, b);
}

#[test]
fn normalize_error_recognizes_timeout() {
    assert_eq!(normalize_error("Timeout"), "TIMEOUT");
    assert_eq!(normalize_error("connection ETIMEDOUT"), "TIMEOUT");
}

#[test]
fn normalize_error_recognizes_network_error() {
    assert_eq!(normalize_error("ECONNREFUSED by peer"), "NETWORK_ERROR");
    assert_eq!(normalize_error("DNS ENOTFOUND host"), "NETWORK_ERROR");
}

#[test]
fn normalize_error_recognizes_http_status() {
    assert_eq!(normalize_error("HTTP_503 Service Unavailable"), "HTTP_503");
    assert_eq!(normalize_error("http 502"), "HTTP_502");
}

#[test]
fn normalize_error_collapses_hex_address_and_numeric_id() {
    let msg = "fault at 0xDEADBEEF for id: 123456789";
    let normalized = normalize_error(msg);
    assert!(normalized.contains("<ADDR>"));
    assert!(normalized.contains("id: <ID>"));
}

#[test]
fn normalize_error_collapses_path_line_tokens() {
    let normalized = normalize_error("panic at src/main.rs:42");
    assert!(normalized.contains("<LOCATION>"));
}

#[test]
fn latency_fingerprint_buckets_to_100ms() {
    let a = latency_fingerprint("https://example.com/a", 1520);
    let b = latency_fingerprint("https://example.com/a", 1580);
    let c = latency_fingerprint("https://example.com/a", 1620);
    assert_eq!(a, b, "1520ms and 1580ms share the 1500ms bucket");
    assert_ne!(a, c, "1620ms falls in a different bucket");
}

proptest! {
    /// Property 1: fingerprint is a pure function of its (normalized) inputs.
    #[test]
    fn prop_fingerprint_stable_for_equal_inputs(
        host in "[a-z]{3,10}\\.com",
        path in "/[a-z]{0,8}",
        status in proptest::option::of(100u16..599),
        error in proptest::option::of("[a-zA-Z ]{0,20}"),
    ) {
        let url = format!("https://{host}{path}");
        let a = fingerprint(&url, status, error.as_deref());
        let b = fingerprint(&url, status, error.as_deref());
        prop_assert_eq!(a, b);
    }

    /// Property 2: any two latencies within the same 100ms bucket fingerprint
    /// identically.
    #[test]
    fn prop_latency_bucketing(base in 0u64..50_000, offset_a in 0u64..100, offset_b in 0u64..100) {
        let bucket_start = (base / 100) * 100;
        let a = latency_fingerprint("https://example.com/x", bucket_start + offset_a);
        let b = latency_fingerprint("https://example.com/x", bucket_start + offset_b);
        prop_assert_eq!(a, b);
    }
}
