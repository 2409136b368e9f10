// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn finding_id_parses_valid_uuid() {
    let raw = "550e8400-e29b-41d4-a716-446655440000";
    let id = FindingId::parse(raw).unwrap();
    assert_eq!(id.as_str(), raw);
}

#[test]
fn finding_id_rejects_malformed_uuid() {
    assert!(FindingId::parse("not-a-uuid").is_err());
}

#[test]
fn generated_ids_are_unique() {
    let a = RunId::generate();
    let b = RunId::generate();
    assert_ne!(a, b);
}

#[test]
fn id_equality_against_str() {
    let id = RunId::new("abc");
    assert_eq!(id, "abc");
    assert_eq!(id, *&"abc");
}
