// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::KvStore;
use bc_core::FakeClock;

fn store() -> (InMemoryKv<FakeClock>, FakeClock) {
    let clock = FakeClock::default();
    (InMemoryKv::new(clock.clone()), clock)
}

#[tokio::test]
async fn get_set_round_trips() {
    let (kv, _clock) = store();
    assert_eq!(kv.get("k").await.unwrap(), None);
    kv.set("k", "v", None).await.unwrap();
    assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
}

#[tokio::test]
async fn ttl_expires_value() {
    let (kv, clock) = store();
    kv.set("k", "v", Some(Duration::from_secs(60))).await.unwrap();
    assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    clock.advance_ms(59_000);
    assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    clock.advance_ms(2_000);
    assert_eq!(kv.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn incr_creates_counter_at_zero() {
    let (kv, _clock) = store();
    assert_eq!(kv.incr("c").await.unwrap(), 1);
    assert_eq!(kv.incr("c").await.unwrap(), 2);
}

#[tokio::test]
async fn incr_preserves_existing_ttl_and_expire_sets_new_one() {
    let (kv, clock) = store();
    assert_eq!(kv.incr("c").await.unwrap(), 1);
    kv.expire("c", Duration::from_secs(3600)).await.unwrap();
    assert_eq!(kv.incr("c").await.unwrap(), 2);
    assert!(kv.ttl("c").await.unwrap().is_some());
    clock.advance_ms(3_601_000);
    assert_eq!(kv.get("c").await.unwrap(), None);
}

#[tokio::test]
async fn exists_and_del() {
    let (kv, _clock) = store();
    kv.set("k", "v", None).await.unwrap();
    assert!(kv.exists("k").await.unwrap());
    kv.del("k").await.unwrap();
    assert!(!kv.exists("k").await.unwrap());
}

#[tokio::test]
async fn list_push_trim_range() {
    let (kv, _clock) = store();
    for v in ["a", "b", "c", "d", "e"] {
        kv.lpush("l", v).await.unwrap();
    }
    // lpush pushes to the front, so the list is now e, d, c, b, a
    assert_eq!(
        kv.lrange("l", 0, -1).await.unwrap(),
        vec!["e", "d", "c", "b", "a"]
    );
    kv.ltrim("l", 0, 2).await.unwrap();
    assert_eq!(kv.lrange("l", 0, -1).await.unwrap(), vec!["e", "d", "c"]);
}

#[tokio::test]
async fn lrange_on_missing_key_is_empty() {
    let (kv, _clock) = store();
    assert_eq!(kv.lrange("nope", 0, -1).await.unwrap(), Vec::<String>::new());
}

#[tokio::test]
async fn scan_matches_glob_pattern() {
    let (kv, _clock) = store();
    kv.set("breaker:example.com:state", "closed", None).await.unwrap();
    kv.set("breaker:other.com:state", "open", None).await.unwrap();
    kv.set("suppress:fp:abc", "1", None).await.unwrap();
    let mut matched = kv.scan("breaker:*:state").await.unwrap();
    matched.sort();
    assert_eq!(matched, vec!["breaker:example.com:state", "breaker:other.com:state"]);
}

#[tokio::test]
async fn multi_set_sets_several_keys_atomically() {
    let (kv, _clock) = store();
    kv.multi_set(&[
        ("breaker:x:state".to_string(), "open".to_string(), None),
        ("breaker:x:opened_at".to_string(), "1700000000000".to_string(), None),
        (
            "breaker:x:next_probe".to_string(),
            "1700000030000".to_string(),
            Some(Duration::from_secs(30)),
        ),
    ])
    .await
    .unwrap();
    assert_eq!(kv.get("breaker:x:state").await.unwrap(), Some("open".to_string()));
    assert_eq!(
        kv.get("breaker:x:opened_at").await.unwrap(),
        Some("1700000000000".to_string())
    );
    assert!(kv.ttl("breaker:x:next_probe").await.unwrap().is_some());
}
