// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bc_adapters::{FetchRequest, InMemoryFetchAdapter};
use bc_kv::memory::fake_clock_kv;
use bc_store::InMemoryStore;

#[tokio::test]
async fn dyn_kv_delegates_to_the_wrapped_backend() {
    let (inner, _clock) = fake_clock_kv();
    let kv = DynKv(inner);
    kv.set("k", "v", None).await.unwrap();
    assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
}

#[tokio::test]
async fn dyn_store_delegates_to_the_wrapped_backend() {
    let inner: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let store = DynStore(inner);
    let run = bc_core::Run::new(bc_core::RunId::generate(), bc_core::RunType::Manual, 1, None, 0);
    store.insert_run(run.clone()).await.unwrap();
    assert!(store.get_run(&run.id).await.unwrap().is_some());
}

#[tokio::test]
async fn any_fetch_adapter_proxy_variant_delegates() {
    let adapter = InMemoryFetchAdapter::new();
    adapter.queue(
        "https://example.com",
        vec![Ok(RawResponse {
            status: 200,
            body: Some("ok".to_string()),
            headers: Default::default(),
        })],
    );
    let any = AnyFetchAdapter::Proxy(adapter);
    let resp = any.fetch_once("https://example.com", &FetchRequest::default()).await.unwrap();
    assert_eq!(resp.status, 200);
}
