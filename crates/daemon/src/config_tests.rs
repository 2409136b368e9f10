// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Mutex;

/// `Config::load` reads process-global env vars; serialize tests that touch
/// them so they don't clobber each other under the default parallel runner.
static ENV_GUARD: Mutex<()> = Mutex::new(());

const MANAGED_VARS: &[&str] = &[
    "PORT",
    "NODE_ENV",
    "DB_HOST",
    "DB_PORT",
    "KV_BACKEND",
    "REDIS_HOST",
    "REDIS_PASSWORD",
    "REDIS_DB",
    "REVERIFY_TTL_SECONDS",
    "BREAKER_ENABLED",
    "BREAKER_OPEN_MINUTES",
    "FETCHER_ADAPTER",
    "RENDER_ADAPTER",
    "RULES_FILE",
    "ALLOW_LIST_FILE",
    "ADMIN_ENABLED",
    "RETENTION_DAYS",
    "BROWSER_CAPTURE_URL",
];

fn with_clean_env<T>(f: impl FnOnce() -> T) -> T {
    let _lock = ENV_GUARD.lock().unwrap_or_else(|e| e.into_inner());
    for var in MANAGED_VARS {
        std::env::remove_var(var);
    }
    let result = f();
    for var in MANAGED_VARS {
        std::env::remove_var(var);
    }
    result
}

#[test]
fn defaults_are_applied_when_no_env_vars_are_set() {
    with_clean_env(|| {
        let config = Config::load().unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.node_env, "development");
        assert_eq!(config.kv_backend, KvBackendKind::Memory);
        assert!(config.breaker.enabled);
        assert_eq!(config.fetcher_adapter, FetcherAdapterKind::Direct);
        assert_eq!(config.render_adapter, RenderAdapterKind::Http);
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.browser_capture_url, "http://127.0.0.1:9222/capture");
    });
}

#[test]
fn kv_backend_defaults_to_redis_once_redis_host_is_set() {
    with_clean_env(|| {
        std::env::set_var("REDIS_HOST", "cache.internal");
        let config = Config::load().unwrap();
        assert_eq!(config.kv_backend, KvBackendKind::Redis);
    });
}

#[test]
fn explicit_kv_backend_overrides_the_redis_host_inference() {
    with_clean_env(|| {
        std::env::set_var("REDIS_HOST", "cache.internal");
        std::env::set_var("KV_BACKEND", "memory");
        let config = Config::load().unwrap();
        assert_eq!(config.kv_backend, KvBackendKind::Memory);
    });
}

#[test]
fn invalid_kv_backend_value_is_rejected() {
    with_clean_env(|| {
        std::env::set_var("KV_BACKEND", "postgres");
        let err = Config::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "KV_BACKEND", .. }));
    });
}

#[test]
fn unparseable_port_is_a_configuration_error() {
    with_clean_env(|| {
        std::env::set_var("PORT", "not-a-number");
        let err = Config::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "PORT", .. }));
    });
}

#[test]
fn unknown_fetcher_adapter_is_rejected() {
    with_clean_env(|| {
        std::env::set_var("FETCHER_ADAPTER", "carrier-pigeon");
        let err = Config::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "FETCHER_ADAPTER", .. }));
    });
}

#[test]
fn render_adapter_can_be_switched_to_memory() {
    with_clean_env(|| {
        std::env::set_var("RENDER_ADAPTER", "memory");
        let config = Config::load().unwrap();
        assert_eq!(config.render_adapter, RenderAdapterKind::Memory);
    });
}

#[test]
fn unknown_render_adapter_is_rejected() {
    with_clean_env(|| {
        std::env::set_var("RENDER_ADAPTER", "carrier-pigeon");
        let err = Config::load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "RENDER_ADAPTER", .. }));
    });
}

#[test]
fn redis_url_is_none_without_a_redis_host() {
    with_clean_env(|| {
        let config = Config::load().unwrap();
        assert_eq!(config.redis_url(), None);
    });
}

#[test]
fn redis_url_embeds_password_and_db_when_configured() {
    with_clean_env(|| {
        std::env::set_var("REDIS_HOST", "cache.internal");
        std::env::set_var("REDIS_PASSWORD", "hunter2");
        std::env::set_var("REDIS_DB", "3");
        let config = Config::load().unwrap();
        assert_eq!(config.redis_url().as_deref(), Some("redis://:hunter2@cache.internal:6379/3"));
    });
}

#[test]
fn bind_addr_uses_the_configured_port() {
    with_clean_env(|| {
        std::env::set_var("PORT", "9999");
        let config = Config::load().unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9999");
    });
}
