// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires every crate's seam into one concrete `AppState` (§9's "AppContext"),
//! built once at startup and shared behind `Arc` across axum handlers and
//! background workers.

use crate::config::{Config, FetcherAdapterKind, KvBackendKind, RenderAdapterKind};
use crate::dynamic::{AnyFetchAdapter, DynKv, DynStore};
use bc_adapters::{AlertEmitter, Fetcher, InMemoryFetchAdapter, ReqwestAlertSink, ReqwestFetchAdapter};
use bc_breaker::{BreakerConfig, CircuitBreaker};
use bc_core::SystemClock;
use bc_engine::{
    ArtifactWriter, HttpRenderAdapter, InMemoryRenderAdapter, JobQueue, Lifecycle, QueueConfig, RenderProcessor,
    ReverifyCoordinator, ScanProcessor,
};
use bc_kv::{InMemoryKv, RedisKv};
use bc_rules::{AllowList, ReqwestRobotsFetcher, RulesEngine, RulesStore};
use bc_store::InMemoryStore;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

pub type Clk = SystemClock;
pub type Kv = DynKv;
pub type St = DynStore;
pub type Robots = ReqwestRobotsFetcher;
pub type Rules = RulesEngine<Robots, Kv, Clk>;
pub type Breaker = CircuitBreaker<Kv, Clk>;
pub type ScanProc = ScanProcessor<St, Clk>;
pub type RenderProc = RenderProcessor<St, Clk>;
pub type ScanQueue = JobQueue<ScanProc, Kv, Clk>;
pub type RenderQueue = JobQueue<RenderProc, Kv, Clk>;
pub type LifecycleT = Lifecycle<St, Clk, ScanQueue>;
pub type Reverify = ReverifyCoordinator<St, Kv, Clk, ScanQueue>;
pub type DaemonFetcher = Fetcher<AnyFetchAdapter, ReqwestAlertSink, Kv, Clk>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("rules file error: {0}")]
    Rules(#[from] bc_rules::RulesError),
    #[error("allow list io error: {0}")]
    AllowListIo(#[from] std::io::Error),
    #[error("kv backend error: {0}")]
    Kv(#[from] bc_kv::KvError),
    #[error("robots fetcher init error: {0}")]
    Robots(#[from] bc_rules::RobotsError),
}

/// Everything an axum handler or background worker needs. Constructed once
/// in `main` and shared via `Arc<AppState>` (an axum `State` extractor).
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: Arc<Clk>,
    pub kv: Arc<Kv>,
    pub store: Arc<St>,
    pub breaker: Option<Arc<Breaker>>,
    pub rules: Arc<Rules>,
    pub fetcher: Arc<DaemonFetcher>,
    pub scan_queue: Arc<ScanQueue>,
    pub render_queue: Arc<RenderQueue>,
    pub lifecycle: Arc<LifecycleT>,
    pub reverify: Arc<Reverify>,
    pub artifact_writer: ArtifactWriter,
    pub metrics_handle: PrometheusHandle,
}

/// The `metrics` crate's recorder is a process-global singleton; guard
/// installation so building a second `AppState` in the same process (tests)
/// doesn't panic trying to re-install it.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().build() {
            Ok((recorder, handle)) => {
                if let Err(e) = metrics::set_global_recorder(recorder) {
                    tracing::debug!(error = %e, "global metrics recorder already installed");
                }
                handle
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to build prometheus recorder, /metrics will render empty");
                PrometheusBuilder::new().build().map(|(_, h)| h).unwrap_or_else(|_| PrometheusHandle::new(Default::default()))
            }
        })
        .clone()
}

/// One non-empty, non-`#`-prefixed pattern per CSV field or line, lowercased
/// at match time by `AllowList` itself (§6).
fn parse_allow_list(raw: &str) -> Vec<String> {
    raw.lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.starts_with('#'))
        .map(str::to_string)
        .collect()
}

impl AppState {
    pub async fn build(config: Config) -> Result<Arc<Self>, StateError> {
        let config = Arc::new(config);
        let clock = Arc::new(SystemClock);

        let kv: Arc<Kv> = match config.kv_backend {
            KvBackendKind::Memory => Arc::new(DynKv(Arc::new(InMemoryKv::new(SystemClock)))),
            KvBackendKind::Redis => {
                let url = config.redis_url().unwrap_or_else(|| "redis://127.0.0.1:6379/0".to_string());
                Arc::new(DynKv(Arc::new(RedisKv::connect(&url)?)))
            }
        };

        // Only an in-memory Store exists today; a SQL-backed implementation
        // plugs in here without changing any other wiring (§5: "SQL is
        // authoritative for Runs, Findings, Artifacts, Reverify Attempts" —
        // no SQL driver is in the dependency stack yet, see DESIGN.md).
        let store: Arc<St> = Arc::new(DynStore(Arc::new(InMemoryStore::new())));

        let allow_list = match &config.allow_list_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                AllowList::new(parse_allow_list(&raw))
            }
            None => AllowList::empty(),
        };

        let rules_store = match &config.rules_file {
            Some(path) => RulesStore::load_from_path(path)?,
            None => RulesStore::load_from_str(r#"{"defaults":{},"rules":[]}"#)?,
        };

        let robots_fetcher = ReqwestRobotsFetcher::new()?;
        let robots_cache = bc_rules::RobotsCache::new(robots_fetcher, kv.clone());
        let rules = Arc::new(RulesEngine::new(allow_list, robots_cache, rules_store, kv.clone(), clock.clone()));

        let breaker: Option<Arc<Breaker>> = if config.breaker.enabled {
            let breaker_config = BreakerConfig {
                fail_threshold: BreakerConfig::default().fail_threshold,
                window_size: config.breaker.error_rate_window,
                failure_rate_threshold: config.breaker.error_rate_threshold_pct / 100.0,
                open_duration_ms: i64::from(config.breaker.open_minutes) * 60_000,
                half_open_probe_delay_ms: BreakerConfig::default().half_open_probe_delay_ms,
            };
            Some(Arc::new(CircuitBreaker::new(kv.clone(), clock.clone(), breaker_config)))
        } else {
            None
        };

        let fetch_adapter = match config.fetcher_adapter {
            FetcherAdapterKind::Direct => AnyFetchAdapter::Direct(ReqwestFetchAdapter::new()),
            FetcherAdapterKind::Proxy => AnyFetchAdapter::Proxy(InMemoryFetchAdapter::new()),
        };
        let alert_sink = ReqwestAlertSink::new(config.slack_webhook_url.clone().unwrap_or_default());
        let action_base_url = format!("http://127.0.0.1:{}", config.port);
        let alerts = AlertEmitter::new(alert_sink, kv.clone(), config.slack_action_token.clone().unwrap_or_default(), action_base_url);
        let breaker_gate: Option<Arc<dyn bc_adapters::BreakerGate>> = breaker.clone().map(|b| b as Arc<dyn bc_adapters::BreakerGate>);
        let fetcher = Arc::new(Fetcher::new(fetch_adapter, breaker_gate, rules.clone(), alerts, clock.clone()));

        let artifact_writer = ArtifactWriter::new(config.artifact_root.clone());

        // The render queue's processor needs to report run-status rollups
        // through `RunStatusChecker`, and the real `Lifecycle` impl needs the
        // scan queue, which in turn needs the render queue as its
        // `RenderEnqueuer` — a genuine cycle between the two queues. Break it
        // with a late-bound `RunStatusChecker` that starts as a no-op and is
        // pointed at the real `Lifecycle` once it exists.
        let lifecycle_cell = Arc::new(LateBoundLifecycle::default());
        let render_adapter: Arc<dyn bc_engine::RenderAdapter> = match config.render_adapter {
            RenderAdapterKind::Http => Arc::new(HttpRenderAdapter::new(config.browser_capture_url.clone())),
            RenderAdapterKind::Memory => Arc::new(InMemoryRenderAdapter::new()),
        };
        let render_processor = RenderProc::new(
            store.clone(),
            clock.clone(),
            render_adapter,
            artifact_writer.clone(),
            lifecycle_cell.clone(),
            config.retention_days,
        );
        let render_queue = JobQueue::new("render-queue", Arc::new(render_processor), kv.clone(), clock.clone(), QueueConfig::render());

        let scan_processor = ScanProc::new(store.clone(), clock.clone(), rules.clone(), render_queue.clone());
        let scan_queue = JobQueue::new("scan-queue", Arc::new(scan_processor), kv.clone(), clock.clone(), QueueConfig::scan());

        let lifecycle = Arc::new(Lifecycle::new(store.clone(), clock.clone(), scan_queue.clone()));
        lifecycle_cell.bind(lifecycle.clone());

        let reverify = Arc::new(
            ReverifyCoordinator::new(store.clone(), kv.clone(), clock.clone(), scan_queue.clone())
                .with_limits(config.reverify_ttl, std::time::Duration::from_secs(3600), config.reverify_rate_per_finding_per_hour),
        );

        Ok(Arc::new(Self {
            config,
            clock,
            kv,
            store,
            breaker,
            rules,
            fetcher,
            scan_queue,
            render_queue,
            lifecycle,
            reverify,
            artifact_writer,
            metrics_handle: metrics_handle(),
        }))
    }
}

/// Breaks the render-queue/scan-queue construction cycle: calls are no-ops
/// until [`bind`](Self::bind) points this at the real `Lifecycle`, which can
/// only be built once the scan queue it needs already exists.
#[derive(Default)]
struct LateBoundLifecycle(std::sync::OnceLock<Arc<LifecycleT>>);

impl LateBoundLifecycle {
    fn bind(&self, lifecycle: Arc<LifecycleT>) {
        let _ = self.0.set(lifecycle);
    }
}

#[async_trait::async_trait]
impl bc_engine::RunStatusChecker for LateBoundLifecycle {
    async fn check_and_update_run_status(&self, run_id: &bc_core::RunId) {
        if let Some(lifecycle) = self.0.get() {
            if let Err(e) = lifecycle.check_and_update_run_status(run_id).await {
                tracing::warn!(run_id = %run_id, error = %e, "failed to roll up run status");
            }
        } else {
            tracing::warn!(run_id = %run_id, "run status checker invoked before lifecycle was bound");
        }
    }
}
