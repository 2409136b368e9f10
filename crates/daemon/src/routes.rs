// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the External interfaces surface (C13, §6).

use crate::error::{error_response, ApiError};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bc_core::{FindingId, ReverifySource, RunId};
use bc_engine::{LifecycleError, ReverifyRequest};
use bc_store::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

fn store_err(e: StoreError) -> bc_core::Error {
    match e {
        StoreError::NotFound(msg) => bc_core::Error::NotFound(msg),
        StoreError::Backend(msg) => bc_core::Error::Store(msg),
    }
}

fn lifecycle_err(e: LifecycleError) -> bc_core::Error {
    match e {
        LifecycleError::Validation(msg) => bc_core::Error::Validation(msg),
        LifecycleError::Store(e) => store_err(e),
    }
}

fn bad_uuid(field: &str, raw: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, "validation_error", format!("{field} {raw:?} is not a valid UUID"))
}

// ---- POST /api/runs ----------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    urls: Vec<String>,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CreateRunResponse {
    id: String,
    submitted: i64,
    count: u32,
    status: bc_core::RunStatus,
    findings: Vec<bc_core::Finding>,
    #[serde(rename = "jobsEnqueued")]
    jobs_enqueued: u32,
}

pub async fn create_run(State(state): State<Arc<AppState>>, Json(body): Json<CreateRunRequest>) -> Result<Response, ApiError> {
    let outcome = state.lifecycle.create_run(body.urls, body.payload).await.map_err(lifecycle_err)?;
    let response = CreateRunResponse {
        id: outcome.run.id.as_str().to_string(),
        submitted: outcome.run.submitted_at_ms,
        count: outcome.run.url_count,
        status: outcome.run.status,
        findings: outcome.findings,
        jobs_enqueued: outcome.jobs_enqueued,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

// ---- GET /api/runs/:id --------------------------------------------------

#[derive(Debug, Serialize)]
struct RunDetail {
    run: bc_core::Run,
    findings: Vec<bc_core::Finding>,
}

pub async fn get_run(State(state): State<Arc<AppState>>, axum::extract::Path(id): axum::extract::Path<String>) -> Result<Response, ApiError> {
    let run_id = RunId::new(id);
    let run = state.store.get_run(&run_id).await.map_err(store_err)?;
    let Some(run) = run else {
        return Err(bc_core::Error::not_found(format!("run {run_id} not found")).into());
    };
    let findings = state.store.list_findings_for_run(&run_id).await.map_err(store_err)?;
    Ok((StatusCode::OK, Json(RunDetail { run, findings })).into_response())
}

// ---- POST /api/findings/:id/reverify ------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct ReverifyBody {
    source: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReverifyResponse {
    ok: bool,
    result: bc_core::ReverifyResult,
    #[serde(rename = "jobId", skip_serializing_if = "Option::is_none")]
    job_id: Option<String>,
    #[serde(rename = "remainingAttempts", skip_serializing_if = "Option::is_none")]
    remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn parse_source(raw: Option<&str>) -> ReverifySource {
    match raw {
        Some("slack") => ReverifySource::Slack,
        _ => ReverifySource::Api,
    }
}

pub async fn reverify_finding(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<String>,
    headers: HeaderMap,
    body: Option<Json<ReverifyBody>>,
) -> Response {
    let Ok(finding_id) = FindingId::parse(&id) else {
        return bad_uuid("finding id", &id);
    };
    let source = parse_source(body.as_ref().and_then(|b| b.source.as_deref()));
    let ip = client_ip(&headers);
    let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string);

    let outcome = state.reverify.reverify(ReverifyRequest { finding_id, ip, user_agent, source }).await;
    let status = match outcome.result {
        bc_core::ReverifyResult::Ok | bc_core::ReverifyResult::Duplicate => StatusCode::OK,
        bc_core::ReverifyResult::NotFound => StatusCode::NOT_FOUND,
        bc_core::ReverifyResult::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        bc_core::ReverifyResult::Error => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let response = ReverifyResponse {
        ok: outcome.ok,
        result: outcome.result,
        job_id: outcome.job_id.map(|j| j.as_str().to_string()),
        remaining_attempts: outcome.remaining_attempts,
        message: outcome.message,
    };
    (status, Json(response)).into_response()
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

// ---- GET /api/findings/:id/reverify-attempts ----------------------------

#[derive(Debug, Serialize)]
struct ReverifyAttemptsResponse {
    #[serde(rename = "findingId")]
    finding_id: String,
    attempts: Vec<bc_core::ReverifyAttempt>,
    total: usize,
}

pub async fn reverify_attempts(State(state): State<Arc<AppState>>, axum::extract::Path(id): axum::extract::Path<String>) -> Response {
    let Ok(finding_id) = FindingId::parse(&id) else {
        return bad_uuid("finding id", &id);
    };
    match state.store.list_reverify_attempts_for_finding(&finding_id).await {
        Ok(attempts) => {
            let total = attempts.len();
            (StatusCode::OK, Json(ReverifyAttemptsResponse { finding_id: finding_id.as_str().to_string(), attempts, total })).into_response()
        }
        Err(e) => ApiError::from(store_err(e)).into_response(),
    }
}

// ---- GET|POST /api/slack/actions ----------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct SlackActionParams {
    action: Option<String>,
    #[serde(rename = "findingId")]
    finding_id: Option<String>,
    t: Option<String>,
    fingerprint: Option<String>,
}

pub async fn slack_action_get(State(state): State<Arc<AppState>>, Query(params): Query<HashMap<String, String>>) -> Response {
    let params = SlackActionParams {
        action: params.get("action").cloned(),
        finding_id: params.get("findingId").cloned(),
        t: params.get("t").cloned(),
        fingerprint: params.get("fingerprint").cloned(),
    };
    handle_slack_action(state, params).await
}

pub async fn slack_action_post(State(state): State<Arc<AppState>>, Json(params): Json<SlackActionParams>) -> Response {
    handle_slack_action(state, params).await
}

async fn handle_slack_action(state: Arc<AppState>, params: SlackActionParams) -> Response {
    let Some(token) = params.t.as_deref() else {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "missing token");
    };
    let expected = state.config.slack_action_token.as_deref().unwrap_or("");
    if expected.is_empty() || token != expected {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "invalid token");
    }

    let Some(action) = params.action.as_deref() else {
        return error_response(StatusCode::BAD_REQUEST, "validation_error", "missing action");
    };
    let Some(raw_finding_id) = params.finding_id.as_deref() else {
        return error_response(StatusCode::BAD_REQUEST, "validation_error", "missing findingId");
    };
    let Ok(finding_id) = FindingId::parse(raw_finding_id) else {
        return bad_uuid("findingId", raw_finding_id);
    };

    match action {
        "reverify" => {
            let outcome = state
                .reverify
                .reverify(ReverifyRequest { finding_id, ip: None, user_agent: None, source: ReverifySource::Slack })
                .await;
            let status = match outcome.result {
                bc_core::ReverifyResult::Ok | bc_core::ReverifyResult::Duplicate => StatusCode::OK,
                bc_core::ReverifyResult::NotFound => StatusCode::NOT_FOUND,
                bc_core::ReverifyResult::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                bc_core::ReverifyResult::Error => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(serde_json::json!({"ok": outcome.ok, "result": outcome.result}))).into_response()
        }
        "suppress24h" => {
            let finding = match state.store.get_finding(&finding_id).await {
                Ok(Some(f)) => f,
                Ok(None) => return error_response(StatusCode::NOT_FOUND, "not_found", "unknown finding"),
                Err(e) => return ApiError::from(store_err(e)).into_response(),
            };
            let fingerprint = params.fingerprint.or(finding.fingerprint).unwrap_or_else(|| finding_id.as_str().to_string());
            let key = format!("suppress:fp:{fingerprint}");
            if let Err(e) = state.kv.set(&key, "1", Some(std::time::Duration::from_secs(24 * 3600))).await {
                tracing::warn!(finding_id = %finding_id, error = %e, "failed to set suppress-24h key");
                return ApiError::from(bc_core::Error::Kv(e.to_string())).into_response();
            }
            (StatusCode::OK, Json(serde_json::json!({"ok": true, "suppressedFor": "24h"}))).into_response()
        }
        other => error_response(StatusCode::BAD_REQUEST, "validation_error", format!("unknown action {other:?}")),
    }
}

// ---- GET /health / GET /ready --------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok", timestamp: state.clock.epoch_ms() })).into_response()
}

/// Distinct from `/health`: reports `503` if the KV store is unreachable
/// (§6.1). The in-memory store/KV backends are always reachable; this only
/// meaningfully degrades when `KV_BACKEND=redis` points at a down Redis.
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    match state.kv.exists("__readiness_probe__").await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"status": "ready"}))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"status": "not_ready", "error": e.to_string()}))).into_response()
        }
    }
}

// ---- GET /metrics ---------------------------------------------------------

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics_handle.render() {
        rendered => (StatusCode::OK, rendered).into_response(),
    }
}

// ---- /admin/* --------------------------------------------------------------

fn check_admin_auth(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    if !state.config.admin.enabled {
        return Err(error_response(StatusCode::NOT_FOUND, "not_found", "admin surface disabled"));
    }
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "missing Authorization header"));
    };
    let Some(encoded) = header.strip_prefix("Basic ") else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "expected Basic auth"));
    };
    let decoded = match base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded) {
        Ok(bytes) => bytes,
        Err(_) => return Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "malformed credentials")),
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "malformed credentials"));
    };
    let Some((user, pass)) = decoded.split_once(':') else {
        return Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "malformed credentials"));
    };
    if user == state.config.admin.username && pass == state.config.admin.password {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized", "bad credentials"))
    }
}

pub async fn admin_breaker_snapshot(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(resp) = check_admin_auth(&state, &headers) {
        return resp;
    }
    let Some(breaker) = &state.breaker else {
        return (StatusCode::OK, Json(serde_json::json!({"enabled": false, "targets": []}))).into_response();
    };
    match breaker.get_all_stats().await {
        Ok(stats) => (StatusCode::OK, Json(serde_json::json!({"enabled": true, "targets": stats}))).into_response(),
        Err(e) => ApiError::from(bc_core::Error::Kv(e.to_string())).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct BreakerResetRequest {
    #[serde(rename = "targetId")]
    target_id: String,
}

pub async fn admin_breaker_reset(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<BreakerResetRequest>) -> Response {
    if let Err(resp) = check_admin_auth(&state, &headers) {
        return resp;
    }
    if body.target_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "validation_error", "targetId is required");
    }
    let Some(breaker) = &state.breaker else {
        return error_response(StatusCode::BAD_REQUEST, "validation_error", "breaker is disabled");
    };
    match breaker.reset(&body.target_id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))).into_response(),
        Err(e) => ApiError::from(bc_core::Error::Kv(e.to_string())).into_response(),
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
