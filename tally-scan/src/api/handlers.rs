//! HTTP request handlers
//!
//! Every handler forwards to the controller handle; none of them touch
//! session state directly.

use super::error::{ApiError, ApiResult};
use super::server::AppContext;
use crate::controller::{AlertListView, ExportSummary, ScanOutcome, SessionSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tally_common::db::settings;
use tally_common::{ApiConfig, ScanEntry};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    code: String,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    removed: ScanEntry,
    entries: Vec<ScanEntry>,
    total: u64,
}

#[derive(Debug, Deserialize)]
pub struct AlertListRequest {
    raw: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    #[serde(flatten)]
    config: ApiConfig,
    missing_fields: Vec<&'static str>,
}

impl From<ApiConfig> for ConfigResponse {
    fn from(config: ApiConfig) -> Self {
        let missing_fields = config.missing_fields();
        Self {
            config,
            missing_fields,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DismissResponse {
    dismissed: bool,
}

#[derive(Debug, Serialize)]
pub struct IntakeResponse {
    paused: bool,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Service liveness
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tally-scan".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
    })
}

// ============================================================================
// Scanning
// ============================================================================

/// POST /api/scan - Submit one scan event
///
/// Blocked scans answer 503 with the outcome body; dropped and paused scans
/// are ordinary outcomes.
pub async fn submit_scan(
    State(ctx): State<AppContext>,
    Json(req): Json<ScanRequest>,
) -> ApiResult<(StatusCode, Json<ScanOutcome>)> {
    let outcome = ctx.controller.scan(req.code).await?;
    let status = match outcome {
        ScanOutcome::Blocked => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// GET /api/session - Session snapshot
pub async fn get_session(State(ctx): State<AppContext>) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(ctx.controller.snapshot().await?))
}

/// POST /api/ledger/:index/decrement
pub async fn decrement_entry(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> ApiResult<Json<SessionSnapshot>> {
    ctx.controller.decrement(index).await?;
    Ok(Json(ctx.controller.snapshot().await?))
}

/// DELETE /api/ledger/:index
pub async fn remove_entry(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> ApiResult<Json<RemoveResponse>> {
    let removed = ctx.controller.remove(index).await?;
    let snapshot = ctx.controller.snapshot().await?;
    Ok(Json(RemoveResponse {
        removed,
        entries: snapshot.entries,
        total: snapshot.total,
    }))
}

/// POST /api/export - Ledger text for the clipboard; also posted to the backend
pub async fn export_ledger(State(ctx): State<AppContext>) -> ApiResult<Json<ExportSummary>> {
    Ok(Json(ctx.controller.export().await?))
}

/// POST /api/result/dismiss
pub async fn dismiss_result(State(ctx): State<AppContext>) -> ApiResult<Json<DismissResponse>> {
    let dismissed = ctx.controller.dismiss_result().await?;
    Ok(Json(DismissResponse { dismissed }))
}

/// POST /api/intake/pause
pub async fn pause_intake(State(ctx): State<AppContext>) -> ApiResult<Json<IntakeResponse>> {
    ctx.controller.set_intake_paused(true).await?;
    Ok(Json(IntakeResponse { paused: true }))
}

/// POST /api/intake/resume
pub async fn resume_intake(State(ctx): State<AppContext>) -> ApiResult<Json<IntakeResponse>> {
    ctx.controller.set_intake_paused(false).await?;
    Ok(Json(IntakeResponse { paused: false }))
}

// ============================================================================
// Watch list
// ============================================================================

/// GET /api/alerts
pub async fn get_alerts(State(ctx): State<AppContext>) -> ApiResult<Json<AlertListView>> {
    Ok(Json(ctx.controller.alert_list().await?))
}

/// PUT /api/alerts - Replace the watch list
pub async fn put_alerts(
    State(ctx): State<AppContext>,
    Json(req): Json<AlertListRequest>,
) -> ApiResult<Json<AlertListView>> {
    let watch_codes = ctx.controller.set_alert_list(req.raw).await?;
    info!("Watch list updated: {} codes", watch_codes);
    Ok(Json(ctx.controller.alert_list().await?))
}

// ============================================================================
// Backend configuration
// ============================================================================

/// GET /api/config
pub async fn get_config(State(ctx): State<AppContext>) -> ApiResult<Json<ConfigResponse>> {
    Ok(Json(ctx.controller.config().await?.into()))
}

/// PUT /api/config - Persist the backend configuration and re-probe health
pub async fn put_config(
    State(ctx): State<AppContext>,
    Json(req): Json<ApiConfig>,
) -> ApiResult<Json<ConfigResponse>> {
    let config = ApiConfig::new(req.domain.trim(), req.branch.trim(), req.api_key.trim());
    if config.domain.contains(char::is_whitespace) {
        return Err(ApiError::BadRequest("Domain must not contain whitespace".to_string()));
    }

    if let Err(e) = settings::save_api_config(&ctx.db_pool, &config).await {
        error!("Failed to save API configuration: {}", e);
        return Err(e.into());
    }
    info!(domain = %config.domain, branch = %config.branch, "API configuration saved");

    ctx.controller.update_config(config.clone()).await?;
    Ok(Json(config.into()))
}

/// POST /api/health/recheck - Explicit re-probe; the result arrives as `HealthChanged`
pub async fn recheck_health(State(ctx): State<AppContext>) -> ApiResult<StatusCode> {
    ctx.controller.recheck_health().await?;
    Ok(StatusCode::ACCEPTED)
}
