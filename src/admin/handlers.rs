use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::schema::GatekeeperConfig;
use crate::error::GatekeeperError;
use crate::http::server::AppState;
use crate::lifecycle::SweepReport;
use crate::limiter::{BucketSnapshot, StoreError};
use crate::replay::{ReplayError, ReplayStats};
use crate::signature::verifier::redact;

const SECRET_MASK: &str = "********";

/// Backend failure surfaced to an administrator.
pub struct AdminError(GatekeeperError);

impl From<StoreError> for AdminError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

impl From<ReplayError> for AdminError {
    fn from(e: ReplayError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Admin operation failed");
        let body = serde_json::json!({
            "success": false,
            "message": self.0.to_string(),
        });
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub rate_limit_enabled: bool,
    pub signature_enabled: bool,
    pub counter_store: &'static str,
    pub replay_store: &'static str,
    pub config_errors: Vec<String>,
}

#[derive(Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

#[derive(Deserialize)]
pub struct InspectQuery {
    pub key: String,
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct InspectResponse {
    pub key: String,
    pub rule: String,
    pub limit: u32,
    pub bucket: Option<BucketSnapshot>,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub key: String,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let policy = state.pipeline.policy();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        rate_limit_enabled: policy.rate_limit_enabled,
        signature_enabled: policy.signature.is_some(),
        counter_store: state.pipeline.limiter().store().name(),
        replay_store: state.pipeline.verifier().replay_store().name(),
        config_errors: policy.config_errors.iter().map(|e| e.to_string()).collect(),
    })
}

/// The active configuration with key material masked.
pub fn redacted(config: &GatekeeperConfig) -> GatekeeperConfig {
    let mut config = config.clone();
    for secret in [
        &mut config.signature.encryption_key,
        &mut config.signature.hmac_secret,
        &mut config.crypto.master_key,
        &mut config.admin.api_key,
    ] {
        if !secret.is_empty() {
            *secret = SECRET_MASK.to_string();
        }
    }
    for sign in &mut config.signature.valid_signs {
        *sign = redact(sign);
    }
    config
}

pub async fn get_config(State(state): State<AppState>) -> Json<GatekeeperConfig> {
    Json(redacted(&state.config.load()))
}

pub async fn inspect_key(
    State(state): State<AppState>,
    Query(query): Query<InspectQuery>,
) -> Result<Json<InspectResponse>, AdminError> {
    let policy = state.pipeline.policy();
    let rule = match query.path.as_deref() {
        Some(path) => policy.rules.resolve_rule(path),
        None => policy.rules.default_rule(),
    };
    let bucket = state
        .pipeline
        .inspect_key(&query.key, query.path.as_deref())
        .await?;

    Ok(Json(InspectResponse {
        key: query.key,
        rule: rule.name.clone(),
        limit: rule.points,
        bucket,
    }))
}

pub async fn reset_key(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<Ack>, AdminError> {
    state.pipeline.reset_key(&request.key).await?;
    Ok(Json(Ack {
        success: true,
        removed: None,
    }))
}

pub async fn clear_limits(State(state): State<AppState>) -> Result<Json<Ack>, AdminError> {
    let removed = state.pipeline.limiter().clear().await?;
    tracing::info!(removed, "Rate limit buckets cleared");
    Ok(Json(Ack {
        success: true,
        removed: Some(removed),
    }))
}

pub async fn replay_stats(State(state): State<AppState>) -> Result<Json<ReplayStats>, AdminError> {
    let stats = state.pipeline.verifier().replay_store().stats().await?;
    Ok(Json(stats))
}

pub async fn replay_clear(State(state): State<AppState>) -> Result<Json<Ack>, AdminError> {
    let removed = state.pipeline.verifier().replay_store().clear().await?;
    tracing::info!(removed, "Replay records cleared");
    Ok(Json(Ack {
        success: true,
        removed: Some(removed),
    }))
}

pub async fn replay_sweep(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.housekeeper.run_once().await)
}
