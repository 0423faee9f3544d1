use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use keyflow_access::AccessError;
use keyflow_models::{AccessRequest, AccessSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            message: "Request failed".to_string(),
            error: error.into(),
        }
    }
}

/// Upstream acknowledgment relayed back to the caller.
#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub status: u16,
    pub data: serde_json::Value,
}

impl AccessResponse {
    fn from_gateway(response: keyflow_access::GatewayResponse) -> Self {
        // Relay the upstream body as JSON when it parses, verbatim otherwise.
        let data = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(_) => serde_json::Value::String(response.body),
        };
        Self {
            status: response.status,
            data,
        }
    }
}

/// Each error kind gets a deliberate status instead of collapsing everything
/// to 400: caller mistakes are 400, an unreachable upstream is 502, and a
/// failed audit write after an acknowledged upstream call is 500. The caller
/// sees the taxonomy-level message; the specific cause is logged here only.
fn map_error(err: AccessError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        AccessError::Validation(_) => StatusCode::BAD_REQUEST,
        AccessError::UpstreamUnavailable { status, detail } => {
            tracing::warn!(?status, detail = %detail, "upstream access control unavailable");
            StatusCode::BAD_GATEWAY
        }
        AccessError::StoreUnavailable(cause) => {
            tracing::error!(error = %cause, "audit log write failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        AccessError::Processing(detail) => {
            tracing::error!(detail = %detail, "unexpected processing failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorResponse::new(err.to_string())))
}

/// Grant a visitor access to the requested access points
/// POST /access_control/grant-access
pub async fn grant_access(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let response = state
        .access_service
        .grant(&request)
        .await
        .map_err(map_error)?;

    Ok(Json(AccessResponse::from_gateway(response)))
}

/// Revoke a visitor's access and close their sessions
/// POST /access_control/revoke-access
pub async fn revoke_access(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, (StatusCode, Json<ErrorResponse>)> {
    let response = state
        .access_service
        .revoke(&request)
        .await
        .map_err(map_error)?;

    Ok(Json(AccessResponse::from_gateway(response)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogQuery {
    pub visitor_token: String,
    pub key_card: String,
}

/// Session history for an identity, newest first
/// GET /access_control/access-log
pub async fn access_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccessLogQuery>,
) -> Result<Json<Vec<AccessSession>>, (StatusCode, Json<ErrorResponse>)> {
    let sessions = state
        .access_log
        .session_history(&params.visitor_token, &params.key_card)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to read access log");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("access log unavailable")),
            )
        })?;

    Ok(Json(sessions))
}
