//! HTTP request handlers.

use super::types::{HealthResponse, VerifyRequest};
use super::AppState;
use crate::error::{GateError, StatusResponse};
use crate::origin::client_ip;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;
use tracing::{debug, info};

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        configured: state.gate.is_some(),
    })
}

/// Verify a Mini App launch and bind the user to the presenting device.
pub async fn verify(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, GateError> {
    // Configuration is checked before the body is looked at.
    let gate = state.gate.as_ref().ok_or(GateError::BotTokenMissing)?;

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(%rejection, "Unreadable verify body");
            VerifyRequest::default()
        }
    };

    let ip = client_ip(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trusted_proxies,
    );
    let verified = gate
        .verify(
            request.init_data.as_deref().unwrap_or_default(),
            request.device_id.as_deref().unwrap_or_default(),
            ip,
        )
        .await?;

    info!(
        user_id = verified.user_id,
        newly_bound = verified.newly_bound,
        "Launch verified"
    );

    Ok(Json(StatusResponse { status: "success" }))
}

/// Any method other than POST on the verify route.
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(StatusResponse {
            status: "method_not_allowed",
        }),
    )
}
