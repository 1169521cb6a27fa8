//! Error types for the device gate.

use crate::notify::Delivery;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use init_data::InitDataError;
use serde::Serialize;
use std::net::IpAddr;
use thiserror::Error;
use tracing::warn;

/// Verification failures, one per externally visible status.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Bot token not configured")]
    BotTokenMissing,

    #[error("Missing required field: {0}")]
    MissingData(&'static str),

    #[error("Malformed launch data: {0}")]
    MalformedPayload(String),

    #[error("Launch data signature mismatch")]
    InvalidSignature,

    #[error("Launch data expired ({age}s old)")]
    Expired { age: i64 },

    #[error("Proxy or VPN origin blocked: {ip}")]
    OriginBlocked { ip: IpAddr },

    #[error("Origin check failed: {0}")]
    OriginCheckFailed(String),

    #[error("Device changed for user {user_id}")]
    DeviceChanged { user_id: i64, alert: Delivery },

    #[error("Binding store error: {0}")]
    Store(#[from] StoreError),
}

impl GateError {
    /// Stable status string returned to the client.
    pub fn status(&self) -> &'static str {
        match self {
            GateError::BotTokenMissing => "bot_token_missing",
            GateError::MissingData(_) => "missing_data",
            // Launch data that cannot be decoded cannot be authenticated either.
            GateError::MalformedPayload(_) | GateError::InvalidSignature => "invalid_signature",
            GateError::Expired { .. } => "expired",
            GateError::OriginBlocked { .. } => "vpn_blocked",
            GateError::OriginCheckFailed(_) => "vpn_check_failed",
            GateError::DeviceChanged { .. } => "device_changed_blocked",
            GateError::Store(_) => "internal_error",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::MissingData(_) => StatusCode::BAD_REQUEST,
            GateError::MalformedPayload(_)
            | GateError::InvalidSignature
            | GateError::Expired { .. }
            | GateError::OriginBlocked { .. }
            | GateError::DeviceChanged { .. } => StatusCode::FORBIDDEN,
            GateError::BotTokenMissing | GateError::OriginCheckFailed(_) | GateError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<InitDataError> for GateError {
    fn from(e: InitDataError) -> Self {
        match e {
            InitDataError::MissingInput(field) => GateError::MissingData(field),
            InitDataError::MalformedPayload(reason) => GateError::MalformedPayload(reason),
            InitDataError::InvalidSignature => GateError::InvalidSignature,
            InitDataError::Expired { age, .. } => GateError::Expired { age },
        }
    }
}

/// Response body: a single `status` field.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "Verification aborted");
        }

        (
            status,
            Json(StatusResponse {
                status: self.status(),
            }),
        )
            .into_response()
    }
}

/// Binding store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Binding for user {0} disappeared during create-if-absent")]
    Vanished(i64),

    #[error("Store configuration error: {0}")]
    Config(String),
}

impl From<aes_gcm::Error> for StoreError {
    fn from(_: aes_gcm::Error) -> Self {
        StoreError::Encryption("AES-GCM encryption/decryption failed".to_string())
    }
}
