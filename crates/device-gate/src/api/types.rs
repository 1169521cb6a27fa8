//! API request and response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/verify`.
///
/// Both fields are optional at the parsing level so that an absent field is
/// reported as `missing_data` rather than as a JSON rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    /// Raw Mini App launch data, URL-encoded
    #[serde(rename = "initData")]
    pub init_data: Option<String>,

    /// Client-side device fingerprint
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether a bot token is configured
    pub configured: bool,
}
