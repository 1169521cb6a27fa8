//! Network-origin screening against an IP reputation service.

use async_trait::async_trait;
use axum::http::HeaderMap;
use reqwest::Client;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Classification of a caller address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginVerdict {
    Clean,
    Proxied,
}

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("Reputation lookup failed: {0}")]
    Lookup(String),
}

/// Classifies caller addresses as clean or proxied.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OriginScreen: Send + Sync {
    async fn screen(&self, ip: IpAddr) -> Result<OriginVerdict, OriginError>;
}

/// ipapi.co-compatible lookup: `GET {base_url}/{ip}/json/`.
///
/// A response flags the address through a top-level `proxy` boolean or a
/// nested `security.vpn` boolean. Anything short of a 2xx JSON object is a
/// failed lookup.
#[derive(Clone)]
pub struct IpApiScreen {
    client: Client,
    base_url: String,
}

impl IpApiScreen {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OriginError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OriginError::Lookup(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OriginScreen for IpApiScreen {
    #[instrument(skip(self))]
    async fn screen(&self, ip: IpAddr) -> Result<OriginVerdict, OriginError> {
        let response = self
            .client
            .get(format!("{}/{}/json/", self.base_url, ip))
            .send()
            .await
            .map_err(|e| OriginError::Lookup(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Reputation lookup returned error status");
            return Err(OriginError::Lookup(format!("status {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OriginError::Lookup(format!("malformed response: {}", e)))?;

        classify(&body)
    }
}

fn classify(body: &Value) -> Result<OriginVerdict, OriginError> {
    if !body.is_object() {
        return Err(OriginError::Lookup("response is not a JSON object".into()));
    }

    if body.get("error") == Some(&Value::Bool(true)) {
        let reason = body
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unspecified");
        return Err(OriginError::Lookup(format!("lookup refused: {}", reason)));
    }

    let proxy = body.get("proxy") == Some(&Value::Bool(true));
    let vpn = body.pointer("/security/vpn") == Some(&Value::Bool(true));
    debug!(proxy, vpn, "Reputation signals");

    if proxy || vpn {
        Ok(OriginVerdict::Proxied)
    } else {
        Ok(OriginVerdict::Clean)
    }
}

/// Caller address to screen.
///
/// With no trusted proxies the transport peer is the caller and
/// `X-Forwarded-For` is ignored. Behind `trusted_proxies` proxies, each of
/// which appends the address it received from, the caller is the entry that
/// many places from the right. A header too short to hold that entry, or an
/// entry that is not an IP address, yields `None`.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trusted_proxies: usize,
) -> Option<IpAddr> {
    if trusted_proxies == 0 {
        return peer.map(|addr| addr.ip());
    }

    let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    else {
        debug!(?peer, "No X-Forwarded-For behind trusted proxy");
        return None;
    };

    let entries: Vec<&str> = forwarded.split(',').map(str::trim).collect();
    let index = entries.len().checked_sub(trusted_proxies)?;
    let ip = entries[index].parse::<IpAddr>().ok();
    if ip.is_none() {
        warn!(%forwarded, trusted_proxies, "Unusable X-Forwarded-For entry");
    }
    ip
}
