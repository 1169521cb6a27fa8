//! Device bindings: which device a user first verified from.

mod file;
mod kv;
mod memory;

pub use file::FileStore;
pub use kv::RedisStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

/// The device a user identity is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceBinding {
    /// Device fingerprint presented on first verification
    pub device_id: String,

    /// Caller address at binding time
    pub ip: IpAddr,

    /// When the binding was created
    pub verified_at: DateTime<Utc>,
}

impl DeviceBinding {
    /// Create a binding stamped with the current time.
    pub fn new(device_id: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            device_id: device_id.into(),
            ip,
            verified_at: Utc::now(),
        }
    }
}

/// Result of an atomic create-if-absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// No binding existed; the candidate was stored.
    Created(DeviceBinding),
    /// A binding already existed and was left untouched.
    Existing(DeviceBinding),
}

/// Durable user → device mapping.
///
/// There is no unconditional write: the first binding for a
/// user can only be created through [`BindingStore::bind_if_absent`].
#[async_trait]
pub trait BindingStore: Send + Sync {
    /// Look up the binding for a user.
    async fn get(&self, user_id: i64) -> Result<Option<DeviceBinding>, StoreError>;

    /// Store `binding` unless one exists already, in a single atomic step.
    async fn bind_if_absent(
        &self,
        user_id: i64,
        binding: DeviceBinding,
    ) -> Result<BindOutcome, StoreError>;
}

/// Key under which a user's binding is stored in key-value backends.
pub fn binding_key(user_id: i64) -> String {
    format!("user:{}", user_id)
}

/// Open the backend selected by configuration.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn BindingStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory binding store (bindings are lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let key = config
                .encryption_key
                .as_ref()
                .map(|k| parse_encryption_key(k.expose_secret()))
                .transpose()?;
            info!(path = ?config.path, encrypted = key.is_some(), "Using file binding store");
            Ok(Arc::new(FileStore::open(config.path.clone(), key).await?))
        }
        StoreBackend::Redis => {
            let url = config.redis_url.as_ref().ok_or_else(|| {
                StoreError::Config("STORE__REDIS_URL is required for the redis backend".into())
            })?;
            info!("Using Redis binding store");
            Ok(Arc::new(RedisStore::connect(url.expose_secret()).await?))
        }
    }
}

/// Parse a 64-character hex string into an AES-256 key.
pub fn parse_encryption_key(hex_key: &str) -> Result<[u8; 32], StoreError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| StoreError::Config(format!("encryption key is not hex: {}", e)))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        StoreError::Config(format!(
            "encryption key must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}
