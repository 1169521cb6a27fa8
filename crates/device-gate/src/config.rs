//! Configuration for the device gate.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Service configuration, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot token (`BOT_TOKEN`); signs launch data and authenticates the Bot API
    #[serde(default)]
    pub bot_token: Option<SecretString>,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// IP reputation lookup configuration
    #[serde(default)]
    pub origin: OriginConfig,

    /// Bot API configuration
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Binding store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Reverse proxies in front of the server that append to
    /// `X-Forwarded-For`; 0 means clients connect directly
    #[serde(default)]
    pub trusted_proxy_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OriginConfig {
    /// Reputation service base URL
    #[serde(default = "default_origin_api_url")]
    pub api_url: String,

    /// Lookup timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Which binding store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend selection
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    /// Path of the binding file (file backend)
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Optional hex AES-256 key for the binding file
    #[serde(default)]
    pub encryption_key: Option<SecretString>,

    /// Redis connection URL (redis backend)
    #[serde(default)]
    pub redis_url: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            trusted_proxy_count: 0,
        }
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            api_url: default_origin_api_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: default_telegram_api_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            encryption_key: None,
            redis_url: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_origin_api_url() -> String {
    "https://ipapi.co".into()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::File
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/data/bindings.json")
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::from_source(config)
    }

    fn from_source(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// The bot token, unless unset or blank.
    pub fn bot_token(&self) -> Option<&SecretString> {
        self.bot_token
            .as_ref()
            .filter(|token| !token.expose_secret().trim().is_empty())
    }
}
