use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::Error;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub intranet: IntranetConfig,
}

/// Intranet client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntranetConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-call deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pagination safety bound.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://intranet.sgdf.fr".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_pages() -> usize {
    50
}
fn default_max_retries() -> usize {
    1
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "sgdf-intranet/0.1 (member directory client)".to_string()
}

impl Default for IntranetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_pages: default_max_pages(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl IntranetConfig {
    /// Same defaults, pointed at another host (staging, mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> Result<Url, Error> {
        Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("base_url {:?}: {}", self.base_url, e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("SGDF")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid intranet configuration")
    }
}
