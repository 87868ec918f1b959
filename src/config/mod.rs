//! Configuration management
//!
//! All configuration comes from environment variables (optionally via a
//! `.env` file loaded by the binary). There is no config file: the
//! deployment surface is two datastore values plus webhook overrides.

use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default analysis webhook endpoint
pub const DEFAULT_WEBHOOK_URL: &str =
    "https://n8n.icc-e.org/webhook/0c67f547-a6b6-431a-9368-68dd2d8a4a8b";

/// Default IP echo service used for best-effort anonymous usage rows
pub const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org?format=json";

/// Main configuration for the gateway core
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote quota store (Supabase/PostgREST) settings
    #[serde(default)]
    pub store: QuotaStoreConfig,
    /// Analysis webhook settings
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Device-local fallback store settings
    #[serde(default)]
    pub local_store: LocalStoreConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment variables");

        let mut config = Config::default();

        if let Ok(url) = env::var("SUPABASE_URL") {
            config.store.url = url;
        }
        if let Ok(key) = env::var("SUPABASE_ANON_KEY") {
            config.store.anon_key = key;
        }
        if let Ok(url) = env::var("PRENSA_IP_ECHO_URL") {
            config.store.ip_echo_url = url;
        }
        if let Ok(url) = env::var("PRENSA_WEBHOOK_URL") {
            config.webhook.url = url;
        }
        if let Ok(timeout) = env::var("PRENSA_WEBHOOK_TIMEOUT_SECS") {
            config.webhook.timeout_secs = timeout.parse().map_err(|_| {
                GatewayError::config("PRENSA_WEBHOOK_TIMEOUT_SECS must be an integer")
            })?;
        }
        if let Ok(path) = env::var("PRENSA_LOCAL_STORE") {
            config.local_store.path = PathBuf::from(path);
        }

        config.validate()?;

        if config.store.is_configured() {
            info!("Remote quota store configured at {}", config.store.url);
        } else {
            info!("Remote quota store not configured, running in local-only mode");
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.webhook.timeout_secs == 0 {
            return Err(GatewayError::config("webhook timeout must be non-zero"));
        }
        url::Url::parse(&self.webhook.url)
            .map_err(|e| GatewayError::config(format!("invalid webhook URL: {}", e)))?;
        if self.store.is_configured() {
            url::Url::parse(&self.store.url)
                .map_err(|e| GatewayError::config(format!("invalid quota store URL: {}", e)))?;
        }
        Ok(())
    }
}

/// Remote quota store (Supabase/PostgREST) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStoreConfig {
    /// Project base URL (e.g. `https://xyz.supabase.co`)
    #[serde(default)]
    pub url: String,
    /// Anonymous API key
    #[serde(default)]
    pub anon_key: String,
    /// IP echo service for best-effort anonymous usage rows
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: String,
}

impl Default for QuotaStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            ip_echo_url: default_ip_echo_url(),
        }
    }
}

impl QuotaStoreConfig {
    /// Whether the remote store can be used at all.
    ///
    /// Empty values and the well-known scaffold placeholders both mean
    /// "not configured" and put the gateway in local-only mode.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
            && !self.anon_key.is_empty()
            && !self.url.contains("tu-proyecto")
            && !self.anon_key.contains("tu-anon-key")
    }
}

/// Analysis webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook endpoint URL
    #[serde(default = "default_webhook_url")]
    pub url: String,
    /// Hard cancellation timeout for the analysis request, in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: default_webhook_url(),
            timeout_secs: default_webhook_timeout(),
        }
    }
}

/// Device-local fallback store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    /// Path of the JSON usage document
    #[serde(default = "default_local_store_path")]
    pub path: PathBuf,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            path: default_local_store_path(),
        }
    }
}

fn default_webhook_url() -> String {
    DEFAULT_WEBHOOK_URL.to_string()
}

fn default_webhook_timeout() -> u64 {
    60
}

fn default_ip_echo_url() -> String {
    DEFAULT_IP_ECHO_URL.to_string()
}

fn default_local_store_path() -> PathBuf {
    PathBuf::from("data/anonymous_quota.json")
}
