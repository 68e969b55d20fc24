//! System configuration parameters
//!
//! Tunables for the SDL demo instrument plus the boot-time secrets.
//! `SystemConfig` values can be overridden via NVS; `Secrets` come from NVS
//! first and fall back to values baked in at build time.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Short fixed-capacity string used for URLs and names in config blobs.
pub type ConfigString = heapless::String<96>;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Broker ---
    /// MQTT broker URL (TLS)
    pub broker_url: ConfigString,
    /// Broker keep-alive (seconds)
    pub broker_keepalive_secs: u16,

    // --- Liveness ---
    /// Heartbeat publish interval (milliseconds)
    pub heartbeat_interval_ms: u32,
    /// Onboard LED toggle interval (milliseconds)
    pub blink_interval_ms: u32,

    // --- Link recovery ---
    /// Delay before the single boot-time connect retry (milliseconds)
    pub connect_retry_delay_ms: u32,
    /// First reconnect backoff (milliseconds)
    pub reconnect_backoff_min_ms: u32,
    /// Reconnect backoff ceiling (milliseconds)
    pub reconnect_backoff_max_ms: u32,
    /// Upper bound on the wait inside one inbound poll (milliseconds)
    pub poll_timeout_ms: u32,

    // --- Sinks ---
    /// Append-only local experiment log
    pub local_log_path: ConfigString,
    /// Remote Data-API insertOne endpoint
    pub remote_url: ConfigString,
    /// Remote cluster (Data-API `dataSource`)
    pub remote_cluster: ConfigString,
    /// Remote database name
    pub remote_database: ConfigString,
}

fn config_string(s: &str) -> ConfigString {
    let mut out = ConfigString::new();
    let _ = out.push_str(&s[..s.len().min(96)]);
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Broker
            broker_url: config_string("mqtts://test.mosquitto.org:8883"),
            broker_keepalive_secs: 30,

            // Liveness
            heartbeat_interval_ms: 15_000,
            blink_interval_ms: 5_000,

            // Link recovery
            connect_retry_delay_ms: 2_000,
            reconnect_backoff_min_ms: 2_000,
            reconnect_backoff_max_ms: 60_000,
            poll_timeout_ms: 10,

            // Sinks
            local_log_path: config_string("/flash/experiments.txt"),
            remote_url: config_string(
                "https://data.mongodb-api.com/app/data-sarkl/endpoint/data/v1/action/insertOne",
            ),
            remote_cluster: config_string("sparks-materials-informatics"),
            remote_database: config_string("clslab-light-mixing"),
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_url.is_empty() {
            return Err(ConfigError::ValidationFailed("broker_url must not be empty"));
        }
        if !(5..=600).contains(&self.broker_keepalive_secs) {
            return Err(ConfigError::ValidationFailed(
                "broker_keepalive_secs must be 5–600",
            ));
        }
        if !(1_000..=600_000).contains(&self.heartbeat_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_interval_ms must be 1000–600000",
            ));
        }
        if !(100..=60_000).contains(&self.blink_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "blink_interval_ms must be 100–60000",
            ));
        }
        if !(100..=10_000).contains(&self.connect_retry_delay_ms) {
            return Err(ConfigError::ValidationFailed(
                "connect_retry_delay_ms must be 100–10000",
            ));
        }
        if self.reconnect_backoff_min_ms == 0
            || self.reconnect_backoff_min_ms > self.reconnect_backoff_max_ms
        {
            return Err(ConfigError::ValidationFailed(
                "reconnect backoff must satisfy 0 < min <= max",
            ));
        }
        // The poll wait must stay well below the heartbeat cadence.
        if self.poll_timeout_ms > 100 {
            return Err(ConfigError::ValidationFailed("poll_timeout_ms must be 0–100"));
        }
        if !self.local_log_path.starts_with('/') {
            return Err(ConfigError::ValidationFailed(
                "local_log_path must be absolute",
            ));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Secrets
// ───────────────────────────────────────────────────────────────

/// Boot-time credentials.  Only the WiFi pair is needed for the core loop;
/// the remote database sink is disabled when its key or collection is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secrets {
    pub wifi_ssid: heapless::String<32>,
    pub wifi_password: heapless::String<64>,
    pub device_nickname: Option<heapless::String<32>>,
    pub remote_api_key: Option<heapless::String<96>>,
    pub remote_collection: Option<heapless::String<64>>,
}

/// Nickname reported when none was provisioned.
pub const ANONYMOUS_NICKNAME: &str = "anonymous";

fn opt_string<const N: usize>(value: Option<&str>) -> Option<heapless::String<N>> {
    let value = value.filter(|v| !v.is_empty())?;
    let mut s = heapless::String::new();
    s.push_str(value).ok()?;
    Some(s)
}

impl Secrets {
    /// Secrets baked in at compile time through `SDL_*` environment
    /// variables.  Used when NVS holds nothing.
    pub fn from_build_env() -> Self {
        Self {
            wifi_ssid: opt_string(option_env!("SDL_WIFI_SSID")).unwrap_or_default(),
            wifi_password: opt_string(option_env!("SDL_WIFI_PASSWORD")).unwrap_or_default(),
            device_nickname: opt_string(option_env!("SDL_DEVICE_NICKNAME")),
            remote_api_key: opt_string(option_env!("SDL_REMOTE_API_KEY")),
            remote_collection: opt_string(option_env!("SDL_REMOTE_COLLECTION")),
        }
    }

    pub fn has_wifi(&self) -> bool {
        !self.wifi_ssid.is_empty()
    }

    /// Nickname to attach to remote documents.
    pub fn nickname(&self) -> &str {
        self.device_nickname
            .as_deref()
            .unwrap_or(ANONYMOUS_NICKNAME)
    }

    /// API key and collection, if both were provisioned.
    pub fn remote_credentials(&self) -> Option<(&str, &str)> {
        match (&self.remote_api_key, &self.remote_collection) {
            (Some(key), Some(collection)) => Some((key.as_str(), collection.as_str())),
            _ => None,
        }
    }
}
