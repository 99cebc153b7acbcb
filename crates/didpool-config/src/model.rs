// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the didpool service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level didpool configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DidpoolConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// DID selection and rotation cycle settings.
    #[serde(default)]
    pub rotation: RotationConfig,

    /// Background side-effect dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Pool-exhaustion alert e-mail settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// Prometheus metrics exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP listener to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of in-flight HTTP requests.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent_requests() -> usize {
    256
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("didpool").join("didpool.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("didpool.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// DID selection and rotation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RotationConfig {
    /// Minimum reputation score (0-100) for a DID to count as healthy.
    #[serde(default = "default_reputation_threshold")]
    pub reputation_threshold: u8,

    /// Daily call cap for DIDs without their own capacity or a tenant override.
    #[serde(default = "default_capacity")]
    pub default_capacity: u32,

    /// Score assumed for DIDs the reputation job has not scored yet.
    #[serde(default = "default_reputation_score")]
    pub default_reputation_score: u8,

    /// Maximum age of a rotation cycle before it is reset regardless of coverage.
    #[serde(default = "default_cycle_max_age_secs")]
    pub cycle_max_age_secs: u64,

    /// Daily usage entries kept on each DID, today included.
    #[serde(default = "default_usage_retention_days")]
    pub usage_retention_days: u32,

    /// Time-to-live of cached rotation state, in milliseconds.
    #[serde(default = "default_state_cache_ttl_ms")]
    pub state_cache_ttl_ms: u64,

    /// Whether rotation state is cached in memory between requests.
    #[serde(default = "default_true")]
    pub state_cache_enabled: bool,

    /// Number returned when a tenant has no active DIDs at all.
    #[serde(default = "default_fallback_did")]
    pub fallback_did: String,

    /// How many times a lost rotation-state race is retried before failing the request.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            reputation_threshold: default_reputation_threshold(),
            default_capacity: default_capacity(),
            default_reputation_score: default_reputation_score(),
            cycle_max_age_secs: default_cycle_max_age_secs(),
            usage_retention_days: default_usage_retention_days(),
            state_cache_ttl_ms: default_state_cache_ttl_ms(),
            state_cache_enabled: default_true(),
            fallback_did: default_fallback_did(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

impl RotationConfig {
    /// Cycle max age as a [`Duration`].
    pub fn cycle_max_age(&self) -> Duration {
        Duration::from_secs(self.cycle_max_age_secs)
    }

    /// Cache TTL as a [`Duration`].
    pub fn state_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.state_cache_ttl_ms)
    }
}

fn default_reputation_threshold() -> u8 {
    50
}

fn default_capacity() -> u32 {
    100
}

fn default_reputation_score() -> u8 {
    50
}

fn default_cycle_max_age_secs() -> u64 {
    86_400
}

fn default_usage_retention_days() -> u32 {
    30
}

fn default_state_cache_ttl_ms() -> u64 {
    5_000
}

fn default_fallback_did() -> String {
    "+18005551234".to_string()
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

/// Background dispatcher configuration for call records and alerts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Bounded queue size; effects beyond it are dropped and logged.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Attempts per side effect, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_backoff_ms`.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Minimum seconds between pool-exhaustion alerts for one tenant.
    /// 0 sends an alert for every fallback response.
    #[serde(default = "default_alert_cooldown_secs")]
    pub alert_cooldown_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            alert_cooldown_secs: default_alert_cooldown_secs(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_alert_cooldown_secs() -> u64 {
    300
}

/// SMTP settings for pool-exhaustion alerts.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Send alerts over SMTP. When false, alerts are only logged.
    #[serde(default)]
    pub enabled: bool,

    /// SMTP relay hostname.
    #[serde(default)]
    pub smtp_host: Option<String>,

    /// SMTP relay port (587 = STARTTLS).
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP username, if the relay requires authentication.
    #[serde(default)]
    pub smtp_username: Option<String>,

    /// SMTP password. Never printed by `Debug`.
    #[serde(default)]
    pub smtp_password: Option<String>,

    /// `From` header for alert mail.
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: default_from_address(),
        }
    }
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("enabled", &self.enabled)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("from_address", &self.from_address)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_address() -> String {
    "DID Optimizer <noreply@localhost>".to_string()
}

/// Prometheus metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_defaults_match_documented_values() {
        let rotation = RotationConfig::default();
        assert_eq!(rotation.reputation_threshold, 50);
        assert_eq!(rotation.default_capacity, 100);
        assert_eq!(rotation.cycle_max_age(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(rotation.state_cache_ttl(), Duration::from_secs(5));
        assert_eq!(rotation.usage_retention_days, 30);
        assert!(rotation.state_cache_enabled);
    }

    #[test]
    fn email_debug_redacts_password() {
        let email = EmailConfig {
            smtp_password: Some("hunter2".to_string()),
            ..EmailConfig::default()
        };
        let rendered = format!("{email:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn rotation_section_rejects_unknown_fields() {
        let toml_str = r#"
[rotation]
reputation_treshold = 40
"#;
        assert!(toml::from_str::<DidpoolConfig>(toml_str).is_err());
    }
}
