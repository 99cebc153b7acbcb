// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::DidpoolConfig;

/// Validate a deserialized configuration, collecting every failure.
pub fn validate_config(config: &DidpoolConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.max_concurrent_requests == 0 {
        errors.push(ConfigError::validation(
            "server.max_concurrent_requests must be at least 1",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let rotation = &config.rotation;
    if rotation.reputation_threshold > 100 {
        errors.push(ConfigError::validation(format!(
            "rotation.reputation_threshold must be between 0 and 100, got {}",
            rotation.reputation_threshold
        )));
    }
    if rotation.default_reputation_score > 100 {
        errors.push(ConfigError::validation(format!(
            "rotation.default_reputation_score must be between 0 and 100, got {}",
            rotation.default_reputation_score
        )));
    }
    if rotation.default_capacity == 0 {
        errors.push(ConfigError::validation(
            "rotation.default_capacity must be at least 1",
        ));
    }
    if rotation.usage_retention_days == 0 {
        errors.push(ConfigError::validation(
            "rotation.usage_retention_days must be at least 1",
        ));
    }
    if rotation.cycle_max_age_secs == 0 {
        errors.push(ConfigError::validation(
            "rotation.cycle_max_age_secs must be at least 1",
        ));
    }
    if rotation.fallback_did.trim().is_empty() {
        errors.push(ConfigError::validation(
            "rotation.fallback_did must not be empty",
        ));
    }

    if config.dispatch.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "dispatch.max_attempts must be at least 1",
        ));
    }
    if config.dispatch.queue_capacity == 0 {
        errors.push(ConfigError::validation(
            "dispatch.queue_capacity must be at least 1",
        ));
    }

    if config.email.enabled
        && config
            .email
            .smtp_host
            .as_deref()
            .is_none_or(|h| h.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "email.smtp_host is required when email.enabled = true",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
