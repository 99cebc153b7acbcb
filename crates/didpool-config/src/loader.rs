// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./didpool.toml` > `~/.config/didpool/didpool.toml` >
//! `/etc/didpool/didpool.toml`, with `DIDPOOL_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::DidpoolConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/didpool/didpool.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "didpool.toml";

/// Sections that may be addressed from `DIDPOOL_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "server",
    "storage",
    "rotation",
    "dispatch",
    "email",
    "prometheus",
];

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("didpool").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/didpool/didpool.toml`
/// 3. `~/.config/didpool/didpool.toml`
/// 4. `./didpool.toml`
/// 5. `DIDPOOL_*` environment variables
pub fn load_config() -> Result<DidpoolConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DidpoolConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DidpoolConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DidpoolConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DidpoolConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DidpoolConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping `DIDPOOL_ROTATION_FALLBACK_DID` to
/// `rotation.fallback_did`.
///
/// Only the first underscore after a known section name becomes a dot, so keys
/// that themselves contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("DIDPOOL_").map(|key| env_key_to_path(key.as_str()).into())
}

fn env_key_to_path(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_first_underscore_only() {
        assert_eq!(
            env_key_to_path("rotation_fallback_did"),
            "rotation.fallback_did"
        );
        assert_eq!(
            env_key_to_path("email_smtp_password"),
            "email.smtp_password"
        );
        assert_eq!(env_key_to_path("server_port"), "server.port");
    }

    #[test]
    fn unknown_env_section_is_left_alone() {
        assert_eq!(env_key_to_path("unrelated_key"), "unrelated_key");
    }
}
