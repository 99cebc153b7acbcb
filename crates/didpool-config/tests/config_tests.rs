// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the didpool configuration system.

use didpool_config::diagnostic::ConfigError;
use didpool_config::model::DidpoolConfig;
use didpool_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_didpool_config() {
    let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
log_level = "debug"
max_concurrent_requests = 64

[storage]
database_path = "/tmp/didpool-test.db"
wal_mode = false

[rotation]
reputation_threshold = 60
default_capacity = 250
cycle_max_age_secs = 3600
state_cache_ttl_ms = 1000
state_cache_enabled = false
fallback_did = "+15550000000"
max_conflict_retries = 5

[dispatch]
queue_capacity = 16
max_attempts = 5
retry_backoff_ms = 10
alert_cooldown_secs = 60

[email]
enabled = true
smtp_host = "smtp.example.com"
smtp_port = 2525
smtp_username = "alerts"
smtp_password = "s3cret"
from_address = "Alerts <alerts@example.com>"

[prometheus]
enabled = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.server.max_concurrent_requests, 64);
    assert_eq!(config.storage.database_path, "/tmp/didpool-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.rotation.reputation_threshold, 60);
    assert_eq!(config.rotation.default_capacity, 250);
    assert_eq!(config.rotation.cycle_max_age_secs, 3600);
    assert_eq!(config.rotation.state_cache_ttl_ms, 1000);
    assert!(!config.rotation.state_cache_enabled);
    assert_eq!(config.rotation.fallback_did, "+15550000000");
    assert_eq!(config.rotation.max_conflict_retries, 5);
    assert_eq!(config.dispatch.queue_capacity, 16);
    assert_eq!(config.dispatch.max_attempts, 5);
    assert_eq!(config.dispatch.retry_backoff_ms, 10);
    assert_eq!(config.dispatch.alert_cooldown_secs, 60);
    assert!(config.email.enabled);
    assert_eq!(config.email.smtp_host.as_deref(), Some("smtp.example.com"));
    assert_eq!(config.email.smtp_port, 2525);
    assert_eq!(config.email.smtp_password.as_deref(), Some("s3cret"));
    assert!(!config.prometheus.enabled);
}

/// Missing sections use defaults without error.
#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 5000);
    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.wal_mode);
    assert!(config.storage.database_path.ends_with("didpool.db"));
    assert_eq!(config.rotation.reputation_threshold, 50);
    assert_eq!(config.rotation.default_capacity, 100);
    assert_eq!(config.rotation.default_reputation_score, 50);
    assert_eq!(config.rotation.cycle_max_age_secs, 86_400);
    assert_eq!(config.rotation.usage_retention_days, 30);
    assert_eq!(config.rotation.state_cache_ttl_ms, 5_000);
    assert_eq!(config.rotation.fallback_did, "+18005551234");
    assert_eq!(config.dispatch.queue_capacity, 1024);
    assert_eq!(config.dispatch.max_attempts, 3);
    assert_eq!(config.dispatch.alert_cooldown_secs, 300);
    assert!(!config.email.enabled);
    assert_eq!(config.email.smtp_port, 587);
    assert!(config.prometheus.enabled);
}

/// A dotted override (what the env provider produces) wins over TOML.
#[test]
fn dotted_override_wins_over_toml() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[rotation]
fallback_did = "+15551112222"
"#;

    let config: DidpoolConfig = Figment::new()
        .merge(Serialized::defaults(DidpoolConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("rotation.fallback_did", "+15553334444"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.rotation.fallback_did, "+15553334444");
}

/// Unknown field in [rotation] yields an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_rotation_key_suggests_correction() {
    let toml = r#"
[rotation]
falback_did = "+15550000000"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "falback_did"
                && suggestion.as_deref() == Some("fallback_did")
                && valid_keys.contains("reputation_threshold")
        })
    });
    assert!(found, "expected UnknownKey for falback_did, got: {errors:?}");
}

/// Unexpected top-level section is rejected.
#[test]
fn unknown_top_level_section_rejected() {
    let toml = r#"
[billing]
plan = "pro"
"#;

    let err = load_config_from_str(toml).expect_err("unknown section should be rejected");
    let err_str = err.to_string();
    assert!(
        err_str.contains("unknown field") || err_str.contains("billing"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Wrong value type produces an InvalidType diagnostic.
#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[server]
port = "five thousand"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_))),
        "expected a type error, got: {errors:?}"
    );
}

/// Semantic validation runs after a successful parse.
#[test]
fn validation_errors_surface_from_str_loader() {
    let toml = r#"
[rotation]
default_capacity = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero capacity should fail");
    assert!(errors.iter().any(
        |e| matches!(e, ConfigError::Validation { message } if message.contains("default_capacity"))
    ));
}

/// Explicit config path is honoured.
#[test]
fn load_from_explicit_path() {
    let dir = std::env::temp_dir().join(format!("didpool-config-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("didpool.toml");
    std::fs::write(&path, "[server]\nport = 6001\n").unwrap();

    let config = load_and_validate_path(&path).expect("file config should validate");
    assert_eq!(config.server.port, 6001);

    std::fs::remove_dir_all(&dir).ok();
}

/// ConfigError renders through miette with its code and help.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "prot".to_string(),
        suggestion: Some("port".to_string()),
        valid_keys: "host, port, log_level, max_concurrent_requests".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some());
    let help = error.help().expect("should have help").to_string();
    assert!(help.contains("did you mean `port`"));

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("prot"));
}
