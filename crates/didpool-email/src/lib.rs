// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pool-exhaustion alert delivery.
//!
//! [`SmtpNotifier`] sends the alert to a tenant's admins through an SMTP
//! relay via lettre. [`LogNotifier`] only logs it and is used when
//! `email.enabled` is false.

pub mod render;

use std::sync::Arc;

use async_trait::async_trait;
use didpool_config::model::EmailConfig;
use didpool_core::error::DidpoolError;
use didpool_core::traits::{Notifier, PluginAdapter};
use didpool_core::types::{AdapterType, HealthStatus, PoolExhaustedAlert};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

pub use render::{ALERT_SUBJECT, AlertMessage, render_alert};

fn notification_error(
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> DidpoolError {
    DidpoolError::Notification {
        message: message.into(),
        source: Some(Box::new(source)),
    }
}

/// Sends alerts over SMTP (STARTTLS).
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Creates a notifier for `config`.
    ///
    /// Requires `config.smtp_host` and a parseable `config.from_address`.
    pub fn new(config: &EmailConfig) -> Result<Self, DidpoolError> {
        let host = config
            .smtp_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DidpoolError::Config("email.smtp_host is required for SMTP alerts".into()))?;

        let from: Mailbox = config.from_address.parse().map_err(|e| {
            DidpoolError::Config(format!(
                "email.from_address {:?} is not a valid mailbox: {e}",
                config.from_address
            ))
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| notification_error(format!("invalid SMTP relay {host}"), e))?
            .port(config.smtp_port);

        if let Some(username) = &config.smtp_username {
            let password = SecretString::from(config.smtp_password.clone().unwrap_or_default());
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, alert: &PoolExhaustedAlert) -> Result<Option<Message>, DidpoolError> {
        let rendered = render_alert(alert);
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(rendered.subject);

        let mut recipients = 0usize;
        for address in &alert.recipients {
            match address.parse::<Mailbox>() {
                Ok(mailbox) => {
                    builder = builder.to(mailbox);
                    recipients += 1;
                }
                Err(e) => {
                    warn!(tenant_id = %alert.tenant_id, address, error = %e, "skipping invalid admin address");
                }
            }
        }
        if recipients == 0 {
            return Ok(None);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(rendered.text, rendered.html))
            .map(Some)
            .map_err(|e| notification_error("failed to build alert message", e))
    }
}

#[async_trait]
impl PluginAdapter for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, DidpoolError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded("SMTP relay refused NOOP".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("SMTP relay unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), DidpoolError> {
        debug!("SMTP notifier shutting down");
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify_pool_exhausted(&self, alert: &PoolExhaustedAlert) -> Result<(), DidpoolError> {
        let Some(message) = self.build_message(alert)? else {
            warn!(tenant_id = %alert.tenant_id, "no deliverable admin addresses for alert");
            return Ok(());
        };
        self.transport
            .send(message)
            .await
            .map_err(|e| notification_error("SMTP send failed", e))?;
        info!(
            tenant_id = %alert.tenant_id,
            recipients = alert.recipients.len(),
            "pool exhaustion alert sent"
        );
        Ok(())
    }
}

/// Logs alerts instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl PluginAdapter for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, DidpoolError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DidpoolError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_pool_exhausted(&self, alert: &PoolExhaustedAlert) -> Result<(), DidpoolError> {
        let rendered = render_alert(alert);
        warn!(
            tenant_id = %alert.tenant_id,
            recipients = ?alert.recipients,
            campaign_id = alert.campaign_id.as_deref().unwrap_or("Unknown"),
            agent_id = alert.agent_id.as_deref().unwrap_or("Unknown"),
            subject = %rendered.subject,
            "pool exhaustion alert (email disabled)"
        );
        Ok(())
    }
}

/// The notifier `config` asks for.
pub fn notifier_from_config(config: &EmailConfig) -> Result<Arc<dyn Notifier>, DidpoolError> {
    if config.enabled {
        Ok(Arc::new(SmtpNotifier::new(config)?))
    } else {
        Ok(Arc::new(LogNotifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use didpool_core::types::TenantId;

    fn smtp_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            smtp_host: Some("smtp.example.com".into()),
            smtp_username: Some("alerts".into()),
            smtp_password: Some("hunter2".into()),
            ..EmailConfig::default()
        }
    }

    fn alert(recipients: &[&str]) -> PoolExhaustedAlert {
        PoolExhaustedAlert {
            tenant_id: TenantId::from("acme"),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            campaign_id: Some("spring".into()),
            agent_id: None,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn smtp_requires_host() {
        let config = EmailConfig {
            smtp_host: None,
            ..smtp_config()
        };
        let err = SmtpNotifier::new(&config).err().expect("should fail");
        assert!(err.to_string().contains("smtp_host"));
    }

    #[test]
    fn smtp_rejects_bad_from_address() {
        let config = EmailConfig {
            from_address: "not an address".into(),
            ..smtp_config()
        };
        let err = SmtpNotifier::new(&config).err().expect("should fail");
        assert!(err.to_string().contains("from_address"));
    }

    #[tokio::test]
    async fn message_addresses_every_valid_admin() {
        let notifier = SmtpNotifier::new(&smtp_config()).unwrap();
        let message = notifier
            .build_message(&alert(&["a@acme.test", "broken", "b@acme.test"]))
            .unwrap()
            .expect("has recipients");
        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 2);
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: DID Pool Capacity Exhausted"));
    }

    #[tokio::test]
    async fn no_valid_admin_means_no_message() {
        let notifier = SmtpNotifier::new(&smtp_config()).unwrap();
        assert!(notifier.build_message(&alert(&["nope"])).unwrap().is_none());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn log_notifier_logs_and_succeeds() {
        LogNotifier
            .notify_pool_exhausted(&alert(&["ops@acme.test"]))
            .await
            .unwrap();
        assert!(logs_contain("pool exhaustion alert (email disabled)"));
    }

    #[test]
    fn disabled_email_uses_log_notifier() {
        let notifier = notifier_from_config(&EmailConfig::default()).unwrap();
        assert_eq!(notifier.name(), "log");
    }
}
