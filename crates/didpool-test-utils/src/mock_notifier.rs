// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock notifier for deterministic testing.
//!
//! `RecordingNotifier` implements `Notifier` and captures every alert for
//! assertion in tests. It can be switched to fail to exercise retry paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use didpool_core::DidpoolError;
use didpool_core::traits::{Notifier, PluginAdapter};
use didpool_core::types::{AdapterType, HealthStatus, PoolExhaustedAlert};

/// A notifier that records alerts instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<PoolExhaustedAlert>>>,
    failures_left: AtomicU32,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` deliveries.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// All alerts delivered so far.
    pub async fn alerts(&self) -> Vec<PoolExhaustedAlert> {
        self.alerts.lock().await.clone()
    }

    pub async fn alert_count(&self) -> usize {
        self.alerts.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for RecordingNotifier {
    fn name(&self) -> &str {
        "recording-notifier"
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
impl Notifier for RecordingNotifier {
    async fn notify_pool_exhausted(&self, alert: &PoolExhaustedAlert) -> Result<(), DidpoolError> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DidpoolError::Notification {
                message: "mock delivery failure".into(),
                source: None,
            });
        }
        self.alerts.lock().await.push(alert.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use didpool_core::types::TenantId;

    fn alert() -> PoolExhaustedAlert {
        PoolExhaustedAlert {
            tenant_id: TenantId::from("t1"),
            recipients: vec!["ops@example.com".into()],
            campaign_id: None,
            agent_id: None,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_alerts() {
        let notifier = RecordingNotifier::new();
        notifier.notify_pool_exhausted(&alert()).await.unwrap();
        assert_eq!(notifier.alert_count().await, 1);
    }

    #[tokio::test]
    async fn fails_requested_number_of_times() {
        let notifier = RecordingNotifier::new();
        notifier.fail_next(2);
        assert!(notifier.notify_pool_exhausted(&alert()).await.is_err());
        assert!(notifier.notify_pool_exhausted(&alert()).await.is_err());
        assert!(notifier.notify_pool_exhausted(&alert()).await.is_ok());
        assert_eq!(notifier.alert_count().await, 1);
    }
}
