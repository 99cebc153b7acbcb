// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for didpool.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Metrics are
//! rendered as Prometheus text by [`PrometheusAdapter::render`], which the
//! gateway serves on `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use didpool_core::traits::adapter::PluginAdapter;
use didpool_core::types::{AdapterType, HealthStatus};
use didpool_core::DidpoolError;

pub use recording::{
    record_allocation, record_conflict, record_cycle_reset, record_fallback,
    record_selection_latency, record_side_effect, set_pool_stats,
};

/// Prometheus metrics adapter.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, DidpoolError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            DidpoolError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wrap an existing handle, e.g. from a recorder built for tests.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, DidpoolError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DidpoolError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> PrometheusAdapter {
        // The global recorder can only be installed once per process.
        PrometheusAdapter::from_handle(PrometheusBuilder::new().build_recorder().handle())
    }

    #[test]
    fn adapter_identity() {
        let adapter = adapter();
        assert_eq!(adapter.name(), "prometheus");
        assert_eq!(adapter.adapter_type(), AdapterType::Observability);
    }

    #[tokio::test]
    async fn adapter_is_always_healthy() {
        assert_eq!(adapter().health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
