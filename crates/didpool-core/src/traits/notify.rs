// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification sender trait.

use async_trait::async_trait;

use crate::error::DidpoolError;
use crate::traits::adapter::PluginAdapter;
use crate::types::PoolExhaustedAlert;

/// Delivers operator alerts. Callers never await this on the allocation path.
#[async_trait]
pub trait Notifier: PluginAdapter {
    /// Sends a pool-exhaustion alert to `alert.recipients`.
    async fn notify_pool_exhausted(&self, alert: &PoolExhaustedAlert) -> Result<(), DidpoolError>;
}
