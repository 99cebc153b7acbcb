// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant-facing collaborators: API-key resolution and the admin directory.

use async_trait::async_trait;

use crate::error::DidpoolError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{TenantContext, TenantId};

/// Resolves a presented API key to the owning tenant.
#[async_trait]
pub trait TenantResolver: PluginAdapter {
    /// Returns `None` for unknown or revoked keys.
    async fn resolve_api_key(&self, api_key: &str) -> Result<Option<TenantContext>, DidpoolError>;
}

/// Lists the people to alert about a tenant's pool.
#[async_trait]
pub trait AdminDirectory: PluginAdapter {
    /// E-mail addresses of the tenant's administrators.
    async fn admin_emails(&self, tenant_id: &TenantId) -> Result<Vec<String>, DidpoolError>;
}
