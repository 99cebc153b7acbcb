// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store traits for DIDs, rotation state, and call records.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::DidpoolError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CallRecord, Did, RotationState, TenantId, UsageUpdate};

/// Read access to a tenant's DID pool.
#[async_trait]
pub trait DidStore: PluginAdapter {
    /// All DIDs with `status = active` for the tenant.
    ///
    /// Each DID carries at most one daily usage entry, the one for `usage_date`.
    async fn active_dids(
        &self,
        tenant_id: &TenantId,
        usage_date: NaiveDate,
    ) -> Result<Vec<Did>, DidpoolError>;
}

/// Durable per-tenant rotation state.
#[async_trait]
pub trait RotationStore: PluginAdapter {
    /// The persisted rotation state, or `None` if the tenant never allocated.
    async fn load_rotation_state(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<RotationState>, DidpoolError>;
}

/// Append-only call record sink.
#[async_trait]
pub trait CallRecordStore: PluginAdapter {
    /// Inserts a call record.
    async fn insert_call_record(&self, record: &CallRecord) -> Result<(), DidpoolError>;
}

/// A store able to apply an allocation atomically.
#[async_trait]
pub trait AllocationStore: DidStore + RotationStore + CallRecordStore {
    /// Applies the DID usage update and writes `state` in one transaction.
    ///
    /// The rotation write is conditional on the persisted version still being
    /// `state.version`; otherwise nothing is written and
    /// [`DidpoolError::RotationConflict`] is returned. On success the state is
    /// returned with its new version.
    async fn commit_allocation(
        &self,
        usage: &UsageUpdate,
        state: &RotationState,
    ) -> Result<RotationState, DidpoolError>;
}
