// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rotation state cache in front of the rotation store.
//!
//! Injected into the allocator and owned by it, so it lives and dies with the
//! service instead of being process-global.

use std::time::Duration;

use dashmap::DashMap;
use didpool_core::types::{RotationState, TenantId};
use tokio::time::Instant;
use tracing::debug;

/// Short-lived per-tenant rotation state cache.
pub trait RotationStateCache: Send + Sync {
    /// A cached state that has not expired.
    fn get(&self, tenant_id: &TenantId) -> Option<RotationState>;

    /// Store `state` for `tenant_id`, restarting its TTL.
    fn set(&self, tenant_id: &TenantId, state: RotationState);

    /// Drop any entry for `tenant_id`.
    fn invalidate(&self, tenant_id: &TenantId);

    /// Drop every entry.
    fn clear(&self);
}

struct Entry {
    state: RotationState,
    stored_at: Instant,
}

/// [`RotationStateCache`] backed by a `DashMap` with a fixed TTL.
pub struct TtlStateCache {
    ttl: Duration,
    entries: DashMap<TenantId, Entry>,
}

impl TtlStateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RotationStateCache for TtlStateCache {
    fn get(&self, tenant_id: &TenantId) -> Option<RotationState> {
        let hit = self
            .entries
            .get(tenant_id)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.state.clone());
        if hit.is_none() {
            self.entries
                .remove_if(tenant_id, |_, entry| entry.stored_at.elapsed() >= self.ttl);
        }
        debug!(tenant_id = %tenant_id, hit = hit.is_some(), "rotation state cache lookup");
        hit
    }

    fn set(&self, tenant_id: &TenantId, state: RotationState) {
        self.entries.insert(
            tenant_id.clone(),
            Entry {
                state,
                stored_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, tenant_id: &TenantId) {
        self.entries.remove(tenant_id);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

/// Cache that never holds anything; every lookup goes to the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStateCache;

impl RotationStateCache for NoStateCache {
    fn get(&self, _tenant_id: &TenantId) -> Option<RotationState> {
        None
    }

    fn set(&self, _tenant_id: &TenantId, _state: RotationState) {}

    fn invalidate(&self, _tenant_id: &TenantId) {}

    fn clear(&self) {}
}
