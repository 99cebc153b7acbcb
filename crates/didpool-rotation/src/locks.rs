// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant allocation serialization.
//!
//! One async mutex per tenant covers the load, select, and record span of an
//! allocation, so requests for the same tenant never interleave within a
//! process. Different tenants proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use didpool_core::types::TenantId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-tenant allocation locks.
#[derive(Default)]
pub struct TenantLocks {
    locks: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `tenant_id`'s rotation.
    ///
    /// The guard is owned so it can move into a detached recording task.
    pub async fn acquire(&self, tenant_id: &TenantId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(tenant_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of tenants that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_tenant_is_exclusive() {
        let locks = TenantLocks::new();
        let tenant = TenantId::from("acme");

        let guard = locks.acquire(&tenant).await;
        let second = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&tenant)).await;
        assert!(second.is_err(), "second acquire should wait while the first is held");

        drop(guard);
        let third = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&tenant)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn different_tenants_do_not_block() {
        let locks = TenantLocks::new();
        let _a = locks.acquire(&TenantId::from("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(&TenantId::from("b"))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
