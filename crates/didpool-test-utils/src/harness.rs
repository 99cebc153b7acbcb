// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full allocation stack against a temp SQLite
//! database: one seeded tenant with an API key and an admin, the side-effect
//! dispatcher, a [`RecordingNotifier`], the allocation handler, and the HTTP
//! router.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use didpool_config::model::{DidpoolConfig, RotationConfig};
use didpool_core::types::{AllocationRequest, DidId, TenantContext, TenantId};
use didpool_core::{DidpoolError, TenantResolver};
use didpool_gateway::{GatewayState, HealthState};
use didpool_rotation::{
    AllocationHandler, AllocationOutcome, DispatchSettings, DispatchTargets, Dispatcher, dispatch,
};
use didpool_storage::queries::{dids, tenants};
use didpool_storage::{Database, NewDid, SqliteStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_notifier::RecordingNotifier;

pub const TEST_API_KEY: &str = "did_test_key";
pub const TEST_ADMIN: &str = "admin@acme.test";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    rotation: RotationConfig,
    tenant_capacity: Option<u32>,
    dids: Vec<NewDid>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            rotation: RotationConfig::default(),
            tenant_capacity: None,
            dids: Vec::new(),
        }
    }

    /// Override rotation settings.
    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the tenant-level capacity override.
    pub fn with_tenant_capacity(mut self, capacity: u32) -> Self {
        self.tenant_capacity = Some(capacity);
        self
    }

    /// Seed a DID into the tenant's pool.
    pub fn with_did(mut self, did: NewDid) -> Self {
        self.dids.push(did);
        self
    }

    /// Seed `count` active, unscored DIDs created one minute apart.
    pub fn with_pool(mut self, count: usize) -> Self {
        let base = chrono::Utc::now() - chrono::Duration::days(1);
        for i in 0..count {
            self.dids.push(NewDid {
                created_at: base + chrono::Duration::minutes(i as i64),
                ..NewDid::new(format!("+1555000{:04}", i + 1))
            });
        }
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, DidpoolError> {
        let temp_dir = tempfile::TempDir::new().map_err(DidpoolError::storage)?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let tenant_id = TenantId::from("acme");
        let tenant = tenants::create_tenant(&db, &tenant_id, "Acme", self.tenant_capacity).await?;
        tenants::add_api_key(&db, &tenant_id, TEST_API_KEY).await?;
        tenants::add_admin(&db, &tenant_id, TEST_ADMIN).await?;

        let mut did_ids = Vec::with_capacity(self.dids.len());
        for did in self.dids {
            did_ids.push(dids::insert_did(&db, &tenant_id, did).await?);
        }

        let store = Arc::new(SqliteStore::from_database(db));
        let notifier = Arc::new(RecordingNotifier::new());
        let shutdown = CancellationToken::new();
        let (dispatcher, worker) = dispatch::spawn(
            DispatchTargets {
                call_records: store.clone(),
                admins: store.clone(),
                notifier: notifier.clone(),
            },
            DispatchSettings {
                queue_capacity: 256,
                max_attempts: 3,
                retry_backoff: Duration::from_millis(1),
                alert_cooldown: Duration::ZERO,
            },
            shutdown.clone(),
        );

        let allocator = AllocationHandler::new(&self.rotation, store.clone(), dispatcher.clone());
        let config = DidpoolConfig {
            rotation: self.rotation,
            ..DidpoolConfig::default()
        };

        Ok(TestHarness {
            store,
            notifier,
            allocator,
            dispatcher,
            tenant,
            did_ids,
            config,
            shutdown,
            worker: Some(worker),
            _temp_dir: temp_dir,
        })
    }
}

/// A complete allocation environment on a temp database.
pub struct TestHarness {
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    /// Captures pool-exhaustion alerts.
    pub notifier: Arc<RecordingNotifier>,
    pub allocator: AllocationHandler,
    pub dispatcher: Dispatcher,
    /// The seeded tenant. Its API key is [`TEST_API_KEY`].
    pub tenant: TenantContext,
    /// Ids of the seeded DIDs, in seeding order.
    pub did_ids: Vec<DidId>,
    pub config: DidpoolConfig,
    shutdown: CancellationToken,
    worker: Option<JoinHandle<()>>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The open database, for provisioning and assertions.
    pub fn db(&self) -> &Database {
        // `build` always supplies an opened database.
        match self.store.database() {
            Ok(db) => db,
            Err(e) => panic!("harness store has no database: {e}"),
        }
    }

    /// Allocate for the seeded tenant.
    pub async fn allocate(
        &self,
        request: AllocationRequest,
    ) -> Result<AllocationOutcome, DidpoolError> {
        self.allocator.allocate(&self.tenant, request).await
    }

    /// The HTTP router wired to this harness, without a metrics renderer.
    pub fn router(&self) -> Router {
        let tenants: Arc<dyn TenantResolver> = self.store.clone();
        didpool_gateway::router(
            GatewayState {
                allocator: self.allocator.clone(),
                tenants,
                health: HealthState {
                    start_time: std::time::Instant::now(),
                    storage: self.store.clone(),
                    prometheus_render: None,
                },
            },
            self.config.server.max_concurrent_requests,
        )
    }

    /// Apply every queued side effect and stop the worker.
    ///
    /// Effects dispatched afterwards are dropped.
    pub async fn drain_side_effects(&mut self) {
        self.shutdown.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}
