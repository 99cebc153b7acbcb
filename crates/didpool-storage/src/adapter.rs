// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the store and tenant-directory traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::OnceCell;
use tracing::debug;

use didpool_config::model::StorageConfig;
use didpool_core::types::{
    CallRecord, Did, RotationState, TenantContext, TenantId, UsageUpdate,
};
use didpool_core::{
    AdapterType, AdminDirectory, AllocationStore, CallRecordStore, DidStore, DidpoolError,
    HealthStatus, PluginAdapter, RotationStore, TenantResolver,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed store.
///
/// The database is opened lazily by [`SqliteStore::initialize`], or supplied
/// up front with [`SqliteStore::from_database`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured path. Nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already opened database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig::default(),
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), DidpoolError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| DidpoolError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// The underlying database handle, for provisioning queries.
    pub fn database(&self) -> Result<&Database, DidpoolError> {
        self.db.get().ok_or_else(|| DidpoolError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DidpoolError> {
        let Ok(db) = self.database() else {
            return Ok(HealthStatus::Unhealthy("storage not initialized".into()));
        };
        let ping = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err);
        Ok(match ping {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), DidpoolError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl DidStore for SqliteStore {
    async fn active_dids(
        &self,
        tenant_id: &TenantId,
        usage_date: NaiveDate,
    ) -> Result<Vec<Did>, DidpoolError> {
        queries::dids::active_dids(self.database()?, tenant_id, usage_date).await
    }
}

#[async_trait]
impl RotationStore for SqliteStore {
    async fn load_rotation_state(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Option<RotationState>, DidpoolError> {
        queries::rotation::load_rotation_state(self.database()?, tenant_id).await
    }
}

#[async_trait]
impl CallRecordStore for SqliteStore {
    async fn insert_call_record(&self, record: &CallRecord) -> Result<(), DidpoolError> {
        queries::call_records::insert_call_record(self.database()?, record).await
    }
}

#[async_trait]
impl AllocationStore for SqliteStore {
    async fn commit_allocation(
        &self,
        usage: &UsageUpdate,
        state: &RotationState,
    ) -> Result<RotationState, DidpoolError> {
        queries::rotation::commit_allocation(self.database()?, usage, state).await
    }
}

#[async_trait]
impl TenantResolver for SqliteStore {
    async fn resolve_api_key(&self, api_key: &str) -> Result<Option<TenantContext>, DidpoolError> {
        queries::tenants::resolve_api_key(self.database()?, api_key).await
    }
}

#[async_trait]
impl AdminDirectory for SqliteStore {
    async fn admin_emails(&self, tenant_id: &TenantId) -> Result<Vec<String>, DidpoolError> {
        queries::tenants::admin_emails(self.database()?, tenant_id).await
    }
}
