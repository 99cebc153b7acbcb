// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenants, API keys, and tenant admin contacts.

use chrono::Utc;
use didpool_core::types::{TenantContext, TenantId};
use didpool_core::DidpoolError;
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::database::{map_tr_err, Database};

/// Lowercase hex SHA-256 of a raw API key. Only hashes are persisted.
pub fn hash_api_key(raw_key: &str) -> String {
    hex::encode(Sha256::digest(raw_key.as_bytes()))
}

/// Insert a tenant. `default_capacity` overrides the process-wide DID capacity.
pub async fn create_tenant(
    db: &Database,
    tenant_id: &TenantId,
    name: &str,
    default_capacity: Option<u32>,
) -> Result<TenantContext, DidpoolError> {
    let ctx = TenantContext {
        tenant_id: tenant_id.clone(),
        name: name.to_string(),
        default_capacity,
    };
    let id = tenant_id.0.clone();
    let name = name.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO tenants (id, name, default_capacity, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, name, default_capacity, Utc::now()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(ctx)
}

/// All tenants, ordered by id.
pub async fn list_tenants(db: &Database) -> Result<Vec<TenantContext>, DidpoolError> {
    db.connection()
        .call(|conn| -> Result<Vec<TenantContext>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT id, name, default_capacity FROM tenants ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(TenantContext {
                    tenant_id: TenantId(row.get(0)?),
                    name: row.get(1)?,
                    default_capacity: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Register a raw API key for a tenant (stored hashed).
pub async fn add_api_key(
    db: &Database,
    tenant_id: &TenantId,
    raw_key: &str,
) -> Result<(), DidpoolError> {
    let key_hash = hash_api_key(raw_key);
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO api_keys (key_hash, tenant_id, is_active, created_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![key_hash, tenant, Utc::now()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Deactivate an API key. Returns whether a key was found.
pub async fn revoke_api_key(db: &Database, raw_key: &str) -> Result<bool, DidpoolError> {
    let key_hash = hash_api_key(raw_key);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE api_keys SET is_active = 0 WHERE key_hash = ?1",
                params![key_hash],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Resolve an active API key to its tenant and stamp the key's `last_used`.
pub async fn resolve_api_key(
    db: &Database,
    raw_key: &str,
) -> Result<Option<TenantContext>, DidpoolError> {
    let key_hash = hash_api_key(raw_key);
    db.connection()
        .call(move |conn| -> Result<Option<TenantContext>, rusqlite::Error> {
            let ctx = conn
                .query_row(
                    "SELECT t.id, t.name, t.default_capacity
                     FROM api_keys k JOIN tenants t ON t.id = k.tenant_id
                     WHERE k.key_hash = ?1 AND k.is_active = 1",
                    params![key_hash],
                    |row| {
                        Ok(TenantContext {
                            tenant_id: TenantId(row.get(0)?),
                            name: row.get(1)?,
                            default_capacity: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            if ctx.is_some() {
                conn.execute(
                    "UPDATE api_keys SET last_used = ?1 WHERE key_hash = ?2",
                    params![Utc::now(), key_hash],
                )?;
            }
            Ok(ctx)
        })
        .await
        .map_err(map_tr_err)
}

/// Add an admin e-mail for a tenant. Duplicates are ignored.
pub async fn add_admin(db: &Database, tenant_id: &TenantId, email: &str) -> Result<(), DidpoolError> {
    let tenant = tenant_id.0.clone();
    let email = email.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO tenant_admins (tenant_id, email) VALUES (?1, ?2)",
                params![tenant, email],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Admin e-mail addresses for a tenant, sorted.
pub async fn admin_emails(db: &Database, tenant_id: &TenantId) -> Result<Vec<String>, DidpoolError> {
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT email FROM tenant_admins WHERE tenant_id = ?1 ORDER BY email",
            )?;
            let rows = stmt.query_map(params![tenant], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tenants.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[test]
    fn api_key_hash_is_hex_sha256() {
        let hash = hash_api_key("did_live_abc");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_api_key("did_live_abc"));
        assert_ne!(hash, hash_api_key("did_live_abd"));
    }

    #[tokio::test]
    async fn api_key_resolves_to_tenant_and_stamps_last_used() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId::from("acme");
        create_tenant(&db, &tenant, "Acme Dialers", Some(250)).await.unwrap();
        add_api_key(&db, &tenant, "secret-key").await.unwrap();

        let ctx = resolve_api_key(&db, "secret-key").await.unwrap().unwrap();
        assert_eq!(ctx.tenant_id, tenant);
        assert_eq!(ctx.name, "Acme Dialers");
        assert_eq!(ctx.default_capacity, Some(250));

        let hash = hash_api_key("secret-key");
        let stamped: Option<String> = db
            .connection()
            .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
                conn.query_row(
                    "SELECT last_used FROM api_keys WHERE key_hash = ?1",
                    params![hash],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert!(stamped.is_some());
    }

    #[tokio::test]
    async fn unknown_and_revoked_keys_do_not_resolve() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId::from("acme");
        create_tenant(&db, &tenant, "Acme", None).await.unwrap();
        add_api_key(&db, &tenant, "k1").await.unwrap();

        assert!(resolve_api_key(&db, "nope").await.unwrap().is_none());
        assert!(revoke_api_key(&db, "k1").await.unwrap());
        assert!(resolve_api_key(&db, "k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn admin_emails_are_scoped_per_tenant() {
        let (db, _dir) = setup_db().await;
        let a = TenantId::from("a");
        let b = TenantId::from("b");
        create_tenant(&db, &a, "A", None).await.unwrap();
        create_tenant(&db, &b, "B", None).await.unwrap();
        add_admin(&db, &a, "ops@a.example").await.unwrap();
        add_admin(&db, &a, "boss@a.example").await.unwrap();
        add_admin(&db, &a, "ops@a.example").await.unwrap();
        add_admin(&db, &b, "ops@b.example").await.unwrap();

        assert_eq!(
            admin_emails(&db, &a).await.unwrap(),
            vec!["boss@a.example", "ops@a.example"]
        );
        assert_eq!(admin_emails(&db, &b).await.unwrap(), vec!["ops@b.example"]);
        assert_eq!(list_tenants(&db).await.unwrap().len(), 2);
    }
}
