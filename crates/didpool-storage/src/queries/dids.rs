// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! DID pool reads and provisioning writes.
//!
//! The rotation engine only reads DIDs here; usage counters are written by
//! [`commit_allocation`](crate::queries::rotation::commit_allocation) and
//! reputation by the external reputation job.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use didpool_core::types::{
    DailyUsage, Did, DidId, DidStatus, DidUsage, Location, Reputation, ReputationStatus, TenantId,
};
use didpool_core::DidpoolError;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{map_tr_err, Database};
use crate::queries::text_conversion_err;

const DID_COLUMNS: &str = "id, tenant_id, phone_number, status, capacity,
     reputation_score, reputation_status, reputation_checked_at,
     total_calls, last_used, last_campaign, last_agent,
     state, area_code, city, country, latitude, longitude, created_at";

/// A DID to provision into a tenant's pool.
#[derive(Debug, Clone)]
pub struct NewDid {
    pub phone_number: String,
    pub status: DidStatus,
    pub capacity: Option<u32>,
    pub reputation_score: Option<u8>,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

impl NewDid {
    /// An active, unscored DID with no capacity override, created now.
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            status: DidStatus::Active,
            capacity: None,
            reputation_score: None,
            location: None,
            created_at: Utc::now(),
        }
    }
}

fn row_to_did(row: &Row<'_>) -> Result<Did, rusqlite::Error> {
    let status: String = row.get(3)?;
    let status = DidStatus::from_str(&status).map_err(|e| text_conversion_err(3, e))?;
    let rep_status: String = row.get(6)?;
    let rep_status =
        ReputationStatus::from_str(&rep_status).map_err(|e| text_conversion_err(6, e))?;
    let score: Option<i64> = row.get(5)?;
    let total_calls: i64 = row.get(8)?;

    let location = Location {
        state: row.get(12)?,
        area_code: row.get(13)?,
        city: row.get(14)?,
        country: row.get(15)?,
        latitude: row.get(16)?,
        longitude: row.get(17)?,
    };

    Ok(Did {
        id: DidId(row.get(0)?),
        tenant_id: TenantId(row.get(1)?),
        phone_number: row.get(2)?,
        status,
        capacity: row.get(4)?,
        reputation: Reputation {
            score: score.map(|s| s.clamp(0, 100) as u8),
            status: rep_status,
            last_checked: row.get(7)?,
        },
        usage: DidUsage {
            total_calls: total_calls.max(0) as u64,
            daily: Vec::new(),
            last_used: row.get(9)?,
            last_campaign: row.get(10)?,
            last_agent: row.get(11)?,
        },
        location: (!location.is_empty()).then_some(location),
        created_at: row.get(18)?,
    })
}

/// Attach daily usage rows to the DIDs they belong to.
fn attach_daily_usage(dids: &mut [Did], usage: Vec<(String, NaiveDate, u32)>) {
    let mut by_did: HashMap<String, Vec<DailyUsage>> = HashMap::new();
    for (did_id, date, count) in usage {
        by_did
            .entry(did_id)
            .or_default()
            .push(DailyUsage { date, count });
    }
    for did in dids.iter_mut() {
        if let Some(daily) = by_did.remove(&did.id.0) {
            did.usage.daily = daily;
        }
    }
}

/// Active DIDs for a tenant, carrying only the daily usage entry for `usage_date`.
pub async fn active_dids(
    db: &Database,
    tenant_id: &TenantId,
    usage_date: NaiveDate,
) -> Result<Vec<Did>, DidpoolError> {
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<Did>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DID_COLUMNS} FROM dids
                 WHERE tenant_id = ?1 AND status = 'active'
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let mut dids = stmt
                .query_map(params![tenant], row_to_did)?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT u.did_id, u.usage_date, u.count
                 FROM did_daily_usage u JOIN dids d ON d.id = u.did_id
                 WHERE d.tenant_id = ?1 AND d.status = 'active' AND u.usage_date = ?2",
            )?;
            let usage = stmt
                .query_map(params![tenant, usage_date], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            attach_daily_usage(&mut dids, usage);
            Ok(dids)
        })
        .await
        .map_err(map_tr_err)
}

/// Every DID of a tenant regardless of status, without usage history.
pub async fn list_dids(db: &Database, tenant_id: &TenantId) -> Result<Vec<Did>, DidpoolError> {
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<Did>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DID_COLUMNS} FROM dids WHERE tenant_id = ?1
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![tenant], row_to_did)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// A single DID with its daily usage history.
pub async fn get_did(db: &Database, did_id: &DidId) -> Result<Option<Did>, DidpoolError> {
    let id = did_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<Did>, rusqlite::Error> {
            let did = conn
                .query_row(
                    &format!("SELECT {DID_COLUMNS} FROM dids WHERE id = ?1"),
                    params![id],
                    row_to_did,
                )
                .optional()?;
            let Some(mut did) = did else {
                return Ok(None);
            };
            let mut stmt = conn.prepare(
                "SELECT usage_date, count FROM did_daily_usage
                 WHERE did_id = ?1 ORDER BY usage_date DESC",
            )?;
            did.usage.daily = stmt
                .query_map(params![id], |row| {
                    Ok(DailyUsage {
                        date: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(did))
        })
        .await
        .map_err(map_tr_err)
}

/// Provision a DID into a tenant's pool.
pub async fn insert_did(
    db: &Database,
    tenant_id: &TenantId,
    new: NewDid,
) -> Result<DidId, DidpoolError> {
    let id = uuid::Uuid::new_v4().to_string();
    let did_id = DidId(id.clone());
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let loc = new.location.unwrap_or_default();
            conn.execute(
                "INSERT INTO dids (id, tenant_id, phone_number, status, capacity,
                     reputation_score, state, area_code, city, country, latitude, longitude,
                     created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    tenant,
                    new.phone_number,
                    new.status.to_string(),
                    new.capacity,
                    new.reputation_score,
                    loc.state,
                    loc.area_code,
                    loc.city,
                    loc.country,
                    loc.latitude,
                    loc.longitude,
                    new.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(did_id)
}

/// Activate or deactivate a DID.
pub async fn set_status(db: &Database, did_id: &DidId, status: DidStatus) -> Result<(), DidpoolError> {
    let id = did_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE dids SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Write a reputation verdict, as the reputation job does.
pub async fn update_reputation(
    db: &Database,
    did_id: &DidId,
    score: Option<u8>,
    status: ReputationStatus,
) -> Result<(), DidpoolError> {
    let id = did_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE dids SET reputation_score = ?1, reputation_status = ?2,
                     reputation_checked_at = ?3
                 WHERE id = ?4",
                params![score, status.to_string(), Utc::now(), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite a DID's usage for one day. Used to seed pools and in tests.
pub async fn set_daily_usage(
    db: &Database,
    did_id: &DidId,
    date: NaiveDate,
    count: u32,
) -> Result<(), DidpoolError> {
    let id = did_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO did_daily_usage (did_id, usage_date, count) VALUES (?1, ?2, ?3)
                 ON CONFLICT (did_id, usage_date) DO UPDATE SET count = excluded.count",
                params![id, date, count],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
