// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rotation state persistence and the transactional allocation commit.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use didpool_core::types::{DidId, RotationState, TenantId, UsageUpdate};
use didpool_core::DidpoolError;
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;

use crate::database::{map_tr_err, Database};
use crate::queries::text_conversion_err;

enum Commit {
    Applied(u64),
    Conflict,
}

fn parse_used(idx: usize, raw: &str) -> Result<BTreeSet<DidId>, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| text_conversion_err(idx, e))
}

/// The persisted rotation state for a tenant, if any.
pub async fn load_rotation_state(
    db: &Database,
    tenant_id: &TenantId,
) -> Result<Option<RotationState>, DidpoolError> {
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Option<RotationState>, rusqlite::Error> {
            conn.query_row(
                "SELECT current_index, last_reset, used_dids_in_cycle, version
                 FROM rotation_state WHERE tenant_id = ?1",
                params![tenant],
                |row| {
                    let used: String = row.get(2)?;
                    let version: i64 = row.get(3)?;
                    Ok(RotationState {
                        current_index: row.get(0)?,
                        last_reset: row.get(1)?,
                        used_dids_in_cycle: parse_used(2, &used)?,
                        version: version.max(0) as u64,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

fn apply_usage(tx: &Transaction<'_>, usage: &UsageUpdate) -> Result<(), rusqlite::Error> {
    let updated = tx.execute(
        "UPDATE dids SET last_used = ?1, last_campaign = ?2, last_agent = ?3,
             total_calls = total_calls + 1
         WHERE id = ?4 AND tenant_id = ?5",
        params![
            usage.used_at,
            usage.campaign_id,
            usage.agent_id,
            usage.did_id.0,
            usage.tenant_id.0,
        ],
    )?;
    if updated == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }

    tx.execute(
        "INSERT INTO did_daily_usage (did_id, usage_date, count) VALUES (?1, ?2, 1)
         ON CONFLICT (did_id, usage_date) DO UPDATE SET count = count + 1",
        params![usage.did_id.0, usage.usage_date],
    )?;
    tx.execute(
        "DELETE FROM did_daily_usage WHERE did_id = ?1 AND usage_date < ?2",
        params![usage.did_id.0, usage.prune_before],
    )?;
    Ok(())
}

fn write_state(
    tx: &Transaction<'_>,
    tenant: &str,
    state: &RotationState,
    now: DateTime<Utc>,
) -> Result<Commit, rusqlite::Error> {
    let used = serde_json::to_string(&state.used_dids_in_cycle)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let next_version = state.version + 1;

    let changed = if state.version == 0 {
        tx.execute(
            "INSERT INTO rotation_state
                 (tenant_id, current_index, last_reset, used_dids_in_cycle, version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (tenant_id) DO NOTHING",
            params![
                tenant,
                state.current_index,
                state.last_reset,
                used,
                next_version as i64,
                now
            ],
        )?
    } else {
        tx.execute(
            "UPDATE rotation_state
             SET current_index = ?1, last_reset = ?2, used_dids_in_cycle = ?3,
                 version = ?4, updated_at = ?5
             WHERE tenant_id = ?6 AND version = ?7",
            params![
                state.current_index,
                state.last_reset,
                used,
                next_version as i64,
                now,
                tenant,
                state.version as i64
            ],
        )?
    };

    Ok(if changed == 1 {
        Commit::Applied(next_version)
    } else {
        Commit::Conflict
    })
}

/// Apply a DID usage update and a conditional rotation-state write atomically.
///
/// `state.version` must be the version the state was read at (0 if it was
/// never persisted). If another writer got there first the transaction is
/// rolled back and [`DidpoolError::RotationConflict`] is returned.
pub async fn commit_allocation(
    db: &Database,
    usage: &UsageUpdate,
    state: &RotationState,
) -> Result<RotationState, DidpoolError> {
    let usage_owned = usage.clone();
    let state_owned = state.clone();
    let tenant = usage.tenant_id.0.clone();

    let outcome = db
        .connection()
        .call(move |conn| -> Result<Commit, rusqlite::Error> {
            let tx = conn.transaction()?;
            let outcome = write_state(&tx, &tenant, &state_owned, usage_owned.used_at)?;
            if let Commit::Applied(_) = outcome {
                apply_usage(&tx, &usage_owned)?;
                tx.commit()?;
            }
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        Commit::Applied(version) => {
            debug!(tenant_id = %usage.tenant_id, version, "rotation state committed");
            Ok(RotationState {
                version,
                ..state.clone()
            })
        }
        Commit::Conflict => Err(DidpoolError::RotationConflict {
            tenant_id: usage.tenant_id.0.clone(),
        }),
    }
}
