// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only call record writes and reads.

use std::str::FromStr;

use didpool_core::types::{CallMetadata, CallRecord, CallResult, DidId, TenantId};
use didpool_core::DidpoolError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::queries::text_conversion_err;

/// Insert a call record.
pub async fn insert_call_record(db: &Database, record: &CallRecord) -> Result<(), DidpoolError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let metadata = serde_json::to_string(&record.metadata)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            conn.execute(
                "INSERT INTO call_records (id, did_id, tenant_id, phone_number, call_timestamp,
                     duration_secs, result, disposition, campaign_id, agent_id,
                     customer_state, customer_area_code, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.id,
                    record.did_id.0,
                    record.tenant_id.0,
                    record.phone_number,
                    record.call_timestamp,
                    record.duration_secs,
                    record.result.to_string(),
                    record.disposition,
                    record.campaign_id,
                    record.agent_id,
                    record.customer_state,
                    record.customer_area_code,
                    metadata,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent call records for a tenant, newest first.
pub async fn recent_call_records(
    db: &Database,
    tenant_id: &TenantId,
    limit: u32,
) -> Result<Vec<CallRecord>, DidpoolError> {
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<CallRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, did_id, tenant_id, phone_number, call_timestamp, duration_secs,
                        result, disposition, campaign_id, agent_id, customer_state,
                        customer_area_code, metadata
                 FROM call_records WHERE tenant_id = ?1
                 ORDER BY call_timestamp DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![tenant, limit], |row| {
                let result: String = row.get(6)?;
                let metadata: String = row.get(12)?;
                Ok(CallRecord {
                    id: row.get(0)?,
                    did_id: DidId(row.get(1)?),
                    tenant_id: TenantId(row.get(2)?),
                    phone_number: row.get(3)?,
                    call_timestamp: row.get(4)?,
                    duration_secs: row.get(5)?,
                    result: CallResult::from_str(&result).map_err(|e| text_conversion_err(6, e))?,
                    disposition: row.get(7)?,
                    campaign_id: row.get(8)?,
                    agent_id: row.get(9)?,
                    customer_state: row.get(10)?,
                    customer_area_code: row.get(11)?,
                    metadata: serde_json::from_str::<CallMetadata>(&metadata)
                        .map_err(|e| text_conversion_err(12, e))?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Number of call records for a tenant.
pub async fn count_call_records(db: &Database, tenant_id: &TenantId) -> Result<u64, DidpoolError> {
    let tenant = tenant_id.0.clone();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM call_records WHERE tenant_id = ?1",
                params![tenant],
                |row| row.get(0),
            )
        })
        .await
        .map(|n| n.max(0) as u64)
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(id: &str, tenant: &str) -> CallRecord {
        CallRecord {
            id: id.to_string(),
            did_id: DidId::from("did-1"),
            tenant_id: TenantId::from(tenant),
            phone_number: "+15550000001".to_string(),
            call_timestamp: Utc::now(),
            duration_secs: 0,
            result: CallResult::Answered,
            disposition: "initiated".to_string(),
            campaign_id: Some("camp".to_string()),
            agent_id: None,
            customer_state: Some("TX".to_string()),
            customer_area_code: Some("512".to_string()),
            metadata: CallMetadata {
                call_direction: "outbound".to_string(),
                recording: false,
                uniqueid: "req-123".to_string(),
                source: "did-selection".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("calls.db").to_str().unwrap())
            .await
            .unwrap();

        insert_call_record(&db, &record("c1", "acme")).await.unwrap();
        insert_call_record(&db, &record("c2", "acme")).await.unwrap();
        insert_call_record(&db, &record("c3", "other")).await.unwrap();

        assert_eq!(count_call_records(&db, &TenantId::from("acme")).await.unwrap(), 2);
        let recent = recent_call_records(&db, &TenantId::from("acme"), 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].result, CallResult::Answered);
        assert_eq!(recent[0].metadata.uniqueid, "req-123");
        assert_eq!(recent[0].customer_area_code.as_deref(), Some("512"));
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("dup.db").to_str().unwrap())
            .await
            .unwrap();

        insert_call_record(&db, &record("c1", "acme")).await.unwrap();
        assert!(insert_call_record(&db, &record("c1", "acme")).await.is_err());
    }
}
