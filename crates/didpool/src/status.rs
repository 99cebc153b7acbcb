// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `didpool status` command implementation.
//!
//! Reads the database directly and reports, per tenant, the pool counts the
//! selector would see right now together with the persisted rotation state.

use std::collections::BTreeSet;
use std::io::IsTerminal;

use chrono::{DateTime, NaiveDate, Utc};
use didpool_config::model::{DidpoolConfig, RotationConfig};
use didpool_core::DidpoolError;
use didpool_rotation::selector::rank_candidates;
use didpool_rotation::{SelectionPolicy, local_today, today_usage};
use didpool_storage::Database;
use didpool_storage::queries::{dids, rotation, tenants};
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub date: NaiveDate,
    pub tenants: Vec<TenantStatus>,
}

#[derive(Debug, Serialize)]
pub struct TenantStatus {
    pub tenant_id: String,
    pub name: String,
    pub active_dids: usize,
    pub eligible_dids: usize,
    pub with_capacity: usize,
    pub calls_today: u64,
    /// `None` until the tenant's first allocation.
    pub rotation: Option<RotationSummary>,
}

#[derive(Debug, Serialize)]
pub struct RotationSummary {
    pub used_in_cycle: usize,
    pub current_index: u32,
    pub version: u64,
    pub last_reset: DateTime<Utc>,
    pub cycle_age_secs: i64,
}

/// Format seconds into a human-readable duration string.
fn format_age(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

async fn collect_status(
    db: &Database,
    rotation_config: &RotationConfig,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<TenantStatus>, DidpoolError> {
    let mut out = Vec::new();
    for tenant in tenants::list_tenants(db).await? {
        let pool = dids::active_dids(db, &tenant.tenant_id, today).await?;
        let state = rotation::load_rotation_state(db, &tenant.tenant_id).await?;

        let used = state
            .as_ref()
            .map(|s| s.used_dids_in_cycle.clone())
            .unwrap_or_default();
        let policy = SelectionPolicy::from_config(rotation_config, tenant.default_capacity);
        let stats = rank_candidates(&pool, &used, today, &policy).stats;

        out.push(TenantStatus {
            tenant_id: tenant.tenant_id.0.clone(),
            name: tenant.name.clone(),
            active_dids: stats.active,
            eligible_dids: stats.eligible,
            with_capacity: stats.with_capacity,
            calls_today: pool.iter().map(|d| u64::from(today_usage(d, today))).sum(),
            rotation: state.map(|s| RotationSummary {
                used_in_cycle: s.used_dids_in_cycle.len(),
                current_index: s.current_index,
                version: s.version,
                last_reset: s.last_reset,
                cycle_age_secs: (now - s.last_reset).num_seconds(),
            }),
        });
    }
    Ok(out)
}

/// Run the `didpool status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &DidpoolConfig, json: bool, plain: bool) -> Result<(), DidpoolError> {
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let today = local_today();
    let tenants = collect_status(&db, &config.rotation, today, Utc::now()).await;
    db.close().await?;
    let tenants = tenants?;

    if json {
        let response = StatusResponse {
            database_path: config.storage.database_path.clone(),
            date: today,
            tenants,
        };
        let out = serde_json::to_string_pretty(&response)
            .map_err(|e| DidpoolError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let use_color = !plain && std::io::stdout().is_terminal();
    if tenants.is_empty() {
        println!("didpool: no tenants in {}", config.storage.database_path);
        return Ok(());
    }
    for tenant in &tenants {
        print_tenant(tenant, config.rotation.cycle_max_age_secs, use_color);
    }
    Ok(())
}

fn print_tenant(tenant: &TenantStatus, cycle_max_age_secs: u64, use_color: bool) {
    let pool = format!(
        "{} active, {} eligible, {} with capacity",
        tenant.active_dids, tenant.eligible_dids, tenant.with_capacity
    );
    let exhausted = tenant.active_dids == 0;

    if use_color {
        use colored::Colorize;
        let pool = if exhausted {
            pool.red().to_string()
        } else if tenant.with_capacity == 0 {
            pool.yellow().to_string()
        } else {
            pool.green().to_string()
        };
        println!("{} ({})", tenant.tenant_id.bold(), tenant.name);
        println!("  pool:     {pool}");
    } else {
        println!("{} ({})", tenant.tenant_id, tenant.name);
        println!("  pool:     {pool}");
    }
    println!("  today:    {} calls", tenant.calls_today);

    match &tenant.rotation {
        Some(r) => {
            let stale = r.cycle_age_secs >= cycle_max_age_secs as i64;
            println!(
                "  cycle:    {}/{} used, index {}, version {}, age {}{}",
                r.used_in_cycle,
                tenant.eligible_dids,
                r.current_index,
                r.version,
                format_age(r.cycle_age_secs),
                if stale { " (resets on next call)" } else { "" }
            );
        }
        None => println!("  cycle:    not started"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use didpool_core::types::{RotationState, TenantId, UsageUpdate};
    use didpool_storage::NewDid;

    #[test]
    fn format_age_ranges() {
        assert_eq!(format_age(-5), "0m");
        assert_eq!(format_age(300), "5m");
        assert_eq!(format_age(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_age(2 * 86400 + 3600), "2d 1h 0m");
    }

    #[tokio::test]
    async fn collects_pool_and_cycle_per_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("s.db").to_string_lossy())
            .await
            .unwrap();
        let acme = TenantId::from("acme");
        tenants::create_tenant(&db, &acme, "Acme", Some(2)).await.unwrap();
        tenants::create_tenant(&db, &TenantId::from("empty"), "Empty", None)
            .await
            .unwrap();

        let a = dids::insert_did(&db, &acme, NewDid::new("+15550000001")).await.unwrap();
        dids::insert_did(
            &db,
            &acme,
            NewDid {
                reputation_score: Some(10),
                ..NewDid::new("+15550000002")
            },
        )
        .await
        .unwrap();

        let now = Utc::now();
        let today = now.date_naive();
        dids::set_daily_usage(&db, &a, today, 2).await.unwrap();

        let mut state = RotationState::fresh(now - Duration::hours(2));
        state.used_dids_in_cycle.insert(a.clone());
        state.current_index = 1;
        let usage = UsageUpdate {
            did_id: a.clone(),
            tenant_id: acme.clone(),
            used_at: now,
            usage_date: today,
            campaign_id: None,
            agent_id: None,
            prune_before: today - Duration::days(30),
        };
        rotation::commit_allocation(&db, &usage, &state).await.unwrap();

        let mut status = collect_status(&db, &RotationConfig::default(), today, now)
            .await
            .unwrap();
        status.sort_by(|x, y| x.tenant_id.cmp(&y.tenant_id));

        let acme_status = &status[0];
        assert_eq!(acme_status.tenant_id, "acme");
        assert_eq!(acme_status.active_dids, 2);
        assert_eq!(acme_status.eligible_dids, 1);
        // Tenant capacity is 2 and A is at 3 today.
        assert_eq!(acme_status.with_capacity, 1);
        assert_eq!(acme_status.calls_today, 3);
        let cycle = acme_status.rotation.as_ref().unwrap();
        assert_eq!(cycle.used_in_cycle, 1);
        assert_eq!(cycle.version, 1);
        assert!(cycle.cycle_age_secs >= 7200);

        let empty = &status[1];
        assert_eq!(empty.active_dids, 0);
        assert!(empty.rotation.is_none());
    }

    #[test]
    fn status_response_serializes() {
        let response = StatusResponse {
            database_path: "didpool.db".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            tenants: vec![TenantStatus {
                tenant_id: "acme".into(),
                name: "Acme".into(),
                active_dids: 3,
                eligible_dids: 3,
                with_capacity: 2,
                calls_today: 14,
                rotation: None,
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["date"], "2026-03-01");
        assert_eq!(json["tenants"][0]["with_capacity"], 2);
        assert!(json["tenants"][0]["rotation"].is_null());
    }
}
