// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage recorder: persists a successful pick.
//!
//! The DID usage update and the rotation state write commit together through
//! [`AllocationStore::commit_allocation`]. The call record follows on the
//! side-effect queue and cannot fail the allocation.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use didpool_core::types::{
    AllocationRequest, CallMetadata, CallRecord, CallResult, Did, RotationState, TenantId,
    UsageUpdate,
};
use didpool_core::{AllocationStore, DidpoolError};
use tracing::debug;

use crate::dispatch::{Dispatcher, SideEffect};

/// Oldest usage date kept when `retention_days` entries, today included, are retained.
pub fn prune_horizon(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(retention_days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Writes usage, rotation state, and call records for picked DIDs.
pub struct UsageRecorder {
    store: Arc<dyn AllocationStore>,
    dispatcher: Dispatcher,
    retention_days: u32,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn AllocationStore>, dispatcher: Dispatcher, retention_days: u32) -> Self {
        Self {
            store,
            dispatcher,
            retention_days,
        }
    }

    /// Usage mutation for `did`, dated `today`.
    pub fn usage_update(
        &self,
        did: &Did,
        tenant_id: &TenantId,
        request: &AllocationRequest,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> UsageUpdate {
        let prune_before = prune_horizon(today, self.retention_days);
        UsageUpdate {
            did_id: did.id.clone(),
            tenant_id: tenant_id.clone(),
            used_at: now,
            usage_date: today,
            campaign_id: request.campaign_id.clone(),
            agent_id: request.agent_id.clone(),
            prune_before,
        }
    }

    /// Commit the usage update and `state` (already advanced past `did`),
    /// then queue the call record. Returns the persisted state.
    pub async fn record_allocation(
        &self,
        did: &Did,
        tenant_id: &TenantId,
        state: &RotationState,
        request: &AllocationRequest,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<RotationState, DidpoolError> {
        let usage = self.usage_update(did, tenant_id, request, now, today);
        let persisted = self.store.commit_allocation(&usage, state).await?;

        debug!(
            tenant_id = %tenant_id,
            did_id = %did.id,
            version = persisted.version,
            "allocation committed"
        );

        self.dispatcher
            .dispatch(SideEffect::CallRecord(call_record(did, tenant_id, request, now)));
        Ok(persisted)
    }
}

/// The audit row for an allocation. The dialer reports the real outcome later.
pub fn call_record(
    did: &Did,
    tenant_id: &TenantId,
    request: &AllocationRequest,
    now: DateTime<Utc>,
) -> CallRecord {
    CallRecord {
        id: uuid::Uuid::new_v4().to_string(),
        did_id: did.id.clone(),
        tenant_id: tenant_id.clone(),
        phone_number: request
            .customer
            .phone
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        call_timestamp: now,
        duration_secs: 0,
        result: CallResult::Answered,
        disposition: "initiated".to_string(),
        campaign_id: request.campaign_id.clone(),
        agent_id: request.agent_id.clone(),
        customer_state: request.customer.state.clone(),
        customer_area_code: request.customer.area_code.clone(),
        metadata: CallMetadata {
            call_direction: "outbound".to_string(),
            recording: false,
            uniqueid: request.request_id.clone().unwrap_or_default(),
            source: "did-selection".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use didpool_core::types::{CustomerContext, DidId, DidStatus, DidUsage, Reputation};

    fn did() -> Did {
        Did {
            id: DidId::from("d1"),
            tenant_id: TenantId::from("t1"),
            phone_number: "+15550000001".into(),
            status: DidStatus::Active,
            capacity: None,
            reputation: Reputation::default(),
            usage: DidUsage::default(),
            location: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn call_record_defaults_unknown_customer() {
        let record = call_record(&did(), &TenantId::from("t1"), &AllocationRequest::default(), Utc::now());
        assert_eq!(record.phone_number, "unknown");
        assert_eq!(record.result, CallResult::Answered);
        assert_eq!(record.disposition, "initiated");
        assert_eq!(record.duration_secs, 0);
        assert_eq!(record.metadata.uniqueid, "");
        assert_eq!(record.metadata.call_direction, "outbound");
        assert_eq!(record.metadata.source, "did-selection");
        assert!(!record.metadata.recording);
    }

    #[test]
    fn call_record_carries_request_context() {
        let request = AllocationRequest {
            campaign_id: Some("spring".into()),
            agent_id: Some("agent-7".into()),
            caller_id: None,
            customer: CustomerContext {
                phone: Some("+15125550100".into()),
                state: Some("TX".into()),
                area_code: Some("512".into()),
            },
            request_id: Some("req-42".into()),
        };
        let record = call_record(&did(), &TenantId::from("t1"), &request, Utc::now());
        assert_eq!(record.phone_number, "+15125550100");
        assert_eq!(record.campaign_id.as_deref(), Some("spring"));
        assert_eq!(record.agent_id.as_deref(), Some("agent-7"));
        assert_eq!(record.customer_state.as_deref(), Some("TX"));
        assert_eq!(record.customer_area_code.as_deref(), Some("512"));
        assert_eq!(record.metadata.uniqueid, "req-42");
        assert_eq!(record.did_id, DidId::from("d1"));
    }

    #[test]
    fn prune_horizon_keeps_retention_days_including_today() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let horizon = prune_horizon(today, 30);
        assert_eq!(horizon, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        // Rows dated before the horizon are deleted, so exactly 30 dates remain.
        assert_eq!((today - horizon).num_days() + 1, 30);

        assert_eq!(prune_horizon(today, 1), today);
        assert_eq!(prune_horizon(today, 0), today);
        assert_eq!(prune_horizon(NaiveDate::MIN, 30), NaiveDate::MIN);
    }

    #[test]
    fn each_call_record_gets_a_fresh_id() {
        let request = AllocationRequest::default();
        let a = call_record(&did(), &TenantId::from("t1"), &request, Utc::now());
        let b = call_record(&did(), &TenantId::from("t1"), &request, Utc::now());
        assert_ne!(a.id, b.id);
    }
}
