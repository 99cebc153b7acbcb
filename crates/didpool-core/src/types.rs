// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the store, the rotation engine, and the gateway.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a tenant (an isolated customer account owning a DID pool).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

/// Identifier of a DID record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DidId(pub String);

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId(s.to_string())
    }
}

impl From<&str> for DidId {
    fn from(s: &str) -> Self {
        DidId(s.to_string())
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    TenantDirectory,
    Notifier,
    Observability,
}

/// Administrative status of a DID.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DidStatus {
    Active,
    Inactive,
}

/// Reputation verdict written by the external reputation job.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ReputationStatus {
    #[default]
    Unknown,
    Positive,
    Negative,
    Neutral,
}

/// Reputation data for a DID. Only read by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reputation {
    /// Score 0-100. `None` until the reputation job has scored the number.
    pub score: Option<u8>,
    pub status: ReputationStatus,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Reputation {
    /// Score used for filtering and ordering, substituting `default` for unscored DIDs.
    pub fn effective_score(&self, default: u8) -> u8 {
        self.score.unwrap_or(default).min(100)
    }
}

/// Calls placed through a DID on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub count: u32,
}

/// Usage counters maintained by the usage recorder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidUsage {
    pub total_calls: u64,
    /// At most one entry per date, newest first, pruned to the retention window.
    pub daily: Vec<DailyUsage>,
    pub last_used: Option<DateTime<Utc>>,
    pub last_campaign: Option<String>,
    pub last_agent: Option<String>,
}

/// Geographic metadata returned to the dialer with the selected number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "areaCode", skip_serializing_if = "Option::is_none")]
    pub area_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Location {
    /// True when no field is populated.
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
            && self.area_code.is_none()
            && self.city.is_none()
            && self.country.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

/// An outbound caller-ID number owned by a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Did {
    pub id: DidId,
    pub tenant_id: TenantId,
    pub phone_number: String,
    pub status: DidStatus,
    /// Daily call cap. `None` falls back to the tenant or process default.
    pub capacity: Option<u32>,
    pub reputation: Reputation,
    pub usage: DidUsage,
    pub location: Option<Location>,
    pub created_at: DateTime<Utc>,
}

/// Per-tenant round-robin bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// Diagnostic position within the cycle; selection never reads it.
    pub current_index: u32,
    pub last_reset: DateTime<Utc>,
    pub used_dids_in_cycle: BTreeSet<DidId>,
    /// Version of the persisted row this state was read from (0 = never persisted).
    pub version: u64,
}

impl RotationState {
    /// A fresh cycle starting at `now`, as created lazily on a tenant's first allocation.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            current_index: 0,
            last_reset: now,
            used_dids_in_cycle: BTreeSet::new(),
            version: 0,
        }
    }
}

/// Outcome recorded on a call record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallResult {
    Answered,
    Busy,
    NoAnswer,
    Failed,
    Dropped,
}

/// Free-form metadata attached to a call record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetadata {
    pub call_direction: String,
    pub recording: bool,
    pub uniqueid: String,
    pub source: String,
}

/// Append-only audit row written once per successful allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: String,
    pub did_id: DidId,
    pub tenant_id: TenantId,
    pub phone_number: String,
    pub call_timestamp: DateTime<Utc>,
    pub duration_secs: u32,
    pub result: CallResult,
    pub disposition: String,
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub customer_state: Option<String>,
    pub customer_area_code: Option<String>,
    pub metadata: CallMetadata,
}

/// Details about the callee, passed through from the dialer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContext {
    pub phone: Option<String>,
    pub state: Option<String>,
    pub area_code: Option<String>,
}

/// One inbound request for an outbound caller ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationRequest {
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub caller_id: Option<String>,
    pub customer: CustomerContext,
    /// Dialer-supplied request id (`x-request-id`), copied onto the call record.
    pub request_id: Option<String>,
}

/// Tenant identity resolved by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub name: String,
    /// Tenant-level override of the default DID capacity.
    pub default_capacity: Option<u32>,
}

/// Alert raised when a tenant has zero active DIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolExhaustedAlert {
    pub tenant_id: TenantId,
    pub recipients: Vec<String>,
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Usage mutation applied to the picked DID by the usage recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageUpdate {
    pub did_id: DidId,
    pub tenant_id: TenantId,
    pub used_at: DateTime<Utc>,
    /// Local calendar date the call counts against.
    pub usage_date: NaiveDate,
    pub campaign_id: Option<String>,
    pub agent_id: Option<String>,
    /// Daily entries dated before this are pruned.
    pub prune_before: NaiveDate,
}
