// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate selector: the four-strategy cascade.
//!
//! Strategies run in order and the first non-empty one wins:
//!
//! 1. unused in the current cycle, healthy, under capacity
//! 2. healthy and under capacity, ignoring the cycle
//! 3. healthy, ignoring capacity
//! 4. any active DID
//!
//! Only a tenant with zero active DIDs produces no candidate.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use didpool_config::model::RotationConfig;
use didpool_core::types::{Did, DidId, TenantId};
use didpool_core::{DidStore, DidpoolError};
use strum::{Display, IntoStaticStr};

use crate::capacity::{has_capacity, today_usage};

/// Which step of the cascade produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    UnusedInCycle,
    Available,
    HealthyOverCapacity,
    LastResort,
}

impl Strategy {
    /// Human-readable label returned to the dialer in response metadata.
    pub fn label(self) -> &'static str {
        match self {
            Strategy::UnusedInCycle => "Strategy 1: Unused in cycle",
            Strategy::Available => "Strategy 2: Good reputation",
            Strategy::HealthyOverCapacity => "Strategy 3: Any good reputation",
            Strategy::LastResort => "Strategy 4: Last resort",
        }
    }

    /// Stable snake_case name used as a metric label.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Thresholds the selector filters with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub reputation_threshold: u8,
    /// Score substituted for DIDs the reputation job has not scored.
    pub default_reputation: u8,
    pub default_capacity: u32,
}

impl SelectionPolicy {
    /// Policy from config, with an optional tenant-level capacity override.
    pub fn from_config(config: &RotationConfig, tenant_capacity: Option<u32>) -> Self {
        Self {
            reputation_threshold: config.reputation_threshold,
            default_reputation: config.default_reputation_score,
            default_capacity: tenant_capacity.unwrap_or(config.default_capacity),
        }
    }

    fn score(&self, did: &Did) -> u8 {
        did.reputation.effective_score(self.default_reputation)
    }

    fn is_healthy(&self, did: &Did) -> bool {
        self.score(did) >= self.reputation_threshold
    }
}

/// Pool counts observed during a selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Active DIDs.
    pub active: usize,
    /// Active DIDs passing the reputation filter; the cycle length.
    pub eligible: usize,
    /// Active DIDs with capacity left today.
    pub with_capacity: usize,
}

/// Result of running the cascade.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// First non-empty strategy's pick.
    pub candidate: Option<(Did, Strategy)>,
    /// Strategy 2's pick, kept for reselection after a cycle reset.
    pub available: Option<Did>,
    pub stats: PoolStats,
}

impl Selection {
    /// True when the tenant has no active DIDs at all.
    pub fn is_empty(&self) -> bool {
        self.candidate.is_none()
    }
}

fn by_last_used(a: &Did, b: &Did) -> Ordering {
    // `None < Some`, so never-used DIDs sort first.
    a.usage
        .last_used
        .cmp(&b.usage.last_used)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Rank `dids` (the tenant's active pool) against the cycle membership.
pub fn rank_candidates(
    dids: &[Did],
    used_in_cycle: &BTreeSet<DidId>,
    today: NaiveDate,
    policy: &SelectionPolicy,
) -> Selection {
    let healthy: Vec<&Did> = dids.iter().filter(|d| policy.is_healthy(d)).collect();
    let available: Vec<&Did> = healthy
        .iter()
        .copied()
        .filter(|d| has_capacity(d, today, policy.default_capacity))
        .collect();

    let stats = PoolStats {
        active: dids.len(),
        eligible: healthy.len(),
        with_capacity: dids
            .iter()
            .filter(|d| has_capacity(d, today, policy.default_capacity))
            .count(),
    };

    let unused = available
        .iter()
        .copied()
        .filter(|d| !used_in_cycle.contains(&d.id))
        .min_by(|a, b| by_last_used(a, b));

    let any_available = available.iter().copied().min_by(|a, b| by_last_used(a, b));

    let best_healthy = || {
        healthy.iter().copied().min_by(|a, b| {
            policy
                .score(b)
                .cmp(&policy.score(a))
                .then_with(|| by_last_used(a, b))
        })
    };

    let last_resort = || {
        dids.iter().min_by(|a, b| {
            policy
                .score(b)
                .cmp(&policy.score(a))
                .then_with(|| today_usage(a, today).cmp(&today_usage(b, today)))
                .then_with(|| by_last_used(a, b))
        })
    };

    let candidate = unused
        .map(|d| (d, Strategy::UnusedInCycle))
        .or_else(|| any_available.map(|d| (d, Strategy::Available)))
        .or_else(|| best_healthy().map(|d| (d, Strategy::HealthyOverCapacity)))
        .or_else(|| last_resort().map(|d| (d, Strategy::LastResort)));

    Selection {
        candidate: candidate.map(|(d, s)| (d.clone(), s)),
        available: any_available.cloned(),
        stats,
    }
}

/// Loads a tenant's active pool and runs the cascade over it.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    policy: SelectionPolicy,
}

impl CandidateSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// Select the best DID for `tenant_id` given the cycle's used set.
    pub async fn select_candidate<S: DidStore + ?Sized>(
        &self,
        store: &S,
        tenant_id: &TenantId,
        used_in_cycle: &BTreeSet<DidId>,
        today: NaiveDate,
    ) -> Result<Selection, DidpoolError> {
        let dids = store.active_dids(tenant_id, today).await?;
        Ok(rank_candidates(&dids, used_in_cycle, today, &self.policy))
    }
}
