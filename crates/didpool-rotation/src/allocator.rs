// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Allocation handler: one request in, one caller ID out.
//!
//! ```text
//! lock tenant -> load state (cache, then store) -> select
//!   -> no candidate: fallback number + pool-exhausted alert, no writes
//!   -> candidate: maybe reset + reselect -> advance -> commit -> cache
//! ```
//!
//! A commit that loses the version check reloads the state from the store and
//! runs the whole pass again, up to `max_conflict_retries` times.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use didpool_config::model::RotationConfig;
use didpool_core::types::{AllocationRequest, Did, RotationState, TenantContext, TenantId};
use didpool_core::{AllocationStore, DidpoolError};
use tracing::{debug, error, info, warn};

use crate::cache::{NoStateCache, RotationStateCache, TtlStateCache};
use crate::capacity::local_today;
use crate::cycle::CycleManager;
use crate::dispatch::{Dispatcher, SideEffect};
use crate::locks::TenantLocks;
use crate::recorder::UsageRecorder;
use crate::selector::{CandidateSelector, PoolStats, SelectionPolicy, Strategy};

/// A DID handed to the dialer.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub did: Did,
    pub strategy: Strategy,
    pub stats: PoolStats,
    /// Rotation state as persisted by this allocation.
    pub rotation_state: RotationState,
    pub allocated_at: DateTime<Utc>,
    /// Wall time from acquiring the tenant lock to the commit.
    pub query_time: Duration,
}

/// What the handler answers with.
#[derive(Debug, Clone)]
pub enum AllocationOutcome {
    Allocated(Allocation),
    /// The tenant has no active DIDs.
    Fallback { number: String },
}

impl AllocationOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, AllocationOutcome::Fallback { .. })
    }

    /// The phone number the dialer should present.
    pub fn number(&self) -> &str {
        match self {
            AllocationOutcome::Allocated(a) => &a.did.phone_number,
            AllocationOutcome::Fallback { number } => number,
        }
    }
}

/// Build the state cache `config` asks for.
pub fn state_cache(config: &RotationConfig) -> Arc<dyn RotationStateCache> {
    if config.state_cache_enabled {
        Arc::new(TtlStateCache::new(config.state_cache_ttl()))
    } else {
        Arc::new(NoStateCache)
    }
}

struct Inner {
    store: Arc<dyn AllocationStore>,
    cache: Arc<dyn RotationStateCache>,
    locks: TenantLocks,
    rotation: RotationConfig,
    cycle: CycleManager,
    recorder: UsageRecorder,
    dispatcher: Dispatcher,
}

/// Orchestrates selection, cycle bookkeeping, and recording.
#[derive(Clone)]
pub struct AllocationHandler {
    inner: Arc<Inner>,
}

impl AllocationHandler {
    pub fn new(
        config: &RotationConfig,
        store: Arc<dyn AllocationStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self::with_cache(config, store, state_cache(config), dispatcher)
    }

    pub fn with_cache(
        config: &RotationConfig,
        store: Arc<dyn AllocationStore>,
        cache: Arc<dyn RotationStateCache>,
        dispatcher: Dispatcher,
    ) -> Self {
        let recorder = UsageRecorder::new(
            Arc::clone(&store),
            dispatcher.clone(),
            config.usage_retention_days,
        );
        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                locks: TenantLocks::new(),
                rotation: config.clone(),
                cycle: CycleManager::new(config.cycle_max_age()),
                recorder,
                dispatcher,
            }),
        }
    }

    pub fn cache(&self) -> &Arc<dyn RotationStateCache> {
        &self.inner.cache
    }

    /// Allocate a caller ID for `tenant`.
    ///
    /// Runs on a detached task holding the tenant lock, so dropping the
    /// returned future does not abort writes for a DID already picked.
    pub async fn allocate(
        &self,
        tenant: &TenantContext,
        request: AllocationRequest,
    ) -> Result<AllocationOutcome, DidpoolError> {
        let guard = self.inner.locks.acquire(&tenant.tenant_id).await;
        let inner = Arc::clone(&self.inner);
        let tenant = tenant.clone();

        tokio::spawn(async move {
            let _guard = guard;
            inner.allocate_locked(&tenant, &request).await
        })
        .await
        .map_err(|e| DidpoolError::Internal(format!("allocation task failed: {e}")))?
    }
}

impl Inner {
    async fn allocate_locked(
        &self,
        tenant: &TenantContext,
        request: &AllocationRequest,
    ) -> Result<AllocationOutcome, DidpoolError> {
        let started = Instant::now();
        let tenant_id = &tenant.tenant_id;
        let selector = CandidateSelector::new(SelectionPolicy::from_config(
            &self.rotation,
            tenant.default_capacity,
        ));
        let max_retries = self.rotation.max_conflict_retries;
        let mut conflicts = 0u32;

        loop {
            let now = Utc::now();
            let today = local_today();
            let state = self.load_state(tenant_id, now).await?;

            let selection = selector
                .select_candidate(self.store.as_ref(), tenant_id, &state.used_dids_in_cycle, today)
                .await?;
            let stats = selection.stats;
            didpool_prometheus::set_pool_stats(
                &tenant_id.0,
                stats.active,
                stats.eligible,
                stats.with_capacity,
            );
            debug!(
                tenant_id = %tenant_id,
                active = stats.active,
                eligible = stats.eligible,
                with_capacity = stats.with_capacity,
                used_in_cycle = state.used_dids_in_cycle.len(),
                "pool stats"
            );

            let Some((picked, strategy)) = selection.candidate else {
                return Ok(self.fallback(tenant_id, request, now));
            };

            let (mut next_state, did, strategy) =
                match (self.cycle.should_reset(&state, stats.eligible, now), selection.available) {
                    (true, Some(available)) => {
                        didpool_prometheus::record_cycle_reset();
                        (self.cycle.reset(&state, now), available, Strategy::Available)
                    }
                    _ => (state, picked, strategy),
                };
            self.cycle.advance(&mut next_state, &did.id, stats.eligible);

            match self
                .commit(&did, tenant_id, &next_state, request, now, today)
                .await
            {
                Ok(persisted) => {
                    let query_time = started.elapsed();
                    didpool_prometheus::record_allocation(strategy.as_str());
                    didpool_prometheus::record_selection_latency(query_time.as_secs_f64());
                    info!(
                        tenant_id = %tenant_id,
                        did_id = %did.id,
                        number = %did.phone_number,
                        strategy = %strategy,
                        used_in_cycle = persisted.used_dids_in_cycle.len(),
                        eligible = stats.eligible,
                        "allocated DID"
                    );
                    return Ok(AllocationOutcome::Allocated(Allocation {
                        did,
                        strategy,
                        stats,
                        rotation_state: persisted,
                        allocated_at: now,
                        query_time,
                    }));
                }
                Err(e) if e.is_conflict() && conflicts < max_retries => {
                    conflicts += 1;
                    didpool_prometheus::record_conflict();
                    warn!(
                        tenant_id = %tenant_id,
                        attempt = conflicts,
                        max_retries,
                        "rotation state changed underneath allocation, retrying"
                    );
                }
                Err(e) => {
                    if e.is_conflict() {
                        didpool_prometheus::record_conflict();
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn commit(
        &self,
        did: &Did,
        tenant_id: &TenantId,
        state: &RotationState,
        request: &AllocationRequest,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<RotationState, DidpoolError> {
        match self
            .recorder
            .record_allocation(did, tenant_id, state, request, now, today)
            .await
        {
            Ok(persisted) => {
                self.cache.set(tenant_id, persisted.clone());
                Ok(persisted)
            }
            Err(e) => {
                // Whatever is cached may be the stale snapshot that lost.
                self.cache.invalidate(tenant_id);
                Err(e)
            }
        }
    }

    async fn load_state(
        &self,
        tenant_id: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<RotationState, DidpoolError> {
        if let Some(state) = self.cache.get(tenant_id) {
            debug!(tenant_id = %tenant_id, "rotation state cache hit");
            return Ok(state);
        }
        debug!(tenant_id = %tenant_id, "rotation state cache miss");
        Ok(self
            .store
            .load_rotation_state(tenant_id)
            .await?
            .unwrap_or_else(|| RotationState::fresh(now)))
    }

    fn fallback(
        &self,
        tenant_id: &TenantId,
        request: &AllocationRequest,
        now: DateTime<Utc>,
    ) -> AllocationOutcome {
        didpool_prometheus::record_fallback();
        error!(
            tenant_id = %tenant_id,
            fallback = %self.rotation.fallback_did,
            "tenant has no active DIDs, returning fallback number"
        );
        self.dispatcher.dispatch(SideEffect::PoolExhausted {
            tenant_id: tenant_id.clone(),
            campaign_id: request.campaign_id.clone(),
            agent_id: request.agent_id.clone(),
            occurred_at: now,
        });
        AllocationOutcome::Fallback {
            number: self.rotation.fallback_did.clone(),
        }
    }
}
