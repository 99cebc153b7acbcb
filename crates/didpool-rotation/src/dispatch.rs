// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background dispatcher for allocation side effects.
//!
//! Call record inserts and pool-exhaustion alerts never block or fail an
//! allocation. Each kind has its own bounded queue and worker lane, so a slow
//! mail relay cannot delay or crowd out call records. Lanes apply effects with
//! per-effect retry and failure logging. When a queue is full the effect is
//! dropped with a warning.
//!
//! Alerts are throttled per tenant: while a tenant's cooldown runs, further
//! pool-exhausted alerts for it are suppressed before they reach the queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use didpool_config::model::DispatchConfig;
use didpool_core::types::{CallRecord, PoolExhaustedAlert, TenantId};
use didpool_core::{AdminDirectory, CallRecordStore, DidpoolError, Notifier};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Work deferred off the allocation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Append a call record for a completed allocation.
    CallRecord(CallRecord),
    /// Alert a tenant's admins that its pool has no active DIDs.
    PoolExhausted {
        tenant_id: TenantId,
        campaign_id: Option<String>,
        agent_id: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl SideEffect {
    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::CallRecord(_) => "call_record",
            SideEffect::PoolExhausted { .. } => "pool_exhausted_alert",
        }
    }
}

/// Queue sizes, retry policy, and alert throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Capacity of each lane's queue.
    pub queue_capacity: usize,
    pub max_attempts: u32,
    /// Attempt `n` (1-based) is followed by a `n * retry_backoff` pause.
    pub retry_backoff: Duration,
    /// Minimum gap between alerts for one tenant. Zero disables throttling.
    pub alert_cooldown: Duration,
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            alert_cooldown: Duration::from_secs(config.alert_cooldown_secs),
        }
    }
}

/// Cloneable handle for queuing side effects.
#[derive(Clone)]
pub struct Dispatcher {
    records: mpsc::Sender<SideEffect>,
    alerts: mpsc::Sender<SideEffect>,
    alert_cooldown: Duration,
    last_alert: Arc<DashMap<TenantId, Instant>>,
}

impl Dispatcher {
    /// Queue `effect` without waiting. Returns false if it was dropped or
    /// suppressed by the alert cooldown.
    pub fn dispatch(&self, effect: SideEffect) -> bool {
        let kind = effect.kind();
        let tx = match &effect {
            SideEffect::CallRecord(_) => &self.records,
            SideEffect::PoolExhausted { tenant_id, .. } => {
                if !self.claim_alert_slot(tenant_id) {
                    didpool_prometheus::record_side_effect(kind, "suppressed");
                    debug!(tenant_id = %tenant_id, "pool exhausted alert suppressed by cooldown");
                    return false;
                }
                &self.alerts
            }
        };

        match tx.try_send(effect) {
            Ok(()) => true,
            Err(e) => {
                let reason = match &e {
                    TrySendError::Full(_) => "queue full",
                    TrySendError::Closed(_) => "queue closed",
                };
                // A dropped alert must not hold the tenant's cooldown.
                if let SideEffect::PoolExhausted { tenant_id, .. } = e.into_inner() {
                    self.last_alert.remove(&tenant_id);
                }
                didpool_prometheus::record_side_effect(kind, "dropped");
                warn!(kind, reason, "side effect queue rejected effect, dropping it");
                false
            }
        }
    }

    fn claim_alert_slot(&self, tenant_id: &TenantId) -> bool {
        if self.alert_cooldown.is_zero() {
            return true;
        }
        let now = Instant::now();
        match self.last_alert.entry(tenant_id.clone()) {
            Entry::Occupied(mut last) => {
                if now.duration_since(*last.get()) < self.alert_cooldown {
                    false
                } else {
                    last.insert(now);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

/// Collaborators the worker applies effects through.
#[derive(Clone)]
pub struct DispatchTargets {
    pub call_records: Arc<dyn CallRecordStore>,
    pub admins: Arc<dyn AdminDirectory>,
    pub notifier: Arc<dyn Notifier>,
}

/// Consumes queued side effects on two independent lanes.
pub struct DispatchWorker {
    records: Lane,
    alerts: Lane,
}

struct Lane {
    name: &'static str,
    rx: mpsc::Receiver<SideEffect>,
    targets: DispatchTargets,
    settings: DispatchSettings,
}

/// Create a dispatcher handle and its (not yet running) worker.
pub fn channel(targets: DispatchTargets, settings: DispatchSettings) -> (Dispatcher, DispatchWorker) {
    let capacity = settings.queue_capacity.max(1);
    let (records_tx, records_rx) = mpsc::channel(capacity);
    let (alerts_tx, alerts_rx) = mpsc::channel(capacity);
    (
        Dispatcher {
            records: records_tx,
            alerts: alerts_tx,
            alert_cooldown: settings.alert_cooldown,
            last_alert: Arc::new(DashMap::new()),
        },
        DispatchWorker {
            records: Lane {
                name: "call_records",
                rx: records_rx,
                targets: targets.clone(),
                settings,
            },
            alerts: Lane {
                name: "alerts",
                rx: alerts_rx,
                targets,
                settings,
            },
        },
    )
}

/// Create a dispatcher and spawn its worker on the current runtime.
///
/// When `shutdown` is cancelled the worker stops accepting new effects,
/// applies everything already queued, and exits.
pub fn spawn(
    targets: DispatchTargets,
    settings: DispatchSettings,
    shutdown: CancellationToken,
) -> (Dispatcher, JoinHandle<()>) {
    let (dispatcher, worker) = channel(targets, settings);
    let handle = tokio::spawn(worker.run(shutdown));
    (dispatcher, handle)
}

impl DispatchWorker {
    /// Process effects until every sender is gone or `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        tokio::join!(
            self.records.run(shutdown.clone()),
            self.alerts.run(shutdown)
        );
        debug!("side effect worker stopped");
    }
}

impl Lane {
    async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                next = self.rx.recv() => match next {
                    Some(effect) => self.apply_with_retry(effect).await,
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    self.rx.close();
                    let mut drained = 0usize;
                    while let Some(effect) = self.rx.recv().await {
                        self.apply_with_retry(effect).await;
                        drained += 1;
                    }
                    info!(lane = self.name, drained, "side effect queue drained");
                    break;
                }
            }
        }
        debug!(lane = self.name, "side effect lane stopped");
    }

    async fn apply_with_retry(&self, effect: SideEffect) {
        let kind = effect.kind();
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.apply(&effect).await {
                Ok(()) => {
                    didpool_prometheus::record_side_effect(kind, "delivered");
                    debug!(kind, attempt, "side effect applied");
                    return;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(kind, attempt, max_attempts, error = %e, "side effect failed, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(e) => {
                    didpool_prometheus::record_side_effect(kind, "failed");
                    error!(kind, attempts = max_attempts, error = %e, "side effect failed, giving up");
                }
            }
        }
    }

    async fn apply(&self, effect: &SideEffect) -> Result<(), DidpoolError> {
        match effect {
            SideEffect::CallRecord(record) => {
                self.targets.call_records.insert_call_record(record).await
            }
            SideEffect::PoolExhausted {
                tenant_id,
                campaign_id,
                agent_id,
                occurred_at,
            } => {
                let recipients = self.targets.admins.admin_emails(tenant_id).await?;
                if recipients.is_empty() {
                    warn!(tenant_id = %tenant_id, "pool exhausted but tenant has no admins to alert");
                    return Ok(());
                }
                let alert = PoolExhaustedAlert {
                    tenant_id: tenant_id.clone(),
                    recipients,
                    campaign_id: campaign_id.clone(),
                    agent_id: agent_id.clone(),
                    occurred_at: *occurred_at,
                };
                self.targets.notifier.notify_pool_exhausted(&alert).await
            }
        }
    }
}
