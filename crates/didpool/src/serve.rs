// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `didpool serve` command implementation.
//!
//! Wires storage, the notifier, the side-effect dispatcher, the allocation
//! handler and the HTTP gateway, then runs until SIGINT/SIGTERM.

use std::sync::Arc;

use didpool_config::model::DidpoolConfig;
use didpool_core::{DidpoolError, Notifier, PluginAdapter, TenantResolver};
use didpool_gateway::{GatewayState, HealthState, ServerConfig};
use didpool_prometheus::PrometheusAdapter;
use didpool_rotation::{AllocationHandler, DispatchSettings, DispatchTargets, dispatch};
use didpool_storage::SqliteStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

/// Run the `didpool serve` command.
pub async fn run_serve(config: DidpoolConfig) -> Result<(), DidpoolError> {
    init_tracing(&config.server.log_level);

    info!("starting didpool serve");

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");

    let notifier: Arc<dyn Notifier> = didpool_email::notifier_from_config(&config.email)?;
    info!(notifier = notifier.name(), "notifier ready");

    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        if config.prometheus.enabled {
            let adapter = Arc::new(PrometheusAdapter::new()?);
            info!("prometheus metrics enabled");
            Some(Arc::new(move || adapter.render()))
        } else {
            None
        };

    // The dispatcher outlives the HTTP server so queued effects drain after the
    // last request finishes.
    let dispatch_shutdown = CancellationToken::new();
    let (dispatcher, worker) = dispatch::spawn(
        DispatchTargets {
            call_records: store.clone(),
            admins: store.clone(),
            notifier: notifier.clone(),
        },
        DispatchSettings::from(&config.dispatch),
        dispatch_shutdown.clone(),
    );

    let allocator = AllocationHandler::new(&config.rotation, store.clone(), dispatcher);

    let tenants: Arc<dyn TenantResolver> = store.clone();
    let state = GatewayState {
        allocator,
        tenants,
        health: HealthState {
            start_time: std::time::Instant::now(),
            storage: store.clone(),
            prometheus_render,
        },
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        max_concurrent_requests: config.server.max_concurrent_requests,
    };

    let cancel = shutdown::install_signal_handler();
    let served = didpool_gateway::start_server(&server_config, state, cancel).await;

    dispatch_shutdown.cancel();
    if let Err(e) = worker.await {
        warn!(error = %e, "side effect worker panicked");
    }
    if let Err(e) = notifier.shutdown().await {
        warn!(error = %e, "notifier shutdown failed");
    }
    if let Err(e) = store.shutdown().await {
        warn!(error = %e, "storage shutdown failed");
    }

    info!("didpool stopped");
    served
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("didpool={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
