// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `doppel serve` command implementation.
//!
//! Wires configuration into the adapter registry, the text-generation client,
//! SQLite storage and the orchestrator, restores persisted state, then runs
//! until SIGINT or SIGTERM. The gateway shares the same cancellation token.

use std::sync::Arc;

use doppel_config::DoppelConfig;
use doppel_core::{DoppelError, StorageAdapter};
use doppel_generator::HttpTextGenerator;
use doppel_gateway::{GatewayState, start_server};
use doppel_orchestrator::metrics::register_metrics;
use doppel_orchestrator::{AdapterRegistry, Orchestrator, install_signal_handler};
use doppel_storage::SqliteStorage;
use doppel_webhook::webhook_factory;
use tracing::{error, info};

/// Every platform kind is served by the webhook adapter unless a dedicated
/// factory is registered for it.
pub fn build_registry(config: &DoppelConfig) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry
        .register("webhook", webhook_factory(config.connection.clone()))
        .set_fallback(webhook_factory(config.connection.clone()));
    registry
}

pub async fn run_serve(config: DoppelConfig) -> Result<(), DoppelError> {
    init_tracing(&config.service.log_level);
    register_metrics();

    info!(name = %config.service.name, "starting doppel serve");

    let registry = build_registry(&config);
    let generator = Arc::new(HttpTextGenerator::new(&config.generator)?);

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let gateway_config = config.gateway.clone();
    let orchestrator = Arc::new(
        Orchestrator::builder(config)
            .generator(generator)
            .storage(storage)
            .channels_from_registry(&registry)?
            .build()?,
    );
    orchestrator.restore().await?;

    let cancel = install_signal_handler();

    let gateway = if gateway_config.enabled {
        let state = GatewayState::new(orchestrator.clone(), gateway_config.bearer_token.clone());
        let cancel = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_server(&gateway_config, state, cancel.clone()).await {
                error!(error = %e, "gateway failed, shutting down");
                cancel.cancel();
            }
        }))
    } else {
        info!("gateway disabled by configuration");
        None
    };

    let result = orchestrator.run(cancel.clone()).await;
    cancel.cancel();
    if let Some(gateway) = gateway
        && let Err(e) = gateway.await
    {
        error!(error = %e, "gateway task panicked");
    }

    info!("doppel stopped");
    result
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("doppel={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
