// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stocky Core - Inventory Service
//!
//! Prepares the database (connect, topology discovery, migrations) and
//! builds the product and sale repositories. Exits non-zero if any
//! bootstrap step fails.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stocky_core::config::Config;
use stocky_core::migrations::HookRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stocky_core=info".into()),
        )
        .init();

    info!("Starting Stocky Core");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        grpc_addr = %config.grpc_addr,
        migrations_path = %config.database.migrations_path.display(),
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_handle = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        signal_cancel.cancel();
    });

    let ready = stocky_core::bootstrap(&config.database, HookRegistry::default_hooks(), &cancel)
        .await
        .map_err(|e| {
            error!(code = e.error_code(), "Bootstrap failed: {}", e);
            e
        })?;

    let repositories = ready.repositories();

    info!(
        grpc_addr = %config.grpc_addr,
        topology = %ready.topology,
        schema_version = ready.migrations.current_version,
        transactional = ready.is_replica_set(),
        "Stocky Core initialized successfully"
    );

    cancel.cancelled().await;
    info!("Shutting down...");

    drop(repositories);
    signal_handle.abort();
    ready.client.shutdown().await;

    info!("Shutdown complete");

    Ok(())
}
