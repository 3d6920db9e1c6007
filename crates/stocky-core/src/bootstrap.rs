// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-start sequence.
//!
//! ```text
//! connect ──► wait for topology ──► run migrations ──► select tx strategy
//! ```
//!
//! Each step must succeed before the next begins. The result is returned as
//! a [`Bootstrapped`] value and passed on explicitly; nothing is stored
//! globally.

use std::sync::Arc;

use mongodb::{Client, Database};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::connection::connect;
use crate::error::{BootstrapError, Result};
use crate::migrations::{HookRegistry, MigrationCoordinator, MigrationReport, MongoMigrationEngine};
use crate::repository::{MongoProductRepository, MongoSaleRepository, Repositories};
use crate::topology::{TopologyKind, topology_channel};
use crate::transaction::TxStrategy;

/// Everything the rest of the service needs once the database is ready.
#[derive(Debug, Clone)]
pub struct Bootstrapped {
    /// Shared driver handle.
    pub client: Client,
    /// Target database handle.
    pub database: Database,
    /// Resolved cluster kind.
    pub topology: TopologyKind,
    /// Strategy for repository writes.
    pub tx_strategy: TxStrategy,
    /// Migrations applied during this start.
    pub migrations: MigrationReport,
}

impl Bootstrapped {
    /// True when the cluster runs multi-statement transactions.
    pub fn is_replica_set(&self) -> bool {
        self.topology.supports_transactions()
    }

    /// Build the repositories over the bootstrapped database.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            products: Arc::new(MongoProductRepository::new(
                self.client.clone(),
                &self.database,
                self.tx_strategy,
            )),
            sales: Arc::new(MongoSaleRepository::new(
                self.client.clone(),
                &self.database,
                self.tx_strategy,
            )),
        }
    }
}

/// Run the bootstrap sequence.
///
/// `cancel` is observed while connecting, while waiting for the topology and
/// between migration versions.
pub async fn bootstrap(
    config: &DatabaseConfig,
    hooks: HookRegistry,
    cancel: &CancellationToken,
) -> Result<Bootstrapped> {
    let (publisher, mut monitor) = topology_channel();

    let connection = tokio::select! {
        biased;

        _ = cancel.cancelled() => return Err(BootstrapError::Cancelled),
        result = connect(config, &publisher) => result?,
    };

    let topology = monitor
        .wait_for_classification(cancel, Some(config.topology_timeout))
        .await?;

    info!(
        topology = %topology,
        transactions = topology.supports_transactions(),
        "Connection established"
    );

    let database = connection.database();

    info!("Running database migrations...");
    let engine = MongoMigrationEngine::new(database.clone(), config.migrations_path.clone());
    let coordinator = MigrationCoordinator::new(
        engine,
        hooks,
        config.migrations_path.clone(),
        database.clone(),
    );
    let migrations = coordinator.run(cancel).await?;
    info!(
        version = migrations.current_version,
        applied = migrations.applied.len(),
        "Migrations completed"
    );

    let tx_strategy = TxStrategy::for_topology(topology);
    if !tx_strategy.is_transactional() {
        warn!(
            topology = %topology,
            "Cluster does not support multi-statement transactions; writes run without a session"
        );
    }

    Ok(Bootstrapped {
        client: connection.client,
        database,
        topology,
        tx_strategy,
        migrations,
    })
}
