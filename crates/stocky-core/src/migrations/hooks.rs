// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain-specific post-migration hooks.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use tokio_util::sync::CancellationToken;

use super::Version;
use crate::repository::{PRODUCT_COLLECTION, SALE_COLLECTION};

/// Work that cannot be expressed as a plain command script.
///
/// Only [`up`](Self::up) runs during bootstrap.
#[async_trait]
pub trait DomainMigration: Send + Sync {
    /// Apply the hook after the engine step for its version succeeded.
    async fn up(&self, cancel: &CancellationToken, db: &Database) -> anyhow::Result<()>;

    /// Reverse [`up`](Self::up).
    async fn down(&self, cancel: &CancellationToken, db: &Database) -> anyhow::Result<()>;
}

/// Hooks keyed by the version they follow.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: BTreeMap<Version, Arc<dyn DomainMigration>>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("versions", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HookRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks shipped with the service.
    pub fn default_hooks() -> Self {
        let mut registry = Self::new();
        registry.register(1, UniqueNameIndexes);
        registry
    }

    /// Register `hook` for `version`, returning the hook it replaced.
    pub fn register(
        &mut self,
        version: Version,
        hook: impl DomainMigration + 'static,
    ) -> Option<Arc<dyn DomainMigration>> {
        self.hooks.insert(version, Arc::new(hook))
    }

    /// Hook for exactly `version`.
    pub fn get(&self, version: Version) -> Option<&Arc<dyn DomainMigration>> {
        self.hooks.get(&version)
    }

    /// Registered versions, ascending.
    pub fn versions(&self) -> impl Iterator<Item = Version> + '_ {
        self.hooks.keys().copied()
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// True when no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

const NAME_INDEX: &str = "name_unique";

/// Unique `name` index on the products and sales collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueNameIndexes;

#[async_trait]
impl DomainMigration for UniqueNameIndexes {
    async fn up(&self, cancel: &CancellationToken, db: &Database) -> anyhow::Result<()> {
        for collection in [SALE_COLLECTION, PRODUCT_COLLECTION] {
            if cancel.is_cancelled() {
                anyhow::bail!("cancelled before indexing '{}'", collection);
            }
            let index = IndexModel::builder()
                .keys(doc! { "name": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(NAME_INDEX.to_string())
                        .build(),
                )
                .build();
            db.collection::<Document>(collection)
                .create_index(index)
                .await?;
        }
        Ok(())
    }

    async fn down(&self, _cancel: &CancellationToken, db: &Database) -> anyhow::Result<()> {
        for collection in [SALE_COLLECTION, PRODUCT_COLLECTION] {
            db.collection::<Document>(collection)
                .drop_index(NAME_INDEX)
                .await?;
        }
        Ok(())
    }
}
