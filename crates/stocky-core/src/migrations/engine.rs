// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic forward-migration engine.
//!
//! Scripts are JSON arrays of database commands, executed in order with
//! `runCommand`:
//!
//! ```json
//! [
//!   { "create": "products" },
//!   { "createIndexes": "sales", "indexes": [{ "key": { "product_id": 1 }, "name": "product_id" }] }
//! ]
//! ```
//!
//! Progress is tracked by a single `{version, dirty}` document in
//! [`VERSION_COLLECTION`]. `dirty` is set before a script starts and cleared
//! once its last command succeeds.
//!
//! A `create` for a collection that already exists counts as applied, so a
//! version that is retried after a later failure does not trip over its own
//! earlier work.

use std::path::PathBuf;

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::error::ErrorKind;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MigrationArtifact, MigrationError, Version, discover};

/// Collection holding the version marker.
pub const VERSION_COLLECTION: &str = "schema_migrations";

/// Server code for `NamespaceExists`.
const NAMESPACE_EXISTS: i32 = 48;

/// Persisted engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMarker {
    /// Last version the engine touched.
    pub version: Version,
    /// Set while `version` is being applied.
    pub dirty: bool,
}

/// Operations the coordinator needs from a migration engine.
#[async_trait]
pub trait MigrationEngine: Send + Sync {
    /// Read the marker. `None` means no version was ever recorded.
    async fn current_version(&self) -> Result<Option<VersionMarker>, MigrationError>;

    /// Apply every artifact above the current version up to and including
    /// `version`. Refuses to start from a dirty marker.
    async fn migrate_to(&self, version: Version) -> Result<(), MigrationError>;

    /// Overwrite the marker with a clean `version`; `0` clears it.
    async fn force_version(&self, version: Version) -> Result<(), MigrationError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionDocument {
    version: i64,
    dirty: bool,
}

/// [`MigrationEngine`] backed by the target MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoMigrationEngine {
    database: Database,
    markers: Collection<VersionDocument>,
    source_dir: PathBuf,
}

impl MongoMigrationEngine {
    /// Create an engine reading scripts from `source_dir`.
    pub fn new(database: Database, source_dir: impl Into<PathBuf>) -> Self {
        let markers = database.collection::<VersionDocument>(VERSION_COLLECTION);
        Self {
            database,
            markers,
            source_dir: source_dir.into(),
        }
    }

    async fn write_marker(&self, version: Version, dirty: bool) -> Result<(), MigrationError> {
        let marker = VersionDocument {
            version: i64::from(version),
            dirty,
        };
        self.markers
            .replace_one(doc! {}, &marker)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn run_script(&self, artifact: &MigrationArtifact) -> Result<(), MigrationError> {
        let raw = tokio::fs::read_to_string(&artifact.path)
            .await
            .map_err(|source| MigrationError::ReadScript {
                path: artifact.path.clone(),
                source,
            })?;

        let commands: Vec<Document> =
            serde_json::from_str(&raw).map_err(|source| MigrationError::InvalidScript {
                path: artifact.path.clone(),
                source,
            })?;

        for (index, command) in commands.into_iter().enumerate() {
            match self.database.run_command(command).await {
                Ok(_) => {}
                Err(err) if namespace_exists(&err) => {
                    debug!(version = artifact.version, index, "Collection already exists");
                }
                Err(source) => {
                    return Err(MigrationError::Command {
                        version: artifact.version,
                        index,
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl MigrationEngine for MongoMigrationEngine {
    async fn current_version(&self) -> Result<Option<VersionMarker>, MigrationError> {
        let Some(stored) = self.markers.find_one(doc! {}).await? else {
            return Ok(None);
        };

        let version = Version::try_from(stored.version).map_err(|_| {
            MigrationError::InvalidMarker {
                value: stored.version,
            }
        })?;

        Ok(Some(VersionMarker {
            version,
            dirty: stored.dirty,
        }))
    }

    async fn migrate_to(&self, version: Version) -> Result<(), MigrationError> {
        let current = match self.current_version().await? {
            Some(marker) if marker.dirty => {
                return Err(MigrationError::Dirty {
                    version: marker.version,
                });
            }
            Some(marker) => marker.version,
            None => 0,
        };

        let artifacts = discover(&self.source_dir).await?;
        if !artifacts.iter().any(|a| a.version == version) {
            return Err(MigrationError::UnknownVersion { version });
        }

        for artifact in artifacts
            .iter()
            .filter(|a| a.version > current && a.version <= version)
        {
            debug!(version = artifact.version, path = %artifact.path.display(), "Running migration script");
            self.write_marker(artifact.version, true).await?;
            self.run_script(artifact).await?;
            self.write_marker(artifact.version, false).await?;
        }

        Ok(())
    }

    async fn force_version(&self, version: Version) -> Result<(), MigrationError> {
        if version == 0 {
            self.markers.delete_many(doc! {}).await?;
            return Ok(());
        }
        self.write_marker(version, false).await
    }
}

fn namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(command) if command.code == NAMESPACE_EXISTS)
}
