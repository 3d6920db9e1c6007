// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Versioned database migrations.
//!
//! Migration artifacts live in a directory and follow a strict naming contract:
//!
//! ```text
//! 000001_create_collections.up.json     forward script, applied at bootstrap
//! 000001_create_collections.down.json   reverse script, never applied here
//! ```
//!
//! Each version is applied in two steps: the generic [`MigrationEngine`]
//! runs the artifact, then the domain hook registered for that version (if
//! any) runs against the database. The persisted watermark only moves past a
//! version when both steps succeed.
//!
//! # Example
//!
//! ```ignore
//! use stocky_core::migrations::{HookRegistry, MigrationCoordinator, MongoMigrationEngine};
//!
//! let engine = MongoMigrationEngine::new(database.clone(), "./migrations/mongo");
//! let coordinator = MigrationCoordinator::new(
//!     engine,
//!     HookRegistry::default_hooks(),
//!     "./migrations/mongo",
//!     database,
//! );
//! let report = coordinator.run(&cancel).await?;
//! ```

pub mod engine;
pub mod hooks;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use mongodb::Database;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use self::engine::{MigrationEngine, MongoMigrationEngine, VERSION_COLLECTION, VersionMarker};
pub use self::hooks::{DomainMigration, HookRegistry, UniqueNameIndexes};

/// Migration version number. Encodes application order.
pub type Version = u32;

static UP_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{6})_([a-zA-Z_]+)\.up\.json$").expect("migration file pattern is valid")
});

/// A forward migration found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationArtifact {
    /// Parsed from the 6-digit prefix.
    pub version: Version,
    /// The part between the prefix and `.up.json`.
    pub name: String,
    /// Full path of the `.up.json` file.
    pub path: PathBuf,
}

/// Outcome of a coordinator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Watermark read at the start of the run.
    pub starting_version: Version,
    /// Versions applied by this run, ascending.
    pub applied: Vec<Version>,
    /// Watermark after the run.
    pub current_version: Version,
}

/// Errors from discovering or applying migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The migration directory could not be listed.
    #[error("failed to read migration directory {}: {source}", path.display())]
    ReadDir {
        /// Directory that was listed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A matching file name carried a version that does not parse.
    #[error("invalid migration version in '{file_name}'")]
    InvalidVersion {
        /// The offending file name.
        file_name: String,
    },

    /// Two forward artifacts share a version.
    #[error("duplicate migration version {version}: '{first}' and '{second}'")]
    DuplicateVersion {
        /// The shared version.
        version: Version,
        /// First file name.
        first: String,
        /// Second file name.
        second: String,
    },

    /// A forward script could not be read.
    #[error("failed to read migration script {}: {source}", path.display())]
    ReadScript {
        /// Script path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A forward script is not a JSON array of command documents.
    #[error("invalid migration script {}: {source}", path.display())]
    InvalidScript {
        /// Script path.
        path: PathBuf,
        /// JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The engine was asked for a version with no artifact.
    #[error("no migration artifact for version {version}")]
    UnknownVersion {
        /// Requested version.
        version: Version,
    },

    /// A previous run stopped in the middle of a version.
    #[error("database is dirty at version {version}; fix the schema manually and force a version")]
    Dirty {
        /// Version that was in flight.
        version: Version,
    },

    /// The persisted marker holds a value that is not a valid version.
    #[error("invalid version marker value {value}")]
    InvalidMarker {
        /// Stored value.
        value: i64,
    },

    /// A command of a forward script failed.
    #[error("migration {version} command #{index} failed: {source}")]
    Command {
        /// Version being applied.
        version: Version,
        /// Zero-based position of the command in the script.
        index: usize,
        /// Driver error.
        #[source]
        source: mongodb::error::Error,
    },

    /// Reading or writing the version marker failed.
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// A domain hook failed.
    #[error("post-migration hook for version {version} failed: {source}")]
    Hook {
        /// Version whose hook failed.
        version: Version,
        /// Hook error.
        #[source]
        source: anyhow::Error,
    },

    /// Cancellation was requested before the next version started.
    #[error("migration cancelled before version {next_version}")]
    Cancelled {
        /// The version that was not started.
        next_version: Version,
    },
}

/// Classify a file name.
///
/// Returns `Ok(None)` for names outside the forward naming contract.
pub fn parse_artifact_name(file_name: &str) -> Result<Option<(Version, String)>, MigrationError> {
    let Some(captures) = UP_FILE.captures(file_name) else {
        return Ok(None);
    };

    let version = captures[1]
        .parse::<Version>()
        .map_err(|_| MigrationError::InvalidVersion {
            file_name: file_name.to_string(),
        })?;

    Ok(Some((version, captures[2].to_string())))
}

/// List forward artifacts in `dir`, sorted by version.
///
/// Directory listing order is not trusted; versions are sorted explicitly.
pub async fn discover(dir: &Path) -> Result<Vec<MigrationArtifact>, MigrationError> {
    let read_dir_err = |source| MigrationError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_dir_err)?;
    let mut artifacts = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
        let path = entry.path();
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some((version, name)) = parse_artifact_name(&file_name)? else {
            continue;
        };
        if !tokio::fs::metadata(&path)
            .await
            .map_err(read_dir_err)?
            .is_file()
        {
            continue;
        }
        artifacts.push(MigrationArtifact {
            version,
            name,
            path,
        });
    }

    artifacts.sort_by_key(|a| a.version);

    if let Some(pair) = artifacts.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrationError::DuplicateVersion {
            version: pair[0].version,
            first: file_name_of(&pair[0].path),
            second: file_name_of(&pair[1].path),
        });
    }

    Ok(artifacts)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Brings the database to the newest on-disk version.
///
/// Safe to run on every start. Assumes a single bootstrapping process.
pub struct MigrationCoordinator<E> {
    engine: E,
    hooks: HookRegistry,
    source_dir: PathBuf,
    database: Database,
}

impl<E: MigrationEngine> MigrationCoordinator<E> {
    /// Create a coordinator over `source_dir`.
    pub fn new(
        engine: E,
        hooks: HookRegistry,
        source_dir: impl Into<PathBuf>,
        database: Database,
    ) -> Self {
        Self {
            engine,
            hooks,
            source_dir: source_dir.into(),
            database,
        }
    }

    /// The engine this coordinator drives.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Highest fully applied version; `0` when nothing was ever applied.
    pub async fn current_watermark(&self) -> Result<Version, MigrationError> {
        match self.engine.current_version().await? {
            None => Ok(0),
            Some(marker) if marker.dirty => Err(MigrationError::Dirty {
                version: marker.version,
            }),
            Some(marker) => Ok(marker.version),
        }
    }

    /// Apply every discovered version above the watermark, in ascending order.
    ///
    /// On failure the marker is reset to the last fully applied version and
    /// the error is returned; nothing else is undone.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<MigrationReport, MigrationError> {
        let starting_version = self.current_watermark().await?;
        let pending: Vec<MigrationArtifact> = discover(&self.source_dir)
            .await?
            .into_iter()
            .filter(|artifact| artifact.version > starting_version)
            .collect();

        if pending.is_empty() {
            info!(version = starting_version, "Database schema is up to date");
            return Ok(MigrationReport {
                starting_version,
                applied: Vec::new(),
                current_version: starting_version,
            });
        }

        info!(
            current_version = starting_version,
            pending = pending.len(),
            "Applying database migrations"
        );

        let mut watermark = starting_version;
        let mut applied = Vec::with_capacity(pending.len());

        for artifact in &pending {
            if cancel.is_cancelled() {
                warn!(
                    next_version = artifact.version,
                    "Migration cancelled before next version"
                );
                return Err(MigrationError::Cancelled {
                    next_version: artifact.version,
                });
            }

            if let Err(err) = self.apply(artifact, cancel).await {
                error!(
                    version = artifact.version,
                    name = %artifact.name,
                    error = %err,
                    "Migration failed"
                );
                self.restore(watermark).await;
                return Err(err);
            }

            watermark = artifact.version;
            applied.push(artifact.version);
            info!(
                version = artifact.version,
                name = %artifact.name,
                "Migration applied"
            );
        }

        Ok(MigrationReport {
            starting_version,
            applied,
            current_version: watermark,
        })
    }

    async fn apply(
        &self,
        artifact: &MigrationArtifact,
        cancel: &CancellationToken,
    ) -> Result<(), MigrationError> {
        self.engine.migrate_to(artifact.version).await?;

        if let Some(hook) = self.hooks.get(artifact.version) {
            debug!(version = artifact.version, "Running post-migration hook");
            hook.up(cancel, &self.database)
                .await
                .map_err(|source| MigrationError::Hook {
                    version: artifact.version,
                    source,
                })?;
        }

        Ok(())
    }

    async fn restore(&self, version: Version) {
        // A failed reset leaves the marker dirty, which the next run refuses.
        if let Err(err) = self.engine.force_version(version).await {
            error!(version, error = %err, "Failed to reset migration version");
        }
    }
}
