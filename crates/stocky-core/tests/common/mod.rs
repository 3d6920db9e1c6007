// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for stocky-core integration tests.
//!
//! Provides an in-memory migration engine, recording hooks and helpers for
//! building migration directories.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mongodb::{Client, Database};
use tokio_util::sync::CancellationToken;

use stocky_core::migrations::{
    DomainMigration, MigrationEngine, MigrationError, Version, VersionMarker,
};

/// Ordered record of engine steps and hook calls, shared by fakes.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Debug, Default)]
struct EngineState {
    marker: Option<VersionMarker>,
    fail_on: Option<Version>,
}

/// In-memory [`MigrationEngine`]. Clones share state.
#[derive(Debug, Clone)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
    log: CallLog,
}

impl FakeEngine {
    pub fn new(log: CallLog) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            log,
        }
    }

    pub fn at_version(log: CallLog, version: Version) -> Self {
        let engine = Self::new(log);
        engine.set_marker(Some(VersionMarker {
            version,
            dirty: false,
        }));
        engine
    }

    pub fn set_marker(&self, marker: Option<VersionMarker>) {
        self.state.lock().unwrap().marker = marker;
    }

    pub fn marker(&self) -> Option<VersionMarker> {
        self.state.lock().unwrap().marker
    }

    /// Make the engine step for `version` fail, leaving the marker dirty.
    pub fn fail_on(&self, version: Option<Version>) {
        self.state.lock().unwrap().fail_on = version;
    }
}

#[async_trait]
impl MigrationEngine for FakeEngine {
    async fn current_version(&self) -> Result<Option<VersionMarker>, MigrationError> {
        Ok(self.marker())
    }

    async fn migrate_to(&self, version: Version) -> Result<(), MigrationError> {
        let mut state = self.state.lock().unwrap();
        if let Some(marker) = state.marker.filter(|m| m.dirty) {
            return Err(MigrationError::Dirty {
                version: marker.version,
            });
        }

        self.log.lock().unwrap().push(format!("engine:{}", version));

        if state.fail_on == Some(version) {
            state.marker = Some(VersionMarker {
                version,
                dirty: true,
            });
            return Err(MigrationError::ReadScript {
                path: format!("{:06}_fake.up.json", version).into(),
                source: std::io::Error::other("injected failure"),
            });
        }

        state.marker = Some(VersionMarker {
            version,
            dirty: false,
        });
        Ok(())
    }

    async fn force_version(&self, version: Version) -> Result<(), MigrationError> {
        self.log.lock().unwrap().push(format!("force:{}", version));
        self.state.lock().unwrap().marker = (version > 0).then_some(VersionMarker {
            version,
            dirty: false,
        });
        Ok(())
    }
}

/// Hook that records its calls and optionally fails or cancels.
pub struct RecordingHook {
    pub version: Version,
    pub log: CallLog,
    pub fail: bool,
    pub cancel_after: Option<CancellationToken>,
}

impl RecordingHook {
    pub fn new(version: Version, log: CallLog) -> Self {
        Self {
            version,
            log,
            fail: false,
            cancel_after: None,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_after = Some(token);
        self
    }
}

#[async_trait]
impl DomainMigration for RecordingHook {
    async fn up(&self, _cancel: &CancellationToken, _db: &Database) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("hook:{}", self.version));
        if let Some(token) = &self.cancel_after {
            token.cancel();
        }
        if self.fail {
            anyhow::bail!("hook {} failed", self.version);
        }
        Ok(())
    }

    async fn down(&self, _cancel: &CancellationToken, _db: &Database) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("down:{}", self.version));
        Ok(())
    }
}

/// A database handle that is never contacted. Building the client does not
/// open a connection.
pub async fn offline_database() -> Database {
    Client::with_uri_str("mongodb://127.0.0.1:1")
        .await
        .expect("client options are valid")
        .database("stocky_offline_test")
}

/// Create empty migration files named `names` in `dir`.
pub fn write_artifacts(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), "[]").expect("write migration artifact");
    }
}
