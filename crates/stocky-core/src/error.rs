// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the bootstrap sequence.
//!
//! Every variant is fatal for the current process start.

use thiserror::Error;

use crate::connection::ConnectError;
use crate::migrations::MigrationError;
use crate::topology::TopologyError;

/// Bootstrap errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// Parse failure, handshake timeout or failed liveness probe.
    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    /// The cluster kind could not be resolved.
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Discovering or applying migrations failed.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Cancellation fired while connecting.
    #[error("Bootstrap cancelled")]
    Cancelled,
}

/// Result type using BootstrapError.
pub type Result<T> = std::result::Result<T, BootstrapError>;

impl BootstrapError {
    /// Stable code for logs and exit reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECTIVITY",
            Self::Topology(TopologyError::Cancelled) => "CANCELLED",
            Self::Topology(_) => "TOPOLOGY",
            Self::Migration(MigrationError::Cancelled { .. }) => "CANCELLED",
            Self::Migration(err) if err.is_discovery() => "MIGRATION_DISCOVERY",
            Self::Migration(_) => "MIGRATION_APPLY",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl MigrationError {
    /// True for errors raised before any version is applied: listing,
    /// naming, or reading the starting marker.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::ReadDir { .. }
                | Self::InvalidVersion { .. }
                | Self::DuplicateVersion { .. }
                | Self::Dirty { .. }
                | Self::InvalidMarker { .. }
        )
    }
}
