// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster topology discovery.
//!
//! The driver reports topology changes through SDAM events. A
//! [`TopologyPublisher`] turns those events into a `watch` channel and a
//! [`TopologyMonitor`] waits on that channel until the cluster kind is known.
//!
//! ```text
//!   Unknown ──(first classifying update)──► Standalone | ReplicaSet | Sharded
//! ```
//!
//! Once classified the published value never changes again, so later runtime
//! topology churn does not leak into bootstrap decisions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mongodb::TopologyType;
use mongodb::event::EventHandler;
use mongodb::event::sdam::SdamEvent;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Deployment mode of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopologyKind {
    /// No server has been described yet.
    #[default]
    Unknown,
    /// A single `mongod`.
    Standalone,
    /// A replica set, with or without a reachable primary.
    ReplicaSet,
    /// A sharded cluster (`mongos`), including load-balanced deployments.
    Sharded,
}

impl TopologyKind {
    /// True for every kind except [`TopologyKind::Unknown`].
    pub fn is_classified(self) -> bool {
        self != Self::Unknown
    }

    /// Whether multi-statement transactions are available.
    pub fn supports_transactions(self) -> bool {
        matches!(self, Self::ReplicaSet | Self::Sharded)
    }

    /// Short lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Standalone => "standalone",
            Self::ReplicaSet => "replica_set",
            Self::Sharded => "sharded",
        }
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TopologyType> for TopologyKind {
    fn from(kind: TopologyType) -> Self {
        match kind {
            TopologyType::Single => Self::Standalone,
            TopologyType::ReplicaSetNoPrimary | TopologyType::ReplicaSetWithPrimary => {
                Self::ReplicaSet
            }
            TopologyType::Sharded | TopologyType::LoadBalanced => Self::Sharded,
            _ => Self::Unknown,
        }
    }
}

/// Errors raised while waiting for a classification.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The caller's deadline elapsed before the cluster kind was known.
    #[error("topology not resolved within {after:?}")]
    Timeout {
        /// The deadline that was supplied.
        after: Duration,
    },

    /// The bootstrap cancellation token fired.
    #[error("topology wait cancelled")]
    Cancelled,

    /// The publishing side went away without ever classifying the cluster.
    #[error("topology update stream closed before the cluster was classified")]
    Closed,
}

/// Create a connected publisher/monitor pair starting at [`TopologyKind::Unknown`].
pub fn topology_channel() -> (TopologyPublisher, TopologyMonitor) {
    let (tx, rx) = watch::channel(TopologyKind::Unknown);
    (
        TopologyPublisher { tx: Arc::new(tx) },
        TopologyMonitor { updates: rx },
    )
}

/// Write side of the topology channel.
#[derive(Debug, Clone)]
pub struct TopologyPublisher {
    tx: Arc<watch::Sender<TopologyKind>>,
}

impl TopologyPublisher {
    /// Record an observed kind.
    ///
    /// Unknown updates and updates after the first classification are
    /// dropped; returns whether the published value changed.
    pub fn publish(&self, kind: TopologyKind) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_classified() || !kind.is_classified() {
                return false;
            }
            *current = kind;
            true
        })
    }

    /// Build the SDAM handler to install on the client options.
    pub fn event_handler(&self) -> EventHandler<SdamEvent> {
        let publisher = self.clone();
        EventHandler::callback(move |event: SdamEvent| {
            if let SdamEvent::TopologyDescriptionChanged(changed) = event {
                let kind = TopologyKind::from(changed.new_description.topology_type());
                if publisher.publish(kind) {
                    debug!(topology = %kind, "Cluster topology classified");
                }
            }
        })
    }
}

/// Read side of the topology channel.
#[derive(Debug)]
pub struct TopologyMonitor {
    updates: watch::Receiver<TopologyKind>,
}

impl TopologyMonitor {
    /// The most recently published kind, without waiting.
    pub fn current(&self) -> TopologyKind {
        *self.updates.borrow()
    }

    /// Block until the cluster is classified.
    ///
    /// There is no built-in timeout: with `deadline = None` a stream that never
    /// classifies waits until `cancel` fires.
    pub async fn wait_for_classification(
        &mut self,
        cancel: &CancellationToken,
        deadline: Option<Duration>,
    ) -> Result<TopologyKind, TopologyError> {
        let expiry = async {
            match deadline {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        loop {
            let kind = *self.updates.borrow_and_update();
            if kind.is_classified() {
                return Ok(kind);
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Err(TopologyError::Cancelled),

                _ = &mut expiry => {
                    return Err(TopologyError::Timeout {
                        after: deadline.unwrap_or_default(),
                    });
                }

                changed = self.updates.changed() => {
                    if changed.is_err() {
                        let kind = *self.updates.borrow();
                        return if kind.is_classified() {
                            Ok(kind)
                        } else {
                            Err(TopologyError::Closed)
                        };
                    }
                }
            }
        }
    }
}
