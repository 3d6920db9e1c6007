// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! How repository writes are executed.
//!
//! Replica sets and sharded clusters run each unit of work inside a session
//! transaction. Standalone servers cannot run multi-statement transactions,
//! so there the unit of work runs directly with no session at all.
//!
//! ```ignore
//! let collection = self.collection.clone();
//! strategy
//!     .execute(&client, move |session| {
//!         Box::pin(async move {
//!             match session {
//!                 Some(session) => collection.insert_one(doc).session(session).await?,
//!                 None => collection.insert_one(doc).await?,
//!             };
//!             Ok(())
//!         })
//!     })
//!     .await?;
//! ```

use futures::future::BoxFuture;
use mongodb::{Client, ClientSession};
use tracing::warn;

use crate::repository::RepositoryError;
use crate::topology::TopologyKind;

/// Execution strategy for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStrategy {
    /// Session plus multi-statement transaction; commit on success, abort on error.
    MultiStatement,
    /// No session; each operation stands alone.
    Direct,
}

impl TxStrategy {
    /// Pick the strategy from the transaction capability of the cluster.
    pub fn select(supports_transactions: bool) -> Self {
        if supports_transactions {
            Self::MultiStatement
        } else {
            Self::Direct
        }
    }

    /// Pick the strategy for a classified topology.
    pub fn for_topology(kind: TopologyKind) -> Self {
        Self::select(kind.supports_transactions())
    }

    /// True for [`TxStrategy::MultiStatement`].
    pub fn is_transactional(self) -> bool {
        self == Self::MultiStatement
    }

    /// Run `work`, handing it the session when one is in use.
    pub async fn execute<T, F>(&self, client: &Client, work: F) -> Result<T, RepositoryError>
    where
        T: Send,
        F: for<'s> FnOnce(
                Option<&'s mut ClientSession>,
            ) -> BoxFuture<'s, Result<T, RepositoryError>>
            + Send,
    {
        match self {
            Self::Direct => work(None).await,
            Self::MultiStatement => {
                let mut session = client.start_session().await?;
                session.start_transaction().await?;

                match work(Some(&mut session)).await {
                    Ok(value) => {
                        session.commit_transaction().await?;
                        Ok(value)
                    }
                    Err(err) => {
                        if let Err(abort_err) = session.abort_transaction().await {
                            warn!(error = %abort_err, "Failed to abort transaction");
                        }
                        Err(err)
                    }
                }
            }
        }
    }
}
