// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repository interfaces and MongoDB backends.
//!
//! Writes go through the [`TxStrategy`](crate::transaction::TxStrategy) chosen
//! at bootstrap; reads always run directly.

/// Await a driver action, attaching the session when there is one.
macro_rules! maybe_session {
    ($session:expr, $action:expr) => {
        match $session {
            Some(session) => $action.session(session).await,
            None => $action.await,
        }
    };
}

pub mod product;
pub mod sale;

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

pub use self::product::MongoProductRepository;
pub use self::sale::MongoSaleRepository;

use crate::models::{Product, Sale};

/// Collection holding [`Product`] documents.
pub const PRODUCT_COLLECTION: &str = "products";

/// Collection holding [`Sale`] documents.
pub const SALE_COLLECTION: &str = "sales";

/// Repository errors.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The id is not a 24-character hex ObjectId.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// No document matched.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity kind, e.g. `product`.
        entity: &'static str,
        /// Requested id or lookup key.
        id: String,
    },

    /// An update was issued for a document that carries no id.
    #[error("{entity} has no id")]
    MissingId {
        /// Entity kind, e.g. `sale`.
        entity: &'static str,
    },

    /// A document could not be converted to BSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),

    /// Driver error.
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

pub(crate) fn parse_id(id: &str) -> Result<ObjectId, RepositoryError> {
    ObjectId::parse_str(id).map_err(|_| RepositoryError::InvalidId(id.to_string()))
}

/// Product storage.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Store a new product and return its hex id.
    async fn insert_one(&self, product: Product) -> Result<String, RepositoryError>;

    /// List products. A `limit` or `offset` of zero or less is ignored.
    async fn get(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError>;

    /// Fetch one product by hex id.
    async fn get_by_id(&self, id: &str) -> Result<Product, RepositoryError>;

    /// Fetch one product by its product code.
    async fn get_by_product_code(&self, code: &str) -> Result<Product, RepositoryError>;

    /// Overwrite the stored fields of `product`, which must carry an id.
    async fn update(&self, product: Product) -> Result<(), RepositoryError>;

    /// Remove a product.
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// Mark a product as blocked.
    async fn block(&self, id: &str) -> Result<(), RepositoryError>;

    /// Clear the blocked flag.
    async fn unblock(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Sale storage.
#[async_trait]
pub trait SaleRepository: Send + Sync {
    /// Store a new sale and return its hex id.
    async fn insert_one(&self, sale: Sale) -> Result<String, RepositoryError>;

    /// List sales. A `limit` or `offset` of zero or less is ignored.
    async fn get(&self, limit: i64, offset: i64) -> Result<Vec<Sale>, RepositoryError>;

    /// Fetch one sale by hex id.
    async fn get_by_id(&self, id: &str) -> Result<Sale, RepositoryError>;

    /// Overwrite the stored fields of `sale`, which must carry an id.
    async fn update(&self, sale: Sale) -> Result<(), RepositoryError>;

    /// Remove a sale.
    async fn delete(&self, id: &str) -> Result<(), RepositoryError>;

    /// Mark a sale as blocked.
    async fn block(&self, id: &str) -> Result<(), RepositoryError>;

    /// Clear the blocked flag.
    async fn unblock(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Repositories handed to the service layer.
#[derive(Clone)]
pub struct Repositories {
    /// Product repository.
    pub products: Arc<dyn ProductRepository>,
    /// Sale repository.
    pub sales: Arc<dyn SaleRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories")
            .field("products", &"...")
            .field("sales", &"...")
            .finish()
    }
}
