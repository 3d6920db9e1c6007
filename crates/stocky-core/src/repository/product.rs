// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MongoDB product repository.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, doc};
use mongodb::{Client, Collection, Database};
use tracing::debug;

use super::{PRODUCT_COLLECTION, ProductRepository, RepositoryError, parse_id};
use crate::models::Product;
use crate::transaction::TxStrategy;

const ENTITY: &str = "product";

/// [`ProductRepository`] over the `products` collection.
#[derive(Debug, Clone)]
pub struct MongoProductRepository {
    client: Client,
    collection: Collection<Product>,
    tx: TxStrategy,
}

impl MongoProductRepository {
    /// Create a repository writing with `tx`.
    pub fn new(client: Client, database: &Database, tx: TxStrategy) -> Self {
        Self {
            client,
            collection: database.collection(PRODUCT_COLLECTION),
            tx,
        }
    }

    async fn set_blocked(&self, id: &str, blocked: bool) -> Result<(), RepositoryError> {
        let oid = parse_id(id)?;
        let collection = self.collection.clone();
        let id = id.to_string();

        self.tx
            .execute(&self.client, move |session| {
                Box::pin(async move {
                    let result = maybe_session!(
                        session,
                        collection.update_one(
                            doc! { "_id": oid },
                            doc! { "$set": { "blocked": blocked } },
                        )
                    )?;
                    if result.matched_count == 0 {
                        return Err(RepositoryError::NotFound { entity: ENTITY, id });
                    }
                    Ok(())
                })
            })
            .await
    }
}

#[async_trait]
impl ProductRepository for MongoProductRepository {
    async fn insert_one(&self, product: Product) -> Result<String, RepositoryError> {
        debug!(name = %product.name, "Inserting product");
        let collection = self.collection.clone();

        let inserted_id = self
            .tx
            .execute(&self.client, move |session| {
                Box::pin(async move {
                    let result = maybe_session!(session, collection.insert_one(&product))?;
                    Ok(result.inserted_id)
                })
            })
            .await?;

        Ok(match inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        })
    }

    async fn get(&self, limit: i64, offset: i64) -> Result<Vec<Product>, RepositoryError> {
        let mut find = self.collection.find(doc! {});
        if offset > 0 {
            find = find.skip(offset as u64);
        }
        if limit > 0 {
            find = find.limit(limit);
        }
        Ok(find.await?.try_collect().await?)
    }

    async fn get_by_id(&self, id: &str) -> Result<Product, RepositoryError> {
        let oid = parse_id(id)?;
        self.collection
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            })
    }

    async fn get_by_product_code(&self, code: &str) -> Result<Product, RepositoryError> {
        self.collection
            .find_one(doc! { "product_code": code })
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: ENTITY,
                id: code.to_string(),
            })
    }

    async fn update(&self, mut product: Product) -> Result<(), RepositoryError> {
        let oid = product
            .id
            .take()
            .ok_or(RepositoryError::MissingId { entity: ENTITY })?;
        let fields = bson::to_document(&product)?;
        let collection = self.collection.clone();

        self.tx
            .execute(&self.client, move |session| {
                Box::pin(async move {
                    let result = maybe_session!(
                        session,
                        collection.update_one(doc! { "_id": oid }, doc! { "$set": fields })
                    )?;
                    if result.matched_count == 0 {
                        return Err(RepositoryError::NotFound {
                            entity: ENTITY,
                            id: oid.to_hex(),
                        });
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let oid = parse_id(id)?;
        let collection = self.collection.clone();
        let id = id.to_string();

        self.tx
            .execute(&self.client, move |session| {
                Box::pin(async move {
                    let result =
                        maybe_session!(session, collection.delete_one(doc! { "_id": oid }))?;
                    if result.deleted_count == 0 {
                        return Err(RepositoryError::NotFound { entity: ENTITY, id });
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn block(&self, id: &str) -> Result<(), RepositoryError> {
        self.set_blocked(id, true).await
    }

    async fn unblock(&self, id: &str) -> Result<(), RepositoryError> {
        self.set_blocked(id, false).await
    }
}
