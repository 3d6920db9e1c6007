// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MongoDB sale repository.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, Bson, doc};
use mongodb::{Client, Collection, Database};

use super::{RepositoryError, SALE_COLLECTION, SaleRepository, parse_id};
use crate::models::Sale;
use crate::transaction::TxStrategy;

const ENTITY: &str = "sale";

/// [`SaleRepository`] over the `sales` collection.
#[derive(Debug, Clone)]
pub struct MongoSaleRepository {
    client: Client,
    collection: Collection<Sale>,
    tx: TxStrategy,
}

impl MongoSaleRepository {
    /// Create a repository writing with `tx`.
    pub fn new(client: Client, database: &Database, tx: TxStrategy) -> Self {
        Self {
            client,
            collection: database.collection(SALE_COLLECTION),
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
impl SaleRepository for MongoSaleRepository {
    async fn insert_one(&self, sale: Sale) -> Result<String, RepositoryError> {
        let collection = self.collection.clone();

        let inserted_id = self
            .tx
            .execute(&self.client, move |session| {
                Box::pin(async move {
                    let result = maybe_session!(session, collection.insert_one(&sale))?;
                    Ok(result.inserted_id)
                })
            })
            .await?;

        Ok(match inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        })
    }

    async fn get(&self, limit: i64, offset: i64) -> Result<Vec<Sale>, RepositoryError> {
        let mut find = self.collection.find(doc! {});
        if offset > 0 {
            find = find.skip(offset as u64);
        }
        if limit > 0 {
            find = find.limit(limit);
        }
        Ok(find.await?.try_collect().await?)
    }

    async fn get_by_id(&self, id: &str) -> Result<Sale, RepositoryError> {
        let oid = parse_id(id)?;
        self.collection
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: ENTITY,
                id: id.to_string(),
            })
    }

    async fn update(&self, mut sale: Sale) -> Result<(), RepositoryError> {
        let oid = sale
            .id
            .take()
            .ok_or(RepositoryError::MissingId { entity: ENTITY })?;
        let fields = bson::to_document(&sale)?;
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
