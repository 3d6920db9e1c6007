// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stored documents.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A product in the `products` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Assigned by the database on insert.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub product_code: String,
    /// RFC 3339 timestamp.
    pub creation_date: String,
    /// Blocked products stay stored but are not for sale.
    #[serde(default)]
    pub blocked: bool,
}

/// A sale (discount) in the `sales` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    /// Assigned by the database on insert.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub description: String,
    pub sale_size: i32,
    /// Hex id of the discounted product.
    pub product_id: String,
    /// Blocked sales stay stored but are not applied.
    #[serde(default)]
    pub blocked: bool,
}
