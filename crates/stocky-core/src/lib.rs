// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stocky Core - Inventory Service Database Layer
//!
//! This crate prepares the MongoDB deployment behind the stocky inventory
//! service (products and sales) and provides the repositories the RPC layer
//! is built on.
//!
//! # Bootstrap
//!
//! ```text
//! ┌──────────────────┐   client   ┌──────────────────┐   kind   ┌──────────────────────┐
//! │    connection    │───────────►│     topology     │─────────►│      migrations      │
//! │  options + ping  │            │ wait for SDAM    │          │ engine step + hooks  │
//! └──────────────────┘            └──────────────────┘          └──────────┬───────────┘
//!                                                                          │
//!                                                                          ▼
//!                                                               ┌──────────────────────┐
//!                                                               │     transaction      │
//!                                                               │ session or direct    │
//!                                                               └──────────────────────┘
//! ```
//!
//! The service never starts accepting requests unless [`bootstrap::bootstrap`]
//! returns successfully.
//!
//! # Migrations
//!
//! | File | Applied at bootstrap |
//! |------|----------------------|
//! | `000001_create_collections.up.json` | yes |
//! | `000001_create_collections.down.json` | no |
//! | `abc_bad.up.json` | no (ignored) |
//!
//! Versions are applied in ascending numeric order, each exactly once. The
//! current version is tracked in the `schema_migrations` collection.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `IIMS_DATABASE_URI` | Yes* | - | MongoDB connection string |
//! | `IIMS_DATABASE_HOSTS` | Yes* | - | `host:port` list when no URI is set |
//! | `IIMS_DATABASE_NAME` | No | database from URI | Target database |
//! | `IIMS_DATABASE_USERNAME` | No | - | SCRAM username |
//! | `IIMS_DATABASE_PASSWORD` | No | - | SCRAM password |
//! | `IIMS_DATABASE_MIGRATIONS_PATH` | No | `./migrations/mongo` | Migration artifacts |
//! | `IIMS_DATABASE_CONNECT_TIMEOUT_SECS` | No | `10` | Connect + ping window |
//! | `IIMS_DATABASE_HEALTHCHECK_TIMEOUT_SECS` | No | `5` | Server selection bound |
//! | `IIMS_DATABASE_TOPOLOGY_TIMEOUT_SECS` | No | `10` | Topology discovery deadline |
//! | `IIMS_SERVER_GRPC_PORT` | No | `50051` | RPC listen port |
//!
//! \* one of the two is required.

/// Process-start sequence and the handle it produces.
pub mod bootstrap;

/// Configuration loaded from environment variables.
pub mod config;

/// Client construction and liveness check.
pub mod connection;

/// Bootstrap error taxonomy.
pub mod error;

/// Versioned migrations: discovery, engine, hooks and coordinator.
pub mod migrations;

/// Stored document types.
pub mod models;

/// Product and sale repositories.
pub mod repository;

/// Typed authentication requests.
pub mod requests;

/// Cluster topology discovery.
pub mod topology;

/// Transaction strategy for repository writes.
pub mod transaction;

pub use bootstrap::{Bootstrapped, bootstrap};
pub use error::BootstrapError;
