/*
 *  Copyright 2025-2026 Kubeplane Maintainers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! # Kubeplane
//!
//! Outbox-driven reconciliation engine for managed Kubernetes clusters.
//!
//! Every change to a tenant-facing entity writes a row to an outbox table in
//! the same transaction. Kubeplane drains that outbox and drives an external
//! cluster orchestrator (Gardener) until it matches the stored state, polls
//! the orchestrator for observed status, and deletes external resources that
//! no stored entity owns.
//!
//! ## Components
//!
//! - [`outbox`]: claiming, locking and marking outbox rows; Postgres
//!   LISTEN/NOTIFY wake-ups
//! - [`handlers`]: per-entity sync, status and reconcile capabilities
//! - [`registry`]: entity type to handler dispatch
//! - [`provisioning`]: the orchestrator client trait, the Gardener client and
//!   an in-memory fake
//! - [`worker`]: the outbox and status loops, retry policy and readiness
//! - [`dal`] and [`database`]: the Postgres store behind [`store::ClusterStore`]
//! - [`testing`]: in-memory outbox and cluster store for tests
//!
//! ## Wiring
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kubeplane::models::outbox::EntityType;
//! use kubeplane::*;
//!
//! let database = Database::new(&url, 10)?;
//! database.run_migrations().await?;
//! let store: Arc<dyn ClusterStore> = Arc::new(DAL::new(database));
//!
//! let config = WorkerConfig::builder().build()?;
//! let cluster = Arc::new(ClusterHandler::new(store, client, &config));
//! let registry = Arc::new(
//!     HandlerRegistry::builder()
//!         .register_sync(EntityType::Cluster, cluster.clone())
//!         .register_status(cluster.clone())
//!         .register_reconcile(cluster)
//!         .build(),
//! );
//!
//! let outbox = OutboxWorker::new(Arc::new(PgOutboxConnector::new(&url)), registry.clone(), config.clone());
//! let status = StatusWorker::new(registry, config);
//! ```

pub mod audit;
pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod naming;
pub mod outbox;
pub mod provisioning;
pub mod registry;
pub mod store;
pub mod testing;
pub mod worker;

pub use config::{WorkerConfig, WorkerConfigBuilder};
pub use dal::DAL;
pub use database::Database;
pub use error::{ConfigError, ProvisionError, RegistryError, StoreError, SyncError};
pub use handlers::{ClusterHandler, ReconcileHandler, StatusHandler, SyncHandler};
pub use outbox::PgOutboxConnector;
pub use provisioning::ProvisioningClient;
pub use registry::HandlerRegistry;
pub use store::ClusterStore;
pub use worker::{OutboxWorker, Readiness, StatusWorker};
