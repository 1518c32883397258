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

//! Entity handler capabilities.
//!
//! A handler implements any subset of the three traits and is registered
//! once per capability in the [`crate::registry::HandlerRegistry`]:
//!
//! - [`SyncHandler`] is dispatched by the outbox worker, once per outbox row
//! - [`StatusHandler`] is polled by the status worker
//! - [`ReconcileHandler`] is run by the outbox worker on its reconcile timer
//!
//! Handlers never retry on their own; the outbox worker owns retry policy.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncError;

pub mod cluster;

pub use cluster::ClusterHandler;

#[async_trait]
pub trait SyncHandler: Send + Sync {
    /// Makes the external system match the stored state of entity `id`.
    ///
    /// Must be idempotent. An entity that no longer exists is success.
    async fn sync(&self, id: Uuid) -> Result<(), SyncError>;
}

/// Outcome of one status pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Entities whose observed status was fetched.
    pub checked: usize,
    /// Entities whose stored status changed value.
    pub transitions: usize,
    /// Entities whose status could not be fetched or stored.
    pub errors: usize,
}

#[async_trait]
pub trait StatusHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Polls observed state and persists transitions.
    async fn check_status(&self) -> Result<StatusReport, SyncError>;
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// External resources listed.
    pub scanned: usize,
    /// Orphans deleted.
    pub deleted: usize,
    /// Resources skipped for lack of a usable owner label.
    pub unlabeled: usize,
    /// Orphans whose deletion failed.
    pub errors: usize,
}

#[async_trait]
pub trait ReconcileHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Deletes external resources that no stored entity owns.
    async fn reconcile_orphans(&self) -> Result<ReconcileReport, SyncError>;
}
