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

//! Cluster store contract used by the cluster handler.
//!
//! The Postgres implementation is the [`DAL`]; [`crate::testing::MemoryClusterStore`]
//! implements the same contract in memory.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::StoreError;
use crate::models::cluster::{Cluster, ShootStatus};
use crate::models::cluster_event::ClusterEventType;

#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Loads a cluster by id. `None` when no row exists.
    async fn get_cluster(&self, id: Uuid) -> Result<Option<Cluster>, StoreError>;

    /// Marks a sync attempt as successful.
    async fn record_sync_success(&self, id: Uuid) -> Result<(), StoreError>;

    /// Marks a sync attempt as failed with `error`.
    async fn record_sync_failure(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Live, synced clusters with ids greater than `after`, ordered by id.
    async fn list_active_clusters(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError>;

    /// Soft-deleted clusters not yet confirmed gone, ids greater than `after`,
    /// ordered by id.
    async fn list_deleting_clusters(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError>;

    /// Every cluster id known to the store, regardless of soft-delete state.
    async fn list_cluster_ids(&self) -> Result<HashSet<Uuid>, StoreError>;

    /// Persists an observed status and, atomically, the lifecycle event it
    /// produced.
    async fn record_shoot_status(
        &self,
        id: Uuid,
        status: ShootStatus,
        message: Option<String>,
        event: Option<ClusterEventType>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl ClusterStore for DAL {
    async fn get_cluster(&self, id: Uuid) -> Result<Option<Cluster>, StoreError> {
        self.cluster().get(id).await
    }

    async fn record_sync_success(&self, id: Uuid) -> Result<(), StoreError> {
        self.cluster().record_sync_success(id).await
    }

    async fn record_sync_failure(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        self.cluster().record_sync_failure(id, error).await
    }

    async fn list_active_clusters(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError> {
        self.cluster().list_active(after, limit).await
    }

    async fn list_deleting_clusters(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError> {
        self.cluster().list_deleting(after, limit).await
    }

    async fn list_cluster_ids(&self) -> Result<HashSet<Uuid>, StoreError> {
        self.cluster().list_ids().await
    }

    async fn record_shoot_status(
        &self,
        id: Uuid,
        status: ShootStatus,
        message: Option<String>,
        event: Option<ClusterEventType>,
    ) -> Result<(), StoreError> {
        self.cluster()
            .record_shoot_status(id, status, message, event)
            .await
    }
}
