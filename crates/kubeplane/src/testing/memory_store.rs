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

//! In-memory [`ClusterStore`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::cluster::{Cluster, NodePool, ShootStatus};
use crate::models::cluster_event::{ClusterEvent, ClusterEventType};
use crate::naming;
use crate::store::ClusterStore;

#[derive(Default)]
struct StoreState {
    clusters: BTreeMap<Uuid, Cluster>,
    events: Vec<ClusterEvent>,
    fail_active_listing: bool,
    unavailable: bool,
}

/// Cluster rows and events held in memory. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryClusterStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a cluster row.
    pub fn insert(&self, cluster: Cluster) {
        self.state.lock().clusters.insert(cluster.id, cluster);
    }

    /// Creates and stores a fresh, never-synced cluster.
    pub fn create_cluster(&self, organization_name: &str, name: &str) -> Cluster {
        let cluster = new_cluster(organization_name, name);
        self.insert(cluster.clone());
        cluster
    }

    pub fn cluster(&self, id: Uuid) -> Option<Cluster> {
        self.state.lock().clusters.get(&id).cloned()
    }

    /// Sets the soft-delete marker.
    pub fn soft_delete(&self, id: Uuid) {
        if let Some(cluster) = self.state.lock().clusters.get_mut(&id) {
            cluster.deleted_at = Some(Utc::now());
        }
    }

    /// Removes the row entirely.
    pub fn hard_delete(&self, id: Uuid) {
        self.state.lock().clusters.remove(&id);
    }

    /// Events recorded for `cluster_id`, oldest first.
    pub fn events(&self, cluster_id: Uuid) -> Vec<ClusterEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.cluster_id == cluster_id)
            .cloned()
            .collect()
    }

    /// While set, listing active clusters fails.
    pub fn fail_active_listing(&self, fail: bool) {
        self.state.lock().fail_active_listing = fail;
    }

    /// While set, cluster lookups fail as if no pooled connection could be
    /// checked out.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }
}

/// Builds a never-synced cluster with a generated shoot name and one node pool.
pub fn new_cluster(organization_name: &str, name: &str) -> Cluster {
    let now = Utc::now();
    Cluster {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        organization_name: organization_name.to_string(),
        name: name.to_string(),
        shoot_name: naming::resource_name(organization_name, name),
        region: "eu-west-1".to_string(),
        kubernetes_version: "1.30".to_string(),
        node_pools: vec![NodePool {
            name: "default".to_string(),
            machine_type: "m5.large".to_string(),
            min: 1,
            max: 3,
        }],
        deleted_at: None,
        synced_at: None,
        sync_error: None,
        sync_attempts: 0,
        last_sync_attempt_at: None,
        shoot_status: ShootStatus::Pending,
        shoot_status_message: None,
        shoot_status_updated_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn page(
    clusters: &BTreeMap<Uuid, Cluster>,
    after: Option<Uuid>,
    limit: i64,
    filter: impl Fn(&Cluster) -> bool,
) -> Vec<Cluster> {
    clusters
        .values()
        .filter(|c| after.map_or(true, |after| c.id > after))
        .filter(|c| filter(c))
        .take(usize::try_from(limit).unwrap_or(0))
        .cloned()
        .collect()
}

#[async_trait]
impl ClusterStore for MemoryClusterStore {
    async fn get_cluster(&self, id: Uuid) -> Result<Option<Cluster>, StoreError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(StoreError::ConnectionPool(
                "timed out waiting for connection".to_string(),
            ));
        }
        Ok(state.clusters.get(&id).cloned())
    }

    async fn record_sync_success(&self, id: Uuid) -> Result<(), StoreError> {
        let now = Utc::now();
        if let Some(cluster) = self.state.lock().clusters.get_mut(&id) {
            cluster.synced_at = Some(now);
            cluster.sync_error = None;
            cluster.sync_attempts = 0;
            cluster.last_sync_attempt_at = Some(now);
        }
        Ok(())
    }

    async fn record_sync_failure(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        if let Some(cluster) = self.state.lock().clusters.get_mut(&id) {
            cluster.sync_error = Some(error.to_string());
            cluster.sync_attempts += 1;
            cluster.last_sync_attempt_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_active_clusters(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError> {
        let state = self.state.lock();
        if state.fail_active_listing {
            return Err(StoreError::ConnectionPool(
                "simulated listing failure".to_string(),
            ));
        }
        Ok(page(&state.clusters, after, limit, |c| {
            c.deleted_at.is_none() && c.synced_at.is_some()
        }))
    }

    async fn list_deleting_clusters(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError> {
        let state = self.state.lock();
        Ok(page(&state.clusters, after, limit, |c| {
            c.deleted_at.is_some() && c.shoot_status != ShootStatus::Deleted
        }))
    }

    async fn list_cluster_ids(&self) -> Result<HashSet<Uuid>, StoreError> {
        Ok(self.state.lock().clusters.keys().copied().collect())
    }

    async fn record_shoot_status(
        &self,
        id: Uuid,
        status: ShootStatus,
        message: Option<String>,
        event: Option<ClusterEventType>,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut state = self.state.lock();
        if let Some(cluster) = state.clusters.get_mut(&id) {
            cluster.shoot_status = status;
            cluster.shoot_status_message = message.clone();
            cluster.shoot_status_updated_at = Some(now);
        } else {
            return Ok(());
        }
        if let Some(event_type) = event {
            state.events.push(ClusterEvent {
                id: Uuid::new_v4(),
                cluster_id: id,
                event_type,
                message,
                created_at: now,
            });
        }
        Ok(())
    }
}
