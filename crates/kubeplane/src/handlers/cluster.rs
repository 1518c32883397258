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

//! Cluster handler: sync, status and orphan reconciliation for clusters.
//!
//! # Sync
//!
//! The stored row is the only input; the outbox event kind is ignored.
//!
//! | Stored row        | External calls                                  |
//! |-------------------|-------------------------------------------------|
//! | missing           | none                                            |
//! | soft-deleted      | `delete_shoot`                                  |
//! | live              | `ensure_project_namespace`, then `apply_shoot`  |
//!
//! After each attempt on an existing row the sync-state columns are updated.
//!
//! # Status
//!
//! Two independent paged passes: live synced clusters get their observed
//! status stored, with an event only when the value changes; soft-deleted
//! clusters are held at `deleting` until the orchestrator reports the shoot
//! gone, then marked `deleted`.
//!
//! # Reconciliation
//!
//! Shoots whose owner label names no cluster row at all are deleted. Shoots
//! with a missing or unparseable label are skipped and counted across passes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{ReconcileHandler, ReconcileReport, StatusHandler, StatusReport, SyncHandler};
use crate::audit;
use crate::config::WorkerConfig;
use crate::error::SyncError;
use crate::models::cluster::{Cluster, ShootStatus};
use crate::models::cluster_event::ClusterEventType;
use crate::naming;
use crate::provisioning::{ExternalResource, ProvisioningClient, ShootSpec};
use crate::store::ClusterStore;

pub struct ClusterHandler {
    store: Arc<dyn ClusterStore>,
    client: Arc<dyn ProvisioningClient>,
    batch_size: i64,
    unlabeled_alert_threshold: u32,
    /// Consecutive reconcile passes each unlabeled resource has been seen in,
    /// keyed by `namespace/name`.
    unlabeled: Mutex<HashMap<String, u32>>,
}

impl ClusterHandler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        client: Arc<dyn ProvisioningClient>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            client,
            batch_size: config.status_batch_size(),
            unlabeled_alert_threshold: config.unlabeled_alert_threshold(),
            unlabeled: Mutex::new(HashMap::new()),
        }
    }

    async fn apply(&self, cluster: &Cluster) -> Result<(), SyncError> {
        let project = naming::project_name(&cluster.organization_name);
        let namespace = self
            .client
            .ensure_project_namespace(&project, cluster.organization_id)
            .await
            .map_err(|e| SyncError::provision("ensure project", e))?
            .ok_or_else(|| SyncError::ProjectNotReady(project.clone()))?;

        let spec = ShootSpec::for_cluster(cluster, namespace);
        self.client
            .apply_shoot(&spec)
            .await
            .map_err(|e| SyncError::provision("apply shoot", e))?;

        debug!(cluster_id = %cluster.id, project = %project, shoot = %spec.name, "Cluster applied");
        Ok(())
    }

    async fn delete(&self, cluster: &Cluster) -> Result<(), SyncError> {
        self.client
            .delete_shoot(cluster.id)
            .await
            .map_err(|e| SyncError::provision("delete shoot", e))?;

        debug!(cluster_id = %cluster.id, shoot = %cluster.shoot_name, "Cluster deletion requested");
        Ok(())
    }

    async fn check_active(&self, report: &mut StatusReport) -> Result<(), SyncError> {
        let mut after = None;
        loop {
            let page = self
                .store
                .list_active_clusters(after, self.batch_size)
                .await?;
            for cluster in &page {
                self.observe_active(cluster, report).await;
            }
            match page.last() {
                Some(last) if page.len() as i64 == self.batch_size => after = Some(last.id),
                _ => return Ok(()),
            }
        }
    }

    async fn observe_active(&self, cluster: &Cluster, report: &mut StatusReport) {
        report.checked += 1;
        let observed = match self.client.shoot_status(cluster.id).await {
            Ok(observed) => observed,
            Err(e) => {
                warn!(cluster_id = %cluster.id, error = %e, "Failed to fetch shoot status");
                report.errors += 1;
                return;
            }
        };

        let changed = observed.status != cluster.shoot_status;
        let event = if changed {
            ClusterEventType::for_status(observed.status)
        } else {
            None
        };

        if let Err(e) = self
            .store
            .record_shoot_status(cluster.id, observed.status, observed.message.clone(), event)
            .await
        {
            warn!(cluster_id = %cluster.id, error = %e, "Failed to record shoot status");
            report.errors += 1;
            return;
        }

        if changed {
            report.transitions += 1;
            counter!("kubeplane_status_transitions_total", "status" => observed.status.as_str())
                .increment(1);
            info!(
                cluster_id = %cluster.id,
                from = %cluster.shoot_status,
                to = %observed.status,
                "Cluster status changed"
            );
        }
        if observed.status == ShootStatus::Error {
            audit::log_cluster_status_error(
                cluster.id,
                &cluster.shoot_name,
                observed.message.as_deref(),
            );
        }
    }

    async fn check_deleting(&self, report: &mut StatusReport) -> Result<(), SyncError> {
        let mut after = None;
        loop {
            let page = self
                .store
                .list_deleting_clusters(after, self.batch_size)
                .await?;
            for cluster in &page {
                self.observe_deleting(cluster, report).await;
            }
            match page.last() {
                Some(last) if page.len() as i64 == self.batch_size => after = Some(last.id),
                _ => return Ok(()),
            }
        }
    }

    async fn observe_deleting(&self, cluster: &Cluster, report: &mut StatusReport) {
        report.checked += 1;
        let observed = match self.client.shoot_status(cluster.id).await {
            Ok(observed) => observed,
            Err(e) => {
                warn!(cluster_id = %cluster.id, error = %e, "Failed to fetch shoot status");
                report.errors += 1;
                return;
            }
        };

        let (status, message, event) = if observed.is_not_found() {
            (ShootStatus::Deleted, None, Some(ClusterEventType::StatusDeleted))
        } else {
            (ShootStatus::Deleting, observed.message, None)
        };

        if let Err(e) = self
            .store
            .record_shoot_status(cluster.id, status, message, event)
            .await
        {
            warn!(cluster_id = %cluster.id, error = %e, "Failed to record shoot status");
            report.errors += 1;
            return;
        }

        if status != cluster.shoot_status {
            report.transitions += 1;
            counter!("kubeplane_status_transitions_total", "status" => status.as_str())
                .increment(1);
        }
        if status == ShootStatus::Deleted {
            audit::log_cluster_deletion_confirmed(cluster.id, &cluster.shoot_name);
        }
    }

    /// Bumps the consecutive-pass count for an unlabeled resource and returns it.
    fn note_unlabeled(&self, resource: &ExternalResource) -> u32 {
        let mut seen = self.unlabeled.lock();
        let passes = seen.entry(resource.key()).or_insert(0);
        *passes += 1;
        *passes
    }
}

#[async_trait]
impl SyncHandler for ClusterHandler {
    async fn sync(&self, id: Uuid) -> Result<(), SyncError> {
        let Some(cluster) = self.store.get_cluster(id).await? else {
            debug!(cluster_id = %id, "Cluster row gone, nothing to sync");
            return Ok(());
        };

        let result = if cluster.is_deleted() {
            self.delete(&cluster).await
        } else {
            self.apply(&cluster).await
        };

        let recorded = match &result {
            Ok(()) => self.store.record_sync_success(id).await,
            Err(e) => self.store.record_sync_failure(id, &e.to_string()).await,
        };
        if let Err(e) = recorded {
            warn!(cluster_id = %id, error = %e, "Failed to record sync state");
        }

        result
    }
}

#[async_trait]
impl StatusHandler for ClusterHandler {
    fn name(&self) -> &str {
        "cluster"
    }

    async fn check_status(&self) -> Result<StatusReport, SyncError> {
        let mut report = StatusReport::default();

        let active = self.check_active(&mut report).await;
        if let Err(e) = &active {
            error!(error = %e, "Failed to list active clusters");
        }
        let deleting = self.check_deleting(&mut report).await;
        if let Err(e) = &deleting {
            error!(error = %e, "Failed to list deleting clusters");
        }

        match (active, deleting) {
            (Err(e), Err(_)) => Err(e),
            _ => Ok(report),
        }
    }
}

#[async_trait]
impl ReconcileHandler for ClusterHandler {
    fn name(&self) -> &str {
        "cluster"
    }

    async fn reconcile_orphans(&self) -> Result<ReconcileReport, SyncError> {
        // Shoots are listed before ids: any shoot created from a committed row
        // is then guaranteed to find that row in the id set.
        let resources = self
            .client
            .list_shoots()
            .await
            .map_err(|e| SyncError::provision("list shoots", e))?;
        let known = self.store.list_cluster_ids().await?;

        let mut report = ReconcileReport {
            scanned: resources.len(),
            ..Default::default()
        };
        let mut unlabeled_now = HashSet::new();

        for resource in &resources {
            let owner = match resource.owner_id() {
                Some(owner) => owner,
                None => {
                    report.unlabeled += 1;
                    unlabeled_now.insert(resource.key());
                    let passes = self.note_unlabeled(resource);
                    warn!(
                        name = %resource.name,
                        namespace = %resource.namespace,
                        label = ?resource.owner_label,
                        passes,
                        "Skipping external resource without a usable owner label"
                    );
                    if passes == self.unlabeled_alert_threshold {
                        audit::log_unlabeled_resource(
                            &resource.name,
                            &resource.namespace,
                            resource.owner_label.as_deref(),
                            passes,
                        );
                    }
                    continue;
                }
            };

            if known.contains(&owner) {
                continue;
            }

            match self.client.delete_shoot(owner).await {
                Ok(()) => {
                    report.deleted += 1;
                    counter!("kubeplane_orphans_deleted_total").increment(1);
                    audit::log_orphan_deleted(owner, &resource.name, &resource.namespace);
                }
                Err(e) => {
                    report.errors += 1;
                    audit::log_orphan_delete_failed(owner, &resource.name, &e.to_string());
                }
            }
        }

        self.unlabeled
            .lock()
            .retain(|key, _| unlabeled_now.contains(key));

        Ok(report)
    }
}
