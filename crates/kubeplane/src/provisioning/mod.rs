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

//! Provisioning client contract.
//!
//! The engine drives the external orchestrator only through
//! [`ProvisioningClient`]. Two implementations ship with the crate:
//!
//! - [`gardener::GardenerClient`] talks to the Gardener API over HTTP
//! - [`fake::FakeProvisioner`] keeps shoots in memory for tests and local runs
//!
//! Every method must be safe to call concurrently from both workers, and the
//! mutating methods must be idempotent.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ProvisionError;
use crate::models::cluster::{Cluster, NodePool, ShootStatus};

pub mod fake;
pub mod gardener;

/// Label carrying the owning cluster's id on every shoot the engine creates.
pub const CLUSTER_ID_LABEL: &str = "kubeplane.io/cluster-id";

/// Message attached to [`ShootStatus::Pending`] when the orchestrator has no
/// shoot for the cluster at all.
pub const NOT_FOUND_MESSAGE: &str = "shoot not found";

/// Desired state of one shoot.
#[derive(Debug, Clone, PartialEq)]
pub struct ShootSpec {
    pub cluster_id: Uuid,
    pub name: String,
    pub namespace: String,
    pub region: String,
    pub kubernetes_version: String,
    pub node_pools: Vec<NodePool>,
}

impl ShootSpec {
    /// Desired state for `cluster` placed in project namespace `namespace`.
    pub fn for_cluster(cluster: &Cluster, namespace: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster.id,
            name: cluster.shoot_name.clone(),
            namespace: namespace.into(),
            region: cluster.region.clone(),
            kubernetes_version: cluster.kubernetes_version.clone(),
            node_pools: cluster.node_pools.clone(),
        }
    }
}

/// Observed state of a shoot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedStatus {
    pub status: ShootStatus,
    pub message: Option<String>,
}

impl ObservedStatus {
    pub fn new(status: ShootStatus, message: impl Into<Option<String>>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The orchestrator has no shoot for the cluster.
    pub fn not_found() -> Self {
        Self {
            status: ShootStatus::Pending,
            message: Some(NOT_FOUND_MESSAGE.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == ShootStatus::Pending && self.message.as_deref() == Some(NOT_FOUND_MESSAGE)
    }
}

/// A shoot as listed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalResource {
    pub name: String,
    pub namespace: String,
    /// Raw value of [`CLUSTER_ID_LABEL`], if present.
    pub owner_label: Option<String>,
}

impl ExternalResource {
    /// Owning cluster id, or `None` when the label is missing or not a UUID.
    pub fn owner_id(&self) -> Option<Uuid> {
        self.owner_label
            .as_deref()
            .and_then(|label| Uuid::parse_str(label).ok())
    }

    /// `namespace/name`, stable across passes.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Ensures the project exists, creating it when absent.
    ///
    /// Returns the project's namespace, or `None` if the project exists but
    /// has not been assigned a namespace yet.
    async fn ensure_project_namespace(
        &self,
        project: &str,
        owner_id: Uuid,
    ) -> Result<Option<String>, ProvisionError>;

    /// Creates or updates the shoot to match `spec`.
    async fn apply_shoot(&self, spec: &ShootSpec) -> Result<(), ProvisionError>;

    /// Deletes the shoot owned by `cluster_id`. A missing shoot is success.
    async fn delete_shoot(&self, cluster_id: Uuid) -> Result<(), ProvisionError>;

    /// Observed status of the shoot owned by `cluster_id`, or
    /// [`ObservedStatus::not_found`].
    async fn shoot_status(&self, cluster_id: Uuid) -> Result<ObservedStatus, ProvisionError>;

    /// Every shoot the orchestrator knows about.
    async fn list_shoots(&self) -> Result<Vec<ExternalResource>, ProvisionError>;
}
