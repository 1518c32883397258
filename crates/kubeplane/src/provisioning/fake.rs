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

//! Deterministic in-memory provisioning client.
//!
//! Shoots and projects live in a mutex-guarded map. Every call is counted,
//! and the next `n` calls of any operation can be made to fail. Applying an
//! identical spec twice changes nothing, so [`FakeProvisioner::mutations`]
//! only moves when externally visible state does.
//!
//! A newly applied shoot reports `progressing`; tests drive it further with
//! [`FakeProvisioner::set_status`]. Deleting a shoot removes it at once.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ExternalResource, ObservedStatus, ProvisioningClient, ShootSpec};
use crate::error::ProvisionError;
use crate::models::cluster::{NodePool, ShootStatus};

/// Operations of [`ProvisioningClient`], for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOperation {
    EnsureProject,
    ApplyShoot,
    DeleteShoot,
    ShootStatus,
    ListShoots,
}

#[derive(Debug, Clone)]
struct FakeProject {
    owner_id: Uuid,
    namespace: Option<String>,
}

#[derive(Debug, Clone)]
struct FakeShoot {
    spec: ShootSpec,
    status: ObservedStatus,
}

#[derive(Default)]
struct FakeState {
    projects: HashMap<String, FakeProject>,
    shoots: HashMap<Uuid, FakeShoot>,
    unlabeled: Vec<ExternalResource>,
    calls: HashMap<FakeOperation, usize>,
    failures: HashMap<FakeOperation, usize>,
    mutations: usize,
    defer_namespaces: bool,
}

impl FakeState {
    /// Counts the call and consumes one injected failure, if any.
    fn enter(&mut self, op: FakeOperation) -> Result<(), ProvisionError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ProvisionError::Api {
                    status: 503,
                    message: format!("injected {:?} failure", op),
                })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeProvisioner {
    state: Mutex<FakeState>,
}

impl FakeProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls of `op` fail with a 503.
    pub fn fail_next(&self, op: FakeOperation, count: usize) {
        self.state.lock().failures.insert(op, count);
    }

    /// Number of calls of `op` so far, failed ones included.
    pub fn calls(&self, op: FakeOperation) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of changes to external state so far.
    pub fn mutations(&self) -> usize {
        self.state.lock().mutations
    }

    /// While set, newly created projects have no namespace until
    /// [`FakeProvisioner::assign_namespaces`] runs.
    pub fn defer_namespaces(&self, defer: bool) {
        self.state.lock().defer_namespaces = defer;
    }

    /// Gives every project without a namespace its namespace.
    pub fn assign_namespaces(&self) {
        for (name, project) in self.state.lock().projects.iter_mut() {
            project.namespace.get_or_insert_with(|| namespace_for(name));
        }
    }

    /// Owner recorded for `project`, if it exists.
    pub fn project_owner(&self, project: &str) -> Option<Uuid> {
        self.state.lock().projects.get(project).map(|p| p.owner_id)
    }

    /// Current spec of the shoot owned by `cluster_id`.
    pub fn shoot(&self, cluster_id: Uuid) -> Option<ShootSpec> {
        self.state
            .lock()
            .shoots
            .get(&cluster_id)
            .map(|s| s.spec.clone())
    }

    /// Number of labelled shoots.
    pub fn shoot_count(&self) -> usize {
        self.state.lock().shoots.len()
    }

    /// Overrides the observed status of an existing shoot.
    pub fn set_status(&self, cluster_id: Uuid, status: ShootStatus, message: Option<&str>) {
        if let Some(shoot) = self.state.lock().shoots.get_mut(&cluster_id) {
            shoot.status = ObservedStatus::new(status, message.map(str::to_string));
        }
    }

    /// Adds a labelled shoot that no cluster row necessarily backs.
    pub fn insert_shoot(&self, cluster_id: Uuid, name: &str, namespace: &str) {
        let spec = ShootSpec {
            cluster_id,
            name: name.to_string(),
            namespace: namespace.to_string(),
            region: "eu-west-1".to_string(),
            kubernetes_version: "1.30".to_string(),
            node_pools: vec![NodePool {
                name: "default".to_string(),
                machine_type: "m5.large".to_string(),
                min: 1,
                max: 1,
            }],
        };
        self.state.lock().shoots.insert(
            cluster_id,
            FakeShoot {
                spec,
                status: ObservedStatus::new(ShootStatus::Ready, None),
            },
        );
    }

    /// Adds a shoot with a missing or arbitrary owner label.
    pub fn insert_unlabeled(&self, name: &str, namespace: &str, label: Option<&str>) {
        self.state.lock().unlabeled.push(ExternalResource {
            name: name.to_string(),
            namespace: namespace.to_string(),
            owner_label: label.map(str::to_string),
        });
    }

    /// Removes a shoot added with [`FakeProvisioner::insert_unlabeled`].
    pub fn remove_unlabeled(&self, name: &str) {
        self.state.lock().unlabeled.retain(|r| r.name != name);
    }
}

fn namespace_for(project: &str) -> String {
    format!("garden-{}", project)
}

#[async_trait]
impl ProvisioningClient for FakeProvisioner {
    async fn ensure_project_namespace(
        &self,
        project: &str,
        owner_id: Uuid,
    ) -> Result<Option<String>, ProvisionError> {
        let mut state = self.state.lock();
        state.enter(FakeOperation::EnsureProject)?;

        if let Some(existing) = state.projects.get(project) {
            return Ok(existing.namespace.clone());
        }

        let namespace = if state.defer_namespaces {
            None
        } else {
            Some(namespace_for(project))
        };
        state.projects.insert(
            project.to_string(),
            FakeProject {
                owner_id,
                namespace: namespace.clone(),
            },
        );
        state.mutations += 1;
        Ok(namespace)
    }

    async fn apply_shoot(&self, spec: &ShootSpec) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        state.enter(FakeOperation::ApplyShoot)?;

        let status = match state.shoots.get(&spec.cluster_id) {
            Some(shoot) if shoot.spec == *spec => return Ok(()),
            Some(shoot) => shoot.status.clone(),
            None => ObservedStatus::new(ShootStatus::Progressing, None),
        };
        state.shoots.insert(
            spec.cluster_id,
            FakeShoot {
                spec: spec.clone(),
                status,
            },
        );
        state.mutations += 1;
        Ok(())
    }

    async fn delete_shoot(&self, cluster_id: Uuid) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        state.enter(FakeOperation::DeleteShoot)?;

        if state.shoots.remove(&cluster_id).is_some() {
            state.mutations += 1;
        }
        Ok(())
    }

    async fn shoot_status(&self, cluster_id: Uuid) -> Result<ObservedStatus, ProvisionError> {
        let mut state = self.state.lock();
        state.enter(FakeOperation::ShootStatus)?;

        Ok(state
            .shoots
            .get(&cluster_id)
            .map(|s| s.status.clone())
            .unwrap_or_else(ObservedStatus::not_found))
    }

    async fn list_shoots(&self) -> Result<Vec<ExternalResource>, ProvisionError> {
        let mut state = self.state.lock();
        state.enter(FakeOperation::ListShoots)?;

        let mut resources: Vec<ExternalResource> = state
            .shoots
            .values()
            .map(|s| ExternalResource {
                name: s.spec.name.clone(),
                namespace: s.spec.namespace.clone(),
                owner_label: Some(s.spec.cluster_id.to_string()),
            })
            .collect();
        resources.extend(state.unlabeled.iter().cloned());
        Ok(resources)
    }
}
