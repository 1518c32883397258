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

//! Gardener-backed provisioning client.
//!
//! Talks to the `core.gardener.cloud/v1beta1` API of a Gardener cluster with
//! a bearer token. Shoots are written with server-side apply so re-applying
//! the same spec is a no-op on the Gardener side, and every shoot carries the
//! [`CLUSTER_ID_LABEL`] so it can be found again by cluster id regardless of
//! its name or namespace.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use super::{
    ExternalResource, ObservedStatus, ProvisioningClient, ShootSpec, CLUSTER_ID_LABEL,
};
use crate::error::ProvisionError;
use crate::models::cluster::ShootStatus;

const API_PREFIX: &str = "apis/core.gardener.cloud/v1beta1";
const FIELD_MANAGER: &str = "kubeplane";
const DELETION_CONFIRMATION: &str = "confirmation.gardener.cloud/deletion";
const APPLY_PATCH: &str = "application/apply-patch+yaml";
const MERGE_PATCH: &str = "application/merge-patch+json";

/// Connection and infrastructure settings for [`GardenerClient`].
#[derive(Debug, Clone)]
pub struct GardenerConfig {
    pub base_url: Url,
    pub token: String,
    pub provider_type: String,
    pub cloud_profile: String,
    pub secret_binding: String,
    pub timeout: Duration,
}

impl GardenerConfig {
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            provider_type: "aws".to_string(),
            cloud_profile: "aws".to_string(),
            secret_binding: "default".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GardenerClient {
    config: GardenerConfig,
    http_client: reqwest::Client,
}

// Only the fields the client reads are modelled.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectMeta {
    name: String,
    namespace: String,
    labels: HashMap<String, String>,
    #[serde(rename = "deletionTimestamp")]
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Project {
    spec: ProjectSpec,
    status: ProjectStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectSpec {
    namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectStatus {
    phase: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShootList {
    items: Vec<Shoot>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Shoot {
    metadata: ObjectMeta,
    status: ShootStatusBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShootStatusBody {
    #[serde(rename = "lastOperation")]
    last_operation: Option<LastOperation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LastOperation {
    #[serde(rename = "type")]
    kind: String,
    state: String,
    description: Option<String>,
}

impl GardenerClient {
    pub fn new(config: GardenerConfig) -> Result<Self, ProvisionError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProvisionError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            API_PREFIX,
            path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.url(path))
            .bearer_auth(&self.config.token)
    }

    fn shoot_path(namespace: &str, name: &str) -> String {
        format!("namespaces/{}/shoots/{}", namespace, name)
    }

    async fn get_project(&self, name: &str) -> Result<Option<Project>, ProvisionError> {
        let response = self
            .request(Method::GET, &format!("projects/{}", name))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn create_project(&self, name: &str, owner_id: Uuid) -> Result<(), ProvisionError> {
        let body = json!({
            "apiVersion": "core.gardener.cloud/v1beta1",
            "kind": "Project",
            "metadata": {
                "name": name,
                "labels": { "kubeplane.io/organization-id": owner_id.to_string() },
            },
            "spec": { "namespace": format!("garden-{}", name) },
        });
        let response = self
            .request(Method::POST, "projects")
            .json(&body)
            .send()
            .await?;
        // Someone else created it first; the caller re-reads it.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check(response).await?;
        info!(project = name, owner_id = %owner_id, "Created Gardener project");
        Ok(())
    }

    async fn find_shoot(&self, cluster_id: Uuid) -> Result<Option<Shoot>, ProvisionError> {
        let selector = format!("{}={}", CLUSTER_ID_LABEL, cluster_id);
        let response = self
            .request(Method::GET, "shoots")
            .query(&[("labelSelector", selector.as_str())])
            .send()
            .await?;
        let list: ShootList = check(response).await?.json().await?;
        Ok(list.items.into_iter().next())
    }

    fn shoot_manifest(&self, spec: &ShootSpec) -> serde_json::Value {
        let workers: Vec<serde_json::Value> = spec
            .node_pools
            .iter()
            .map(|pool| {
                json!({
                    "name": pool.name,
                    "machine": { "type": pool.machine_type },
                    "minimum": pool.min,
                    "maximum": pool.max,
                })
            })
            .collect();

        json!({
            "apiVersion": "core.gardener.cloud/v1beta1",
            "kind": "Shoot",
            "metadata": {
                "name": spec.name,
                "namespace": spec.namespace,
                "labels": { CLUSTER_ID_LABEL: spec.cluster_id.to_string() },
            },
            "spec": {
                "cloudProfileName": self.config.cloud_profile,
                "secretBindingName": self.config.secret_binding,
                "region": spec.region,
                "kubernetes": { "version": spec.kubernetes_version },
                "provider": {
                    "type": self.config.provider_type,
                    "workers": workers,
                },
            },
        })
    }
}

/// Passes successful responses through and turns the rest into
/// [`ProvisionError::Api`].
async fn check(response: Response) -> Result<Response, ProvisionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("failed to read error body: {}", e));
    Err(ProvisionError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Maps a Gardener shoot onto the engine's status vocabulary.
fn observed_status(shoot: &Shoot) -> ObservedStatus {
    if shoot.metadata.deletion_timestamp.is_some() {
        let message = shoot
            .status
            .last_operation
            .as_ref()
            .and_then(|op| op.description.clone());
        return ObservedStatus::new(ShootStatus::Deleting, message);
    }

    let Some(op) = shoot.status.last_operation.as_ref() else {
        return ObservedStatus::new(ShootStatus::Pending, Some("no operation yet".to_string()));
    };

    let status = match (op.kind.as_str(), op.state.as_str()) {
        ("Delete", _) => ShootStatus::Deleting,
        (_, "Succeeded") => ShootStatus::Ready,
        (_, "Error") | (_, "Failed") | (_, "Aborted") => ShootStatus::Error,
        (_, "Processing") | (_, "Pending") => ShootStatus::Progressing,
        _ => ShootStatus::Pending,
    };
    ObservedStatus::new(status, op.description.clone())
}

#[async_trait]
impl ProvisioningClient for GardenerClient {
    async fn ensure_project_namespace(
        &self,
        project: &str,
        owner_id: Uuid,
    ) -> Result<Option<String>, ProvisionError> {
        let existing = match self.get_project(project).await? {
            Some(existing) => existing,
            None => {
                self.create_project(project, owner_id).await?;
                match self.get_project(project).await? {
                    Some(created) => created,
                    None => return Ok(None),
                }
            }
        };

        if existing.status.phase.as_deref() == Some("Ready") {
            Ok(existing.spec.namespace)
        } else {
            debug!(project, phase = ?existing.status.phase, "Project not ready");
            Ok(None)
        }
    }

    async fn apply_shoot(&self, spec: &ShootSpec) -> Result<(), ProvisionError> {
        let body = serde_json::to_vec(&self.shoot_manifest(spec))
            .map_err(|e| ProvisionError::InvalidResponse(e.to_string()))?;

        let response = self
            .request(Method::PATCH, &Self::shoot_path(&spec.namespace, &spec.name))
            .query(&[("fieldManager", FIELD_MANAGER), ("force", "true")])
            .header(header::CONTENT_TYPE, APPLY_PATCH)
            .body(body)
            .send()
            .await?;
        check(response).await?;

        debug!(cluster_id = %spec.cluster_id, shoot = %spec.name, "Applied shoot");
        Ok(())
    }

    async fn delete_shoot(&self, cluster_id: Uuid) -> Result<(), ProvisionError> {
        let Some(shoot) = self.find_shoot(cluster_id).await? else {
            return Ok(());
        };
        let path = Self::shoot_path(&shoot.metadata.namespace, &shoot.metadata.name);

        let annotate = json!({
            "metadata": { "annotations": { DELETION_CONFIRMATION: "true" } },
        });
        let response = self
            .request(Method::PATCH, &path)
            .header(header::CONTENT_TYPE, MERGE_PATCH)
            .body(annotate.to_string())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;

        let response = self.request(Method::DELETE, &path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;

        info!(cluster_id = %cluster_id, shoot = %shoot.metadata.name, "Requested shoot deletion");
        Ok(())
    }

    async fn shoot_status(&self, cluster_id: Uuid) -> Result<ObservedStatus, ProvisionError> {
        Ok(self
            .find_shoot(cluster_id)
            .await?
            .map(|shoot| observed_status(&shoot))
            .unwrap_or_else(ObservedStatus::not_found))
    }

    async fn list_shoots(&self) -> Result<Vec<ExternalResource>, ProvisionError> {
        let response = self.request(Method::GET, "shoots").send().await?;
        let list: ShootList = check(response).await?.json().await?;

        Ok(list
            .items
            .into_iter()
            .map(|shoot| {
                let mut metadata = shoot.metadata;
                ExternalResource {
                    owner_label: metadata.labels.remove(CLUSTER_ID_LABEL),
                    name: metadata.name,
                    namespace: metadata.namespace,
                }
            })
            .collect())
    }
}
