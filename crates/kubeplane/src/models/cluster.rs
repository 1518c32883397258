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

//! Cluster Model
//!
//! A cluster row carries three disjoint groups of columns, each with a single
//! writer:
//!
//! - desired state (name, region, version, node pools, `deleted_at`): the API layer
//! - sync state (`synced_at`, `sync_error`, `sync_attempts`, `last_sync_attempt_at`):
//!   the cluster handler, invoked from the outbox worker
//! - observed state (`shoot_status`, `shoot_status_message`, `shoot_status_updated_at`):
//!   the status worker
//!
//! Each writer issues updates touching only its own columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Observed lifecycle status of a cluster's shoot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShootStatus {
    Pending,
    Progressing,
    Ready,
    Error,
    Deleting,
    Deleted,
}

impl ShootStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShootStatus::Pending => "pending",
            ShootStatus::Progressing => "progressing",
            ShootStatus::Ready => "ready",
            ShootStatus::Error => "error",
            ShootStatus::Deleting => "deleting",
            ShootStatus::Deleted => "deleted",
        }
    }

    /// Parses a status from its column value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ShootStatus::Pending),
            "progressing" => Some(ShootStatus::Progressing),
            "ready" => Some(ShootStatus::Ready),
            "error" => Some(ShootStatus::Error),
            "deleting" => Some(ShootStatus::Deleting),
            "deleted" => Some(ShootStatus::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for ShootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Desired specification of one worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    pub name: String,
    pub machine_type: String,
    pub min: i32,
    pub max: i32,
}

/// A cluster row (domain type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Denormalised from `organizations.name`; the project name derives from it.
    pub organization_name: String,
    pub name: String,
    /// Shoot name chosen at creation time; stable for the life of the cluster.
    pub shoot_name: String,
    pub region: String,
    pub kubernetes_version: String,
    pub node_pools: Vec<NodePool>,
    pub deleted_at: Option<DateTime<Utc>>,

    pub synced_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub sync_attempts: i32,
    pub last_sync_attempt_at: Option<DateTime<Utc>>,

    pub shoot_status: ShootStatus,
    pub shoot_status_message: Option<String>,
    pub shoot_status_updated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    /// Whether deletion has been requested.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
