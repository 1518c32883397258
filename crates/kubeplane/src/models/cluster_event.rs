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

//! Cluster Event Model
//!
//! Cluster events are an append-only audit trail of observed status
//! transitions. They are written in the same transaction as the status
//! change that produced them and are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::cluster::ShootStatus;

/// A recorded cluster lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub event_type: ClusterEventType,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterEventType {
    StatusProgressing,
    StatusReady,
    StatusError,
    StatusDeleted,
}

impl ClusterEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterEventType::StatusProgressing => "status_progressing",
            ClusterEventType::StatusReady => "status_ready",
            ClusterEventType::StatusError => "status_error",
            ClusterEventType::StatusDeleted => "status_deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "status_progressing" => Some(ClusterEventType::StatusProgressing),
            "status_ready" => Some(ClusterEventType::StatusReady),
            "status_error" => Some(ClusterEventType::StatusError),
            "status_deleted" => Some(ClusterEventType::StatusDeleted),
            _ => None,
        }
    }

    /// The event recorded when a cluster enters `status`, if any.
    ///
    /// `pending` and `deleting` are transient and produce no event.
    pub fn for_status(status: ShootStatus) -> Option<Self> {
        match status {
            ShootStatus::Progressing => Some(ClusterEventType::StatusProgressing),
            ShootStatus::Ready => Some(ClusterEventType::StatusReady),
            ShootStatus::Error => Some(ClusterEventType::StatusError),
            ShootStatus::Deleted => Some(ClusterEventType::StatusDeleted),
            ShootStatus::Pending | ShootStatus::Deleting => None,
        }
    }
}

impl fmt::Display for ClusterEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
