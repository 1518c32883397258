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

//! Outbox Model
//!
//! An outbox row is an intent to synchronize one entity with the external
//! orchestrator. Rows are written by the entity store's own write path (the
//! `clusters` trigger, or the API layer for other entity types) and drained
//! by the outbox worker.
//!
//! Exactly one of the entity reference columns is populated per row; which
//! one determines the entity type. The `event` column is advisory only:
//! handlers always re-read the entity to decide what to do.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::StoreError;

/// Kind of entity an outbox row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Cluster,
    Namespace,
    Project,
    ProjectMember,
}

impl EntityType {
    /// Returns the string representation used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Cluster => "cluster",
            EntityType::Namespace => "namespace",
            EntityType::Project => "project",
            EntityType::ProjectMember => "project_member",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The change that produced an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxEvent {
    Created,
    Updated,
    Deleted,
}

impl OutboxEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxEvent::Created => "created",
            OutboxEvent::Updated => "updated",
            OutboxEvent::Deleted => "deleted",
        }
    }

    /// Parses an event from its column value.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(OutboxEvent::Created),
            "updated" => Some(OutboxEvent::Updated),
            "deleted" => Some(OutboxEvent::Deleted),
            _ => None,
        }
    }
}

/// Processing state of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Waiting to be processed, either for the first time or after a retry backoff.
    Pending,
    /// Successfully synchronized.
    Processed,
    /// Terminal failure; requires operator intervention.
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processed => "processed",
            OutboxStatus::Failed => "failed",
        }
    }
}

/// Reference to the entity an outbox row targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: Uuid,
}

/// An outbox row as claimed by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRow {
    pub id: i64,
    pub cluster_id: Option<Uuid>,
    pub namespace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub project_member_id: Option<Uuid>,
    /// Advisory; may be `None` if the stored value is not recognised.
    pub event: Option<OutboxEvent>,
    pub retries: i32,
    pub status_info: Option<String>,
}

impl OutboxRow {
    /// Creates a row targeting a single entity.
    pub fn for_entity(id: i64, entity: EntityRef, event: OutboxEvent) -> Self {
        let mut row = Self {
            id,
            cluster_id: None,
            namespace_id: None,
            project_id: None,
            project_member_id: None,
            event: Some(event),
            retries: 0,
            status_info: None,
        };
        match entity.entity_type {
            EntityType::Cluster => row.cluster_id = Some(entity.id),
            EntityType::Namespace => row.namespace_id = Some(entity.id),
            EntityType::Project => row.project_id = Some(entity.id),
            EntityType::ProjectMember => row.project_member_id = Some(entity.id),
        }
        row
    }

    /// Resolves the entity this row targets.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Integrity`] when no reference column, or more than
    /// one, is populated.
    pub fn entity(&self) -> Result<EntityRef, StoreError> {
        let populated: Vec<EntityRef> = [
            (EntityType::Cluster, self.cluster_id),
            (EntityType::Namespace, self.namespace_id),
            (EntityType::Project, self.project_id),
            (EntityType::ProjectMember, self.project_member_id),
        ]
        .into_iter()
        .filter_map(|(entity_type, id)| id.map(|id| EntityRef { entity_type, id }))
        .collect();

        match populated.as_slice() {
            [entity] => Ok(*entity),
            [] => Err(StoreError::Integrity(format!(
                "outbox row {} references no entity",
                self.id
            ))),
            many => Err(StoreError::Integrity(format!(
                "outbox row {} references {} entities",
                self.id,
                many.len()
            ))),
        }
    }
}
