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

//! PostgreSQL database models
//!
//! Diesel row types used internally by the DAL and converted to domain types
//! at the DAL boundary. Text-encoded enums and the JSON node pool column are
//! parsed during conversion; a value the domain does not recognise is a
//! [`StoreError::Integrity`] rather than a panic.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::schema::*;
use crate::error::StoreError;
use crate::models::cluster::{Cluster, NodePool, ShootStatus};
use crate::models::cluster_event::{ClusterEvent, ClusterEventType};

// ============================================================================
// Cluster Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = clusters)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgCluster {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub shoot_name: String,
    pub region: String,
    pub kubernetes_version: String,
    pub node_pools: serde_json::Value,
    pub deleted_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub sync_attempts: i32,
    pub last_sync_attempt_at: Option<DateTime<Utc>>,
    pub shoot_status: String,
    pub shoot_status_message: Option<String>,
    pub shoot_status_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PgCluster {
    /// Converts the row, joined with its organization's name, to the domain type.
    pub fn into_cluster(self, organization_name: String) -> Result<Cluster, StoreError> {
        let shoot_status = ShootStatus::from_str(&self.shoot_status).ok_or_else(|| {
            StoreError::Integrity(format!(
                "cluster {} has unknown shoot_status '{}'",
                self.id, self.shoot_status
            ))
        })?;
        let node_pools: Vec<NodePool> =
            serde_json::from_value(self.node_pools).map_err(|e| {
                StoreError::Integrity(format!("cluster {} has malformed node_pools: {}", self.id, e))
            })?;

        Ok(Cluster {
            id: self.id,
            organization_id: self.organization_id,
            organization_name,
            name: self.name,
            shoot_name: self.shoot_name,
            region: self.region,
            kubernetes_version: self.kubernetes_version,
            node_pools,
            deleted_at: self.deleted_at,
            synced_at: self.synced_at,
            sync_error: self.sync_error,
            sync_attempts: self.sync_attempts,
            last_sync_attempt_at: self.last_sync_attempt_at,
            shoot_status,
            shoot_status_message: self.shoot_status_message,
            shoot_status_updated_at: self.shoot_status_updated_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ============================================================================
// Cluster Event Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = cluster_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PgClusterEvent {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub event_type: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cluster_events)]
pub struct NewPgClusterEvent {
    pub cluster_id: Uuid,
    pub event_type: String,
    pub message: Option<String>,
}

impl TryFrom<PgClusterEvent> for ClusterEvent {
    type Error = StoreError;

    fn try_from(row: PgClusterEvent) -> Result<Self, Self::Error> {
        let event_type = ClusterEventType::from_str(&row.event_type).ok_or_else(|| {
            StoreError::Integrity(format!(
                "cluster event {} has unknown event_type '{}'",
                row.id, row.event_type
            ))
        })?;
        Ok(ClusterEvent {
            id: row.id,
            cluster_id: row.cluster_id,
            event_type,
            message: row.message,
            created_at: row.created_at,
        })
    }
}
