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

//! Cluster Data Access Layer
//!
//! Reads join `organizations` for the owning organization's name, which the
//! cluster handler needs to derive the project name.
//!
//! Writers are split by column group. [`ClusterDAL::record_sync_success`] and
//! [`ClusterDAL::record_sync_failure`] touch sync-state only;
//! [`ClusterDAL::record_shoot_status`] touches observed state only. Neither
//! touches desired state or `updated_at`, so neither re-enqueues an outbox row.

use std::collections::HashSet;

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use super::models::{NewPgClusterEvent, PgCluster};
use super::DAL;
use crate::database::schema::{cluster_events, clusters, organizations};
use crate::error::StoreError;
use crate::models::cluster::{Cluster, ShootStatus};
use crate::models::cluster_event::ClusterEventType;

/// Data Access Layer for cluster rows.
pub struct ClusterDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> ClusterDAL<'a> {
    /// Loads a cluster by id, soft-deleted or not.
    pub async fn get(&self, id: Uuid) -> Result<Option<Cluster>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let row: Option<(PgCluster, String)> = conn
            .interact(move |conn| {
                clusters::table
                    .inner_join(organizations::table)
                    .filter(clusters::id.eq(id))
                    .select((PgCluster::as_select(), organizations::name))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.map(|(cluster, organization)| cluster.into_cluster(organization))
            .transpose()
    }

    /// Lists live clusters that have been synced at least once, ordered by id,
    /// starting after `after`.
    pub async fn list_active(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let rows: Vec<(PgCluster, String)> = conn
            .interact(move |conn| {
                let mut query = clusters::table
                    .inner_join(organizations::table)
                    .select((PgCluster::as_select(), organizations::name))
                    .filter(clusters::deleted_at.is_null())
                    .filter(clusters::synced_at.is_not_null())
                    .into_boxed();
                if let Some(after) = after {
                    query = query.filter(clusters::id.gt(after));
                }
                query.order(clusters::id.asc()).limit(limit).load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter()
            .map(|(cluster, organization)| cluster.into_cluster(organization))
            .collect()
    }

    /// Lists soft-deleted clusters whose external deletion is not yet
    /// confirmed, ordered by id, starting after `after`.
    pub async fn list_deleting(
        &self,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Cluster>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let rows: Vec<(PgCluster, String)> = conn
            .interact(move |conn| {
                let mut query = clusters::table
                    .inner_join(organizations::table)
                    .select((PgCluster::as_select(), organizations::name))
                    .filter(clusters::deleted_at.is_not_null())
                    .filter(clusters::shoot_status.ne(ShootStatus::Deleted.as_str()))
                    .into_boxed();
                if let Some(after) = after {
                    query = query.filter(clusters::id.gt(after));
                }
                query.order(clusters::id.asc()).limit(limit).load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter()
            .map(|(cluster, organization)| cluster.into_cluster(organization))
            .collect()
    }

    /// Every cluster id in the store, including soft-deleted and
    /// deletion-confirmed rows.
    pub async fn list_ids(&self) -> Result<HashSet<Uuid>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let ids: Vec<Uuid> = conn
            .interact(|conn| clusters::table.select(clusters::id).load(conn))
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(ids.into_iter().collect())
    }

    /// Records a successful sync attempt.
    pub async fn record_sync_success(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let now = Utc::now();

        conn.interact(move |conn| {
            diesel::update(clusters::table.find(id))
                .set((
                    clusters::synced_at.eq(Some(now)),
                    clusters::sync_error.eq(None::<String>),
                    clusters::sync_attempts.eq(0),
                    clusters::last_sync_attempt_at.eq(Some(now)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Records a failed sync attempt and its error text.
    pub async fn record_sync_failure(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let now = Utc::now();
        let error = error.to_string();

        conn.interact(move |conn| {
            diesel::update(clusters::table.find(id))
                .set((
                    clusters::sync_error.eq(Some(error)),
                    clusters::sync_attempts.eq(clusters::sync_attempts + 1),
                    clusters::last_sync_attempt_at.eq(Some(now)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Stores an observed status and, when given, the lifecycle event it
    /// produced. Both writes commit together or not at all.
    pub async fn record_shoot_status(
        &self,
        id: Uuid,
        status: ShootStatus,
        message: Option<String>,
        event: Option<ClusterEventType>,
    ) -> Result<(), StoreError> {
        let conn = self.dal.database.get_connection().await?;
        let now = Utc::now();

        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::update(clusters::table.find(id))
                    .set((
                        clusters::shoot_status.eq(status.as_str()),
                        clusters::shoot_status_message.eq(message.clone()),
                        clusters::shoot_status_updated_at.eq(Some(now)),
                    ))
                    .execute(conn)?;

                if let Some(event_type) = event {
                    diesel::insert_into(cluster_events::table)
                        .values(&NewPgClusterEvent {
                            cluster_id: id,
                            event_type: event_type.as_str().to_string(),
                            message,
                        })
                        .execute(conn)?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(())
    }
}
