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

//! Cluster Event Data Access Layer
//!
//! Events are normally written by [`super::ClusterDAL::record_shoot_status`]
//! together with the status change. This accessor reads them back and can
//! append standalone events.

use diesel::prelude::*;
use uuid::Uuid;

use super::models::{NewPgClusterEvent, PgClusterEvent};
use super::DAL;
use crate::database::schema::cluster_events;
use crate::error::StoreError;
use crate::models::cluster_event::{ClusterEvent, ClusterEventType};

pub struct ClusterEventDAL<'a> {
    pub dal: &'a DAL,
}

impl<'a> ClusterEventDAL<'a> {
    /// Appends an event.
    pub async fn create(
        &self,
        cluster_id: Uuid,
        event_type: ClusterEventType,
        message: Option<String>,
    ) -> Result<ClusterEvent, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let new_event = NewPgClusterEvent {
            cluster_id,
            event_type: event_type.as_str().to_string(),
            message,
        };

        let row: PgClusterEvent = conn
            .interact(move |conn| {
                diesel::insert_into(cluster_events::table)
                    .values(&new_event)
                    .returning(PgClusterEvent::as_returning())
                    .get_result(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    /// Events for one cluster, oldest first.
    pub async fn list_by_cluster(&self, cluster_id: Uuid) -> Result<Vec<ClusterEvent>, StoreError> {
        let conn = self.dal.database.get_connection().await?;

        let rows: Vec<PgClusterEvent> = conn
            .interact(move |conn| {
                cluster_events::table
                    .filter(cluster_events::cluster_id.eq(cluster_id))
                    .order(cluster_events::created_at.asc())
                    .select(PgClusterEvent::as_select())
                    .load(conn)
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
