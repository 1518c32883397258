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

//! Operator-facing lifecycle signals.
//!
//! Every event here needs a human eventually: a cluster the orchestrator
//! reports as broken, an outbox row that will never be retried, a resource
//! the engine deleted on its own. Each function logs one structured event
//! tagged with an `event_type` from [`events`], so alerting rules can match
//! on the tag instead of the message text.

use uuid::Uuid;

use crate::models::outbox::EntityType;

/// Event types for reconciliation signals.
pub mod events {
    /// Observed shoot status is `error`.
    pub const CLUSTER_STATUS_ERROR: &str = "cluster.status.error";
    /// Cluster deletion confirmed by the orchestrator.
    pub const CLUSTER_DELETION_CONFIRMED: &str = "cluster.deletion.confirmed";

    /// Outbox row marked failed after exhausting retries.
    pub const OUTBOX_RETRIES_EXHAUSTED: &str = "outbox.retries_exhausted";
    /// Outbox row for an entity type with no sync handler.
    pub const OUTBOX_NO_HANDLER: &str = "outbox.no_handler";
    /// Outbox row referencing zero or several entities.
    pub const OUTBOX_MALFORMED: &str = "outbox.malformed";

    /// External resource with no backing cluster row was deleted.
    pub const ORPHAN_DELETED: &str = "reconcile.orphan.deleted";
    /// Deleting an orphaned resource failed.
    pub const ORPHAN_DELETE_FAILED: &str = "reconcile.orphan.delete_failed";
    /// External resource without a usable owner label seen repeatedly.
    pub const UNLABELED_RESOURCE: &str = "reconcile.unlabeled_resource";
}

/// Log an observed `error` status.
pub fn log_cluster_status_error(cluster_id: Uuid, shoot_name: &str, message: Option<&str>) {
    tracing::error!(
        event_type = events::CLUSTER_STATUS_ERROR,
        cluster_id = %cluster_id,
        shoot = %shoot_name,
        message = message.unwrap_or("<none>"),
        "Cluster reported error status"
    );
}

/// Log a confirmed deletion.
pub fn log_cluster_deletion_confirmed(cluster_id: Uuid, shoot_name: &str) {
    tracing::info!(
        event_type = events::CLUSTER_DELETION_CONFIRMED,
        cluster_id = %cluster_id,
        shoot = %shoot_name,
        "Cluster deletion confirmed"
    );
}

/// Log an outbox row that ran out of retries.
pub fn log_retries_exhausted(
    outbox_id: i64,
    entity_type: EntityType,
    entity_id: Uuid,
    retries: i32,
    error: &str,
) {
    tracing::error!(
        event_type = events::OUTBOX_RETRIES_EXHAUSTED,
        outbox_id,
        entity_type = %entity_type,
        entity_id = %entity_id,
        retries,
        error = %error,
        "Outbox row failed permanently"
    );
}

/// Log an outbox row whose entity type has no handler.
pub fn log_no_handler(outbox_id: i64, entity_type: EntityType, entity_id: Uuid) {
    tracing::error!(
        event_type = events::OUTBOX_NO_HANDLER,
        outbox_id,
        entity_type = %entity_type,
        entity_id = %entity_id,
        "No sync handler for outbox row"
    );
}

/// Log a malformed outbox row.
pub fn log_malformed_row(outbox_id: i64, error: &str) {
    tracing::error!(
        event_type = events::OUTBOX_MALFORMED,
        outbox_id,
        error = %error,
        "Malformed outbox row"
    );
}

/// Log the deletion of an orphaned resource.
pub fn log_orphan_deleted(owner_id: Uuid, name: &str, namespace: &str) {
    tracing::warn!(
        event_type = events::ORPHAN_DELETED,
        owner_id = %owner_id,
        name = %name,
        namespace = %namespace,
        "Deleted orphaned external resource"
    );
}

/// Log a failed orphan deletion.
pub fn log_orphan_delete_failed(owner_id: Uuid, name: &str, error: &str) {
    tracing::error!(
        event_type = events::ORPHAN_DELETE_FAILED,
        owner_id = %owner_id,
        name = %name,
        error = %error,
        "Failed to delete orphaned external resource"
    );
}

/// Log an unlabeled resource that has persisted across `passes` reconcile passes.
pub fn log_unlabeled_resource(name: &str, namespace: &str, label: Option<&str>, passes: u32) {
    tracing::error!(
        event_type = events::UNLABELED_RESOURCE,
        name = %name,
        namespace = %namespace,
        label = label.unwrap_or("<missing>"),
        passes,
        "External resource has no usable owner label"
    );
}
