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

// The outbox table is not declared here: it is only read and written through
// the dedicated tokio-postgres connection in `crate::outbox::postgres`.

diesel::table! {
    organizations (id) {
        id -> Uuid,
        name -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    clusters (id) {
        id -> Uuid,
        organization_id -> Uuid,
        name -> Text,
        shoot_name -> Text,
        region -> Text,
        kubernetes_version -> Text,
        node_pools -> Jsonb,
        deleted_at -> Nullable<Timestamptz>,
        synced_at -> Nullable<Timestamptz>,
        sync_error -> Nullable<Text>,
        sync_attempts -> Int4,
        last_sync_attempt_at -> Nullable<Timestamptz>,
        shoot_status -> Text,
        shoot_status_message -> Nullable<Text>,
        shoot_status_updated_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    cluster_events (id) {
        id -> Uuid,
        cluster_id -> Uuid,
        event_type -> Text,
        message -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(clusters -> organizations (organization_id));
diesel::joinable!(cluster_events -> clusters (cluster_id));

diesel::allow_tables_to_appear_in_same_query!(organizations, clusters, cluster_events);
