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

//! Outbox dispatch, retry and failure semantics through the real worker.

use kubeplane::models::outbox::{EntityRef, EntityType, OutboxEvent, OutboxRow, OutboxStatus};
use kubeplane::provisioning::fake::FakeOperation;
use kubeplane::worker::Outcome;
use uuid::Uuid;

use crate::fixtures::{test_config_builder, Harness};

#[tokio::test]
async fn test_apply_fails_twice_then_succeeds() {
    let harness = Harness::new();
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");
    harness.client.fail_next(FakeOperation::ApplyShoot, 2);

    assert_eq!(harness.drain().await, 3);

    let record = harness.outbox.record(row).unwrap();
    assert_eq!(record.status, OutboxStatus::Processed);
    assert_eq!(record.row.retries, 2);
    assert!(harness.client.shoot(cluster.id).is_some());

    let stored = harness.store.cluster(cluster.id).unwrap();
    assert!(stored.synced_at.is_some());
    assert_eq!(stored.sync_attempts, 0);
    assert!(stored.sync_error.is_none());
}

#[tokio::test]
async fn test_retry_ceiling_marks_failed() {
    let harness = Harness::with_config(test_config_builder().max_retries(3).build().unwrap());
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");
    harness.client.fail_next(FakeOperation::ApplyShoot, 100);

    assert_eq!(harness.drain().await, 3);

    let record = harness.outbox.record(row).unwrap();
    assert_eq!(record.status, OutboxStatus::Failed);
    assert_eq!(record.row.retries, 3);
    let info = record.row.status_info.unwrap();
    assert!(info.starts_with("apply shoot:"), "{info}");
    assert_eq!(harness.client.calls(FakeOperation::ApplyShoot), 3);

    let stored = harness.store.cluster(cluster.id).unwrap();
    assert_eq!(stored.sync_attempts, 3);
    assert!(stored.sync_error.is_some());
}

#[tokio::test]
async fn test_row_at_ceiling_fails_on_next_failure() {
    let harness = Harness::with_config(test_config_builder().max_retries(5).build().unwrap());
    let cluster = harness.store.create_cluster("Acme Corp", "prod");
    let mut row = OutboxRow::for_entity(
        0,
        EntityRef {
            entity_type: EntityType::Cluster,
            id: cluster.id,
        },
        OutboxEvent::Updated,
    );
    row.retries = 4;
    let id = harness.outbox.enqueue_row(row);
    harness.client.fail_next(FakeOperation::EnsureProject, 1);

    let mut session = harness.outbox.session();
    let outcome = harness
        .outbox_worker
        .process_next(&mut session)
        .await
        .unwrap();

    assert_eq!(outcome, Some(Outcome::Failed { retries: 5 }));
    assert_eq!(harness.outbox.record(id).unwrap().status, OutboxStatus::Failed);
}

#[tokio::test]
async fn test_unregistered_entity_type_fails_without_retry() {
    let harness = Harness::new();
    let mut row = OutboxRow::for_entity(
        0,
        EntityRef {
            entity_type: EntityType::Namespace,
            id: Uuid::new_v4(),
        },
        OutboxEvent::Created,
    );
    row.retries = 3;
    let id = harness.outbox.enqueue_row(row);

    assert_eq!(harness.drain().await, 1);

    let record = harness.outbox.record(id).unwrap();
    assert_eq!(record.status, OutboxStatus::Failed);
    assert_eq!(record.row.retries, 3);
    assert!(record
        .row
        .status_info
        .unwrap()
        .contains("no sync handler registered"));
}

#[tokio::test]
async fn test_permanent_failure_does_not_block_later_rows() {
    let harness = Harness::new();
    let mut empty = OutboxRow::for_entity(
        0,
        EntityRef {
            entity_type: EntityType::Cluster,
            id: Uuid::new_v4(),
        },
        OutboxEvent::Created,
    );
    empty.cluster_id = None;
    let malformed = harness.outbox.enqueue_row(empty);
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");

    assert_eq!(harness.drain().await, 2);

    assert_eq!(
        harness.outbox.record(malformed).unwrap().status,
        OutboxStatus::Failed
    );
    assert_eq!(harness.outbox.record(row).unwrap().status, OutboxStatus::Processed);
    assert!(harness.client.shoot(cluster.id).is_some());
}

#[tokio::test]
async fn test_duplicate_rows_apply_once() {
    let harness = Harness::new();
    let (cluster, _) = harness.create_cluster("Acme Corp", "prod");
    harness.enqueue(cluster.id, OutboxEvent::Updated);
    harness.enqueue(cluster.id, OutboxEvent::Updated);

    assert_eq!(harness.drain().await, 3);

    assert_eq!(harness.client.shoot_count(), 1);
    assert_eq!(harness.client.calls(FakeOperation::ApplyShoot), 3);
    // project creation plus one shoot creation
    assert_eq!(harness.client.mutations(), 2);
}

#[tokio::test]
async fn test_vanished_cluster_is_processed() {
    let harness = Harness::new();
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");
    harness.store.hard_delete(cluster.id);

    assert_eq!(harness.drain().await, 1);

    assert_eq!(harness.outbox.record(row).unwrap().status, OutboxStatus::Processed);
    assert_eq!(harness.client.mutations(), 0);
}

#[tokio::test]
async fn test_project_without_namespace_is_retried() {
    let harness = Harness::new();
    harness.client.defer_namespaces(true);
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");

    let mut session = harness.outbox.session();
    let outcome = harness
        .outbox_worker
        .process_next(&mut session)
        .await
        .unwrap();
    assert_eq!(outcome, Some(Outcome::RetryScheduled { retries: 1 }));
    assert!(harness.client.shoot(cluster.id).is_none());

    harness.client.assign_namespaces();
    let outcome = harness
        .outbox_worker
        .process_next(&mut session)
        .await
        .unwrap();
    assert_eq!(outcome, Some(Outcome::Processed));
    assert_eq!(harness.outbox.record(row).unwrap().row.retries, 1);
    assert_eq!(
        harness.client.shoot(cluster.id).unwrap().namespace,
        "garden-acmecorp"
    );
}

#[tokio::test]
async fn test_store_outage_releases_row_without_spending_retries() {
    let harness = Harness::with_config(test_config_builder().max_retries(3).build().unwrap());
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");
    harness.store.set_unavailable(true);

    let mut session = harness.outbox.session();
    let err = harness
        .outbox_worker
        .drain(&mut session)
        .await
        .expect_err("store outage surfaces to the worker");
    assert!(err.is_connectivity());

    let record = harness.outbox.record(row).unwrap();
    assert_eq!(record.status, OutboxStatus::Pending);
    assert_eq!(record.row.retries, 0);
    assert!(record.row.status_info.is_none());
    assert!(!harness.outbox.is_locked(row));
    assert_eq!(harness.client.calls(FakeOperation::EnsureProject), 0);

    harness.store.set_unavailable(false);
    assert_eq!(harness.drain().await, 1);

    let record = harness.outbox.record(row).unwrap();
    assert_eq!(record.status, OutboxStatus::Processed);
    assert_eq!(record.row.retries, 0);
    assert!(harness.client.shoot(cluster.id).is_some());
}
