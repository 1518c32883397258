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

//! Observed-status polling and lifecycle events.

use kubeplane::models::cluster::ShootStatus;
use kubeplane::models::cluster_event::ClusterEventType;
use kubeplane::models::outbox::OutboxEvent;
use kubeplane::provisioning::fake::FakeOperation;
use kubeplane::StatusHandler;

use crate::fixtures::Harness;

#[tokio::test]
async fn test_ready_error_ready_records_three_events() {
    let harness = Harness::new();
    let (cluster, _) = harness.create_cluster("Acme Corp", "prod");
    harness.drain().await;

    harness.client.set_status(cluster.id, ShootStatus::Ready, None);
    harness.status_worker.poll_once().await;
    harness.status_worker.poll_once().await;

    harness
        .client
        .set_status(cluster.id, ShootStatus::Error, Some("quota exceeded"));
    harness.status_worker.poll_once().await;
    harness.status_worker.poll_once().await;

    harness.client.set_status(cluster.id, ShootStatus::Ready, None);
    harness.status_worker.poll_once().await;
    harness.status_worker.poll_once().await;

    let events: Vec<_> = harness
        .store
        .events(cluster.id)
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        events,
        vec![
            ClusterEventType::StatusReady,
            ClusterEventType::StatusError,
            ClusterEventType::StatusReady,
        ]
    );
    assert_eq!(
        harness.store.events(cluster.id)[1].message.as_deref(),
        Some("quota exceeded")
    );
}

#[tokio::test]
async fn test_unsynced_cluster_is_not_polled() {
    let harness = Harness::new();
    harness.store.create_cluster("Acme Corp", "prod");

    harness.status_worker.poll_once().await;

    assert_eq!(harness.client.calls(FakeOperation::ShootStatus), 0);
}

#[tokio::test]
async fn test_deletion_confirmed_once_shoot_is_gone() {
    let harness = Harness::new();
    let (cluster, _) = harness.create_cluster("Acme Corp", "prod");
    harness.drain().await;
    harness.client.set_status(cluster.id, ShootStatus::Ready, None);
    harness.status_worker.poll_once().await;

    // deletion intent recorded but not yet dispatched
    harness.store.soft_delete(cluster.id);
    harness
        .client
        .set_status(cluster.id, ShootStatus::Deleting, Some("deleting workers"));
    harness.status_worker.poll_once().await;
    let stored = harness.store.cluster(cluster.id).unwrap();
    assert_eq!(stored.shoot_status, ShootStatus::Deleting);
    assert_eq!(stored.shoot_status_message.as_deref(), Some("deleting workers"));

    harness.enqueue(cluster.id, OutboxEvent::Deleted);
    harness.drain().await;
    harness.status_worker.poll_once().await;

    let stored = harness.store.cluster(cluster.id).unwrap();
    assert_eq!(stored.shoot_status, ShootStatus::Deleted);
    let events: Vec<_> = harness
        .store
        .events(cluster.id)
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        events,
        vec![ClusterEventType::StatusReady, ClusterEventType::StatusDeleted]
    );

    // confirmed clusters drop out of the deleting pass
    let calls = harness.client.calls(FakeOperation::ShootStatus);
    harness.status_worker.poll_once().await;
    assert_eq!(harness.client.calls(FakeOperation::ShootStatus), calls);
}

#[tokio::test]
async fn test_listing_failure_does_not_abort_deleting_pass() {
    let harness = Harness::new();
    let (cluster, _) = harness.create_cluster("Acme Corp", "prod");
    harness.drain().await;
    harness.store.soft_delete(cluster.id);
    harness.enqueue(cluster.id, OutboxEvent::Deleted);
    harness.drain().await;
    harness.store.fail_active_listing(true);

    let report = harness.handler.check_status().await.unwrap();

    assert_eq!(report.checked, 1);
    assert_eq!(
        harness.store.cluster(cluster.id).unwrap().shoot_status,
        ShootStatus::Deleted
    );
}

#[tokio::test]
async fn test_status_fetch_failure_leaves_stored_status() {
    let harness = Harness::new();
    let (cluster, _) = harness.create_cluster("Acme Corp", "prod");
    harness.drain().await;
    harness.client.fail_next(FakeOperation::ShootStatus, 1);

    let report = harness.handler.check_status().await.unwrap();

    assert_eq!(report.errors, 1);
    assert_eq!(
        harness.store.cluster(cluster.id).unwrap().shoot_status,
        ShootStatus::Pending
    );
    assert!(harness.store.events(cluster.id).is_empty());
}
