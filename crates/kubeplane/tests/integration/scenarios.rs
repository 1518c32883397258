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

//! End-to-end flows with both workers running.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kubeplane::models::cluster::ShootStatus;
use kubeplane::models::outbox::{OutboxEvent, OutboxStatus};
use kubeplane::provisioning::fake::FakeOperation;
use kubeplane::SyncHandler;
use tokio::sync::watch;

use crate::fixtures::{test_config_builder, Harness};

async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

#[tokio::test]
async fn test_create_then_delete_skips_project_on_delete() {
    let harness = Harness::new();
    let cluster = harness.store.create_cluster("Acme Corp", "prod");

    harness.handler.sync(cluster.id).await.unwrap();
    assert!(harness.client.shoot(cluster.id).is_some());
    assert_eq!(harness.client.calls(FakeOperation::EnsureProject), 1);

    harness.store.soft_delete(cluster.id);
    harness.handler.sync(cluster.id).await.unwrap();

    assert!(harness.client.shoot(cluster.id).is_none());
    assert_eq!(harness.client.calls(FakeOperation::EnsureProject), 1);
    assert_eq!(harness.client.calls(FakeOperation::DeleteShoot), 1);
}

#[tokio::test]
async fn test_second_sync_changes_nothing() {
    let harness = Harness::new();
    let cluster = harness.store.create_cluster("Acme Corp", "prod");

    harness.handler.sync(cluster.id).await.unwrap();
    let mutations = harness.client.mutations();
    harness.handler.sync(cluster.id).await.unwrap();

    assert_eq!(harness.client.mutations(), mutations);
    assert_eq!(harness.client.shoot_count(), 1);
}

#[tokio::test]
async fn test_cluster_lifecycle_with_running_workers() {
    let harness = Arc::new(Harness::new());
    let readiness = harness.outbox_worker.readiness();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let outbox_task = tokio::spawn({
        let harness = harness.clone();
        let shutdown = shutdown_rx.clone();
        async move { harness.outbox_worker.run(shutdown).await }
    });
    let status_task = tokio::spawn({
        let harness = harness.clone();
        async move { harness.status_worker.run(shutdown_rx).await }
    });

    eventually(|| {
        let ready = readiness.is_ready();
        async move { ready }
    })
    .await;

    let (cluster, created) = harness.create_cluster("Acme Corp", "prod");
    eventually(|| {
        let done = harness.outbox.record(created).unwrap().status == OutboxStatus::Processed;
        async move { done }
    })
    .await;

    harness.client.set_status(cluster.id, ShootStatus::Ready, None);
    eventually(|| {
        let ready = harness.store.cluster(cluster.id).unwrap().shoot_status == ShootStatus::Ready;
        async move { ready }
    })
    .await;

    harness.store.soft_delete(cluster.id);
    let deleted = harness.enqueue(cluster.id, OutboxEvent::Deleted);
    eventually(|| {
        let gone = harness.store.cluster(cluster.id).unwrap().shoot_status == ShootStatus::Deleted;
        async move { gone }
    })
    .await;

    assert_eq!(
        harness.outbox.record(deleted).unwrap().status,
        OutboxStatus::Processed
    );
    assert!(harness.client.shoot(cluster.id).is_none());
    assert_eq!(harness.client.calls(FakeOperation::EnsureProject), 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        outbox_task.await.unwrap();
        status_task.await.unwrap();
    })
    .await
    .expect("workers stop on shutdown");
    assert!(!readiness.is_ready());
}

#[tokio::test]
async fn test_rows_written_while_disconnected_are_drained_after_reconnect() {
    let harness = Arc::new(Harness::new());
    let readiness = harness.outbox_worker.readiness();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn({
        let harness = harness.clone();
        async move { harness.outbox_worker.run(shutdown_rx).await }
    });

    eventually(|| {
        let ready = readiness.is_ready();
        async move { ready }
    })
    .await;

    harness.outbox.refuse_connections(true);
    harness.outbox.drop_connections();
    eventually(|| {
        let down = !readiness.is_ready();
        async move { down }
    })
    .await;

    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");
    harness.outbox.refuse_connections(false);

    eventually(|| {
        let done = harness.outbox.record(row).unwrap().status == OutboxStatus::Processed;
        async move { done }
    })
    .await;
    assert!(readiness.is_ready());
    assert!(harness.client.shoot(cluster.id).is_some());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("worker stops on shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_store_outage_reconnects_instead_of_failing_rows() {
    let harness = Arc::new(Harness::with_config(
        test_config_builder().max_retries(3).build().unwrap(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    harness.store.set_unavailable(true);
    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");

    let task = tokio::spawn({
        let harness = harness.clone();
        async move { harness.outbox_worker.run(shutdown_rx).await }
    });

    // More sessions than the retry ceiling allows attempts.
    eventually(|| {
        let reconnected = harness.outbox.connect_count() > 3;
        async move { reconnected }
    })
    .await;
    let record = harness.outbox.record(row).unwrap();
    assert_eq!(record.status, OutboxStatus::Pending);
    assert_eq!(record.row.retries, 0);

    harness.store.set_unavailable(false);
    eventually(|| {
        let done = harness.outbox.record(row).unwrap().status == OutboxStatus::Processed;
        async move { done }
    })
    .await;
    assert_eq!(harness.outbox.record(row).unwrap().row.retries, 0);
    assert!(harness.client.shoot(cluster.id).is_some());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("worker stops on shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_backed_off_row_is_picked_up_without_notification() {
    let config = test_config_builder()
        .base_backoff(Duration::from_millis(50))
        .max_backoff(Duration::from_millis(50))
        .outbox_poll_interval(Duration::from_secs(10))
        .build()
        .unwrap();
    let harness = Arc::new(Harness::with_config(config));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    harness.client.fail_next(FakeOperation::ApplyShoot, 1);

    let task = tokio::spawn({
        let harness = harness.clone();
        async move { harness.outbox_worker.run(shutdown_rx).await }
    });

    let (cluster, row) = harness.create_cluster("Acme Corp", "prod");
    tokio::time::timeout(Duration::from_secs(1), async {
        while harness.outbox.record(row).unwrap().status != OutboxStatus::Processed {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("retried row drained well before the poll interval");
    assert_eq!(harness.outbox.record(row).unwrap().row.retries, 1);
    assert!(harness.client.shoot(cluster.id).is_some());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("worker stops on shutdown")
        .unwrap();
}
