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

//! Orphan reconciliation against the fake orchestrator.

use kubeplane::provisioning::fake::FakeOperation;
use kubeplane::ReconcileHandler;
use uuid::Uuid;

use crate::fixtures::Harness;

#[tokio::test]
async fn test_orphans_deleted_known_owners_kept() {
    let harness = Harness::new();
    let (live, _) = harness.create_cluster("Acme Corp", "live");
    let (doomed, _) = harness.create_cluster("Acme Corp", "doomed");
    harness.drain().await;
    harness.store.soft_delete(doomed.id);

    let orphan = Uuid::new_v4();
    harness
        .client
        .insert_shoot(orphan, "acmestray1", "garden-acmecorp");

    let report = harness.handler.reconcile_orphans().await.unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.deleted, 1);
    assert!(harness.client.shoot(orphan).is_none());
    assert!(harness.client.shoot(live.id).is_some());
    // soft-deleted clusters are cleaned up through the outbox, not here
    assert!(harness.client.shoot(doomed.id).is_some());
}

#[tokio::test]
async fn test_unlabeled_resources_are_skipped() {
    let harness = Harness::new();
    harness
        .client
        .insert_unlabeled("manual", "garden-acmecorp", None);
    harness
        .client
        .insert_unlabeled("typo", "garden-acmecorp", Some("not-a-uuid"));

    let report = harness.handler.reconcile_orphans().await.unwrap();

    assert_eq!(report.unlabeled, 2);
    assert_eq!(report.deleted, 0);
    assert_eq!(harness.client.calls(FakeOperation::DeleteShoot), 0);
}

#[tokio::test]
async fn test_orphan_delete_failure_is_counted() {
    let harness = Harness::new();
    harness
        .client
        .insert_shoot(Uuid::new_v4(), "acmestray1", "garden-acmecorp");
    harness.client.fail_next(FakeOperation::DeleteShoot, 1);

    let report = harness.handler.reconcile_orphans().await.unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(harness.client.shoot_count(), 1);

    let report = harness.handler.reconcile_orphans().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(harness.client.shoot_count(), 0);
}

#[tokio::test]
async fn test_listing_failure_is_an_error() {
    let harness = Harness::new();
    harness.client.fail_next(FakeOperation::ListShoots, 1);

    let err = harness.handler.reconcile_orphans().await.unwrap_err();
    assert!(err.to_string().starts_with("list shoots:"), "{err}");
}

#[tokio::test]
async fn test_worker_reconciles_every_handler() {
    let harness = Harness::new();
    let orphan = Uuid::new_v4();
    harness
        .client
        .insert_shoot(orphan, "acmestray1", "garden-acmecorp");

    harness.outbox_worker.reconcile_all().await;

    assert!(harness.client.shoot(orphan).is_none());
    assert_eq!(harness.client.calls(FakeOperation::ListShoots), 1);
}
