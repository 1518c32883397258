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

//! Shared wiring for integration tests: an in-memory store, outbox and
//! provisioner behind the real handler, registry and workers.

use std::sync::Arc;
use std::time::Duration;

use kubeplane::models::cluster::Cluster;
use kubeplane::models::outbox::{EntityRef, EntityType, OutboxEvent};
use kubeplane::provisioning::fake::FakeProvisioner;
use kubeplane::testing::{MemoryClusterStore, MemoryOutbox};
use kubeplane::{ClusterHandler, HandlerRegistry, OutboxWorker, StatusWorker, WorkerConfig};

pub struct Harness {
    pub store: MemoryClusterStore,
    pub client: Arc<FakeProvisioner>,
    pub outbox: MemoryOutbox,
    pub handler: Arc<ClusterHandler>,
    pub outbox_worker: OutboxWorker,
    pub status_worker: StatusWorker,
}

/// Fast timings with zero backoff, so retried rows are due again at once.
pub fn test_config() -> WorkerConfig {
    test_config_builder().build().expect("valid test config")
}

pub fn test_config_builder() -> kubeplane::WorkerConfigBuilder {
    WorkerConfig::builder()
        .base_backoff(Duration::ZERO)
        .max_backoff(Duration::ZERO)
        .notify_wait_timeout(Duration::from_millis(20))
        .outbox_poll_interval(Duration::from_millis(50))
        .status_poll_interval(Duration::from_millis(20))
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: WorkerConfig) -> Self {
        let store = MemoryClusterStore::new();
        let client = Arc::new(FakeProvisioner::new());
        let outbox = MemoryOutbox::new();
        let handler = Arc::new(ClusterHandler::new(
            Arc::new(store.clone()),
            client.clone(),
            &config,
        ));
        let registry = Arc::new(
            HandlerRegistry::builder()
                .register_sync(EntityType::Cluster, handler.clone())
                .register_status(handler.clone())
                .register_reconcile(handler.clone())
                .build(),
        );
        let outbox_worker =
            OutboxWorker::new(Arc::new(outbox.clone()), registry.clone(), config.clone());
        let status_worker = StatusWorker::new(registry, config);

        Self {
            store,
            client,
            outbox,
            handler,
            outbox_worker,
            status_worker,
        }
    }

    /// Stores a new cluster and enqueues its `created` row.
    pub fn create_cluster(&self, organization: &str, name: &str) -> (Cluster, i64) {
        let cluster = self.store.create_cluster(organization, name);
        let row = self.enqueue(cluster.id, OutboxEvent::Created);
        (cluster, row)
    }

    pub fn enqueue(&self, cluster_id: uuid::Uuid, event: OutboxEvent) -> i64 {
        self.outbox.enqueue(
            EntityRef {
                entity_type: EntityType::Cluster,
                id: cluster_id,
            },
            event,
        )
    }

    /// Drains every due row on a fresh session.
    pub async fn drain(&self) -> usize {
        let mut session = self.outbox.session();
        self.outbox_worker
            .drain(&mut session)
            .await
            .expect("drain outbox")
    }
}
