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

//! Handler registry.
//!
//! Built once at startup with [`HandlerRegistryBuilder`] and shared by both
//! workers behind an `Arc`. There is no way to mutate a built registry, so
//! lookups need no locking.
//!
//! ```rust,ignore
//! let cluster = Arc::new(ClusterHandler::new(store, client, &config));
//! let registry = HandlerRegistry::builder()
//!     .register_sync(EntityType::Cluster, cluster.clone())
//!     .register_status(cluster.clone())
//!     .register_reconcile(cluster)
//!     .build();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::handlers::{ReconcileHandler, StatusHandler, SyncHandler};
use crate::models::outbox::EntityType;

pub struct HandlerRegistry {
    sync: HashMap<EntityType, Arc<dyn SyncHandler>>,
    status: Vec<Arc<dyn StatusHandler>>,
    reconcile: Vec<Arc<dyn ReconcileHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// The sync handler for `entity_type`.
    pub fn sync_handler_for(
        &self,
        entity_type: EntityType,
    ) -> Result<Arc<dyn SyncHandler>, RegistryError> {
        self.sync
            .get(&entity_type)
            .cloned()
            .ok_or(RegistryError::NoHandler(entity_type))
    }

    pub fn status_handlers(&self) -> &[Arc<dyn StatusHandler>] {
        &self.status
    }

    pub fn reconcile_handlers(&self) -> &[Arc<dyn ReconcileHandler>] {
        &self.reconcile
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sync: Vec<&str> = self.sync.keys().map(|t| t.as_str()).collect();
        sync.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("sync", &sync)
            .field(
                "status",
                &self.status.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field(
                "reconcile",
                &self.reconcile.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Default)]
pub struct HandlerRegistryBuilder {
    sync: HashMap<EntityType, Arc<dyn SyncHandler>>,
    status: Vec<Arc<dyn StatusHandler>>,
    reconcile: Vec<Arc<dyn ReconcileHandler>>,
}

impl HandlerRegistryBuilder {
    /// Registers the sync handler for `entity_type`.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for `entity_type`. Two
    /// handlers for one type is a wiring bug, not a runtime condition.
    pub fn register_sync(mut self, entity_type: EntityType, handler: Arc<dyn SyncHandler>) -> Self {
        if self.sync.insert(entity_type, handler).is_some() {
            panic!("sync handler for entity type '{}' registered twice", entity_type);
        }
        self
    }

    pub fn register_status(mut self, handler: Arc<dyn StatusHandler>) -> Self {
        self.status.push(handler);
        self
    }

    pub fn register_reconcile(mut self, handler: Arc<dyn ReconcileHandler>) -> Self {
        self.reconcile.push(handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            sync: self.sync,
            status: self.status,
            reconcile: self.reconcile,
        }
    }
}
