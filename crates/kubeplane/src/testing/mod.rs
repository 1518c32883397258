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

//! In-memory stores for tests and local runs.
//!
//! Paired with [`crate::provisioning::fake::FakeProvisioner`], these let the
//! full engine run without Postgres or an orchestrator.

pub mod memory_outbox;
pub mod memory_store;

pub use memory_outbox::{MemoryOutbox, MemoryOutboxSession, OutboxRecord};
pub use memory_store::{new_cluster, MemoryClusterStore};
