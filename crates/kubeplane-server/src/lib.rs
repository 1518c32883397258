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

//! Kubeplane worker process.
//!
//! Wires the reconciliation engine to Postgres and a provisioning backend,
//! runs the outbox and status workers, and serves health and metrics.

pub mod config;
pub mod health;
pub mod telemetry;

pub use config::{LogFormat, Provisioner, ServerConfig};
