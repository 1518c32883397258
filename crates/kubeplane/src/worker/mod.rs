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

//! Background workers.
//!
//! Two independent loops share one [`crate::registry::HandlerRegistry`]:
//!
//! - [`OutboxWorker`] drains the outbox and runs orphan reconciliation
//! - [`StatusWorker`] polls observed status
//!
//! Both stop when their `watch` shutdown channel flips to `true`.

pub mod backoff;
pub mod outbox;
pub mod readiness;
pub mod status;

pub use backoff::RetryDecision;
pub use outbox::{OutboxWorker, Outcome};
pub use readiness::Readiness;
pub use status::StatusWorker;
