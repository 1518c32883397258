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

//! Outbox store abstraction.
//!
//! The outbox worker talks to the store through three layers:
//!
//! - [`OutboxConnector`] opens a session; it is called again after a
//!   connection is lost.
//! - [`OutboxSession`] is one live connection. It is subscribed to outbox
//!   notifications for its whole lifetime and claims rows one at a time.
//! - [`ClaimedRow`] is one locked row inside an open transaction. Exactly one
//!   of the `mark_*` methods commits the outcome; dropping the row without
//!   marking it rolls the transaction back and releases the lock, leaving the
//!   row pending for the next claim.
//!
//! A claimed row borrows its session mutably, so a session never holds more
//! than one row lock at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut session = connector.connect().await?;
//! while let Some(claimed) = session.claim_next().await? {
//!     let entity = claimed.row().entity()?;
//!     // ... dispatch ...
//!     claimed.mark_processed().await?;
//! }
//! session.wait_for_notification(Duration::from_secs(5)).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::outbox::OutboxRow;

pub mod postgres;

pub use postgres::PgOutboxConnector;

/// Notification channel the store signals on after every outbox insert.
pub const OUTBOX_CHANNEL: &str = "outbox_events";

/// Opens outbox sessions.
#[async_trait]
pub trait OutboxConnector: Send + Sync {
    /// Opens a connection and subscribes it to outbox notifications.
    async fn connect(&self) -> Result<Box<dyn OutboxSession>, StoreError>;
}

/// A live, subscribed connection to the outbox.
#[async_trait]
pub trait OutboxSession: Send {
    /// Begins a transaction and locks the oldest due pending row, skipping
    /// rows locked by other sessions. `None` means there is nothing to do.
    async fn claim_next<'a>(&'a mut self)
        -> Result<Option<Box<dyn ClaimedRow + 'a>>, StoreError>;

    /// Waits up to `timeout` for an outbox notification.
    ///
    /// Returns `Ok(true)` when notified and `Ok(false)` on timeout. Any
    /// notifications already queued are consumed by the same call. Returns
    /// [`StoreError::ConnectionLost`] once the underlying connection is gone.
    async fn wait_for_notification(&mut self, timeout: Duration) -> Result<bool, StoreError>;
}

/// A locked outbox row inside an open transaction.
#[async_trait]
pub trait ClaimedRow: Send {
    fn row(&self) -> &OutboxRow;

    /// Marks the row processed and commits.
    async fn mark_processed(self: Box<Self>) -> Result<(), StoreError>;

    /// Stores the new retry count and error text, defers the row by
    /// `backoff`, and commits. The row stays pending.
    async fn mark_retry(
        self: Box<Self>,
        retries: i32,
        backoff: Duration,
        status_info: &str,
    ) -> Result<(), StoreError>;

    /// Marks the row permanently failed and commits.
    async fn mark_failed(self: Box<Self>, retries: i32, status_info: &str)
        -> Result<(), StoreError>;
}
