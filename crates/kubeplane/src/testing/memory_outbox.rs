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

//! In-memory outbox with the claim, lock and notification behaviour of the
//! Postgres store.
//!
//! - claims skip rows locked by another session and rows not yet due
//! - dropping a claimed row without marking it releases the lock unchanged
//! - sessions only see notifications raised after they connected
//! - [`MemoryOutbox::drop_connections`] invalidates every open session, which
//!   then reports [`StoreError::ConnectionLost`]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::models::outbox::{EntityRef, OutboxEvent, OutboxRow, OutboxStatus};
use crate::outbox::{ClaimedRow, OutboxConnector, OutboxSession};

/// Snapshot of a stored outbox row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    pub row: OutboxRow,
    pub status: OutboxStatus,
    pub next_attempt_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct OutboxState {
    rows: BTreeMap<i64, OutboxRecord>,
    locked: HashSet<i64>,
    next_id: i64,
}

struct Inner {
    state: Mutex<OutboxState>,
    signal: watch::Sender<u64>,
    generation: AtomicU64,
    refuse_connections: AtomicBool,
    connects: AtomicUsize,
}

/// Shared in-memory outbox. Clones refer to the same rows.
#[derive(Clone)]
pub struct MemoryOutbox {
    inner: Arc<Inner>,
}

impl Default for MemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOutbox {
    pub fn new() -> Self {
        let (signal, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(OutboxState::default()),
                signal,
                generation: AtomicU64::new(0),
                refuse_connections: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
            }),
        }
    }

    /// Inserts a pending row for `entity` and notifies subscribers.
    pub fn enqueue(&self, entity: EntityRef, event: OutboxEvent) -> i64 {
        self.enqueue_row(OutboxRow::for_entity(0, entity, event))
    }

    /// Inserts `row` as pending, assigning it a fresh id, and notifies
    /// subscribers. The row is stored as given, malformed or not.
    pub fn enqueue_row(&self, mut row: OutboxRow) -> i64 {
        let id = {
            let mut state = self.inner.state.lock();
            state.next_id += 1;
            row.id = state.next_id;
            state.rows.insert(
                row.id,
                OutboxRecord {
                    row,
                    status: OutboxStatus::Pending,
                    next_attempt_at: Utc::now(),
                    processed_at: None,
                },
            );
            state.next_id
        };
        self.inner.signal.send_modify(|seq| *seq += 1);
        id
    }

    /// Current state of row `id`.
    pub fn record(&self, id: i64) -> Option<OutboxRecord> {
        self.inner.state.lock().rows.get(&id).cloned()
    }

    /// Number of rows still pending, due or not.
    pub fn pending_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .rows
            .values()
            .filter(|r| r.status == OutboxStatus::Pending)
            .count()
    }

    /// Whether row `id` is currently locked by a claim.
    pub fn is_locked(&self, id: i64) -> bool {
        self.inner.state.lock().locked.contains(&id)
    }

    /// Makes every pending row due now, skipping remaining backoff.
    pub fn make_all_due(&self) {
        let now = Utc::now();
        for record in self.inner.state.lock().rows.values_mut() {
            if record.status == OutboxStatus::Pending {
                record.next_attempt_at = now;
            }
        }
    }

    /// Kills every open session. Subsequent calls on them fail with
    /// [`StoreError::ConnectionLost`]; sessions waiting for a notification
    /// wake up and fail.
    pub fn drop_connections(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.signal.send_modify(|seq| *seq += 1);
    }

    /// While set, [`OutboxConnector::connect`] fails.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Opens a session directly, bypassing the connector trait.
    pub fn session(&self) -> MemoryOutboxSession {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        MemoryOutboxSession {
            inner: self.inner.clone(),
            generation: self.inner.generation.load(Ordering::SeqCst),
            signal: self.inner.signal.subscribe(),
        }
    }
}

#[async_trait]
impl OutboxConnector for MemoryOutbox {
    async fn connect(&self) -> Result<Box<dyn OutboxSession>, StoreError> {
        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionLost);
        }
        Ok(Box::new(self.session()))
    }
}

/// One open session on a [`MemoryOutbox`].
pub struct MemoryOutboxSession {
    inner: Arc<Inner>,
    generation: u64,
    signal: watch::Receiver<u64>,
}

impl MemoryOutboxSession {
    fn check_alive(&self) -> Result<(), StoreError> {
        if self.inner.generation.load(Ordering::SeqCst) == self.generation {
            Ok(())
        } else {
            Err(StoreError::ConnectionLost)
        }
    }
}

#[async_trait]
impl OutboxSession for MemoryOutboxSession {
    async fn claim_next<'a>(
        &'a mut self,
    ) -> Result<Option<Box<dyn ClaimedRow + 'a>>, StoreError> {
        self.check_alive()?;

        let now = Utc::now();
        let mut state = self.inner.state.lock();
        let OutboxState { rows, locked, .. } = &mut *state;
        let next = rows
            .values()
            .find(|r| {
                r.status == OutboxStatus::Pending
                    && r.next_attempt_at <= now
                    && !locked.contains(&r.row.id)
            })
            .map(|r| r.row.clone());

        Ok(next.map(|row| {
            locked.insert(row.id);
            Box::new(MemoryClaimedRow {
                inner: self.inner.clone(),
                generation: self.generation,
                row,
            }) as Box<dyn ClaimedRow + 'a>
        }))
    }

    async fn wait_for_notification(&mut self, timeout: Duration) -> Result<bool, StoreError> {
        self.check_alive()?;

        let notified = match tokio::time::timeout(timeout, self.signal.changed()).await {
            Ok(Ok(())) => {
                self.signal.borrow_and_update();
                true
            }
            Ok(Err(_)) => return Err(StoreError::ConnectionLost),
            Err(_) => false,
        };

        self.check_alive()?;
        Ok(notified)
    }
}

struct MemoryClaimedRow {
    inner: Arc<Inner>,
    generation: u64,
    row: OutboxRow,
}

impl MemoryClaimedRow {
    /// Applies `update` to the stored row if the session is still alive.
    fn commit(&self, update: impl FnOnce(&mut OutboxRecord)) -> Result<(), StoreError> {
        if self.inner.generation.load(Ordering::SeqCst) != self.generation {
            return Err(StoreError::ConnectionLost);
        }
        let mut state = self.inner.state.lock();
        if let Some(record) = state.rows.get_mut(&self.row.id) {
            update(record);
        }
        Ok(())
    }
}

impl Drop for MemoryClaimedRow {
    fn drop(&mut self) {
        self.inner.state.lock().locked.remove(&self.row.id);
    }
}

#[async_trait]
impl ClaimedRow for MemoryClaimedRow {
    fn row(&self) -> &OutboxRow {
        &self.row
    }

    async fn mark_processed(self: Box<Self>) -> Result<(), StoreError> {
        self.commit(|record| {
            record.status = OutboxStatus::Processed;
            record.processed_at = Some(Utc::now());
        })
    }

    async fn mark_retry(
        self: Box<Self>,
        retries: i32,
        backoff: Duration,
        status_info: &str,
    ) -> Result<(), StoreError> {
        let backoff =
            chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::days(365));
        self.commit(|record| {
            record.row.retries = retries;
            record.row.status_info = Some(status_info.to_string());
            record.next_attempt_at = Utc::now() + backoff;
        })
    }

    async fn mark_failed(
        self: Box<Self>,
        retries: i32,
        status_info: &str,
    ) -> Result<(), StoreError> {
        self.commit(|record| {
            record.status = OutboxStatus::Failed;
            record.row.retries = retries;
            record.row.status_info = Some(status_info.to_string());
        })
    }
}
