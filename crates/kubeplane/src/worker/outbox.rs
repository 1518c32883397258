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

//! Outbox worker.
//!
//! Drains the outbox one row at a time. Each row is claimed, dispatched to
//! its sync handler and marked inside a single store transaction:
//!
//! ```text
//!   pending ──claim──▶ locked ──sync ok──────────────────▶ processed
//!                        │
//!                        ├──sync err, retries+1 < max────▶ pending (deferred by backoff)
//!                        ├──sync err, retries+1 >= max───▶ failed
//!                        └──malformed row / no handler───▶ failed (retries unchanged)
//! ```
//!
//! Between drains the worker waits for an outbox notification, bounded by
//! `notify_wait_timeout` (and never longer than `outbox_poll_interval`). It
//! drains again on every wake-up, notified or not, so missed notifications
//! and rows coming out of backoff are picked up within one wait.
//! Reconciliation runs at startup and then every `reconcile_interval`.
//!
//! A lost connection clears readiness and is retried with backoff until
//! shutdown. Shutdown is only observed between rows, never mid-sync.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::{self, RetryDecision};
use super::readiness::Readiness;
use crate::audit;
use crate::config::WorkerConfig;
use crate::error::{StoreError, SyncError};
use crate::outbox::{OutboxConnector, OutboxSession};
use crate::registry::HandlerRegistry;

/// Result of processing one outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    RetryScheduled { retries: i32 },
    Failed { retries: i32 },
}

pub struct OutboxWorker {
    connector: Arc<dyn OutboxConnector>,
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
    readiness: Readiness,
}

impl OutboxWorker {
    pub fn new(
        connector: Arc<dyn OutboxConnector>,
        registry: Arc<HandlerRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            connector,
            registry,
            config,
            readiness: Readiness::new(),
        }
    }

    /// Handle on the worker's readiness flag.
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Claims and processes the next due row. `None` when the outbox is idle.
    ///
    /// Store errors propagate, including a sync that failed because the
    /// entity store was unreachable. The claimed row's transaction is rolled
    /// back and the row stays pending with its retry count unchanged.
    pub async fn process_next(
        &self,
        session: &mut dyn OutboxSession,
    ) -> Result<Option<Outcome>, StoreError> {
        let Some(claimed) = session.claim_next().await? else {
            return Ok(None);
        };
        let row = claimed.row().clone();

        let entity = match row.entity() {
            Ok(entity) => entity,
            Err(e) => {
                let info = e.to_string();
                audit::log_malformed_row(row.id, &info);
                claimed.mark_failed(row.retries, &info).await?;
                counter!("kubeplane_outbox_failed_total", "entity_type" => "unknown").increment(1);
                return Ok(Some(Outcome::Failed {
                    retries: row.retries,
                }));
            }
        };
        let entity_type = entity.entity_type.as_str();

        let handler = match self.registry.sync_handler_for(entity.entity_type) {
            Ok(handler) => handler,
            Err(e) => {
                audit::log_no_handler(row.id, entity.entity_type, entity.id);
                claimed.mark_failed(row.retries, &e.to_string()).await?;
                counter!("kubeplane_outbox_failed_total", "entity_type" => entity_type)
                    .increment(1);
                return Ok(Some(Outcome::Failed {
                    retries: row.retries,
                }));
            }
        };

        match handler.sync(entity.id).await {
            Ok(()) => {
                claimed.mark_processed().await?;
                counter!("kubeplane_outbox_processed_total", "entity_type" => entity_type)
                    .increment(1);
                debug!(
                    outbox_id = row.id,
                    entity_type,
                    entity_id = %entity.id,
                    retries = row.retries,
                    "Outbox row processed"
                );
                Ok(Some(Outcome::Processed))
            }
            // Dropping the claim rolls it back; the row keeps its retry count.
            Err(SyncError::Store(e)) if e.is_connectivity() => {
                warn!(
                    outbox_id = row.id,
                    entity_type,
                    entity_id = %entity.id,
                    error = %e,
                    "Store unreachable during sync, releasing row"
                );
                Err(e)
            }
            Err(e) => {
                let info = e.to_string();
                match backoff::decide(row.retries, &self.config) {
                    RetryDecision::Fail { retries } => {
                        claimed.mark_failed(retries, &info).await?;
                        counter!("kubeplane_outbox_failed_total", "entity_type" => entity_type)
                            .increment(1);
                        audit::log_retries_exhausted(
                            row.id,
                            entity.entity_type,
                            entity.id,
                            retries,
                            &info,
                        );
                        Ok(Some(Outcome::Failed { retries }))
                    }
                    RetryDecision::Retry { retries, backoff } => {
                        claimed.mark_retry(retries, backoff, &info).await?;
                        counter!("kubeplane_outbox_retried_total", "entity_type" => entity_type)
                            .increment(1);
                        warn!(
                            outbox_id = row.id,
                            entity_type,
                            entity_id = %entity.id,
                            retries,
                            backoff_secs = backoff.as_secs_f64(),
                            error = %info,
                            "Outbox row failed, retry scheduled"
                        );
                        Ok(Some(Outcome::RetryScheduled { retries }))
                    }
                }
            }
        }
    }

    /// Processes rows until none is due. Returns the number handled.
    pub async fn drain(&self, session: &mut dyn OutboxSession) -> Result<usize, StoreError> {
        let mut handled = 0;
        while self.process_next(session).await?.is_some() {
            handled += 1;
        }
        Ok(handled)
    }

    /// Runs every registered reconcile handler once. Failures are logged.
    pub async fn reconcile_all(&self) {
        for handler in self.registry.reconcile_handlers() {
            match handler.reconcile_orphans().await {
                Ok(report) => info!(
                    handler = handler.name(),
                    scanned = report.scanned,
                    deleted = report.deleted,
                    unlabeled = report.unlabeled,
                    errors = report.errors,
                    "Reconciliation pass complete"
                ),
                Err(e) => error!(
                    handler = handler.name(),
                    error = %e,
                    "Reconciliation pass failed"
                ),
            }
        }
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Outbox worker started");
        let mut next_reconcile = Instant::now();
        let mut attempt = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.connector.connect().await {
                Ok(mut session) => {
                    self.readiness.set_ready(true);
                    info!("Outbox worker connected and listening");

                    let result = self
                        .serve(
                            session.as_mut(),
                            &mut shutdown,
                            &mut next_reconcile,
                            &mut attempt,
                        )
                        .await;
                    self.readiness.set_ready(false);

                    match result {
                        Ok(()) => break,
                        Err(e) => {
                            counter!("kubeplane_outbox_reconnects_total").increment(1);
                            warn!(error = %e, attempt, "Outbox connection lost, reconnecting");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Failed to open outbox connection");
                }
            }

            attempt += 1;
            let delay = backoff::reconnect_delay(&self.config, attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.readiness.set_ready(false);
        info!("Outbox worker stopped");
    }

    /// Serves one session until shutdown (`Ok`) or a store error (`Err`).
    ///
    /// Every wake-up drains, whether a notification arrived or the wait timed
    /// out. `attempt` is reset once a drain completes, so a store that stays
    /// unreachable keeps backing off across reconnects.
    async fn serve(
        &self,
        session: &mut dyn OutboxSession,
        shutdown: &mut watch::Receiver<bool>,
        next_reconcile: &mut Instant,
        attempt: &mut i32,
    ) -> Result<(), StoreError> {
        let wait = self
            .config
            .notify_wait_timeout()
            .min(self.config.outbox_poll_interval());

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            if Instant::now() >= *next_reconcile {
                self.reconcile_all().await;
                *next_reconcile = Instant::now() + self.config.reconcile_interval();
            }

            while !*shutdown.borrow() {
                if self.process_next(session).await?.is_none() {
                    *attempt = 0;
                    break;
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                notified = session.wait_for_notification(wait) => {
                    if !notified? {
                        debug!("No outbox notification, polling");
                    }
                }
            }
        }
    }
}
