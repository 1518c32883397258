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

//! PostgreSQL outbox sessions.
//!
//! Each session owns one `tokio-postgres` connection. A spawned driver task
//! polls the connection and forwards `NOTIFY` messages into a channel; the
//! session issues `LISTEN` once after connecting. Row claims run in a
//! `tokio_postgres::Transaction` so the `FOR UPDATE SKIP LOCKED` lock lives
//! exactly as long as the transaction.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_postgres::{AsyncMessage, Client, NoTls, Notification, Row, Transaction};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{ClaimedRow, OutboxConnector, OutboxSession, OUTBOX_CHANNEL};
use crate::error::StoreError;
use crate::models::outbox::{OutboxEvent, OutboxRow, OutboxStatus};

const CLAIM_NEXT: &str = "\
    SELECT id, cluster_id, namespace_id, project_id, project_member_id, event, retries, status_info \
    FROM outbox \
    WHERE status = $1 AND next_attempt_at <= now() \
    ORDER BY id \
    LIMIT 1 \
    FOR UPDATE SKIP LOCKED";

const MARK_PROCESSED: &str = "\
    UPDATE outbox SET status = $2, processed_at = now() WHERE id = $1";

const MARK_RETRY: &str = "\
    UPDATE outbox \
    SET retries = $2, status_info = $3, next_attempt_at = now() + make_interval(secs => $4::float8) \
    WHERE id = $1";

const MARK_FAILED: &str = "\
    UPDATE outbox SET status = $2, retries = $3, status_info = $4 WHERE id = $1";

/// Opens [`PgOutboxSession`]s against one database.
pub struct PgOutboxConnector {
    database_url: String,
}

impl PgOutboxConnector {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl OutboxConnector for PgOutboxConnector {
    async fn connect(&self) -> Result<Box<dyn OutboxSession>, StoreError> {
        let session = PgOutboxSession::connect(&self.database_url).await?;
        Ok(Box::new(session))
    }
}

/// One subscribed outbox connection.
pub struct PgOutboxSession {
    client: Client,
    notifications: mpsc::UnboundedReceiver<Notification>,
    driver: JoinHandle<()>,
}

impl PgOutboxSession {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let (client, mut connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(classify)?;

        let (tx, notifications) = mpsc::unbounded_channel();

        let driver = tokio::spawn(async move {
            let stream = futures::stream::poll_fn(move |cx| connection.poll_message(cx));
            futures::pin_mut!(stream);

            while let Some(message) = stream.next().await {
                match message {
                    Ok(AsyncMessage::Notification(notification)) => {
                        if tx.send(notification).is_err() {
                            break;
                        }
                    }
                    Ok(AsyncMessage::Notice(notice)) => {
                        debug!(notice = %notice, "Outbox connection notice");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Outbox connection error");
                        break;
                    }
                }
            }
            debug!("Outbox connection driver exited");
        });

        client
            .batch_execute(&format!("LISTEN {}", OUTBOX_CHANNEL))
            .await
            .map_err(classify)?;
        info!(channel = OUTBOX_CHANNEL, "Outbox listener subscribed");

        Ok(Self {
            client,
            notifications,
            driver,
        })
    }
}

impl Drop for PgOutboxSession {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[async_trait]
impl OutboxSession for PgOutboxSession {
    async fn claim_next<'a>(
        &'a mut self,
    ) -> Result<Option<Box<dyn ClaimedRow + 'a>>, StoreError> {
        if self.client.is_closed() {
            return Err(StoreError::ConnectionLost);
        }

        let tx = self.client.transaction().await.map_err(classify)?;
        let claimed = tx
            .query_opt(CLAIM_NEXT, &[&OutboxStatus::Pending.as_str()])
            .await
            .map_err(classify)?;

        match claimed {
            Some(row) => {
                let row = outbox_row(&row)?;
                debug!(outbox_id = row.id, retries = row.retries, "Claimed outbox row");
                Ok(Some(Box::new(PgClaimedRow { tx, row })))
            }
            None => {
                tx.rollback().await.map_err(classify)?;
                Ok(None)
            }
        }
    }

    async fn wait_for_notification(&mut self, timeout: Duration) -> Result<bool, StoreError> {
        if self.client.is_closed() {
            return Err(StoreError::ConnectionLost);
        }

        match tokio::time::timeout(timeout, self.notifications.recv()).await {
            Ok(Some(notification)) => {
                debug!(
                    channel = notification.channel(),
                    payload = notification.payload(),
                    "Received outbox notification"
                );
                // One drain covers every row inserted so far.
                while self.notifications.try_recv().is_ok() {}
                Ok(true)
            }
            Ok(None) => Err(StoreError::ConnectionLost),
            Err(_) => Ok(false),
        }
    }
}

/// A row locked by `FOR UPDATE SKIP LOCKED` inside `tx`.
struct PgClaimedRow<'a> {
    tx: Transaction<'a>,
    row: OutboxRow,
}

#[async_trait]
impl<'a> ClaimedRow for PgClaimedRow<'a> {
    fn row(&self) -> &OutboxRow {
        &self.row
    }

    async fn mark_processed(self: Box<Self>) -> Result<(), StoreError> {
        let PgClaimedRow { tx, row } = *self;
        tx.execute(MARK_PROCESSED, &[&row.id, &OutboxStatus::Processed.as_str()])
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)
    }

    async fn mark_retry(
        self: Box<Self>,
        retries: i32,
        backoff: Duration,
        status_info: &str,
    ) -> Result<(), StoreError> {
        let PgClaimedRow { tx, row } = *self;
        let backoff_secs = backoff.as_secs_f64();
        tx.execute(MARK_RETRY, &[&row.id, &retries, &status_info, &backoff_secs])
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)
    }

    async fn mark_failed(
        self: Box<Self>,
        retries: i32,
        status_info: &str,
    ) -> Result<(), StoreError> {
        let PgClaimedRow { tx, row } = *self;
        tx.execute(
            MARK_FAILED,
            &[&row.id, &OutboxStatus::Failed.as_str(), &retries, &status_info],
        )
        .await
        .map_err(classify)?;
        tx.commit().await.map_err(classify)
    }
}

fn outbox_row(row: &Row) -> Result<OutboxRow, StoreError> {
    let event: String = row.try_get("event").map_err(classify)?;
    Ok(OutboxRow {
        id: row.try_get("id").map_err(classify)?,
        cluster_id: row.try_get::<_, Option<Uuid>>("cluster_id").map_err(classify)?,
        namespace_id: row.try_get::<_, Option<Uuid>>("namespace_id").map_err(classify)?,
        project_id: row.try_get::<_, Option<Uuid>>("project_id").map_err(classify)?,
        project_member_id: row
            .try_get::<_, Option<Uuid>>("project_member_id")
            .map_err(classify)?,
        event: OutboxEvent::from_str(&event),
        retries: row.try_get("retries").map_err(classify)?,
        status_info: row.try_get("status_info").map_err(classify)?,
    })
}

/// Separates a dead connection from an ordinary query failure.
fn classify(e: tokio_postgres::Error) -> StoreError {
    if e.is_closed() {
        StoreError::ConnectionLost
    } else {
        StoreError::Postgres(e)
    }
}
