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

//! Database connection pool.
//!
//! The pool is shared by both workers and, in a full deployment, by the API
//! layer. It uses `deadpool-diesel`; every query runs inside
//! `conn.interact(...)` on a blocking thread.
//!
//! The outbox worker does not use this pool for claiming rows: it holds one
//! dedicated `tokio-postgres` connection for `LISTEN` and its row
//! transactions (see [`crate::outbox::postgres`]).

use deadpool_diesel::postgres::{Manager as PgManager, Pool as PgPool, Runtime as PgRuntime};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;
use url::Url;

use crate::error::StoreError;

/// Embedded SQL migrations for the entity store.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// A pooled connection checked out of [`Database`].
pub type PooledConnection = deadpool::managed::Object<PgManager>;

/// A pool of PostgreSQL connections.
///
/// `Database` is `Clone`; each clone references the same underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    url: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("url", &redact_password(&self.url))
            .finish()
    }
}

impl Database {
    /// Creates a new pool for `database_url` holding at most `max_size` connections.
    ///
    /// No connection is opened until the first checkout.
    pub fn new(database_url: &str, max_size: usize) -> Result<Self, StoreError> {
        Url::parse(database_url)
            .map_err(|e| StoreError::ConnectionPool(format!("invalid database URL: {}", e)))?;

        let manager = PgManager::new(database_url, PgRuntime::Tokio1);
        let pool = PgPool::builder(manager)
            .max_size(max_size)
            .build()
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        info!(
            url = %redact_password(database_url),
            max_size,
            "PostgreSQL connection pool initialized"
        );

        Ok(Self {
            pool,
            url: database_url.to_string(),
        })
    }

    /// The URL this pool connects to. The outbox worker opens its dedicated
    /// connection against the same database.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Checks out a pooled connection.
    pub async fn get_connection(&self) -> Result<PooledConnection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))
    }

    /// Runs pending migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.get_connection().await?;
        let applied = conn
            .interact(|conn| {
                conn.run_pending_migrations(MIGRATIONS)
                    .map(|versions| versions.len())
                    .map_err(|e| e.to_string())
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
            .map_err(|e| StoreError::ConnectionPool(format!("migration failed: {}", e)))?;

        info!(applied, "Database migrations complete");
        Ok(())
    }
}

/// Replaces the password component of a URL for logging.
fn redact_password(database_url: &str) -> String {
    match Url::parse(database_url) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}
