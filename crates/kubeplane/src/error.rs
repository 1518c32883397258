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

//! Error types for the reconciliation engine.
//!
//! Errors are split by the layer that produces them:
//!
//! - [`StoreError`]: the entity store (diesel pool, outbox connection)
//! - [`ProvisionError`]: the external provisioning orchestrator
//! - [`SyncError`]: a handler operation, wrapping the two above with context
//! - [`RegistryError`]: handler lookup
//! - [`ConfigError`]: worker configuration validation

use thiserror::Error;

use crate::models::outbox::EntityType;

/// Errors raised by the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not obtain a pooled connection, or the pooled task panicked.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A diesel query failed.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A query on the dedicated outbox connection failed.
    #[error("Outbox connection error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// The dedicated outbox connection was closed by the server or the network.
    #[error("Outbox connection lost")]
    ConnectionLost,

    /// A stored row violates an invariant the engine relies on.
    #[error("Data integrity violation: {0}")]
    Integrity(String),
}

impl StoreError {
    /// True when the store could not be reached, as opposed to a query that
    /// reached it and was rejected.
    pub fn is_connectivity(&self) -> bool {
        match self {
            StoreError::ConnectionPool(_) | StoreError::ConnectionLost => true,
            StoreError::Postgres(e) => e.is_closed(),
            StoreError::Database(diesel::result::Error::DatabaseError(kind, _)) => {
                matches!(kind, diesel::result::DatabaseErrorKind::ClosedConnection)
            }
            StoreError::Database(_) | StoreError::Integrity(_) => false,
        }
    }
}

/// Errors raised by a provisioning client.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// The orchestrator answered with a non-success status.
    #[error("orchestrator returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The orchestrator answered with a body that could not be understood.
    #[error("invalid orchestrator response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProvisionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProvisionError::InvalidResponse(e.to_string())
        } else {
            ProvisionError::Transport(e.to_string())
        }
    }
}

/// Errors returned by sync, status and reconcile handlers.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A provisioning call failed; `operation` names the step for diagnosis.
    #[error("{operation}: {source}")]
    Provision {
        operation: &'static str,
        #[source]
        source: ProvisionError,
    },

    /// The project exists externally but has no namespace assigned yet.
    #[error("ensure project: project '{0}' has no namespace yet")]
    ProjectNotReady(String),
}

impl SyncError {
    /// Wraps a provisioning failure with the name of the operation that failed.
    pub fn provision(operation: &'static str, source: ProvisionError) -> Self {
        SyncError::Provision { operation, source }
    }
}

/// Errors raised by handler lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no sync handler registered for entity type '{0}'")]
    NoHandler(EntityType),
}

/// Errors raised while validating worker configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_retries must be at least 1")]
    ZeroRetries,

    #[error("status_batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("{name} must be greater than zero")]
    ZeroInterval { name: &'static str },

    #[error("base_backoff ({base:?}) exceeds max_backoff ({max:?})")]
    BackoffInverted {
        base: std::time::Duration,
        max: std::time::Duration,
    },
}
