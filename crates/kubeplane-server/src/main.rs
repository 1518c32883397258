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

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use kubeplane::models::outbox::EntityType;
use kubeplane::provisioning::fake::FakeProvisioner;
use kubeplane::provisioning::gardener::GardenerClient;
use kubeplane::{
    ClusterHandler, ClusterStore, Database, HandlerRegistry, OutboxWorker, PgOutboxConnector,
    ProvisioningClient, StatusWorker, DAL,
};
use kubeplane_server::health::{self, HealthState};
use kubeplane_server::{telemetry, Provisioner, ServerConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let config = ServerConfig::parse();

    telemetry::init_tracing(config.log_format);
    let metrics = match telemetry::install_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics disabled");
            None
        }
    };

    let worker_config = config
        .worker_config()
        .context("invalid worker configuration")?;

    let database = Database::new(&config.database_url, config.db_pool_size)
        .context("failed to create database pool")?;
    database
        .run_migrations()
        .await
        .context("failed to run migrations")?;
    let store: Arc<dyn ClusterStore> = Arc::new(DAL::new(database));

    let client: Arc<dyn ProvisioningClient> = match config.provisioner {
        Provisioner::Gardener => Arc::new(
            GardenerClient::new(config.gardener_config()?)
                .context("failed to build Gardener client")?,
        ),
        Provisioner::Fake => {
            warn!("Using the in-memory provisioner; nothing will be provisioned");
            Arc::new(FakeProvisioner::new())
        }
    };

    let cluster = Arc::new(ClusterHandler::new(store, client, &worker_config));
    let registry = Arc::new(
        HandlerRegistry::builder()
            .register_sync(EntityType::Cluster, cluster.clone())
            .register_status(cluster.clone())
            .register_reconcile(cluster)
            .build(),
    );
    info!(?registry, "Handlers registered");

    let outbox_worker = Arc::new(OutboxWorker::new(
        Arc::new(PgOutboxConnector::new(config.database_url.clone())),
        registry.clone(),
        worker_config.clone(),
    ));
    let status_worker = Arc::new(StatusWorker::new(registry, worker_config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = TcpListener::bind(config.health_addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {}", config.health_addr))?;
    let health_task = tokio::spawn(health::serve(
        listener,
        HealthState::new(outbox_worker.readiness(), metrics),
        shutdown_rx.clone(),
    ));

    let outbox_task = tokio::spawn({
        let worker = outbox_worker.clone();
        let shutdown = shutdown_rx.clone();
        async move { worker.run(shutdown).await }
    });
    let status_task = tokio::spawn({
        let worker = status_worker.clone();
        async move { worker.run(shutdown_rx).await }
    });

    wait_for_signal().await;
    info!("Shutdown requested, waiting for workers");
    // Receivers outlive this send; it only fails once every task is gone.
    let _ = shutdown_tx.send(true);

    if let Err(e) = outbox_task.await {
        error!(error = %e, "Outbox worker task failed");
    }
    if let Err(e) = status_task.await {
        error!(error = %e, "Status worker task failed");
    }
    match health_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Health endpoint failed"),
        Err(e) => error!(error = %e, "Health endpoint task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received SIGINT"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
            },
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    }
}
