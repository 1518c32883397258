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

//! Status worker. Polls every registered status handler on a fixed interval,
//! independent of outbox traffic.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::registry::HandlerRegistry;

pub struct StatusWorker {
    registry: Arc<HandlerRegistry>,
    config: WorkerConfig,
}

impl StatusWorker {
    pub fn new(registry: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        Self { registry, config }
    }

    /// Runs one pass over every status handler. A failing handler does not
    /// stop the others.
    pub async fn poll_once(&self) {
        for handler in self.registry.status_handlers() {
            match handler.check_status().await {
                Ok(report) => {
                    counter!("kubeplane_status_passes_total", "handler" => handler.name().to_string())
                        .increment(1);
                    debug!(
                        handler = handler.name(),
                        checked = report.checked,
                        transitions = report.transitions,
                        errors = report.errors,
                        "Status pass complete"
                    );
                }
                Err(e) => {
                    counter!("kubeplane_status_pass_failures_total", "handler" => handler.name().to_string())
                        .increment(1);
                    error!(handler = handler.name(), error = %e, "Status pass failed");
                }
            }
        }
    }

    /// Polls immediately, then every `status_poll_interval`, until `shutdown`
    /// turns true or its sender is dropped. A slow pass delays the next tick
    /// instead of bunching ticks up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.status_poll_interval().as_secs_f64(),
            "Status worker started"
        );
        let mut ticker = tokio::time::interval(self.config.status_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => self.poll_once().await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Status worker stopped");
    }
}
