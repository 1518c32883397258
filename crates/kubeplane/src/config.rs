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

//! Configuration for the outbox and status workers.

use std::time::Duration;

use crate::error::ConfigError;

/// Timing and retry parameters shared by the background workers.
///
/// # Construction
///
/// ```rust
/// use std::time::Duration;
/// use kubeplane::WorkerConfig;
///
/// let config = WorkerConfig::builder()
///     .max_retries(5)
///     .base_backoff(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries(), 5);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct WorkerConfig {
    outbox_poll_interval: Duration,
    notify_wait_timeout: Duration,
    reconcile_interval: Duration,
    base_backoff: Duration,
    max_backoff: Duration,
    max_retries: i32,
    status_poll_interval: Duration,
    status_batch_size: i64,
    unlabeled_alert_threshold: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            outbox_poll_interval: Duration::from_secs(30),
            notify_wait_timeout: Duration::from_secs(5),
            reconcile_interval: Duration::from_secs(300),
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            max_retries: 10,
            status_poll_interval: Duration::from_secs(30),
            status_batch_size: 50,
            unlabeled_alert_threshold: 3,
        }
    }
}

impl WorkerConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Upper bound on the time the outbox worker goes without draining. The
    /// effective wait is the smaller of this and `notify_wait_timeout`.
    pub fn outbox_poll_interval(&self) -> Duration {
        self.outbox_poll_interval
    }

    /// Bound on a single wait for a store notification. The worker drains
    /// again when the wait times out.
    pub fn notify_wait_timeout(&self) -> Duration {
        self.notify_wait_timeout
    }

    /// How often orphan reconciliation runs.
    pub fn reconcile_interval(&self) -> Duration {
        self.reconcile_interval
    }

    /// Backoff after the first failure; doubles on each further failure.
    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    /// Ceiling for retry and reconnect backoff.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Failed attempts after which an outbox row is marked failed.
    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// How often the status worker polls observed state.
    pub fn status_poll_interval(&self) -> Duration {
        self.status_poll_interval
    }

    /// Page size for status listings.
    pub fn status_batch_size(&self) -> i64 {
        self.status_batch_size
    }

    /// Consecutive reconcile passes an unlabeled resource may be seen before
    /// it is escalated.
    pub fn unlabeled_alert_threshold(&self) -> u32 {
        self.unlabeled_alert_threshold
    }

    /// Checks the configuration for values the workers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries < 1 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.status_batch_size < 1 {
            return Err(ConfigError::ZeroBatchSize);
        }
        for (name, value) in [
            ("outbox_poll_interval", self.outbox_poll_interval),
            ("notify_wait_timeout", self.notify_wait_timeout),
            ("reconcile_interval", self.reconcile_interval),
            ("status_poll_interval", self.status_poll_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroInterval { name });
            }
        }
        if self.base_backoff > self.max_backoff {
            return Err(ConfigError::BackoffInverted {
                base: self.base_backoff,
                max: self.max_backoff,
            });
        }
        Ok(())
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug, Clone, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    pub fn outbox_poll_interval(mut self, value: Duration) -> Self {
        self.config.outbox_poll_interval = value;
        self
    }

    pub fn notify_wait_timeout(mut self, value: Duration) -> Self {
        self.config.notify_wait_timeout = value;
        self
    }

    pub fn reconcile_interval(mut self, value: Duration) -> Self {
        self.config.reconcile_interval = value;
        self
    }

    pub fn base_backoff(mut self, value: Duration) -> Self {
        self.config.base_backoff = value;
        self
    }

    pub fn max_backoff(mut self, value: Duration) -> Self {
        self.config.max_backoff = value;
        self
    }

    pub fn max_retries(mut self, value: i32) -> Self {
        self.config.max_retries = value;
        self
    }

    pub fn status_poll_interval(mut self, value: Duration) -> Self {
        self.config.status_poll_interval = value;
        self
    }

    pub fn status_batch_size(mut self, value: i64) -> Self {
        self.config.status_batch_size = value;
        self
    }

    pub fn unlabeled_alert_threshold(mut self, value: u32) -> Self {
        self.config.unlabeled_alert_threshold = value;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<WorkerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
