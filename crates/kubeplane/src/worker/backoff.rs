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

//! Retry policy for failed outbox rows.

use std::time::Duration;

use crate::config::WorkerConfig;

/// Shortest pause between reconnect attempts, even with a zero base backoff.
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// What to do with a row whose sync just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep the row pending, due again after `backoff`.
    Retry { retries: i32, backoff: Duration },
    /// Give up on the row.
    Fail { retries: i32 },
}

/// Exponential backoff after `failures` consecutive failures:
/// `base * 2^(failures - 1)`, capped at `max`.
pub fn backoff_for(base: Duration, max: Duration, failures: i32) -> Duration {
    let exponent = failures.saturating_sub(1).clamp(0, 31) as u32;
    base.checked_mul(1u32 << exponent)
        .map_or(max, |delay| delay.min(max))
}

/// Decides the fate of a row that has failed `prior_retries` times before
/// and just failed again.
pub fn decide(prior_retries: i32, config: &WorkerConfig) -> RetryDecision {
    let retries = prior_retries.saturating_add(1);
    if retries >= config.max_retries() {
        RetryDecision::Fail { retries }
    } else {
        RetryDecision::Retry {
            retries,
            backoff: backoff_for(config.base_backoff(), config.max_backoff(), retries),
        }
    }
}

/// Delay before reconnect attempt number `attempt` (1-based).
pub fn reconnect_delay(config: &WorkerConfig, attempt: i32) -> Duration {
    backoff_for(config.base_backoff(), config.max_backoff(), attempt).max(MIN_RECONNECT_DELAY)
}
