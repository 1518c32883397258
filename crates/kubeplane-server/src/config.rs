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

//! Process configuration, read from flags or the environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use kubeplane::provisioning::gardener::GardenerConfig;
use kubeplane::{ConfigError, WorkerConfig};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provisioner {
    /// The Gardener API.
    Gardener,
    /// In-memory fake. For local runs only; nothing is provisioned.
    Fake,
}

/// Kubeplane reconciliation worker
#[derive(Debug, Clone, Parser)]
#[command(name = "kubeplane-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Maximum pooled database connections
    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10)]
    pub db_pool_size: usize,

    /// Address for the health and metrics endpoint
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    pub health_addr: SocketAddr,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    #[arg(long, env = "PROVISIONER", value_enum, default_value_t = Provisioner::Gardener)]
    pub provisioner: Provisioner,

    /// Base URL of the Gardener API server
    #[arg(long, env = "GARDENER_URL")]
    pub gardener_url: Option<Url>,

    /// Bearer token for the Gardener API
    #[arg(long, env = "GARDENER_TOKEN", hide_env_values = true)]
    pub gardener_token: Option<String>,

    #[arg(long, env = "GARDENER_PROVIDER_TYPE", default_value = "aws")]
    pub gardener_provider_type: String,

    #[arg(long, env = "GARDENER_CLOUD_PROFILE", default_value = "aws")]
    pub gardener_cloud_profile: String,

    #[arg(long, env = "GARDENER_SECRET_BINDING", default_value = "default")]
    pub gardener_secret_binding: String,

    /// Longest gap between outbox drains (e.g. "30s")
    #[arg(long, env = "OUTBOX_POLL_INTERVAL", default_value = "30s", value_parser = parse_duration)]
    pub outbox_poll_interval: Duration,

    /// Longest single wait for an outbox notification
    #[arg(long, env = "NOTIFY_WAIT_TIMEOUT", default_value = "5s", value_parser = parse_duration)]
    pub notify_wait_timeout: Duration,

    /// Interval between orphan reconciliation passes
    #[arg(long, env = "RECONCILE_INTERVAL", default_value = "5m", value_parser = parse_duration)]
    pub reconcile_interval: Duration,

    #[arg(long, env = "BASE_BACKOFF", default_value = "5s", value_parser = parse_duration)]
    pub base_backoff: Duration,

    #[arg(long, env = "MAX_BACKOFF", default_value = "5m", value_parser = parse_duration)]
    pub max_backoff: Duration,

    /// Failed attempts before an outbox row is marked failed
    #[arg(long, env = "MAX_RETRIES", default_value_t = 10)]
    pub max_retries: i32,

    #[arg(long, env = "STATUS_POLL_INTERVAL", default_value = "30s", value_parser = parse_duration)]
    pub status_poll_interval: Duration,

    #[arg(long, env = "STATUS_BATCH_SIZE", default_value_t = 50)]
    pub status_batch_size: i64,

    /// Consecutive reconcile passes before an unlabeled resource is escalated
    #[arg(long, env = "UNLABELED_ALERT_THRESHOLD", default_value_t = 3)]
    pub unlabeled_alert_threshold: u32,
}

impl ServerConfig {
    /// Worker settings, validated.
    pub fn worker_config(&self) -> Result<WorkerConfig, ConfigError> {
        WorkerConfig::builder()
            .outbox_poll_interval(self.outbox_poll_interval)
            .notify_wait_timeout(self.notify_wait_timeout)
            .reconcile_interval(self.reconcile_interval)
            .base_backoff(self.base_backoff)
            .max_backoff(self.max_backoff)
            .max_retries(self.max_retries)
            .status_poll_interval(self.status_poll_interval)
            .status_batch_size(self.status_batch_size)
            .unlabeled_alert_threshold(self.unlabeled_alert_threshold)
            .build()
    }

    /// Gardener client settings. Fails when the URL or token is missing.
    pub fn gardener_config(&self) -> Result<GardenerConfig> {
        let url = self
            .gardener_url
            .clone()
            .context("GARDENER_URL is required when PROVISIONER=gardener")?;
        let token = self
            .gardener_token
            .clone()
            .context("GARDENER_TOKEN is required when PROVISIONER=gardener")?;

        let mut config = GardenerConfig::new(url, token);
        config.provider_type = self.gardener_provider_type.clone();
        config.cloud_profile = self.gardener_cloud_profile.clone();
        config.secret_binding = self.gardener_secret_binding.clone();
        Ok(config)
    }
}

/// Parses a duration such as "30s", "5m" or "1h30m".
///
/// Units are d, h, m and s. A bare number without a unit is rejected.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let mut total: u64 = 0;
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
            continue;
        }
        if current_num.is_empty() {
            return Err(anyhow!(
                "Invalid duration format: expected number before '{}'",
                c
            ));
        }

        let num: u64 = current_num
            .parse()
            .with_context(|| format!("Invalid number in duration: {}", current_num))?;
        current_num.clear();

        let unit = match c {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(anyhow!("Unknown duration unit: '{}'. Use d, h, m, or s", c)),
        };
        total = num
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| anyhow!("Duration '{}' is too large", s))?;
    }

    if !current_num.is_empty() {
        return Err(anyhow!(
            "Duration '{}' is missing a unit. Use d (days), h (hours), m (minutes), or s (seconds)",
            s
        ));
    }

    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 3] = ["kubeplane-server", "--database-url", "postgres://localhost/kubeplane"];

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(" 2D ").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("99999999999999999999d").is_err());
    }

    #[test]
    fn test_defaults_match_worker_defaults() {
        let config = ServerConfig::try_parse_from(REQUIRED).unwrap();
        let worker = config.worker_config().unwrap();
        let defaults = WorkerConfig::default();

        assert_eq!(worker.outbox_poll_interval(), defaults.outbox_poll_interval());
        assert_eq!(worker.notify_wait_timeout(), defaults.notify_wait_timeout());
        assert_eq!(worker.reconcile_interval(), defaults.reconcile_interval());
        assert_eq!(worker.base_backoff(), defaults.base_backoff());
        assert_eq!(worker.max_backoff(), defaults.max_backoff());
        assert_eq!(worker.max_retries(), defaults.max_retries());
        assert_eq!(worker.status_poll_interval(), defaults.status_poll_interval());
        assert_eq!(worker.status_batch_size(), defaults.status_batch_size());
        assert_eq!(
            worker.unlabeled_alert_threshold(),
            defaults.unlabeled_alert_threshold()
        );
        assert_eq!(config.provisioner, Provisioner::Gardener);
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn test_invalid_worker_settings_rejected() {
        let mut args = REQUIRED.to_vec();
        args.extend(["--base-backoff", "10m", "--max-backoff", "1m"]);
        let config = ServerConfig::try_parse_from(args).unwrap();
        assert!(matches!(
            config.worker_config(),
            Err(ConfigError::BackoffInverted { .. })
        ));
    }

    #[test]
    fn test_gardener_settings_required() {
        let config = ServerConfig::try_parse_from(REQUIRED).unwrap();
        let err = config.gardener_config().unwrap_err();
        assert!(err.to_string().contains("GARDENER_URL"));

        let mut args = REQUIRED.to_vec();
        args.extend([
            "--gardener-url",
            "https://gardener.example.com",
            "--gardener-token",
            "secret",
            "--gardener-cloud-profile",
            "gcp",
        ]);
        let config = ServerConfig::try_parse_from(args).unwrap();
        let gardener = config.gardener_config().unwrap();
        assert_eq!(gardener.cloud_profile, "gcp");
        assert_eq!(gardener.provider_type, "aws");
    }
}
