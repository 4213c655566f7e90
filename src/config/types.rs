use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::discovery::DEFAULT_LOOK_AHEAD;
use crate::tracker::{PollingConfig, RetryBackoffConfig};

/// Configuration of the wallet daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the provider backend
    pub provider_url: String,
    /// sqlx connection string of the document database
    pub database_url: String,
    /// Documents are stored under this name
    pub wallet_name: String,
    /// Account export (JSON) the watch-only key agent is built from
    pub account_path: String,
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    pub considered_out_of_sync_after_secs: u64,
    /// Unused addresses derived past the last used one during discovery
    pub look_ahead: u32,
    pub health_check_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:3000".to_string(),
            database_url: "sqlite://wallet.db".to_string(),
            wallet_name: "default".to_string(),
            account_path: "account.json".to_string(),
            poll_interval_ms: 5_000,
            max_poll_interval_ms: 100_000,
            considered_out_of_sync_after_secs: 180,
            look_ahead: DEFAULT_LOOK_AHEAD,
            health_check_interval_secs: 30,
        }
    }
}

impl Config {
    pub fn polling(&self) -> PollingConfig {
        PollingConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
            considered_out_of_sync_after: Duration::from_secs(self.considered_out_of_sync_after_secs),
            retry: RetryBackoffConfig {
                max_interval: Duration::from_millis(self.max_poll_interval_ms),
                ..RetryBackoffConfig::default()
            },
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}: {:?}", name, value))
}

/// Applies the given variables on top of the defaults
pub fn config_from_vars<F>(var: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();

    if let Some(url) = var("PROVIDER_URL") {
        config.provider_url = url;
    }

    if let Some(url) = var("DATABASE_URL") {
        config.database_url = url;
    }

    if let Some(name) = var("WALLET_NAME") {
        config.wallet_name = name;
    }

    if let Some(path) = var("ACCOUNT_PATH") {
        config.account_path = path;
    }

    if let Some(value) = var("POLL_INTERVAL_MS") {
        config.poll_interval_ms = parse_var("POLL_INTERVAL_MS", &value)?;
    }

    if let Some(value) = var("MAX_POLL_INTERVAL_MS") {
        config.max_poll_interval_ms = parse_var("MAX_POLL_INTERVAL_MS", &value)?;
    }

    if let Some(value) = var("CONSIDERED_OUT_OF_SYNC_AFTER_SECS") {
        config.considered_out_of_sync_after_secs =
            parse_var("CONSIDERED_OUT_OF_SYNC_AFTER_SECS", &value)?;
    }

    if let Some(value) = var("LOOK_AHEAD") {
        config.look_ahead = parse_var("LOOK_AHEAD", &value)?;
    }

    if let Some(value) = var("HEALTH_CHECK_INTERVAL_SECS") {
        config.health_check_interval_secs = parse_var("HEALTH_CHECK_INTERVAL_SECS", &value)?;
    }

    if config.max_poll_interval_ms < config.poll_interval_ms {
        anyhow::bail!(
            "MAX_POLL_INTERVAL_MS ({}) is below POLL_INTERVAL_MS ({})",
            config.max_poll_interval_ms,
            config.poll_interval_ms
        );
    }

    Ok(config)
}

/// Loads configuration from environment variables, falling back to default values
pub fn load_config() -> Result<Config> {
    config_from_vars(|name| env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = config_from_vars(vars(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.look_ahead, 20);
        assert_eq!(config.polling().considered_out_of_sync_after, Duration::from_secs(180));
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from_vars(vars(&[
            ("PROVIDER_URL", "https://provider.example"),
            ("POLL_INTERVAL_MS", "1000"),
            ("LOOK_AHEAD", "5"),
        ]))
        .unwrap();
        assert_eq!(config.provider_url, "https://provider.example");
        assert_eq!(config.polling().interval, Duration::from_secs(1));
        assert_eq!(config.look_ahead, 5);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let error = config_from_vars(vars(&[("LOOK_AHEAD", "many")])).unwrap_err();
        assert!(error.to_string().contains("LOOK_AHEAD"));

        assert!(config_from_vars(vars(&[("POLL_INTERVAL_MS", "200000")])).is_err());
    }
}
