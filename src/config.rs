use std::{env, time::Duration};

use thiserror::Error;

use crate::{
    command::DEFAULT_COMMAND_TIMEOUT, journalctl::DEFAULT_JOURNALCTL_BIN,
    systemctl::DEFAULT_SYSTEMCTL_BIN,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct Config {
    pub unit: String,
    pub systemctl_bin: String,
    pub journalctl_bin: String,
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub restart_on_failure: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MONITOR_UNIT is required and must not be empty")]
    MissingUnit,
    #[error("COMMAND_TIMEOUT_MS must be a positive integer")]
    InvalidCommandTimeout,
    #[error("POLL_INTERVAL_MS must be a positive integer")]
    InvalidPollInterval,
    #[error("RESTART_ON_FAILURE must be one of: true, false, 1, 0")]
    InvalidRestartOnFailure,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let unit = lookup("MONITOR_UNIT")
            .map(|unit| unit.trim().to_string())
            .filter(|unit| !unit.is_empty())
            .ok_or(ConfigError::MissingUnit)?;

        let systemctl_bin = non_empty(lookup("SYSTEMCTL_BIN"))
            .unwrap_or_else(|| DEFAULT_SYSTEMCTL_BIN.to_string());
        let journalctl_bin = non_empty(lookup("JOURNALCTL_BIN"))
            .unwrap_or_else(|| DEFAULT_JOURNALCTL_BIN.to_string());

        let command_timeout = non_empty(lookup("COMMAND_TIMEOUT_MS"))
            .map(|value| parse_millis(&value).ok_or(ConfigError::InvalidCommandTimeout))
            .transpose()?
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT);
        let poll_interval = non_empty(lookup("POLL_INTERVAL_MS"))
            .map(|value| parse_millis(&value).ok_or(ConfigError::InvalidPollInterval))
            .transpose()?
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let restart_on_failure = non_empty(lookup("RESTART_ON_FAILURE"))
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidRestartOnFailure),
            })
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            unit,
            systemctl_bin,
            journalctl_bin,
            command_timeout,
            poll_interval,
            restart_on_failure,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_millis(value: &str) -> Option<Duration> {
    value
        .parse::<u64>()
        .ok()
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
}
