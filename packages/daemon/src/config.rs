//! Daemon settings read from `DISPATCH_*` environment variables.

use std::time::Duration;

use actors::{JanitorConfig, WorkerConfig};
use db::DbConfig;
use dispatch_core::AgentId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got '{value}'")]
    InvalidSeconds { name: &'static str, value: String },
    #[error("{name} must be a positive number of milliseconds, got '{value}'")]
    InvalidMillis { name: &'static str, value: String },
    #[error("DISPATCH_AGENTS contains an invalid agent id: {0}")]
    InvalidAgent(String),
    #[error("DISPATCH_DB_USER and DISPATCH_DB_PASS must be set together")]
    PartialCredentials,
}

/// Everything the daemon needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db: DbConfig,
    pub worker: WorkerConfig,
    /// `None` when `DISPATCH_JANITOR_INTERVAL_SECS` is `0`.
    pub janitor: Option<JanitorConfig>,
    pub agents: Vec<AgentId>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source. Unset or empty variables
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut db = match var("DISPATCH_DB_ENDPOINT") {
            Some(endpoint) => DbConfig::endpoint(endpoint.trim()),
            None => DbConfig::default(),
        };
        if let Some(namespace) = var("DISPATCH_DB_NAMESPACE") {
            db = db.with_namespace(namespace);
        }
        if let Some(database) = var("DISPATCH_DB_DATABASE") {
            db = db.with_database(database);
        }
        match (var("DISPATCH_DB_USER"), var("DISPATCH_DB_PASS")) {
            (Some(user), Some(pass)) => db = db.with_credentials(user, pass),
            (None, None) => {}
            _ => return Err(ConfigError::PartialCredentials),
        }

        let mut worker = WorkerConfig::default();
        if let Some(ms) = millis(&var, "DISPATCH_POLL_INTERVAL_MS")? {
            worker = worker.with_poll_interval(ms);
        }
        if let Some(secs) = seconds(&var, "DISPATCH_JOB_TIMEOUT_SECS")? {
            worker = worker.with_job_timeout(secs);
        }

        let janitor = match seconds(&var, "DISPATCH_JANITOR_INTERVAL_SECS")? {
            Some(interval) if interval.is_zero() => None,
            interval => {
                let mut janitor = JanitorConfig::default();
                if let Some(interval) = interval {
                    janitor = janitor.with_interval(interval);
                }
                if let Some(stuck_after) = seconds(&var, "DISPATCH_STUCK_AFTER_SECS")? {
                    janitor = janitor.with_stuck_after(stuck_after);
                }
                if let Some(retention) = seconds(&var, "DISPATCH_RETENTION_SECS")? {
                    janitor = janitor.with_retention(retention);
                }
                if let Some(timeout) = seconds(&var, "DISPATCH_SWEEP_TIMEOUT_SECS")? {
                    janitor = janitor.with_sweep_timeout(timeout);
                }
                Some(janitor)
            }
        };

        let agents = match var("DISPATCH_AGENTS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| AgentId::parse(s).map_err(|e| ConfigError::InvalidAgent(e.to_string())))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            db,
            worker,
            janitor,
            agents,
        })
    }
}

fn seconds(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    var(name)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidSeconds { name, value })
        })
        .transpose()
}

fn millis(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    var(name)
        .map(|value| match value.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
            _ => Err(ConfigError::InvalidMillis { name, value }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.db.endpoint, "mem://");
        assert!(settings.db.credentials.is_none());
        assert!(settings.agents.is_empty());

        let janitor = settings.janitor.unwrap();
        assert_eq!(janitor.interval, Duration::from_secs(60));
        assert_eq!(janitor.stuck_after, Duration::from_secs(30 * 60));
        assert_eq!(janitor.retention, Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[test]
    fn reads_store_and_janitor_settings() {
        let agent = AgentId::new();
        let agent_list = format!(" {agent} ,");
        let settings = settings(&[
            ("DISPATCH_DB_ENDPOINT", "rocksdb://./data"),
            ("DISPATCH_DB_NAMESPACE", "staging"),
            ("DISPATCH_DB_DATABASE", "jobs"),
            ("DISPATCH_JANITOR_INTERVAL_SECS", "15"),
            ("DISPATCH_STUCK_AFTER_SECS", "600"),
            ("DISPATCH_RETENTION_SECS", "86400"),
            ("DISPATCH_SWEEP_TIMEOUT_SECS", "5"),
            ("DISPATCH_POLL_INTERVAL_MS", "250"),
            ("DISPATCH_AGENTS", agent_list.as_str()),
        ])
        .unwrap();

        assert_eq!(settings.db.endpoint, "rocksdb://./data");
        assert_eq!(settings.db.namespace, "staging");
        assert_eq!(settings.db.database, "jobs");
        assert_eq!(settings.worker.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.agents, vec![agent]);

        let janitor = settings.janitor.unwrap();
        assert_eq!(janitor.interval, Duration::from_secs(15));
        assert_eq!(janitor.stuck_after, Duration::from_secs(600));
        assert_eq!(janitor.retention, Duration::from_secs(86400));
        assert_eq!(janitor.sweep_timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_interval_disables_janitor() {
        let settings = settings(&[("DISPATCH_JANITOR_INTERVAL_SECS", "0")]).unwrap();
        assert!(settings.janitor.is_none());
    }

    #[test]
    fn rejects_malformed_values() {
        assert_eq!(
            settings(&[("DISPATCH_RETENTION_SECS", "7d")]).unwrap_err(),
            ConfigError::InvalidSeconds {
                name: "DISPATCH_RETENTION_SECS",
                value: "7d".to_string()
            }
        );
        assert!(matches!(
            settings(&[("DISPATCH_POLL_INTERVAL_MS", "0")]),
            Err(ConfigError::InvalidMillis { .. })
        ));
        assert!(matches!(
            settings(&[("DISPATCH_AGENTS", "not-a-ulid")]),
            Err(ConfigError::InvalidAgent(_))
        ));
        assert_eq!(
            settings(&[("DISPATCH_DB_USER", "root")]).unwrap_err(),
            ConfigError::PartialCredentials
        );
    }
}
