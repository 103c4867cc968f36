//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `roomhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use chrono::TimeDelta;
use roomhub_adapter_mqtt::MqttConfig;
use roomhub_app::pending::RetryPolicy;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Schedule reconciliation and command retry.
    pub reconciler: ReconcilerConfig,
    /// Card registration.
    pub registration: RegistrationConfig,
    /// Domain event bus and audit log.
    pub events: EventsConfig,
    /// Vacation mode.
    pub vacation: VacationConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Seconds between two ticks.
    pub tick_secs: u64,
    /// Seconds a command may stay unconfirmed before it is republished.
    pub confirm_timeout_secs: u64,
    /// Total publications of one command, the first included.
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Seconds a card capture waits for the reader.
    pub timeout_secs: u64,
    /// Users known to the card directory at startup.
    pub users: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Days an audit log entry is kept.
    pub retention_days: u32,
    /// Capacity of the in-process broadcast channel.
    pub bus_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct VacationConfig {
    /// Start with every sensor armed and presence simulation running.
    pub active: bool,
    /// Seconds between two presence simulation steps.
    pub simulation_secs: u64,
}

impl Config {
    /// Load configuration from `roomhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if a
    /// value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("roomhub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("ROOMHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("ROOMHUB_MQTT_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Some(port) = var("ROOMHUB_MQTT_PORT").and_then(|val| val.parse().ok()) {
            self.mqtt.broker_port = port;
        }
        if let Some(val) = var("ROOMHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation("mqtt port must be non-zero".to_string()));
        }
        if self.reconciler.tick_secs == 0 {
            return Err(ConfigError::Validation("tick_secs must be non-zero".to_string()));
        }
        if self.reconciler.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.events.bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "bus_capacity must be non-zero".to_string(),
            ));
        }
        if self.vacation.simulation_secs == 0 {
            return Err(ConfigError::Validation(
                "simulation_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl ReconcilerConfig {
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            confirm_timeout: seconds(self.confirm_timeout_secs),
            max_attempts: self.max_attempts,
        }
    }
}

impl RegistrationConfig {
    #[must_use]
    pub fn ttl(&self) -> TimeDelta {
        seconds(self.timeout_secs)
    }
}

impl EventsConfig {
    #[must_use]
    pub fn retention(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.retention_days))
    }
}

impl VacationConfig {
    #[must_use]
    pub fn simulation_period(&self) -> Duration {
        Duration::from_secs(self.simulation_secs)
    }
}

fn seconds(value: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1_000))
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:roomhub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "roomhubd=info,roomhub=info,rumqttc=warn".to_string(),
        }
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            confirm_timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            users: Vec::new(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            bus_capacity: 256,
        }
    }
}

impl Default for VacationConfig {
    fn default() -> Self {
        Self {
            active: false,
            simulation_secs: 600,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.broker_host, "localhost");
        assert_eq!(config.mqtt.broker_port, 1883);
        assert_eq!(config.database.url, "sqlite:roomhub.db?mode=rwc");
        assert_eq!(config.reconciler.tick_secs, 60);
        assert_eq!(config.reconciler.max_attempts, 3);
        assert_eq!(config.registration.timeout_secs, 60);
        assert_eq!(config.events.retention_days, 30);
        assert!(!config.vacation.active);
        assert_eq!(config.vacation.simulation_secs, 600);
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.reconciler.tick_secs, 60);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [mqtt]
            broker_host = 'broker.lan'
            broker_port = 8883
            client_id = 'hub-1'

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [reconciler]
            tick_secs = 15
            confirm_timeout_secs = 10
            max_attempts = 5

            [registration]
            timeout_secs = 120
            users = ['alice', 'bob']

            [events]
            retention_days = 7
            bus_capacity = 64

            [vacation]
            active = true
            simulation_secs = 900
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mqtt.broker_host, "broker.lan");
        assert_eq!(config.mqtt.broker_port, 8883);
        assert_eq!(config.mqtt.client_id, "hub-1");
        assert_eq!(config.database_url(), "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.reconciler.tick(), Duration::from_secs(15));
        assert_eq!(
            config.reconciler.retry_policy(),
            RetryPolicy {
                confirm_timeout: TimeDelta::seconds(10),
                max_attempts: 5,
            }
        );
        assert_eq!(config.registration.ttl(), TimeDelta::seconds(120));
        assert_eq!(config.registration.users, vec!["alice", "bob"]);
        assert_eq!(config.events.retention(), TimeDelta::days(7));
        assert_eq!(config.events.bus_capacity, 64);
        assert!(config.vacation.active);
        assert_eq!(config.vacation.simulation_period(), Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [reconciler]
            tick_secs = 30
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.reconciler.tick_secs, 30);
        assert_eq!(config.reconciler.confirm_timeout_secs, 30);
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("ROOMHUB_DATABASE_URL", "sqlite::memory:"),
            ("ROOMHUB_MQTT_HOST", "10.0.0.2"),
            ("ROOMHUB_MQTT_PORT", "1884"),
            ("ROOMHUB_LOG", "trace"),
        ]));
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert_eq!(config.mqtt.broker_port, 1884);
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_rust_log_over_roomhub_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("ROOMHUB_LOG", "trace"), ("RUST_LOG", "warn")]));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("ROOMHUB_MQTT_PORT", "not-a-port")]));
        assert_eq!(config.mqtt.broker_port, 1883);
    }

    #[test]
    fn should_reject_zero_values() {
        let mut config: Config = toml::from_str("").unwrap();
        config.reconciler.tick_secs = 0;
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str("").unwrap();
        config.reconciler.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str("").unwrap();
        config.mqtt.broker_port = 0;
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str("").unwrap();
        config.vacation.simulation_secs = 0;
        assert!(config.validate().is_err());
    }
}
