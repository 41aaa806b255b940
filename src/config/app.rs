//! Main application configuration
//!
//! Configuration loads from defaults, an optional TOML file, and finally
//! environment variable overrides, then validates as a whole.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub amqp: AmqpSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the health/status endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// AMQP connection settings for the external scorer transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpSettings {
    /// Whether the scorer transport connects at all. Disabled deployments
    /// cannot create external-scorer strategies.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
    /// Maximum connection attempts before startup fails
    pub max_retry_attempts: u32,
    /// Initial retry delay in milliseconds (doubles per attempt)
    pub retry_delay_ms: u64,
    /// How long one evaluation waits for a scorer reply, in seconds
    pub scorer_reply_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Interval between queue ticks in milliseconds
    pub tick_interval_ms: u64,
    /// Directory holding the strategy and queue definition files
    pub data_dir: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "rally-point".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for AmqpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            max_retry_attempts: 5,
            retry_delay_ms: 1000,
            scorer_reply_timeout_seconds: 15,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            data_dir: "data".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // AMQP settings
        if let Ok(enabled) = env::var("AMQP_ENABLED") {
            self.amqp.enabled = enabled
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_ENABLED value: {}", enabled))?;
        }
        if let Ok(host) = env::var("AMQP_HOST") {
            self.amqp.host = host;
        }
        if let Ok(port) = env::var("AMQP_PORT") {
            self.amqp.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_PORT value: {}", port))?;
        }
        if let Ok(username) = env::var("AMQP_USERNAME") {
            self.amqp.username = username;
        }
        if let Ok(password) = env::var("AMQP_PASSWORD") {
            self.amqp.password = password;
        }
        if let Ok(vhost) = env::var("AMQP_VHOST") {
            self.amqp.vhost = vhost;
        }
        if let Ok(retries) = env::var("AMQP_MAX_RETRY_ATTEMPTS") {
            self.amqp.max_retry_attempts = retries
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_MAX_RETRY_ATTEMPTS value: {}", retries))?;
        }
        if let Ok(delay) = env::var("AMQP_RETRY_DELAY_MS") {
            self.amqp.retry_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid AMQP_RETRY_DELAY_MS value: {}", delay))?;
        }
        if let Ok(timeout) = env::var("SCORER_REPLY_TIMEOUT_SECONDS") {
            self.amqp.scorer_reply_timeout_seconds = timeout.parse().map_err(|_| {
                anyhow!("Invalid SCORER_REPLY_TIMEOUT_SECONDS value: {}", timeout)
            })?;
        }

        // Matchmaking settings
        if let Ok(interval) = env::var("TICK_INTERVAL_MS") {
            self.matchmaking.tick_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid TICK_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(dir) = env::var("DATA_DIR") {
            self.matchmaking.data_dir = dir;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.matchmaking.tick_interval_ms)
    }

    /// Get scorer reply timeout as Duration
    pub fn scorer_reply_timeout(&self) -> Duration {
        Duration::from_secs(self.amqp.scorer_reply_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if config.amqp.enabled {
        if config.amqp.host.is_empty() {
            return Err(anyhow!("AMQP host cannot be empty"));
        }
        if config.amqp.port == 0 {
            return Err(anyhow!("AMQP port cannot be 0"));
        }
        if config.amqp.scorer_reply_timeout_seconds == 0 {
            return Err(anyhow!("Scorer reply timeout must be greater than 0"));
        }
    }

    if config.matchmaking.tick_interval_ms == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }
    if config.matchmaking.data_dir.is_empty() {
        return Err(anyhow!("Data directory cannot be empty"));
    }

    Ok(())
}
