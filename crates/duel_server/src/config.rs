//! Server configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then the
//! process environment, then command-line overrides applied by the binary.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Telegram bot settings for result notifications.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token.
    bot_token: String,

    /// Web app opened by the "Play Again" button.
    #[serde(default)]
    mini_app_url: Option<String>,
}

impl TelegramConfig {
    /// Creates Telegram settings.
    pub fn new(bot_token: impl Into<String>, mini_app_url: Option<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            mini_app_url,
        }
    }
}

/// Runtime configuration for the server binary.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    port: u16,

    /// Seconds a concluded match stays readable before removal.
    #[serde(default = "default_cleanup_grace_secs")]
    cleanup_grace_secs: u64,

    /// Seconds between stats and cleanup sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    log_filter: String,

    /// Result notifications over Telegram; results are only logged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    telegram: Option<TelegramConfig>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cleanup_grace_secs() -> u64 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_log_filter() -> String {
    "info,duel_server=debug".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cleanup_grace_secs: default_cleanup_grace_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            log_filter: default_log_filter(),
            telegram: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads from `path` when given, defaults otherwise, then applies the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Applies `PORT`, `BOT_TOKEN` and `MINI_APP_URL` from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides read through `lookup`.
    #[instrument(skip_all)]
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid PORT {:?}: {}", port, e)))?;
            debug!(port = self.port, "Port taken from environment");
        }

        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            let mini_app_url = lookup("MINI_APP_URL")
                .or_else(|| self.telegram.as_ref().and_then(|t| t.mini_app_url.clone()));
            self.telegram = Some(TelegramConfig::new(token, mini_app_url));
            debug!("Telegram notifications enabled from environment");
        } else if let (Some(url), Some(telegram)) = (lookup("MINI_APP_URL"), self.telegram.as_mut()) {
            telegram.mini_app_url = Some(url);
        }

        Ok(self)
    }

    /// Overrides the bind address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Overrides the bind port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the cleanup grace period.
    pub fn with_cleanup_grace_secs(mut self, secs: u64) -> Self {
        self.cleanup_grace_secs = secs;
        self
    }

    /// Overrides the sweep interval.
    pub fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup_grace_secs == 0 {
            return Err(ConfigError::new("cleanup_grace_secs must be positive".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::new("sweep_interval_secs must be positive".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::new("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Grace period as a duration.
    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }

    /// Sweep interval as a duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(*config.port(), 3000);
        assert_eq!(config.cleanup_grace(), Duration::from_secs(5));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert!(config.telegram().is_none());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "port = 8080\ncleanup_grace_secs = 10").expect("write config");

        let config = ServerConfig::from_file(file.path()).expect("parse config");
        assert_eq!(*config.port(), 8080);
        assert_eq!(*config.cleanup_grace_secs(), 10);
        assert_eq!(config.host(), "127.0.0.1");
    }

    #[test]
    fn test_from_file_with_telegram() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[telegram]\nbot_token = \"abc\"\nmini_app_url = \"https://example.org/app\""
        )
        .expect("write config");

        let config = ServerConfig::from_file(file.path()).expect("parse config");
        let telegram = config.telegram().as_ref().expect("telegram section");
        assert_eq!(telegram.bot_token(), "abc");
        assert_eq!(telegram.mini_app_url().as_deref(), Some("https://example.org/app"));
    }

    #[test]
    fn test_from_file_errors() {
        let err = ServerConfig::from_file("/nonexistent/duel.toml").unwrap_err();
        assert!(err.message.starts_with("Failed to read config file"));

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "port = \"not a number\"").expect("write config");
        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(err.message.starts_with("Failed to parse config"));
        assert!(err.file.ends_with("config.rs"));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::default()
            .apply_env_from(env(&[
                ("PORT", "4100"),
                ("BOT_TOKEN", "token"),
                ("MINI_APP_URL", "https://example.org"),
            ]))
            .expect("valid env");
        assert_eq!(*config.port(), 4100);
        assert_eq!(
            config.telegram(),
            &Some(TelegramConfig::new("token", Some("https://example.org".into())))
        );
    }

    #[test]
    fn test_env_invalid_port() {
        let err = ServerConfig::default()
            .apply_env_from(env(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(err.message.contains("Invalid PORT"));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        assert!(ServerConfig::default().with_cleanup_grace_secs(0).validate().is_err());
        assert!(ServerConfig::default().with_sweep_interval_secs(0).validate().is_err());
    }

    #[test]
    fn test_toml_render_round_trips() {
        let config = ServerConfig::default().with_port(9000);
        let rendered = config.to_toml().expect("render");
        let parsed: ServerConfig = toml::from_str(&rendered).expect("parse rendered");
        assert_eq!(parsed, config);
    }
}
