use std::path::Path;

use serde::{Deserialize, Serialize};

/// Main configuration structure for skycut
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub uws: UwsConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub signing: SigningConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, crate::Error> {
        use crate::Error;

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, crate::Error> {
        // Try to load from SKYCUT_CONFIG env var first
        if let Ok(config_path) = std::env::var("SKYCUT_CONFIG") {
            return Self::load(&config_path);
        }

        // Try default locations
        let default_paths = ["./config/skycut.toml", "/etc/skycut/config.toml"];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        use crate::Error;

        if self.server.port == 0 {
            return Err(Error::Config("Invalid server port".to_string()));
        }

        if self.database.pool_size == 0 {
            return Err(Error::Config("Database pool size must be > 0".to_string()));
        }

        if let Some(duration) = self.uws.execution_duration {
            if duration <= 0 {
                return Err(Error::Config(
                    "Default execution duration must be > 0".to_string(),
                ));
            }
        }

        if self.uws.lifetime <= 0 {
            return Err(Error::Config("Job lifetime must be > 0".to_string()));
        }

        if self.uws.wait_timeout < 0 || self.uws.sync_timeout < 0 {
            return Err(Error::Config("Timeouts must not be negative".to_string()));
        }

        if self.signing.url_lifetime <= 0 {
            return Err(Error::Config("Signed URL lifetime must be > 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL for the UWS database
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Password, injected into the URL when present.
    ///
    /// Kept separate from the URL so the URL can be logged.
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            password: None,
            pool_size: default_pool_size(),
        }
    }
}

/// Settings for the UWS job lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UwsConfig {
    /// Default per-job execution duration cap in seconds; `None` means no
    /// limit
    #[serde(default = "default_execution_duration")]
    pub execution_duration: Option<i64>,

    /// Default offset in seconds from creation to destruction time
    #[serde(default = "default_lifetime")]
    pub lifetime: i64,

    /// Maximum number of seconds a long poll may block
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout: i64,

    /// Maximum number of seconds the sync facade waits for completion
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout: i64,
}

impl Default for UwsConfig {
    fn default() -> Self {
        Self {
            execution_duration: default_execution_duration(),
            lifetime: default_lifetime(),
            wait_timeout: default_wait_timeout(),
            sync_timeout: default_sync_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Connection URL for the work queue transport
    #[serde(default = "default_queue_url")]
    pub url: String,

    /// Name of the single backend actor jobs are submitted to
    #[serde(default = "default_actor")]
    pub actor: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: default_queue_url(),
            actor: default_actor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Public base URL under which signed result URLs are served
    #[serde(default = "default_signing_base_url")]
    pub base_url: String,

    /// Identity recorded in signed URLs
    #[serde(default = "default_service_account")]
    pub service_account: String,

    /// HMAC key material for URL signatures
    #[serde(default)]
    pub secret: String,

    /// Signed URL lifetime in seconds
    #[serde(default = "default_url_lifetime")]
    pub url_lifetime: i64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            base_url: default_signing_base_url(),
            service_account: default_service_account(),
            secret: String::new(),
            url_lifetime: default_url_lifetime(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON-formatted log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "postgres://skycut@localhost/skycut".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_execution_duration() -> Option<i64> {
    Some(600)
}

fn default_lifetime() -> i64 {
    24 * 60 * 60
}

fn default_wait_timeout() -> i64 {
    60
}

fn default_sync_timeout() -> i64 {
    60
}

fn default_queue_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_actor() -> String {
    "cutout".to_string()
}

fn default_signing_base_url() -> String {
    "https://example.com".to_string()
}

fn default_service_account() -> String {
    "skycut@localhost".to_string()
}

fn default_url_lifetime() -> i64 {
    15 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.uws.execution_duration, Some(600));
        assert_eq!(config.uws.lifetime, 24 * 60 * 60);
        assert_eq!(config.signing.url_lifetime, 15 * 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "postgres://uws@db.example.com/uws"
            pool_size = 10

            [uws]
            sync_timeout = 45
            "#,
        )
        .unwrap();
        assert_eq!(config.database.url, "postgres://uws@db.example.com/uws");
        assert_eq!(config.database.pool_size, 10);
        assert_eq!(config.uws.sync_timeout, 45);
        // Unspecified sections fall back to defaults.
        assert_eq!(config.uws.wait_timeout, 60);
        assert_eq!(config.queue.actor, "cutout");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.uws.lifetime = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.uws.execution_duration = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.database.pool_size = 0;
        assert!(config.validate().is_err());
    }
}
