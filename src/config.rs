//! Configuration types, read from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the listener binds on `0.0.0.0`.
    pub port: u16,
    /// Upper bound on waiting for in-flight requests during graceful stop.
    pub shutdown_timeout: Duration,
    /// Public base URL used in notification links.
    pub base_url: String,
    /// Site name shown in notification subjects.
    pub site_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            shutdown_timeout: Duration::from_secs(30),
            base_url: "http://localhost:3000".to_string(),
            site_name: "ideaboard".to_string(),
        }
    }
}

impl ServerConfig {
    /// Build from `PORT`, `SERVER_SHUTDOWN_TIMEOUT_SECS`, `BASE_URL` and
    /// `SITE_NAME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = env_parse("PORT", defaults.port)?;
        Ok(Self {
            port,
            shutdown_timeout: Duration::from_secs(env_parse(
                "SERVER_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )?),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            site_name: std::env::var("SITE_NAME").unwrap_or(defaults.site_name),
        })
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of worker tasks consuming the queue.
    pub workers: usize,
    /// Maximum number of pending tasks before enqueue is rejected.
    pub capacity: usize,
    /// Grace period for draining pending tasks on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 10_000,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl WorkerConfig {
    /// Build from `WORKER_COUNT`, `WORKER_QUEUE_CAPACITY` and
    /// `WORKER_SHUTDOWN_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let workers: usize = env_parse("WORKER_COUNT", defaults.workers)?;
        let capacity: usize = env_parse("WORKER_QUEUE_CAPACITY", defaults.capacity)?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_COUNT".into(),
                message: "must be at least 1".into(),
            });
        }
        if capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_QUEUE_CAPACITY".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            workers,
            capacity,
            shutdown_timeout: Duration::from_secs(env_parse(
                "WORKER_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )?),
        })
    }
}

/// Build and runtime metadata reported in diagnostics.
#[derive(Debug, Clone)]
pub struct SystemSettings {
    pub version: String,
    pub build_time: String,
    pub compiler: String,
    pub environment: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: option_env!("BUILD_TIME").unwrap_or("N/A").to_string(),
            compiler: option_env!("BUILD_RUSTC").unwrap_or("rustc").to_string(),
            environment: "development".to_string(),
        }
    }
}

impl SystemSettings {
    /// Build metadata is baked in at compile time; the environment comes
    /// from `APP_ENV`.
    pub fn from_env() -> Self {
        Self {
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            ..Default::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Outbound email configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Sender address for notifications.
    pub noreply: String,
    /// Regex of addresses allowed to receive email. Empty disables the list.
    pub allowlist: String,
    /// Regex of addresses never sent to. Empty disables the list.
    pub denylist: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            noreply: "noreply@ideaboard.local".to_string(),
            allowlist: String::new(),
            denylist: String::new(),
        }
    }
}

impl EmailConfig {
    /// Build from `EMAIL_NOREPLY`, `EMAIL_ALLOWLIST` and `EMAIL_DENYLIST`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            noreply: std::env::var("EMAIL_NOREPLY").unwrap_or(defaults.noreply),
            allowlist: std::env::var("EMAIL_ALLOWLIST").unwrap_or_default(),
            denylist: std::env::var("EMAIL_DENYLIST").unwrap_or_default(),
        }
    }
}

/// All process configuration, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub email: EmailConfig,
    pub system: SystemSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            worker: WorkerConfig::from_env()?,
            email: EmailConfig::from_env(),
            system: SystemSettings::from_env(),
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("'{raw}': {e}"),
                })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.bind_addr(), "0.0.0.0:3000");
        assert_eq!(settings.worker.workers, 4);
        assert_eq!(settings.worker.capacity, 10_000);
        assert!(settings.email.allowlist.is_empty());
        assert!(!settings.system.is_production());
    }

    #[test]
    fn env_parse_falls_back_when_unset() {
        let value: u16 = env_parse("IDEABOARD_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
