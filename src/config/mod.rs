use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Age after which a successful entry is refetched on the next read
    pub stale_after_secs: u64,
    /// Refresh interval for polled resources (leads, telecallers, documents)
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the persisted session file; `None` keeps the session in memory
    pub storage_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("LENDFLOW_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("LENDFLOW_API_URL") {
            self.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("LENDFLOW_HTTP_TIMEOUT_SECS") {
            self.api.timeout_secs = v.parse().unwrap_or(self.api.timeout_secs);
        }
        if let Ok(v) = env::var("LENDFLOW_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        if let Ok(v) = env::var("LENDFLOW_CACHE_STALE_SECS") {
            self.cache.stale_after_secs = v.parse().unwrap_or(self.cache.stale_after_secs);
        }
        if let Ok(v) = env::var("LENDFLOW_POLL_INTERVAL_SECS") {
            self.cache.poll_interval_secs = v.parse().unwrap_or(self.cache.poll_interval_secs);
        }

        if let Some(dir) = default_storage_dir() {
            self.session.storage_dir = Some(dir);
        }

        self
    }

    /// Configuration for a backend at `base_url` with an in-memory session
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let mut config = Self::development();
        config.api.base_url = base_url.into().trim_end_matches('/').to_string();
        config
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.cache.stale_after_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.cache.poll_interval_secs)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8080".to_string(),
                timeout_secs: 30,
                enable_request_logging: true,
            },
            cache: CacheConfig {
                stale_after_secs: 30,
                poll_interval_secs: 30,
            },
            session: SessionConfig { storage_dir: None },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging-api.lendflow.example".to_string(),
                timeout_secs: 20,
                enable_request_logging: true,
            },
            cache: CacheConfig {
                stale_after_secs: 30,
                poll_interval_secs: 30,
            },
            session: SessionConfig { storage_dir: None },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://api.lendflow.example".to_string(),
                timeout_secs: 15,
                enable_request_logging: false,
            },
            cache: CacheConfig {
                stale_after_secs: 60,
                poll_interval_secs: 30,
            },
            session: SessionConfig { storage_dir: None },
        }
    }
}

/// `LENDFLOW_CONFIG_DIR`, falling back to `$HOME/.config/lendflow`
pub fn default_storage_dir() -> Option<PathBuf> {
    if let Ok(custom_dir) = env::var("LENDFLOW_CONFIG_DIR") {
        return Some(PathBuf::from(custom_dir));
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join("lendflow"))
}

// Process-wide default used by the CLI; library types take a config explicitly
pub static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::from_env);

pub fn config() -> &'static ClientConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = ClientConfig::development();
        assert_eq!(config.stale_after(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert!(config.session.storage_dir.is_none());
    }

    #[test]
    fn test_default_production_config() {
        let config = ClientConfig::production();
        assert!(!config.api.enable_request_logging);
        assert_eq!(config.stale_after(), Duration::from_secs(60));
        assert!(config.api.base_url.starts_with("https://"));
    }

    #[test]
    fn test_for_base_url_trims_trailing_slash() {
        let config = ClientConfig::for_base_url("http://127.0.0.1:4000/");
        assert_eq!(config.api.base_url, "http://127.0.0.1:4000");
        assert_eq!(config.environment, Environment::Development);
    }
}
