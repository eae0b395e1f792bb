//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use globalshutdown_relay::{HttpOptions, Policy, StoreBackend};

/// Global configuration for globalshutdown
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub policy: PolicyConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Take the client address from `X-Forwarded-For` (behind a reverse proxy)
    pub trust_forwarded_for: bool,
    /// Stable origin-hash key; random per process when unset.
    /// A `${VAR}` reference to an unset variable is a config error.
    #[serde(deserialize_with = "deserialize_required_env_var")]
    pub origin_salt: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            trust_forwarded_for: false,
            origin_salt: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    DuckDb,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Database file for the duckdb backend (in-memory when unset)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    pub rate_limit: RateLimitConfig,
    pub expiry: ExpiryConfig,
    pub capacity: CapacityConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_per_origin: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_per_origin: globalshutdown_relay::policy::DEFAULT_MAX_PER_ORIGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: globalshutdown_relay::policy::DEFAULT_TTL.as_secs(),
            sweep_interval_secs: globalshutdown_relay::policy::DEFAULT_SWEEP_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: globalshutdown_relay::policy::DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server_url: String,
    pub poll_interval_secs: u64,
    pub id_file: PathBuf,
    /// Program and arguments; platform default when unset
    pub shutdown_command: Option<Vec<String>>,
    pub dry_run: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            poll_interval_secs: globalshutdown_agent::DEFAULT_POLL_INTERVAL.as_secs(),
            id_file: PathBuf::from("id.txt"),
            shutdown_command: None,
            dry_run: false,
        }
    }
}

/// Deserialize a string that may be an environment variable reference like ${VAR}.
///
/// The variable must be set: falling back silently would swap a configured
/// value for the default without anyone noticing.
fn deserialize_required_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    expand_env_var(&raw)
        .map(Some)
        .ok_or_else(|| {
            serde::de::Error::custom(format!("environment variable in {raw} is not set"))
        })
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl PolicyConfig {
    pub fn to_policy(self) -> Result<Policy> {
        let mut policy = Policy::unrestricted();
        if self.rate_limit.enabled {
            if self.rate_limit.max_per_origin == 0 {
                bail!("policy.rate_limit.max_per_origin must be at least 1");
            }
            policy = policy.with_rate_limit(self.rate_limit.max_per_origin);
        }
        if self.expiry.enabled {
            if self.expiry.ttl_secs == 0 || self.expiry.sweep_interval_secs == 0 {
                bail!("policy.expiry.ttl_secs and sweep_interval_secs must be positive");
            }
            policy = policy.with_expiry(
                Duration::from_secs(self.expiry.ttl_secs),
                Duration::from_secs(self.expiry.sweep_interval_secs),
            );
        }
        if self.capacity.enabled {
            if self.capacity.max_entries == 0 {
                bail!("policy.capacity.max_entries must be at least 1");
            }
            policy = policy.with_capacity(self.capacity.max_entries);
        }
        Ok(policy)
    }
}

impl StoreConfig {
    pub fn to_backend(&self) -> StoreBackend {
        match self.backend {
            BackendKind::Memory => StoreBackend::Memory,
            BackendKind::DuckDb => StoreBackend::DuckDb {
                path: self.path.clone(),
            },
        }
    }
}

impl ServerConfig {
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Result<Duration> {
        if self.poll_interval_secs == 0 {
            bail!("agent.poll_interval_secs must be positive");
        }
        Ok(Duration::from_secs(self.poll_interval_secs))
    }

    pub fn shutdown_argv(&self) -> Vec<String> {
        self.shutdown_command
            .clone()
            .unwrap_or_else(globalshutdown_agent::default_command)
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./globalshutdown.toml (current directory)
    /// 2. ~/.config/globalshutdown/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("globalshutdown.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "globalshutdown") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
