use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::EngineConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    pub appwrite: AppwriteSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub sweep: SweepSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Redis URL, or `memory://` for a single-process in-memory store
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Optional namespace prepended to every key
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            key_prefix: None,
        }
    }
}

impl StoreSettings {
    pub fn is_memory(&self) -> bool {
        self.redis_url.starts_with("memory://")
    }
}

fn default_redis_url() -> String { "redis://127.0.0.1:6379".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteSettings {
    pub endpoint: String,
    pub api_key: String,
    pub project_id: String,
    pub database_id: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    #[serde(default = "default_profiles_collection")]
    pub profiles: String,
    #[serde(default = "default_subscriptions_collection")]
    pub subscriptions: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            profiles: default_profiles_collection(),
            subscriptions: default_subscriptions_collection(),
        }
    }
}

fn default_profiles_collection() -> String { "profiles".to_string() }
fn default_subscriptions_collection() -> String { "subscriptions".to_string() }

/// Resolver cache; 0 disables it
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_size")]
    pub size: u64,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            size: default_cache_size(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_size() -> u64 { 10_000 }
fn default_cache_ttl() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_pair_ttl")]
    pub pair_ttl_secs: u64,
    #[serde(default = "default_recent_cooldown")]
    pub recent_cooldown_secs: u64,
    #[serde(default = "default_recent_max_len")]
    pub recent_max_len: usize,
    #[serde(default = "default_true")]
    pub prefetch: bool,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            pair_ttl_secs: default_pair_ttl(),
            recent_cooldown_secs: default_recent_cooldown(),
            recent_max_len: default_recent_max_len(),
            prefetch: true,
        }
    }
}

impl From<&MatchingSettings> for EngineConfig {
    fn from(settings: &MatchingSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            prefetch: settings.prefetch,
            pair_ttl: Duration::from_secs(settings.pair_ttl_secs),
            recent_cooldown: Duration::from_secs(settings.recent_cooldown_secs),
            recent_max_partners: settings.recent_max_len.max(1),
        }
    }
}

fn default_max_attempts() -> usize { 50 }
fn default_pair_ttl() -> u64 { 24 * 60 * 60 }
fn default_recent_cooldown() -> u64 { 20 * 60 }
fn default_recent_max_len() -> usize { 100 }
fn default_true() -> bool { true }

#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sweep_interval(),
        }
    }
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_sweep_interval() -> u64 { 3 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with LUME__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Development overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., LUME__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("LUME")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("LUME")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply well-known environment variables on top of the layered config
///
/// `REDIS_URL` wins over `store.redis_url`; the Appwrite credentials can be
/// given with the `LUME_APPWRITE__*` single-underscore spelling used by
/// deployment manifests.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("store.redis_url", redis_url)?;
    }

    for key in ["endpoint", "api_key", "project_id", "database_id"] {
        let var = format!("LUME_APPWRITE__{}", key.to_uppercase());
        if let Ok(value) = env::var(&var) {
            builder = builder.set_override(format!("appwrite.{}", key), value)?;
        }
    }

    builder.build()
}
