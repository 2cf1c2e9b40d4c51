//! Service settings.
//!
//! Later sources win: built-in defaults, then `config.toml`, then
//! `CODELORE__<SECTION>__<KEY>` environment variables. `DATABASE_URL` is
//! honoured on top of all of them.
//!
//! The loaded [`AppConfig`] is handed to the server as app data rather than
//! read from a global, so tests can build one with whatever limits they need.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Seconds to wait for queued karma notifications on shutdown
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            shutdown_grace_seconds: 5,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Overridden by DATABASE_URL when that is set
    pub url: String,
    pub max_connections: u32,
    /// Create missing tables from the entity definitions on boot
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/codelore".to_string(),
            max_connections: 10,
            create_schema: false,
        }
    }
}

/// Karma configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KarmaConfig {
    /// Credit approvers with the same points as the author they approve
    pub reward_approvers: bool,
    /// Ledger entries per page (default)
    pub history_limit: u64,
    pub max_history_limit: u64,
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            reward_approvers: true,
            history_limit: 20,
            max_history_limit: 100,
        }
    }
}

/// Comment thread configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    /// How long a cached first page is served
    pub cache_ttl_seconds: u64,
    /// Maximum number of posts with cached pages
    pub cache_capacity: u64,
    pub default_take: u64,
    pub max_take: u64,
    pub default_reply_take: u64,
    pub max_reply_take: u64,
    pub default_depth: u32,
    pub max_depth: u32,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 60,
            cache_capacity: 10_000,
            default_take: 10,
            max_take: 50,
            default_reply_take: 3,
            max_reply_take: 20,
            default_depth: 1,
            max_depth: 3,
        }
    }
}

/// Review queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub per_page: u64,
    pub max_per_page: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            per_page: 20,
            max_per_page: 100,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub karma: KarmaConfig,
    pub comments: CommentsConfig,
    pub approval: ApprovalConfig,
}

impl AppConfig {
    /// Loads `config.toml` from the working directory, if present.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config.toml")
    }

    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::new(path, FileFormat::Toml).required(false))
            // e.g., CODELORE__SERVER__BIND, CODELORE__KARMA__REWARD_APPROVERS
            .add_source(
                Environment::with_prefix("CODELORE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AppConfig = config.try_deserialize()?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        Ok(config)
    }
}
