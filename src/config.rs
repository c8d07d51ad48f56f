//! Runtime configuration.
//!
//! Layers, lowest precedence first: built-in defaults, a TOML file
//! (`config/default.toml` when present, or an explicit `--config` path),
//! `WX__SECTION__KEY` environment variables, and finally the plain
//! `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER`/`DB_PASSWORD` variables.
//! The resulting [`AppConfig`] is passed explicitly to every component.

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{DEFAULT_BATCH_SIZE, DEFAULT_SOURCE_DIR, DEFAULT_SOURCE_EXTENSION};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use validator::Validate;

const DEFAULT_CONFIG_FILE: &str = "config/default";
const ENV_PREFIX: &str = "WX";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,

    #[serde(default)]
    #[validate(nested)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub user: String,
    pub password: String,
    /// Upper bound on idle connections kept for reuse
    #[validate(range(min = 1, max = 64))]
    pub pool_size: usize,
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
    /// 0 disables the server-side statement timeout
    pub statement_timeout_secs: u64,
    pub connect_retries: u32,
    pub retry_backoff_ms: u64,
    /// Rows per bulk insert statement
    #[validate(range(min = 1, max = 100000))]
    pub batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "weather".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            pool_size: 4,
            connect_timeout_secs: 10,
            statement_timeout_secs: 60,
            connect_retries: 3,
            retry_backoff_ms: 500,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("statement_timeout_secs", &self.statement_timeout_secs)
            .field("connect_retries", &self.connect_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestionConfig {
    pub source_dir: PathBuf,
    #[validate(length(min = 1))]
    pub extensions: Vec<String>,
    #[validate(range(min = 1))]
    pub max_workers: usize,
    pub use_mmap: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            extensions: vec![DEFAULT_SOURCE_EXTENSION.to_string()],
            max_workers: num_cpus::get(),
            use_mmap: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Re-apply the tenths conversion during aggregation (temperature / 10,
    /// precipitation / 100) on top of the one done at ingestion.
    pub legacy_scaling: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load from defaults, an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_source = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE)
                .required(false)
                .format(config::FileFormat::Toml),
        };

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;
        app_config.apply_database_env(|key| std::env::var(key).ok())?;
        app_config.validate()?;

        Ok(app_config)
    }

    /// Apply the `DB_*` variables used by existing deployments.
    pub fn apply_database_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = port
                .trim()
                .parse()
                .map_err(|_| ProcessingError::Config(format!("Invalid DB_PORT: '{}'", port)))?;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        Ok(())
    }
}
