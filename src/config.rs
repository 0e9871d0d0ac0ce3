use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::db::SearchIndexMode;
use crate::logging::LogFormat;
use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Archive database settings
    pub database: DatabaseConfig,
    /// Import pipeline settings
    pub import: ImportConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Search server settings
    pub server: ServerConfig,
}

/// Archive database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file name inside the output directory
    pub file_name: String,
    /// `auto` or `off`
    pub search_index: String,
    /// Read connections held by the server
    pub max_connections: u32,
}

/// Import pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Messages per write transaction
    pub batch_size: usize,
    /// Media directory name inside the output directory
    pub media_dir_name: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file, rotated daily
    pub file_path: Option<String>,
    /// "json" or "text"
    pub format: String,
}

/// Search server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Maximum rows per search page
    pub search_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                file_name: "messages.db".to_string(),
                search_index: "auto".to_string(),
                max_connections: 4,
            },
            import: ImportConfig {
                batch_size: 10_000,
                media_dir_name: "media".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                search_limit: 200,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    ///
    /// Defaults, then `config/default`, `config/local` and `config` files
    /// (any supported format, all optional), then `SMS_ARCHIVE__SECTION__KEY`
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Like [`AppConfig::load`] with one extra, required file on top of the
    /// optional ones.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::build(Some(path))
    }

    fn build(extra: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| anyhow::anyhow!("Failed to serialize default configuration: {}", e))?;

        let mut builder = Config::builder()
            // Start with default values
            .add_source(defaults)
            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false));

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Add environment variables with prefix
            .add_source(
                Environment::with_prefix("SMS_ARCHIVE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database config
        if self.database.file_name.trim().is_empty() {
            return Err(anyhow::anyhow!("database.file_name cannot be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("max_connections must be greater than 0"));
        }
        self.search_index_mode()?;

        // Validate import config
        InputValidator::validate_batch_size(self.import.batch_size)?;
        if self.import.media_dir_name.trim().is_empty() {
            return Err(anyhow::anyhow!("import.media_dir_name cannot be empty"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }
        self.log_format()?;

        // Validate server config
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server.port must be greater than 0"));
        }
        if self.server.search_limit == 0 {
            return Err(anyhow::anyhow!("server.search_limit must be greater than 0"));
        }

        Ok(())
    }

    /// Parsed `database.search_index`
    pub fn search_index_mode(&self) -> Result<SearchIndexMode> {
        SearchIndexMode::parse(&self.database.search_index).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid search index mode: {}. Must be one of: [\"auto\", \"off\"]",
                self.database.search_index
            )
        })
    }

    /// Parsed `logging.format`
    pub fn log_format(&self) -> Result<LogFormat> {
        LogFormat::parse(&self.logging.format).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: [\"text\", \"json\"]",
                self.logging.format
            )
        })
    }
}
