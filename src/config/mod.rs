//! Configuration management for Stowaway

pub mod schema;

pub use schema::{Config, StoreBackend};

use crate::error::{StowawayError, StowawayResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "stowaway.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stowaway")
            .join("config.toml")
    }

    /// Walk up from `start` looking for a project-local config file
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> StowawayResult<Config> {
        self.load_merged(None).await
    }

    /// Load the global config with an optional local config merged on top
    pub async fn load_merged(&self, local: Option<&Path>) -> StowawayResult<Config> {
        let mut merged = if self.config_path.exists() {
            self.read_table(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            toml::Table::new()
        };

        if let Some(local) = local {
            let overlay = self.read_table(local).await?;
            merge_tables(&mut merged, overlay);
        }

        let source = local.unwrap_or(&self.config_path);
        let config: Config = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| StowawayError::ConfigInvalid {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate(source)?;
        Ok(config)
    }

    async fn read_table(&self, path: &Path) -> StowawayResult<toml::Table> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            StowawayError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| StowawayError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> StowawayResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            StowawayError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> StowawayResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StowawayError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively merge `overlay` into `base`; overlay scalars and arrays win
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(overlay_table) = value {
            if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
                merge_tables(base_table, overlay_table);
                continue;
            }
            base.insert(key, toml::Value::Table(overlay_table));
        } else {
            base.insert(key, value);
        }
    }
}
