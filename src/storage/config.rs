//! JSON Configuration Management
//!
//! Handles reading and writing the agent settings file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{AgentSettings, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dir};

/// Configuration service for managing agent settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AgentSettings,
}

impl ConfigService {
    /// Load the default config file (~/.taskpilot/config.json), creating it
    /// with defaults if missing
    pub fn new() -> AppResult<Self> {
        Self::open(config_path()?)
    }

    /// Load a config file, creating it with defaults if missing
    pub fn open(config_path: impl Into<PathBuf>) -> AppResult<Self> {
        let config_path = config_path.into();
        if let Some(parent) = config_path.parent() {
            ensure_dir(parent)?;
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AgentSettings::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AgentSettings> {
        let content = fs::read_to_string(path)?;
        let config: AgentSettings = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AgentSettings) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &AgentSettings {
        &self.config
    }

    /// Update the configuration with a partial update.
    ///
    /// An update that fails validation is rejected and leaves the current
    /// configuration untouched.
    pub fn update_config(&mut self, update: SettingsUpdate) -> AppResult<AgentSettings> {
        let mut candidate = self.config.clone();
        candidate.apply_update(update);
        candidate.validate().map_err(AppError::validation)?;
        Self::save_to_file(&self.config_path, &candidate)?;
        self.config = candidate;
        tracing::info!(path = %self.config_path.display(), "settings updated");
        Ok(self.config.clone())
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Reset configuration to defaults
    pub fn reset(&mut self) -> AppResult<()> {
        self.config = AgentSettings::default();
        self.save()?;
        Ok(())
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            config: AgentSettings::default(),
        }
    }
}
