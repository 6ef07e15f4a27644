//! Cross-Platform Path Utilities
//!
//! Resolves the agent's data directory (~/.taskpilot/) and the files in it.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the TaskPilot directory (~/.taskpilot/)
pub fn taskpilot_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".taskpilot"))
}

/// Get the config file path (~/.taskpilot/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(taskpilot_dir()?.join("config.json"))
}

/// Get the key-value storage file path (~/.taskpilot/storage.json)
pub fn storage_path() -> AppResult<PathBuf> {
    Ok(taskpilot_dir()?.join("storage.json"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the TaskPilot directory, creating if it doesn't exist
pub fn ensure_taskpilot_dir() -> AppResult<PathBuf> {
    let path = taskpilot_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}
