use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::GroupMode;
use crate::error::{Error, Result};

/// Configuration for a checkpoint sorting run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Move files into place instead of copying them
    pub move_files: bool,

    /// Write a formatted metadata text file next to each sorted image
    pub write_sidecars: bool,

    /// Keep the source's subfolder structure inside each group folder
    pub preserve_structure: bool,

    /// Track the full checkpoint + LoRA grouping signature
    pub group_by_lora_stack: bool,

    /// Rename sorted files with sequential numbering
    pub rename_files: bool,

    /// Prefix for renamed files, e.g. "nova_skyrift"
    pub user_prefix: String,

    /// Directory for rotating log files, None to skip file logging
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            move_files: true,
            write_sidecars: true,
            preserve_structure: false,
            group_by_lora_stack: false,
            rename_files: false,
            user_prefix: String::new(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check the configuration for inconsistent settings
    pub fn validate(&self) -> Result<()> {
        if self.rename_files && self.user_prefix.is_empty() {
            return Err(Error::Configuration(
                "renaming requires a non-empty user prefix".to_string(),
            ));
        }
        if self
            .user_prefix
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*'))
        {
            return Err(Error::Configuration(format!(
                "user prefix '{}' contains filesystem-illegal characters",
                self.user_prefix
            )));
        }
        Ok(())
    }

    pub fn group_mode(&self) -> GroupMode {
        if self.group_by_lora_stack {
            GroupMode::ByCheckpointAndLoras
        } else {
            GroupMode::ByCheckpoint
        }
    }
}

// -- Tests --
