use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "stdfi";
const CONFIG_FILE: &str = "config.json";

/// Head number PCR/HBR/SBR records use for the all-sites summary
pub const SUMMARY_HEAD: u8 = 255;

/// Indexing engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Head number reserved for the all-sites summary part counts
    #[serde(default = "default_summary_head")]
    pub summary_head: u8,

    /// Seal a scope left open at end of stream as a truncated extent.
    /// When false such scopes are dropped from the index.
    #[serde(default = "default_seal_unterminated_scopes")]
    pub seal_unterminated_scopes: bool,

    /// Emit a trace event every N records during a build (0 disables)
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

fn default_summary_head() -> u8 {
    SUMMARY_HEAD
}

fn default_seal_unterminated_scopes() -> bool {
    true
}

fn default_progress_every() -> u64 {
    0
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            summary_head: default_summary_head(),
            seal_unterminated_scopes: default_seal_unterminated_scopes(),
            progress_every: default_progress_every(),
        }
    }
}

impl IndexConfig {
    /// Load config from the user config directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_in(dirs::config_dir())
    }

    /// Load `stdfi/config.json` under a config directory, defaulting when absent
    pub fn load_in(config_dir: Option<PathBuf>) -> Result<Self> {
        match config_dir.map(config_path_in) {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: IndexConfig =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Path of the user-level config file, if the platform has a config directory
pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(config_path_in)
}

fn config_path_in(dir: PathBuf) -> PathBuf {
    dir.join(APP_NAME).join(CONFIG_FILE)
}
