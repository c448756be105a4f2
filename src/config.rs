use std::{fs, path::PathBuf};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use which::which;

use crate::{CkError, Result};

/// Default config cache expiry in seconds (5 requests / hr budget).
pub const DEFAULT_CACHE_EXPIRY_S: u64 = 60 * 12;

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Directory where session, notes and analytics data live
    pub data_dir: PathBuf,

    /// Developer mode: config fetches skip the cache expiry window
    pub developer_mode: bool,

    /// Path to the feature-flags document; defaults to flags.json in data_dir
    pub flags_source: Option<PathBuf>,

    /// Default editor command (falls back to $EDITOR and platform defaults)
    pub editor_command: Option<String>,

    /// User signed in automatically when no session exists
    #[serde(default)]
    pub auto_sign_in: Option<String>,
}

impl Config {
    /// Loads the configuration from the given path, or builds the default
    /// configuration when no path is given or the file does not exist yet.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) if p.exists() => {
                debug!("Loading configuration from {}", p.display());
                let content = fs::read_to_string(p)?;
                let config: Config = serde_json::from_str(&content)?;
                Ok(config)
            }
            Some(p) => Err(CkError::ConfigError {
                message: format!("Configuration file not found: {}", p.display()),
            }),
            None => Self::default_config(),
        }
    }

    /// Builds the default configuration under the platform project directory.
    pub fn default_config() -> Result<Self> {
        let dirs = ProjectDirs::from("io", "cloudkeep", "cloudkeep").ok_or_else(|| {
            CkError::ConfigError {
                message: "Could not determine a home directory for application data".to_string(),
            }
        })?;

        let config = Config {
            data_dir: dirs.data_dir().to_path_buf(),
            developer_mode: cfg!(debug_assertions),
            flags_source: None,
            editor_command: None,
            auto_sign_in: None,
        };
        info!("Using default configuration: data_dir={}", config.data_dir.display());
        Ok(config)
    }

    /// Ensures the data directory exists.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            debug!("Creating data directory: {}", self.data_dir.display());
            fs::create_dir_all(&self.data_dir).map_err(|_| CkError::DirectoryError {
                path: self.data_dir.clone(),
            })?;
        }
        Ok(())
    }

    /// Root directory of the note collection documents.
    pub fn notes_dir(&self) -> PathBuf {
        self.data_dir.join("notes")
    }

    /// Path the session document is persisted at.
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    /// Path of the feature-flags document the config fetch reads.
    pub fn flags_source(&self) -> PathBuf {
        self.flags_source
            .clone()
            .unwrap_or_else(|| self.data_dir.join("flags.json"))
    }

    /// Path the analytics sink appends to.
    pub fn analytics_path(&self) -> PathBuf {
        self.data_dir.join("analytics.jsonl")
    }

    /// Config cache expiry: zero in developer mode, twelve minutes otherwise.
    pub fn config_cache_ttl(&self) -> u64 {
        if self.developer_mode {
            0
        } else {
            DEFAULT_CACHE_EXPIRY_S
        }
    }

    // This method provides smart fallbacks when no editor is configured
    pub fn get_editor_command(&self) -> String {
        // First try the configured editor
        if let Some(editor) = &self.editor_command {
            return editor.clone();
        }

        // Then try environment variable
        if let Ok(editor) = std::env::var("EDITOR") {
            return editor;
        }

        // Fall back to platform defaults
        if cfg!(windows) {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "open -t".to_string()
        } else {
            // Try common Linux editors
            for editor in &["nano", "vim", "vi", "emacs"] {
                if which(editor).is_ok() {
                    return editor.to_string();
                }
            }
            "nano".to_string()
        }
    }
}
