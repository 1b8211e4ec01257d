//! Configuration loaded from `~/.chatline/chatline.toml`.
//!
//! Every field has a default; a missing or malformed file yields the
//! defaults. Command-line flags override individual values afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client settings for the chat shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatlineConfig {
    /// Server host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Nickname to register with; prompted for when absent.
    pub nickname: Option<String>,

    /// How long to wait for `NAME_OK` / `NAME_TAKEN` after `SET_NAME`.
    #[serde(default = "default_name_timeout_ms")]
    pub name_timeout_ms: u64,

    /// Largest inbound frame payload accepted, in bytes.
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: u32,

    /// Where received files are saved.
    /// Defaults to `~/Downloads/<nickname>`.
    pub download_dir: Option<PathBuf>,

    /// Prefix log lines with `HH:MM:SS`.
    #[serde(default)]
    pub show_timestamps: bool,
}

impl Default for ChatlineConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: None,
            name_timeout_ms: default_name_timeout_ms(),
            max_frame_len: default_max_frame_len(),
            download_dir: None,
            show_timestamps: false,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    5000
}

fn default_name_timeout_ms() -> u64 {
    5_000
}

fn default_max_frame_len() -> u32 {
    64 * 1024 * 1024
}

/// Default location of the config file.
pub fn default_config_path() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chatline")
        .join("chatline.toml")
}

impl ChatlineConfig {
    /// Load configuration from the default config file.
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn name_timeout(&self) -> Duration {
        Duration::from_millis(self.name_timeout_ms)
    }

    /// Directory for received files, given the confirmed nickname.
    pub fn download_dir_for(&self, nickname: &str) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs_next::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Downloads")
                .join(nickname)
        })
    }
}
