use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::resolver::ReleaseChannel;

pub const SETTINGS_FILE: &str = "settings.json";

/// Global defaults, persisted at `<data_dir>/settings.json`.
///
/// Every field here can be overridden per instance; resolution happens at
/// launch time via `LaunchOptions::resolve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub memory_min_mb: u32,
    pub memory_max_mb: u32,
    pub window_width: u32,
    pub window_height: u32,
    pub java_path: Option<PathBuf>,
    pub java_args: Vec<String>,
    pub env_vars: HashMap<String, String>,
    pub pre_launch_hook: Option<String>,
    pub post_exit_hook: Option<String>,
    pub wrapper_command: Option<String>,
    /// Preferred release channel when resolving resource updates.
    pub release_channel: ReleaseChannel,
    /// Parallel download slots for install/repair operations.
    pub max_download_concurrency: usize,
    /// Persisted notifications older than this are purged at startup.
    pub notification_retention_days: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory_min_mb: 512,
            memory_max_mb: 4096,
            window_width: 854,
            window_height: 480,
            java_path: None,
            java_args: Vec::new(),
            env_vars: HashMap::new(),
            pre_launch_hook: None,
            post_exit_hook: None,
            wrapper_command: None,
            release_channel: ReleaseChannel::Release,
            max_download_concurrency: 8,
            notification_retention_days: 30,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Corrupt {}: {} — using defaults", SETTINGS_FILE, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }
}
