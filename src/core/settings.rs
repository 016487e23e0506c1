//! Supervisor settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory name under the platform config directory
pub const CONFIG_DIR_NAME: &str = "tvlauncher";

/// Settings for the process supervisor and the launcher binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// How long to wait for a PID that was not assigned at spawn time (ms).
    ///
    /// A workaround for the spawn/exit race; tune per platform and load.
    pub pid_resolve_timeout_ms: u64,
    /// Enable debug logging
    pub debug_logging: bool,
    /// Custom location of the app catalog
    pub apps_file: Option<PathBuf>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            pid_resolve_timeout_ms: 50,
            debug_logging: false,
            apps_file: None,
        }
    }
}

impl SupervisorSettings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse settings file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read settings file {}", path.display()))
            }
        };
        settings.validate();
        Ok(settings)
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.pid_resolve_timeout_ms = self.pid_resolve_timeout_ms.clamp(1, 5000);
    }

    pub fn pid_resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.pid_resolve_timeout_ms)
    }

    /// Get the app catalog path, using default if not set
    pub fn get_apps_file(&self) -> PathBuf {
        self.apps_file.clone().unwrap_or_else(default_apps_file)
    }
}

/// Get the config directory
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

pub fn default_settings_file() -> PathBuf {
    config_directory().join("settings.json")
}

pub fn default_apps_file() -> PathBuf {
    config_directory().join("apps.json")
}
