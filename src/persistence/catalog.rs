//! App catalog - Read-only access to the launcher's JSON list of apps

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{AppConfig, ConfigId};

/// Load app configs from a JSON array.
///
/// A missing file is an empty catalog. Entries without an `id`, `name` or
/// `launchCommand` are skipped.
pub fn load_app_configs(path: &Path) -> Result<Vec<AppConfig>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No app catalog at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read app catalog {}", path.display()))
        }
    };

    let entries: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse app catalog {}", path.display()))?;

    let mut result = Vec::new();
    for entry in entries {
        match serde_json::from_value::<AppConfig>(entry.clone()) {
            Ok(config) if is_complete(&config) => result.push(config),
            Ok(_) => warn!("Skipping incomplete app config entry: {}", entry),
            Err(e) => warn!("Skipping invalid app config entry {}: {}", entry, e),
        }
    }

    debug!("Loaded {} app configs from {}", result.len(), path.display());
    Ok(result)
}

/// Find one config by id
pub fn find_app_config<'a>(configs: &'a [AppConfig], id: &ConfigId) -> Option<&'a AppConfig> {
    configs.iter().find(|c| &c.id == id)
}

fn is_complete(config: &AppConfig) -> bool {
    !config.id.as_str().is_empty()
        && !config.name.is_empty()
        && !config.launch_command.trim().is_empty()
}
