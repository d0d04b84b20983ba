use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PerfdeskError, Result};

/// Top-level configuration for Perfdesk.
///
/// Loaded from `~/.perfdesk/config.toml` by default. Every section falls
/// back to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerfdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl PerfdeskConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PerfdeskConfig = toml::from_str(&content)?;
        config.store.index_rules()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration if the file exists. A missing file is `None`; a
    /// file that exists but does not parse is an error.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// JSON export of the store the CLI operates on.
    pub snapshot_path: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            snapshot_path: "~/.perfdesk/snapshot.json".to_string(),
        }
    }
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Declared server-side indexes as `"<collection>:<field>"`. Both sides
    /// may be nested paths, e.g. `"teams/eng:profile/level"`. Equality
    /// queries on any other field fail with an index error.
    pub indexes: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            indexes: vec![
                "employees:userId".to_string(),
                "goals:employeeId".to_string(),
                "feedbacks:employeeId".to_string(),
                "performanceMetrics:employeeId".to_string(),
                "notifications:userId".to_string(),
                "adminRatings:adminId".to_string(),
                "adminRatings:employeeId".to_string(),
            ],
        }
    }
}

impl StoreConfig {
    /// Split each index rule into `(collection, field)`.
    pub fn index_rules(&self) -> Result<Vec<(String, String)>> {
        self.indexes
            .iter()
            .map(|rule| match rule.split_once(':') {
                Some((collection, field))
                    if !collection.trim_matches('/').is_empty()
                        && !field.trim_matches('/').is_empty()
                        && !field.contains(':') =>
                {
                    Ok((collection.to_string(), field.to_string()))
                }
                _ => Err(PerfdeskError::Config(format!(
                    "index rule {rule:?} must look like \"collection:field\""
                ))),
            })
            .collect()
    }
}

/// Notification side-channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Emit notifications after primary writes.
    pub enabled: bool,
    /// Account role that receives feedback requests.
    pub admin_role: String,
    /// Feedback category prefix marking a request to admins.
    pub request_prefix: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_role: "admin".to_string(),
            request_prefix: "request-".to_string(),
        }
    }
}
