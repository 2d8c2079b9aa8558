//! Persistent configuration for iosdrive.
//!
//! Stores user settings in `~/.iosdrive/config.json`: the default server URL,
//! the Appium executable used when a local server has to be launched, and
//! capabilities merged under every session the CLI starts.
//!
//! # Example
//!
//! ```no_run
//! use iosdrive_core::config::IosDriveConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = IosDriveConfig::load();
//!
//! if let Some(url) = &config.server_url {
//!     println!("Server: {url}");
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capabilities::Capabilities;

const CONFIG_DIRNAME: &str = ".iosdrive";
const CONFIG_FILENAME: &str = "config.json";

/// Returns `~/.iosdrive`, creating it if needed.
///
/// Returns `None` when the home directory cannot be determined.
pub fn iosdrive_dir() -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(CONFIG_DIRNAME);
    std::fs::create_dir_all(&dir).ok();
    Some(dir)
}

/// Persistent iosdrive configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IosDriveConfig {
    /// Address of an already running Appium server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Appium executable used when a local server is launched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appium_binary: Option<PathBuf>,

    /// Capabilities applied beneath the caller's own for new sessions.
    #[serde(default, skip_serializing_if = "Capabilities::is_empty")]
    pub default_capabilities: Capabilities,
}

impl IosDriveConfig {
    /// Load config from `~/.iosdrive/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        match iosdrive_dir() {
            Some(dir) => Self::load_from(&dir.join(CONFIG_FILENAME)),
            None => Self::default(),
        }
    }

    /// Load config from an explicit path, falling back to [`Default`].
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "ignoring unreadable config");
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save config to `~/.iosdrive/config.json`.
    pub fn save(&self) -> std::io::Result<()> {
        let dir = iosdrive_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "home directory not found")
        })?;
        self.save_to(&dir.join(CONFIG_FILENAME))
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("iosdrive_config_{}_{name}.json", std::process::id()))
    }

    #[test]
    fn default_config_is_empty() {
        let config = IosDriveConfig::default();
        assert!(config.server_url.is_none());
        assert!(config.appium_binary.is_none());
        assert!(config.default_capabilities.is_empty());
    }

    #[test]
    fn empty_fields_are_not_serialized() {
        let json = serde_json::to_string(&IosDriveConfig::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn deserialize_full_config() {
        let loaded: IosDriveConfig = serde_json::from_value(json!({
            "server_url": "http://127.0.0.1:4723",
            "appium_binary": "/opt/homebrew/bin/appium",
            "default_capabilities": {"appium:automationName": "XCUITest"}
        }))
        .unwrap();

        assert_eq!(loaded.server_url.as_deref(), Some("http://127.0.0.1:4723"));
        assert_eq!(
            loaded.appium_binary,
            Some(PathBuf::from("/opt/homebrew/bin/appium"))
        );
        assert_eq!(
            loaded.default_capabilities.get("appium:automationName"),
            Some(&json!("XCUITest"))
        );
    }

    #[test]
    fn save_and_load_from_path() {
        let path = temp_path("roundtrip");
        let config = IosDriveConfig {
            server_url: Some("http://10.0.0.5:4723/wd/hub".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = IosDriveConfig::load_from(&path);
        assert_eq!(loaded, config);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_from_invalid_file_returns_default() {
        let path = temp_path("invalid");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(IosDriveConfig::load_from(&path), IosDriveConfig::default());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_from_missing_file_returns_default() {
        let loaded = IosDriveConfig::load_from(Path::new("/nonexistent/iosdrive/config.json"));
        assert_eq!(loaded, IosDriveConfig::default());
    }
}
