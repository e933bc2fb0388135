//! Driver configuration
//!
//! Stored as TOML, by default in `~/.config/mech5/driver.toml`. Every field
//! is optional; a missing file means defaults.

use mech5_keypad::{DeviceConfig, KeyupPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which D-Bus bus the control surface is published on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    Session,
    System,
}

/// Complete driver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// When held macro keys are released
    #[serde(default)]
    pub keyup_policy: KeyupPolicy,
    /// Log every key report at info level
    #[serde(default)]
    pub verbose: bool,
    /// Name of the virtual input device
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default)]
    pub bus: BusKind,
    /// How often to look for newly plugged keypads
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_device_name() -> String {
    "Azio Levetron Mech5 Macro Keys".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            keyup_policy: KeyupPolicy::default(),
            verbose: false,
            device_name: default_device_name(),
            bus: BusKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl DriverConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mech5")
            .join("driver.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: DriverConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Settings handed to each attached device
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            keyup_policy: self.keyup_policy,
            verbose: self.verbose,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: DriverConfig = toml::from_str("").unwrap();
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.keyup_policy, KeyupPolicy::OnNextPress);
        assert_eq!(config.device_name, "Azio Levetron Mech5 Macro Keys");
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_file() {
        let config: DriverConfig = toml::from_str(
            r#"
keyup_policy = "on-last-release"
verbose = true
bus = "system"
"#,
        )
        .unwrap();
        assert_eq!(config.keyup_policy, KeyupPolicy::OnLastRelease);
        assert!(config.verbose);
        assert_eq!(config.bus, BusKind::System);
        assert_eq!(config.poll_interval_ms, 2000);

        let device = config.device_config();
        assert_eq!(device.keyup_policy, KeyupPolicy::OnLastRelease);
        assert!(device.verbose);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result: Result<DriverConfig, _> = toml::from_str("keyup_policy = \"never\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_serializes() {
        let toml_str = toml::to_string_pretty(&DriverConfig::default()).unwrap();
        assert!(toml_str.contains("keyup_policy = \"on-next-press\""));
        assert!(toml_str.contains("bus = \"session\""));
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let config = DriverConfig {
            poll_interval_ms: 0,
            ..DriverConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }
}
