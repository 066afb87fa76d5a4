//! Configuration file support.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/setpace/config.toml`.
//! Every field has a default, so a partial (or missing) file is fine.

use crate::reward::RewardTable;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub rewards: RewardTable,

    #[serde(default)]
    pub timer: TimerConfig,

    #[serde(default)]
    pub surface: SurfaceConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    pub fn wal_dir(&self) -> PathBuf {
        self.data_dir.join("wal")
    }

    pub fn wal_path(&self) -> PathBuf {
        self.wal_dir().join("sessions.wal")
    }

    pub fn state_path(&self) -> PathBuf {
        self.wal_dir().join("state.json")
    }

    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join("sessions.csv")
    }
}

/// Clock and cue settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimerConfig {
    /// Milliseconds per engine tick; one tick is one counted second
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_cues_enabled")]
    pub cues_enabled: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            cues_enabled: default_cues_enabled(),
        }
    }
}

/// Secondary surface settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            keep_alive_ms: default_keep_alive_ms(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("setpace")
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_cues_enabled() -> bool {
    true
}

fn default_keep_alive_ms() -> u64 {
    2000
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("setpace")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        self.rewards.validate()?;
        if self.timer.tick_interval_ms == 0 {
            return Err(Error::Config("timer.tick_interval_ms must be non-zero".into()));
        }
        if self.surface.keep_alive_ms == 0 {
            return Err(Error::Config("surface.keep_alive_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timer.tick_interval_ms, 1000);
        assert!(config.timer.cues_enabled);
        assert_eq!(config.surface.keep_alive_ms, 2000);
        assert_eq!(config.rewards, RewardTable::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[rewards]
personal_best = 40

[timer]
cues_enabled = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rewards.personal_best, 40);
        assert_eq!(config.rewards.set_complete, 10);
        assert!(!config.timer.cues_enabled);
        assert_eq!(config.timer.tick_interval_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.data.data_dir = temp_dir.path().join("data");
        config.timer.tick_interval_ms = 250;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");

        std::fs::write(&path, "[timer]\ntick_interval_ms = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[rewards]\nexceeded_target = 1\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "[timer\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn test_data_paths() {
        let data = DataConfig {
            data_dir: PathBuf::from("/tmp/setpace"),
        };
        assert_eq!(data.wal_path(), PathBuf::from("/tmp/setpace/wal/sessions.wal"));
        assert_eq!(data.state_path(), PathBuf::from("/tmp/setpace/wal/state.json"));
        assert_eq!(data.csv_path(), PathBuf::from("/tmp/setpace/sessions.csv"));
    }
}
