//! Runtime configuration persisted through the settings store

use embassy_time::Duration;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::ingest::FieldPolicy;
use crate::settings::{SettingsError, SettingsStore};

/// Settings key the configuration blob is stored under
pub const CONFIG_KEY: &str = "wristos/config";

/// Upper bound for the encoded configuration
const CONFIG_BLOB_LEN: usize = 32;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How oversized notification fields are handled
    pub field_policy: FieldPolicy,
    /// Send battery status to the phone on every charge-state change
    pub report_battery: bool,
    pub periodic: PeriodicConfig,
}

/// Periods of the three timer-driven channels, in milliseconds
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicConfig {
    pub fast_ms: u32,
    pub second_ms: u32,
    pub slow_ms: u32,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            fast_ms: 100,
            second_ms: 1_000,
            slow_ms: 10_000,
        }
    }
}

impl PeriodicConfig {
    pub fn fast(&self) -> Duration {
        Duration::from_millis(self.fast_ms as u64)
    }

    pub fn second(&self) -> Duration {
        Duration::from_millis(self.second_ms as u64)
    }

    pub fn slow(&self) -> Duration {
        Duration::from_millis(self.slow_ms as u64)
    }

    fn is_valid(&self) -> bool {
        self.fast_ms > 0 && self.second_ms > 0 && self.slow_ms > 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            field_policy: FieldPolicy::Truncate,
            report_battery: true,
            periodic: PeriodicConfig::default(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to encode configuration: {0}")]
    Encode(postcard::Error),
    #[error("settings store error: {0}")]
    Settings(SettingsError),
}

impl Config {
    /// Load the stored configuration.
    ///
    /// Falls back to defaults when nothing is stored or the stored blob does
    /// not decode to a usable configuration.
    pub fn load<S: SettingsStore>(store: &S) -> Self {
        let mut buf = [0u8; CONFIG_BLOB_LEN];
        let len = match store.get(CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(SettingsError::NotFound) => {
                info!("No stored configuration, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read configuration: {}", e);
                return Self::default();
            }
        };

        match postcard::from_bytes::<Config>(&buf[..len]) {
            Ok(config) if config.periodic.is_valid() => config,
            Ok(_) => {
                warn!("Stored configuration has a zero period, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("Stored configuration is corrupt ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save<S: SettingsStore>(&self, store: &mut S) -> Result<(), ConfigError> {
        let mut buf = [0u8; CONFIG_BLOB_LEN];
        let blob = postcard::to_slice(self, &mut buf).map_err(ConfigError::Encode)?;
        store.set(CONFIG_KEY, blob).map_err(ConfigError::Settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn test_missing_config_uses_defaults() {
        let settings = MemorySettings::new();
        assert_eq!(Config::load(&settings), Config::default());
    }

    #[test]
    fn test_saved_config_is_loaded() {
        let mut settings = MemorySettings::new();
        let config = Config {
            field_policy: FieldPolicy::Reject,
            report_battery: false,
            periodic: PeriodicConfig {
                fast_ms: 250,
                ..PeriodicConfig::default()
            },
        };

        config.save(&mut settings).unwrap();

        assert_eq!(Config::load(&settings), config);
    }

    #[test]
    fn test_corrupt_config_uses_defaults() {
        let mut settings = MemorySettings::new();
        settings.set(CONFIG_KEY, &[9, 9]).unwrap();

        assert_eq!(Config::load(&settings), Config::default());
    }

    #[test]
    fn test_zero_period_config_uses_defaults() {
        let mut settings = MemorySettings::new();
        let config = Config {
            periodic: PeriodicConfig {
                second_ms: 0,
                ..PeriodicConfig::default()
            },
            ..Config::default()
        };
        config.save(&mut settings).unwrap();

        assert_eq!(Config::load(&settings), Config::default());
    }
}
