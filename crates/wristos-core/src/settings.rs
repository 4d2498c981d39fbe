//! Persistent key-value settings seam.
//!
//! On the watch this is backed by the flash settings partition. The core
//! only needs get/set/erase on small binary blobs.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    #[error("no value stored under that key")]
    NotFound,
    #[error("value needs a {needed} byte buffer")]
    BufferTooSmall { needed: usize },
    #[error("settings storage failure")]
    Storage,
}

/// Key-value storage for settings blobs
pub trait SettingsStore {
    /// Copy the value stored under `key` into `buf`, returning its length.
    fn get(&self, key: &str, buf: &mut [u8]) -> Result<usize, SettingsError>;

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), SettingsError>;

    /// Remove `key`. Erasing a missing key is not an error.
    fn erase(&mut self, key: &str) -> Result<(), SettingsError>;
}

/// RAM-only settings, for the simulator and tests
#[derive(Debug, Default, Clone)]
pub struct MemorySettings {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str, buf: &mut [u8]) -> Result<usize, SettingsError> {
        let value = self.entries.get(key).ok_or(SettingsError::NotFound)?;
        let target = buf
            .get_mut(..value.len())
            .ok_or(SettingsError::BufferTooSmall {
                needed: value.len(),
            })?;
        target.copy_from_slice(value);
        Ok(value.len())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), SettingsError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<(), SettingsError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_erase() {
        let mut settings = MemorySettings::new();
        let mut buf = [0u8; 8];

        assert_eq!(settings.get("k", &mut buf), Err(SettingsError::NotFound));

        settings.set("k", &[1, 2, 3]).unwrap();
        assert_eq!(settings.get("k", &mut buf), Ok(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);

        settings.erase("k").unwrap();
        settings.erase("k").unwrap();
        assert!(settings.is_empty());
    }

    #[test]
    fn test_small_buffer() {
        let mut settings = MemorySettings::new();
        settings.set("k", &[0; 10]).unwrap();

        assert_eq!(
            settings.get("k", &mut [0u8; 4]),
            Err(SettingsError::BufferTooSmall { needed: 10 })
        );
    }
}
