//! Engine configuration.
//!
//! The front-end's settings store owns persistence; the engine only consumes
//! a validated snapshot of it at construction time.

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;
use crate::windows::{DEFAULT_WINDOW_LEN, PAGE_SIZE};

/// Default number of cached windows.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Settings consumed by the engine plus the display fields the front-end
/// stores alongside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of mapped windows kept alive at once.
    pub cache_capacity: usize,
    /// Length of a freshly mapped window in bytes.
    pub window_len: u64,
    /// Encoding used to decode line bytes.
    pub encoding: Encoding,

    // Display settings carried for the front-end; the engine ignores them.
    pub font_size: f32,
    pub tab_width: usize,
    pub theme: String,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            window_len: DEFAULT_WINDOW_LEN,
            encoding: Encoding::Utf8,
            font_size: 14.0,
            tab_width: 4,
            theme: "dark".to_string(),
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl EngineConfig {
    /// Clamps the engine-facing fields into their supported ranges: at least
    /// one cached window, and a window length that is a non-zero multiple of
    /// the page size.
    pub fn validated(mut self) -> Self {
        self.cache_capacity = self.cache_capacity.max(1);
        if self.window_len < PAGE_SIZE {
            self.window_len = PAGE_SIZE;
        } else {
            self.window_len -= self.window_len % PAGE_SIZE;
        }
        self.tab_width = self.tab_width.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.window_len, 16 * 1024 * 1024);
        assert_eq!(config.encoding, Encoding::Utf8);
    }

    #[test]
    fn test_validation_clamps() {
        let config = EngineConfig {
            cache_capacity: 0,
            window_len: 5000,
            tab_width: 0,
            ..EngineConfig::default()
        }
        .validated();

        assert_eq!(config.cache_capacity, 1);
        assert_eq!(config.window_len, 4096);
        assert_eq!(config.tab_width, 1);
    }

    #[test]
    fn test_validation_keeps_aligned_values() {
        let config = EngineConfig {
            window_len: 8 * 1024 * 1024,
            ..EngineConfig::default()
        }
        .validated();
        assert_eq!(config.window_len, 8 * 1024 * 1024);
    }
}
