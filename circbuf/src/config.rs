// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Creation-time configuration for a circular stream buffer.
//!
//! A [`BufferConfig`] fixes the geometry of the arena for the whole lifetime of
//! a decode session. It can be built in code or loaded from JSON:
//!
//! ```
//! use circbuf::config::BufferConfig;
//!
//! # fn main() -> Result<(), circbuf::Error> {
//! let config = BufferConfig::from_json(r#"{"window-size": 4096, "num-windows": 4}"#)?;
//! assert_eq!(config.read_ahead(), 1024);
//! assert_eq!(config.capacity()?, 4 * 4096 + 2 * 1024);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Window count used when a configuration does not specify one.
pub const DEFAULT_NUM_WINDOWS: usize = 3;

/// Smallest window count accepted in variable (non fixed block) mode.
pub const MIN_VARIABLE_WINDOWS: usize = 3;

fn default_num_windows() -> usize {
    DEFAULT_NUM_WINDOWS
}

/// Geometry of a [`crate::CircularStreamBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BufferConfig {
    /// Bytes the consumer needs per pull, normally the codec's input buffer size.
    pub window_size: usize,

    /// Capacity multiplier. Must be at least 3 unless `fixed_block_size` is set.
    #[serde(default = "default_num_windows")]
    pub num_windows: usize,

    /// Disables splitting and compaction; producer and consumer move exactly
    /// one window at a time and the ring wraps only at the arena boundary.
    #[serde(default)]
    pub fixed_block_size: bool,
}

impl BufferConfig {
    /// Creates a configuration from its three parameters.
    pub fn new(window_size: usize, num_windows: usize, fixed_block_size: bool) -> Self {
        Self {
            window_size,
            num_windows,
            fixed_block_size,
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed or has unknown keys
    /// - any error returned by [`Self::validate`]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Extra slack kept beyond one window: a quarter window in variable mode,
    /// nothing in fixed block mode.
    pub fn read_ahead(&self) -> usize {
        if self.fixed_block_size {
            0
        } else {
            self.window_size / 4
        }
    }

    /// Total arena size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the size overflows `usize`.
    pub fn capacity(&self) -> Result<usize> {
        self.num_windows
            .checked_mul(self.window_size)
            .and_then(|windows| windows.checked_add(self.read_ahead() * 2))
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{} windows of {} bytes overflow the address space",
                    self.num_windows, self.window_size
                ))
            })
    }

    /// Checks that a buffer can be built from this configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for a zero window size or window count, or an
    ///   overflowing capacity
    /// - [`Error::TooFewWindows`] for fewer than [`MIN_VARIABLE_WINDOWS`]
    ///   windows in variable mode
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window size must be non-zero".into()));
        }
        if self.num_windows == 0 {
            return Err(Error::InvalidConfig("window count must be non-zero".into()));
        }
        if !self.fixed_block_size && self.num_windows < MIN_VARIABLE_WINDOWS {
            return Err(Error::TooFewWindows {
                num_windows: self.num_windows,
            });
        }
        self.capacity().map(|_| ())
    }
}
