// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

use circbuf::BufferConfig;
use serde::{Deserialize, Serialize};

use crate::{Result, ThreadProperties};

/// Everything a [`crate::DecodeSession`] is created from.
///
/// ```
/// use circbuf_decode::{Scheduling, SessionConfig};
///
/// # fn main() -> Result<(), circbuf_decode::Error> {
/// let config = SessionConfig::from_json(
///     r#"{
///         "buffer": {"window-size": 1536, "num-windows": 4},
///         "thread": {"scheduling": {"policy": "round-robin", "priority": 20}}
///     }"#,
/// )?;
/// assert_eq!(config.buffer.window_size, 1536);
/// assert_eq!(config.thread.scheduling, Scheduling::RoundRobin { priority: 20 });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SessionConfig {
    pub buffer: BufferConfig,
    #[serde(default)]
    pub thread: ThreadProperties,
}

impl SessionConfig {
    /// Creates a configuration with default thread properties.
    pub fn new(buffer: BufferConfig) -> Self {
        Self {
            buffer,
            thread: ThreadProperties::default(),
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] for malformed documents and any error
    /// [`Self::validate`] reports.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates both the buffer geometry and the thread properties.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Buffer`] or [`crate::Error::InvalidConfig`].
    pub fn validate(&self) -> Result<()> {
        self.buffer.validate()?;
        self.thread.validate()
    }
}
