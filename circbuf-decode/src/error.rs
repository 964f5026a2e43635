// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by a decode session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Buffer: {0}")]
    Buffer(#[from] circbuf::Error),

    /// The frame decoder failed; the session aborted its buffer.
    #[error("Decoder: {0}")]
    Decoder(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The decoder accepted a full window without consuming or producing anything.
    #[error("Decoder made no progress on a {len} byte window")]
    DecoderStalled { len: usize },

    /// Decoded frames could not be delivered.
    #[error("Frame sink closed")]
    SinkClosed,

    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn decode thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Decode thread panicked")]
    ThreadPanicked,

    #[error("Json: {0}")]
    Json(#[from] serde_json::Error),
}
