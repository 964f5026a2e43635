// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for circular stream buffer operations.
//!
//! Configuration errors surface from [`crate::CircularStreamBuffer::new`];
//! everything else is reported by the producer- or consumer-side calls.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when creating or driving a circular stream buffer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Variable-size mode needs at least three windows so that the tail of the
    /// arena can be copied to the front without touching unread data.
    #[error("At least 3 windows are required without fixed block size, got {num_windows}")]
    TooFewWindows {
        /// The rejected window count.
        num_windows: usize,
    },

    /// The buffer configuration is unusable (zero sizes, arithmetic overflow).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The consumer has given up on the stream; nothing queued will ever be read.
    #[error("Consumer aborted")]
    ConsumerAborted,

    /// In fixed block mode a window must be consumed in one piece.
    #[error("Fixed block window of {len} bytes consumed partially ({used} bytes)")]
    PartialBlock {
        /// Bytes reported as consumed.
        used: usize,
        /// Length of the window handed out.
        len: usize,
    },

    /// In fixed block mode a single chunk can never exceed the arena.
    #[error("Chunk of {len} bytes does not fit a {capacity} byte arena")]
    ChunkTooLarge {
        /// Length of the rejected chunk.
        len: usize,
        /// Arena capacity in bytes.
        capacity: usize,
    },

    /// A window is already held by the consumer; only one may be outstanding.
    #[error("A window is already outstanding")]
    WindowOutstanding,

    /// The window was not handed out by this buffer, or is no longer current.
    #[error("Window does not belong to this buffer")]
    ForeignWindow,

    /// The pluggable copy function rejected a chunk.
    #[error("Copy failed: {0}")]
    Copy(String),

    /// Failed to parse a JSON configuration.
    #[error("Json: {0}")]
    Json(#[from] serde_json::Error),
}
