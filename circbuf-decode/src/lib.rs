// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Decode-thread runner for the circular stream buffer.
//!
//! This crate wires a [`circbuf::CircularStreamBuffer`] between a pipeline's
//! push thread and a dedicated decode thread:
//!
//! - **DecodeSession**: owns the buffer and the decode thread; the caller pushes
//!   stream data into it and finally collects a [`DecodeSummary`]
//! - **FrameDecoder**: the opaque codec, fed one window at a time
//! - **FrameSink**: where decoded frames go (an `mpsc` sender works out of the box)
//! - **ThreadProperties**: name, stack size and real-time scheduling of the
//!   decode thread
//!
//! ## Data Flow
//!
//! ```text
//! push thread                     decode thread
//! ───────────                     ─────────────
//! DecodeSession::push ──► CircularStreamBuffer ──► FrameDecoder ──► FrameSink
//!                               ▲                     │
//!                               └──── consumed(n) ◄───┘
//! ```
//!
//! A decoder or sink error aborts the buffer: the push thread gets
//! [`circbuf::Error::ConsumerAborted`] on its next push and
//! [`DecodeSession::finish`] returns the error that caused it.

mod config;
mod decoder;
mod error;
mod runner;
mod session;
mod thread_props;

pub use config::SessionConfig;
pub use decoder::{DecodeOutcome, DecodedFrame, FrameDecoder, FrameSink, PassThroughDecoder};
pub use error::{Error, Result};
pub use runner::DecodeSummary;
pub use session::DecodeSession;
pub use thread_props::{DEFAULT_THREAD_NAME, PRIORITY_RANGE, Scheduling, ThreadProperties};
