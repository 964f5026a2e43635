// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # circbuf - circular stream buffer
//!
//! A single-producer / single-consumer byte ring that decouples a thread
//! delivering compressed stream data in chunks of arbitrary size from a decoder
//! thread that wants fixed-size, contiguous input windows.
//!
//! ## Overview
//!
//! The producer calls [`CircularStreamBuffer::queue`] with whatever it has; the
//! consumer calls [`CircularStreamBuffer::get_window`], decodes as much of the
//! window as it can, and reports the bytes it actually used through
//! [`CircularStreamBuffer::consumed`]. The remainder is part of the next window.
//!
//! ### Key Concepts
//!
//! - **Window**: `window_size` contiguous unread bytes, the consumer's unit of work
//! - **Read-ahead**: a quarter window of slack kept beyond each window
//! - **Compaction**: when the producer reaches the end of the arena while the
//!   consumer holds no window, the unread bytes move to the front
//! - **Shift**: when the consumer does hold a window, the producer instead
//!   copies the unread tail to the front and keeps writing after the copy
//! - **Read reset**: the consumer later jumps from the tail onto that copy
//! - **Drain**: end of input; the consumer gets short windows, then an empty one
//! - **Abort**: the consumer gave up; the producer fails from then on
//!
//! ## Architecture
//!
//! ```text
//!  producer thread                               consumer thread
//!  ───────────────                               ───────────────
//!  queue(chunk) ──► ChunkCopier ──┐         ┌──► get_window() ─► BufferWindow
//!                                 ▼         │                        │
//!                 ┌─────────────────────────┴──┐                     │
//!                 │ arena  [..R#########W.....] │ ◄── consumed(w, n) ◄┘
//!                 └────────────────────────────┘
//!        waits on consumer_gate ◄──── force ──── after consume / abort
//!        force ──── producer_gate ────► waits for a full window / drain
//! ```
//!
//! ## Examples
//!
//! ### Pumping a stream through the buffer
//!
//! ```
//! use std::sync::Arc;
//! use circbuf::{BufferConfig, CircularStreamBuffer, StreamChunk};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), circbuf::Error> {
//! let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(1024, 3, false))?);
//!
//! let producer = {
//!     let buffer = buffer.clone();
//!     std::thread::spawn(move || -> Result<(), circbuf::Error> {
//!         let packet = [0x47u8; 188];
//!         for i in 0..100u64 {
//!             let chunk = StreamChunk::new(&packet)
//!                 .with_pts(Duration::from_millis(i * 10))
//!                 .with_duration(Duration::from_millis(10));
//!             buffer.queue(chunk)?;
//!         }
//!         buffer.drain(true);
//!         Ok(())
//!     })
//! };
//!
//! let mut total = 0;
//! loop {
//!     let window = buffer.get_window()?;
//!     if window.is_empty() {
//!         break;
//!     }
//!     // A decoder would stop at a frame boundary; this one takes everything.
//!     let used = window.len();
//!     buffer.consumed(window, used)?;
//!     total += used;
//! }
//! assert_eq!(total, 188 * 100);
//! producer.join().unwrap()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Fixed block mode
//!
//! With `fixed_block_size` the producer and consumer move whole blocks of
//! exactly `window_size` bytes, and partial consumption is an error:
//!
//! ```
//! use circbuf::{BufferConfig, CircularStreamBuffer, Error};
//!
//! # fn main() -> Result<(), circbuf::Error> {
//! let buffer = CircularStreamBuffer::new(BufferConfig::new(8, 2, true))?;
//! buffer.queue(&[1u8; 8][..])?;
//! let window = buffer.get_window()?;
//! assert!(matches!(buffer.consumed(window, 3), Err(Error::PartialBlock { used: 3, len: 8 })));
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - [`CircularStreamBuffer`] is `Send + Sync`; share it through an `Arc`
//! - One thread queues, one thread pulls windows; the buffer does not arbitrate
//!   between several producers or several consumers
//! - [`BufferWindow`] borrows the buffer and only one may be outstanding

mod buffer;
mod copy;
mod error;
mod rendezvous;
mod stats;

pub mod config;

pub use buffer::{CircularStreamBuffer, StreamChunk, window::BufferWindow};
pub use config::BufferConfig;
pub use copy::{ChunkCopier, RawCopy, SwapBytes16};
pub use error::{Error, Result};
pub use rendezvous::RendezvousGate;
pub use stats::{BufferPhase, BufferStats, FillDiagram};
