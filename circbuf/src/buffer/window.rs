// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Consumer-side view of one window of the ring.

use std::time::Duration;

use super::CircularStreamBuffer;

/// Read-only view of a contiguous run of unread bytes.
///
/// Returned by [`CircularStreamBuffer::get_window`] and handed back through
/// [`CircularStreamBuffer::consumed`], which takes it by value so the bytes
/// cannot be looked at once the producer may reuse them. The lifetime `'a` is
/// tied to the buffer that produced it.
///
/// A zero-length window is the end-of-stream marker; it is only returned
/// while the buffer is draining.
///
/// Dropping a window without passing it to `consumed()` gives it back
/// untouched: the read position does not move and the next `get_window()`
/// returns the same bytes.
///
/// # Examples
///
/// ```
/// # use circbuf::{BufferConfig, CircularStreamBuffer};
/// # fn main() -> Result<(), circbuf::Error> {
/// let buffer = CircularStreamBuffer::new(BufferConfig::new(4, 3, false))?;
/// buffer.queue(&b"abcdef"[..])?;
///
/// let window = buffer.get_window()?;
/// assert_eq!(window.data(), b"abcd");
/// buffer.consumed(window, 4)?;
/// # Ok(())
/// # }
/// ```
pub struct BufferWindow<'a> {
    buffer: &'a CircularStreamBuffer,
    offset: usize,
    len: usize,
    generation: u64,
    timestamp: Option<Duration>,
    /// Set once the window went back through `consumed()`.
    released: bool,
}

impl<'a> BufferWindow<'a> {
    pub(crate) fn new(
        buffer: &'a CircularStreamBuffer,
        offset: usize,
        len: usize,
        generation: u64,
        timestamp: Option<Duration>,
    ) -> Self {
        Self {
            buffer,
            offset,
            len,
            generation,
            timestamp,
            released: false,
        }
    }

    /// The window's bytes.
    pub fn data(&self) -> &[u8] {
        // SAFETY
        // The range lies between the read and write positions. The producer only
        // writes at or beyond the write position, and its compaction target ends
        // at or before the read position, so nothing writes here until this
        // window is consumed or dropped.
        unsafe { self.buffer.arena.slice(self.offset, self.len) }
    }

    /// Number of bytes in the window, at most the buffer's window size.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for the end-of-stream marker.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of the window within the arena.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Stream time of the first byte, if the producer supplied timestamps.
    ///
    /// The window carries no duration; the consumer learns it from the codec
    /// and reports it through [`CircularStreamBuffer::time_consumed`].
    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn belongs_to(&self, buffer: &CircularStreamBuffer) -> bool {
        std::ptr::eq(self.buffer, buffer)
    }

    pub(crate) fn mark_released(&mut self) {
        self.released = true;
    }
}

impl std::fmt::Debug for BufferWindow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferWindow")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("generation", &self.generation)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl Drop for BufferWindow<'_> {
    /// Hands an unconsumed window back without advancing the read position.
    fn drop(&mut self) {
        if !self.released {
            self.buffer.release_window(self.generation);
        }
    }
}
