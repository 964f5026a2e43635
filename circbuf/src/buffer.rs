// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Single-producer / single-consumer circular byte-stream buffer.
//!
//! The producer queues arbitrary byte chunks; the consumer pulls windows of at
//! least `window_size` contiguous bytes (fewer only while draining) and reports
//! how many it actually used. Both sides block on a [`RendezvousGate`] when the
//! other side has to move first.
//!
//! # Key Types
//!
//! - [`CircularStreamBuffer`]: the ring itself
//! - [`BufferWindow`]: a borrowed view of one window, handed back via `consumed()`
//! - [`StreamChunk`]: producer input with optional timing metadata

pub mod window;

mod arena;
mod state;

use std::{
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use self::{arena::Arena, state::RingState, window::BufferWindow};
use crate::{
    BufferConfig, BufferPhase, BufferStats, ChunkCopier, Error, FillDiagram, RawCopy,
    RendezvousGate, Result,
};

/// Width of the fill diagram logged when display is enabled.
const DISPLAY_COLUMNS: usize = 64;

/// Producer input: a byte range with optional stream timing.
///
/// Missing timing is "unknown". An unknown duration makes the buffer's
/// remaining-duration estimate unknown from then on.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamChunk<'a> {
    /// The bytes to queue.
    pub data: &'a [u8],
    /// Stream time of the first byte.
    pub pts: Option<Duration>,
    /// Playback duration the bytes represent.
    pub duration: Option<Duration>,
}

impl<'a> StreamChunk<'a> {
    /// Creates a chunk without timing information.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pts: None,
            duration: None,
        }
    }

    /// Sets the presentation timestamp.
    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Sets the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl<'a> From<&'a [u8]> for StreamChunk<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Vec<u8>> for StreamChunk<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::new(data.as_slice())
    }
}

/// Circular byte-stream buffer decoupling a producer thread from a consumer
/// thread that needs fixed-size windows.
///
/// Share it between the two threads behind an [`std::sync::Arc`]. Exactly one
/// thread may act as producer (`queue`) and one as consumer (`get_window`,
/// `consumed`, `time_consumed`); `drain`, `consumer_aborted` and the
/// introspection methods may be called from anywhere.
///
/// # Shutdown
///
/// A producer blocked in [`Self::queue`] only returns once the consumer frees
/// space or calls [`Self::consumer_aborted`]; a consumer blocked in
/// [`Self::get_window`] only returns once data arrives or [`Self::drain`] is
/// enabled. Always drain (and, if the consumer stops early, abort) before
/// giving up on a session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use circbuf::{BufferConfig, CircularStreamBuffer};
///
/// # fn main() -> Result<(), circbuf::Error> {
/// let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(4096, 4, false))?);
///
/// let producer = {
///     let buffer = buffer.clone();
///     std::thread::spawn(move || -> Result<(), circbuf::Error> {
///         buffer.queue(&vec![0u8; 10_000])?;
///         buffer.drain(true);
///         Ok(())
///     })
/// };
///
/// let mut total = 0;
/// loop {
///     let window = buffer.get_window()?;
///     if window.is_empty() {
///         break;
///     }
///     let used = window.len();
///     buffer.consumed(window, used)?;
///     total += used;
/// }
/// assert_eq!(total, 10_000);
/// producer.join().unwrap()?;
/// # Ok(())
/// # }
/// ```
pub struct CircularStreamBuffer {
    id: Uuid,
    config: BufferConfig,
    arena: Arena,
    state: Mutex<RingState>,
    /// Consumer waits here; the producer releases it when a window is ready.
    producer_gate: RendezvousGate,
    /// Producer waits here; the consumer releases it when space frees up.
    consumer_gate: RendezvousGate,
    copier: Box<dyn ChunkCopier>,
    display: AtomicBool,
}

impl CircularStreamBuffer {
    /// Creates a buffer that copies queued bytes verbatim.
    ///
    /// # Errors
    ///
    /// - [`Error::TooFewWindows`] if fewer than 3 windows are requested without
    ///   fixed block size
    /// - [`Error::InvalidConfig`] for zero sizes or an overflowing capacity
    pub fn new(config: BufferConfig) -> Result<Self> {
        Self::with_copier(config, RawCopy)
    }

    /// Creates a buffer that moves queued bytes through `copier`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    ///
    /// # Examples
    ///
    /// ```
    /// use circbuf::{BufferConfig, CircularStreamBuffer, SwapBytes16};
    ///
    /// # fn main() -> Result<(), circbuf::Error> {
    /// let buffer = CircularStreamBuffer::with_copier(BufferConfig::new(2, 3, false), SwapBytes16)?;
    /// buffer.queue(&[1u8, 2, 3, 4][..])?;
    /// let window = buffer.get_window()?;
    /// assert_eq!(window.data(), &[2, 1]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_copier(config: BufferConfig, copier: impl ChunkCopier + 'static) -> Result<Self> {
        config.validate()?;
        let state = RingState::new(&config)?;
        let arena = Arena::new(config.capacity()?);
        let id = Uuid::new_v4();
        debug!(
            %id,
            window_size = config.window_size,
            num_windows = config.num_windows,
            fixed_block_size = config.fixed_block_size,
            capacity = arena.len(),
            "Created circular buffer"
        );
        Ok(Self {
            id,
            config,
            arena,
            state: Mutex::new(state),
            producer_gate: RendezvousGate::unbounded(),
            consumer_gate: RendezvousGate::unbounded(),
            copier: Box::new(copier),
            display: AtomicBool::new(false),
        })
    }

    /// Queues a chunk of bytes, blocking while there is no room for it.
    ///
    /// Chunks that do not fit are split: whatever fits is written at once and
    /// the rest waits for the consumer. When the end of the arena is reached
    /// the producer first tries to make room instead of blocking: with no
    /// window outstanding it moves the unread bytes to the front, otherwise,
    /// once the consumer has moved past the first window, it copies the unread
    /// tail to the front and continues behind the copy. In fixed block mode
    /// chunks are only split at the arena end.
    ///
    /// Zero-length chunks succeed without touching the buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::ConsumerAborted`] if the consumer has aborted, before or while
    ///   this call was blocked
    /// - [`Error::ChunkTooLarge`] in fixed block mode for a chunk larger than
    ///   the arena
    /// - [`Error::Copy`] if the copy function fails; bytes written by earlier
    ///   pieces of the same chunk stay queued
    pub fn queue<'c>(&self, chunk: impl Into<StreamChunk<'c>>) -> Result<()> {
        let chunk = chunk.into();
        let granularity = self.copier.granularity().max(1);
        if self.config.fixed_block_size && chunk.data.len() > self.arena.len() {
            return Err(Error::ChunkTooLarge {
                len: chunk.data.len(),
                capacity: self.arena.len(),
            });
        }

        if self.lock_state().consumer_aborted {
            return Err(Error::ConsumerAborted);
        }
        let mut remaining = chunk.data;
        if remaining.is_empty() {
            return Ok(());
        }

        let mut first_piece = true;
        loop {
            self.consumer_gate.reset();
            let mut state = self.lock_state();
            if state.consumer_aborted {
                return Err(Error::ConsumerAborted);
            }

            if state.write_space() < remaining.len()
                && let Some(len) = state.plan_compaction()
            {
                // SAFETY
                // No window is outstanding and the state lock is held, so the
                // consumer cannot look at the arena until the move is done.
                unsafe { self.arena.move_to_front(state.read_pos, len) };
                debug!(id = %self.id, from = state.read_pos, len, "Compacted unread bytes to front");
                state.apply_compaction();
                continue;
            }

            if state.write_space() < remaining.len()
                && let Some(shift) = state.plan_shift()
            {
                // SAFETY
                // The copy target ends at or before the read position and the source
                // is unread tail data, so neither range is written by the consumer,
                // and the consumer does not read the front until the read reset.
                unsafe { self.arena.copy_to_front(shift.src, shift.len) };
                state.apply_shift(shift);
                debug!(id = %self.id, src = shift.src, len = shift.len, "Shifted tail to front");
                continue;
            }

            let len = state.next_write_len(remaining.len(), granularity);
            if len == 0 {
                state.pending = remaining.len();
                state.pending_granularity = granularity;
                state.counters.producer_waits += 1;
                trace!(
                    id = %self.id,
                    needed = state.bytes_needed(),
                    space = state.write_space(),
                    "Producer waiting for space"
                );
                drop(state);
                // Nothing more arrives until the consumer moves, so let it
                // look at what is already there.
                self.producer_gate.force();
                self.consumer_gate.meet();
                continue;
            }

            let offset = state.write_pos;
            drop(state);

            let (piece, rest) = remaining.split_at(len);
            // SAFETY
            // [offset, offset + len) is write space: the consumer never reads past
            // the write position and only this thread moves it.
            let dst = unsafe { self.arena.slice_mut(offset, len) };
            self.copier.copy_into(dst, piece)?;

            let mut state = self.lock_state();
            state.commit_write(len);
            if first_piece {
                if state.timestamp.is_none() {
                    state.timestamp = chunk.pts;
                }
                state.duration = state.duration.zip(chunk.duration).map(|(a, b)| a + b);
                first_piece = false;
            }
            let window_ready = state.data_size >= state.window_threshold();
            trace!(id = %self.id, len, data_size = state.data_size, "Queued");
            self.display_state(&state);
            drop(state);

            if window_ready {
                self.producer_gate.force();
            }
            if rest.is_empty() {
                return Ok(());
            }
            remaining = rest;
        }
    }

    /// Returns the next window, blocking until a full window is available.
    ///
    /// While draining the call never blocks: it returns whatever is left, and a
    /// zero-length window once everything has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WindowOutstanding`] if the previous window has not been
    /// consumed or dropped.
    pub fn get_window(&self) -> Result<BufferWindow<'_>> {
        loop {
            self.producer_gate.reset();
            let mut state = self.lock_state();
            if state.outstanding.is_some() {
                return Err(Error::WindowOutstanding);
            }

            if state.reset_read_pointer() {
                debug!(id = %self.id, read_pos = state.read_pos, "Read position reset to front");
                if state.producer_may_proceed() {
                    self.consumer_gate.force();
                }
            }

            let available = state.contiguous_available();
            if available >= state.window_size() || state.draining {
                let len = available.min(state.window_size());
                if len == 0 {
                    state.drained = true;
                    debug!(id = %self.id, "Drained");
                }
                state.generation += 1;
                let generation = state.generation;
                state.outstanding = Some(generation);
                trace!(id = %self.id, offset = state.read_pos, len, "Window");
                return Ok(BufferWindow::new(
                    self,
                    state.read_pos,
                    len,
                    generation,
                    state.timestamp,
                ));
            }

            state.counters.consumer_waits += 1;
            trace!(id = %self.id, available, "Consumer waiting for data");
            drop(state);
            self.producer_gate.meet();
        }
    }

    /// Hands a window back, advancing the read position by `bytes_used`.
    ///
    /// Reports larger than the window are clamped to its length with a warning.
    ///
    /// # Errors
    ///
    /// - [`Error::PartialBlock`] in fixed block mode when `bytes_used` differs
    ///   from the window length; the read position does not move
    /// - [`Error::ForeignWindow`] if the window came from another buffer
    pub fn consumed(&self, mut window: BufferWindow<'_>, bytes_used: usize) -> Result<()> {
        if !window.belongs_to(self) {
            return Err(Error::ForeignWindow);
        }
        window.mark_released();

        let mut state = self.lock_state();
        if state.outstanding != Some(window.generation()) {
            return Err(Error::ForeignWindow);
        }
        state.outstanding = None;

        let len = window.len();
        if self.config.fixed_block_size && bytes_used != len {
            error!(id = %self.id, used = bytes_used, len, "Partial consumption of a fixed block");
            return Err(Error::PartialBlock {
                used: bytes_used,
                len,
            });
        }
        let used = if bytes_used > len {
            warn!(
                id = %self.id,
                used = bytes_used,
                len,
                "Consumer reported more bytes than the window held, clamping"
            );
            len
        } else {
            bytes_used
        };

        state.commit_read(used);
        trace!(id = %self.id, used, data_size = state.data_size, "Consumed");
        self.display_state(&state);
        let wake_producer = state.producer_may_proceed();
        drop(state);

        if wake_producer {
            self.consumer_gate.force();
        }
        Ok(())
    }

    /// Advances the stream timestamp by `duration` and subtracts it from the
    /// remaining known duration.
    ///
    /// `None` means the consumer could not measure the time; the remaining
    /// duration becomes unknown for good and the timestamp stays put.
    pub fn time_consumed(&self, duration: Option<Duration>) {
        let mut state = self.lock_state();
        match duration {
            Some(duration) => {
                state.timestamp = state.timestamp.map(|ts| ts + duration);
                state.duration = state.duration.map(|d| d.saturating_sub(duration));
            }
            None => state.duration = None,
        }
    }

    /// Enables or disables draining.
    ///
    /// Enabling wakes a consumer blocked in [`Self::get_window`] so it picks up
    /// the remaining bytes and then the zero-length end-of-stream window.
    /// Disabling returns a drained buffer to normal operation.
    pub fn drain(&self, on: bool) {
        let mut state = self.lock_state();
        state.draining = on;
        if !on {
            state.drained = false;
        }
        drop(state);
        debug!(id = %self.id, on, "Drain");
        if on {
            self.producer_gate.force();
        }
    }

    /// Latches the buffer into the aborted state.
    ///
    /// A producer blocked in [`Self::queue`] wakes up and fails, as does every
    /// later call to `queue`.
    pub fn consumer_aborted(&self) {
        self.lock_state().consumer_aborted = true;
        error!(id = %self.id, "Consumer aborted");
        self.consumer_gate.force();
    }

    /// Enables logging of a fill diagram after every queue and consume.
    pub fn set_display(&self, on: bool) {
        self.display.store(on, Ordering::Relaxed);
    }

    /// Session identifier used in log output.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Configuration the buffer was created with.
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Bytes per full window.
    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    /// Slack kept beyond one window.
    pub fn read_ahead(&self) -> usize {
        self.config.read_ahead()
    }

    /// Arena size in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Whether the buffer runs in fixed block mode.
    pub fn is_fixed_block(&self) -> bool {
        self.config.fixed_block_size
    }

    /// Bytes queued and not yet consumed.
    pub fn data_size(&self) -> usize {
        self.lock_state().data_size
    }

    /// Bytes the producer could write right now without compacting.
    pub fn write_space(&self) -> usize {
        self.lock_state().write_space()
    }

    /// Returns `true` if no unread bytes are queued.
    pub fn is_empty(&self) -> bool {
        self.data_size() == 0
    }

    /// Stream time at the read position, if known.
    pub fn timestamp(&self) -> Option<Duration> {
        self.lock_state().timestamp
    }

    /// Known playback duration of the unread bytes, `None` once unknown.
    pub fn duration_remaining(&self) -> Option<Duration> {
        self.lock_state().duration
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> BufferPhase {
        self.lock_state().phase()
    }

    /// Snapshot of positions and counters.
    pub fn stats(&self) -> BufferStats {
        self.lock_state().stats()
    }

    /// One-line picture of the arena, `columns` cells wide.
    ///
    /// ```
    /// use circbuf::{BufferConfig, CircularStreamBuffer};
    ///
    /// # fn main() -> Result<(), circbuf::Error> {
    /// let buffer = CircularStreamBuffer::new(BufferConfig::new(4, 3, false))?;
    /// buffer.queue(&[0u8; 7][..])?;
    /// assert_eq!(buffer.fill_diagram(14).to_string(), "[R######W......] 7/14 bytes");
    /// # Ok(())
    /// # }
    /// ```
    pub fn fill_diagram(&self, columns: usize) -> FillDiagram {
        self.stats().fill_diagram(columns)
    }

    /// Gives a dropped, unconsumed window back.
    pub(crate) fn release_window(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.outstanding == Some(generation) {
            state.outstanding = None;
            trace!(id = %self.id, generation, "Window returned unconsumed");
        }
    }

    fn display_state(&self, state: &RingState) {
        if self.display.load(Ordering::Relaxed) {
            debug!(
                id = %self.id,
                "{}",
                state.stats().fill_diagram(DISPLAY_COLUMNS)
            );
        }
    }

    // Every state transition is completed before the guard is dropped, so a
    // panic elsewhere never leaves the positions half-updated.
    fn lock_state(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircularStreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircularStreamBuffer")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
