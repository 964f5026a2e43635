// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Ring positions and flags, kept under the buffer's state lock.
//!
//! Layout while contiguous: unread bytes are `[read_pos, write_pos)`.
//!
//! Once the producer runs out of room at the end of the arena it *shifts*: the
//! unread bytes from `shift_src` to the end of valid data are copied to the
//! front, writing continues right after that copy, and the ring is wrapped.
//! While wrapped, unread bytes are `[read_pos, tail_end)` followed by the new
//! front data. When the consumer reaches `shift_src` it jumps back by that
//! distance onto the copy (the *read reset*) and the ring is contiguous again.
//!
//! `shift_src` is at least `tail_end - (window_size + read_ahead)`, so a read
//! position that cannot reset yet still has more than a full window of tail
//! in front of it, and the copy is never longer than the region the first
//! window used to occupy.
//!
//! While the consumer holds no window the producer may instead *compact*: move
//! all unread bytes to the front in one go. The ring stays contiguous.

use std::time::Duration;

use crate::{BufferConfig, BufferPhase, BufferStats, Result};

/// A planned shift: copy `len` bytes from `src` to the arena front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shift {
    pub src: usize,
    pub len: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub bytes_queued: u64,
    pub bytes_consumed: u64,
    pub max_consumed: usize,
    pub shifts: u64,
    pub read_resets: u64,
    pub compactions: u64,
    pub producer_waits: u64,
    pub consumer_waits: u64,
}

#[derive(Debug)]
pub(crate) struct RingState {
    capacity: usize,
    window_size: usize,
    read_ahead: usize,
    fixed_block: bool,

    pub read_pos: usize,
    pub write_pos: usize,
    /// End of valid tail data while wrapped.
    pub tail_end: usize,
    /// Distance from the tail back to its copy at the front while wrapped.
    pub shift_delta: usize,
    pub contiguous: bool,

    /// Unread bytes, counting the shifted copy only once.
    pub data_size: usize,
    /// Remainder of the chunk the producer last blocked on.
    pub pending: usize,
    /// Copy granularity that remainder is written with.
    pub pending_granularity: usize,

    pub draining: bool,
    pub drained: bool,
    pub consumer_aborted: bool,

    /// Stream time at the read position, set by the first timestamped chunk.
    pub timestamp: Option<Duration>,
    /// Known duration of the unread data; `None` once any piece was unknown.
    pub duration: Option<Duration>,

    /// Generation of the window currently held by the consumer.
    pub outstanding: Option<u64>,
    pub generation: u64,

    pub counters: Counters,
}

impl RingState {
    pub fn new(config: &BufferConfig) -> Result<Self> {
        Ok(Self {
            capacity: config.capacity()?,
            window_size: config.window_size,
            read_ahead: config.read_ahead(),
            fixed_block: config.fixed_block_size,
            read_pos: 0,
            write_pos: 0,
            tail_end: 0,
            shift_delta: 0,
            contiguous: true,
            data_size: 0,
            pending: 0,
            pending_granularity: 1,
            draining: false,
            drained: false,
            consumer_aborted: false,
            timestamp: None,
            duration: Some(Duration::ZERO),
            outstanding: None,
            generation: 0,
            counters: Counters::default(),
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Data level at which a waiting consumer is woken.
    pub fn window_threshold(&self) -> usize {
        self.window_size + self.read_ahead
    }

    pub fn write_space(&self) -> usize {
        if self.contiguous {
            self.capacity - self.write_pos
        } else {
            self.read_pos.saturating_sub(self.write_pos)
        }
    }

    /// Unread bytes directly following the read position.
    pub fn contiguous_available(&self) -> usize {
        if self.contiguous {
            self.write_pos - self.read_pos
        } else {
            self.tail_end.saturating_sub(self.read_pos)
        }
    }

    /// Whether the region the first window (plus read-ahead) occupies has been consumed.
    pub fn first_window_free(&self) -> bool {
        self.read_pos >= self.window_threshold()
    }

    /// Plans a shift that gives the producer more room, if one exists.
    ///
    /// Fixed block mode never copies; it wraps with an empty shift once the
    /// write position sits exactly on the arena end.
    pub fn plan_shift(&self) -> Option<Shift> {
        if !self.contiguous {
            return None;
        }
        if self.fixed_block {
            return (self.write_pos == self.capacity).then_some(Shift {
                src: self.capacity,
                len: 0,
            });
        }
        if !self.first_window_free() {
            return None;
        }
        let src = self
            .read_pos
            .max(self.write_pos.saturating_sub(self.window_threshold()));
        let len = self.write_pos - src;
        // Only worth it if the wrapped ring has more room than the tail.
        (self.read_pos - len > self.write_space()).then_some(Shift { src, len })
    }

    /// Bytes to move to the front if the unread region can be compacted now.
    ///
    /// Only while contiguous, in variable mode, with no window outstanding and
    /// something already consumed.
    pub fn plan_compaction(&self) -> Option<usize> {
        (self.contiguous && !self.fixed_block && self.outstanding.is_none() && self.read_pos > 0)
            .then(|| self.write_pos - self.read_pos)
    }

    pub fn apply_compaction(&mut self) {
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
        self.counters.compactions += 1;
    }

    pub fn apply_shift(&mut self, shift: Shift) {
        self.tail_end = self.write_pos;
        self.shift_delta = shift.src;
        self.write_pos = shift.len;
        self.contiguous = false;
        self.counters.shifts += 1;
    }

    /// Moves the read position from the tail onto its copy at the front.
    pub fn reset_read_pointer(&mut self) -> bool {
        if self.contiguous
            || self.read_pos < self.shift_delta
            || self.write_pos < self.read_pos - self.shift_delta
        {
            return false;
        }
        self.read_pos -= self.shift_delta;
        self.tail_end = 0;
        self.shift_delta = 0;
        self.contiguous = true;
        self.counters.read_resets += 1;
        true
    }

    /// Bytes of a `wanted`-byte remainder that can be written right now.
    ///
    /// Fixed block mode never splits except at the arena end; variable mode
    /// writes whatever fits, rounded down to `granularity`.
    pub fn next_write_len(&self, wanted: usize, granularity: usize) -> usize {
        let space = self.write_space();
        if self.fixed_block {
            let wanted = self.fixed_write_len(wanted);
            if space >= wanted { wanted } else { 0 }
        } else if space >= wanted {
            wanted
        } else {
            space - space % granularity
        }
    }

    /// Space a producer blocked on a `wanted`-byte remainder waits for.
    pub fn progress_threshold(&self, wanted: usize, granularity: usize) -> usize {
        if self.fixed_block {
            self.fixed_write_len(wanted)
        } else {
            wanted.min(self.window_size.max(granularity))
        }
    }

    fn fixed_write_len(&self, wanted: usize) -> usize {
        if self.contiguous {
            wanted.min(self.capacity - self.write_pos)
        } else {
            wanted
        }
    }

    pub fn commit_write(&mut self, len: usize) {
        self.write_pos += len;
        self.data_size += len;
        self.counters.bytes_queued += len as u64;
    }

    pub fn commit_read(&mut self, len: usize) {
        self.read_pos += len;
        self.data_size -= len;
        self.counters.bytes_consumed += len as u64;
        self.counters.max_consumed = self.counters.max_consumed.max(len);
    }

    /// Space the blocked producer needs before it can make progress, for the
    /// ring as it is now. A read reset changes the answer in fixed block mode.
    pub fn bytes_needed(&self) -> usize {
        self.progress_threshold(self.pending, self.pending_granularity)
    }

    /// Whether a producer blocked in `queue()` should be woken: it can shift,
    /// compact, or simply fits.
    pub fn producer_may_proceed(&self) -> bool {
        let can_make_room = self.contiguous && !self.fixed_block && self.read_pos > 0;
        can_make_room || self.write_space() >= self.bytes_needed()
    }

    pub fn phase(&self) -> BufferPhase {
        if self.consumer_aborted {
            BufferPhase::Aborted
        } else if self.drained {
            BufferPhase::Drained
        } else if self.draining {
            BufferPhase::Draining
        } else {
            BufferPhase::Active
        }
    }

    pub fn stats(&self) -> BufferStats {
        let counters = &self.counters;
        BufferStats {
            capacity: self.capacity,
            window_size: self.window_size,
            read_ahead: self.read_ahead,
            read_pos: self.read_pos,
            write_pos: self.write_pos,
            tail_end: if self.contiguous {
                self.write_pos
            } else {
                self.tail_end
            },
            contiguous: self.contiguous,
            data_size: self.data_size,
            write_space: self.write_space(),
            bytes_queued: counters.bytes_queued,
            bytes_consumed: counters.bytes_consumed,
            max_consumed: counters.max_consumed,
            shifts: counters.shifts,
            read_resets: counters.read_resets,
            compactions: counters.compactions,
            producer_waits: counters.producer_waits,
            consumer_waits: counters.consumer_waits,
        }
    }
}
