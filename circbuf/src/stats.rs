// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Buffer introspection: counters, lifecycle phase and a fill-level diagram.

use std::fmt;

use serde::Serialize;

/// Lifecycle phase of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferPhase {
    /// Normal operation; the consumer waits for full windows.
    Active,
    /// End of input announced; the consumer takes whatever is left.
    Draining,
    /// The consumer has seen the zero-length end-of-stream window.
    Drained,
    /// The consumer gave up; every further queue fails.
    Aborted,
}

/// Point-in-time snapshot of a buffer's positions and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BufferStats {
    pub capacity: usize,
    pub window_size: usize,
    pub read_ahead: usize,
    pub read_pos: usize,
    pub write_pos: usize,
    /// End of the wrapped tail region, equal to `write_pos` while contiguous.
    pub tail_end: usize,
    pub contiguous: bool,
    /// Bytes queued and not yet consumed.
    pub data_size: usize,
    pub write_space: usize,
    pub bytes_queued: u64,
    pub bytes_consumed: u64,
    /// Largest single `consumed()` report seen.
    pub max_consumed: usize,
    /// Producer-side copies of the unread tail onto the front of the arena.
    pub shifts: u64,
    /// Consumer-side jumps from the tail back onto the compacted copy.
    pub read_resets: u64,
    /// Moves of all unread bytes to the front while no window was held.
    pub compactions: u64,
    /// Times the producer blocked for space.
    pub producer_waits: u64,
    /// Times the consumer blocked for data.
    pub consumer_waits: u64,
}

impl BufferStats {
    /// Renders the arena as a single line of `columns` cells.
    pub fn fill_diagram(&self, columns: usize) -> FillDiagram {
        FillDiagram {
            stats: *self,
            columns: columns.max(1),
        }
    }

    fn is_live(&self, pos: usize) -> bool {
        if self.contiguous {
            pos >= self.read_pos && pos < self.write_pos
        } else {
            (pos >= self.read_pos && pos < self.tail_end) || pos < self.write_pos
        }
    }
}

/// ASCII picture of the arena: `#` for unread bytes, `.` for free space,
/// `R` and `W` for the read and write positions, `|` closing a wrapped tail.
///
/// ```text
/// [###W.........R#######|..]
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FillDiagram {
    stats: BufferStats,
    columns: usize,
}

impl fmt::Display for FillDiagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        let capacity = stats.capacity.max(1);
        let cell_of = |pos: usize| (pos.min(capacity - 1) * self.columns) / capacity;

        let mut cells = vec!['.'; self.columns];
        for (cell, c) in cells.iter_mut().enumerate() {
            let start = cell * capacity / self.columns;
            let end = ((cell + 1) * capacity / self.columns).max(start + 1);
            if (start..end).any(|pos| stats.is_live(pos)) {
                *c = '#';
            }
        }
        if !stats.contiguous {
            cells[cell_of(stats.tail_end)] = '|';
        }
        cells[cell_of(stats.write_pos)] = 'W';
        cells[cell_of(stats.read_pos)] = 'R';

        write!(f, "[")?;
        for c in cells {
            write!(f, "{c}")?;
        }
        write!(f, "] {}/{} bytes", stats.data_size, stats.capacity)
    }
}
