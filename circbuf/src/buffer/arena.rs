// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Byte storage shared between the producer and consumer threads.

use std::cell::UnsafeCell;

/// Fixed-size byte arena with unsynchronized interior mutability.
///
/// The arena itself does not arbitrate access. Callers guarantee that a range
/// is never written while another thread reads or writes an overlapping range;
/// the ring positions kept under the buffer's state lock provide that.
pub(crate) struct Arena {
    cells: Box<[UnsafeCell<u8>]>,
}

// Safety: all access goes through raw pointers on disjoint ranges, as
// established by the read/write position protocol of the owning buffer.
unsafe impl Sync for Arena {}

impl Arena {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            cells: (0..capacity).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    /// Shared view of `[offset, offset + len)`.
    ///
    /// # Safety
    ///
    /// The range must be in bounds and must not be written for the lifetime
    /// of the returned slice.
    pub(crate) unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.len());
        unsafe { std::slice::from_raw_parts(self.base().add(offset), len) }
    }

    /// Exclusive view of `[offset, offset + len)`.
    ///
    /// # Safety
    ///
    /// The range must be in bounds and no other reference to it may exist for
    /// the lifetime of the returned slice.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.len());
        unsafe { std::slice::from_raw_parts_mut(self.base().add(offset), len) }
    }

    /// Copies `len` bytes starting at `src` to the start of the arena.
    ///
    /// # Safety
    ///
    /// `[src, src + len)` must be in bounds and must not overlap `[0, len)`,
    /// and nobody may be reading `[0, len)` or writing either range.
    pub(crate) unsafe fn copy_to_front(&self, src: usize, len: usize) {
        debug_assert!(src >= len && src + len <= self.len());
        unsafe { std::ptr::copy_nonoverlapping(self.base().add(src), self.base(), len) }
    }

    /// Moves `len` bytes starting at `src` to the start of the arena. The
    /// ranges may overlap.
    ///
    /// # Safety
    ///
    /// `[src, src + len)` must be in bounds and nobody else may access
    /// `[0, src + len)` during the call.
    pub(crate) unsafe fn move_to_front(&self, src: usize, len: usize) {
        debug_assert!(src + len <= self.len());
        unsafe { std::ptr::copy(self.base().add(src), self.base(), len) }
    }
}
