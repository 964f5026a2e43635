// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable copy step used when queued bytes enter the arena.
//!
//! By default the buffer copies bytes verbatim ([`RawCopy`]). A collaborator
//! that needs to transform data on the way in (for example swapping the byte
//! order of 16-bit PCM) installs its own [`ChunkCopier`]. Any
//! `Fn(&mut [u8], &[u8]) -> Result<()>` closure qualifies; user data is whatever
//! the closure captures.

use crate::{Error, Result};

/// Copies one chunk of producer data into the arena.
///
/// `dst` and `src` always have the same length. Implementations must fill all
/// of `dst`.
pub trait ChunkCopier: Send + Sync {
    /// Copies (and possibly transforms) `src` into `dst`.
    fn copy_into(&self, dst: &mut [u8], src: &[u8]) -> Result<()>;

    /// Alignment the buffer keeps when it splits a chunk that does not fit.
    ///
    /// A copier working on multi-byte units returns the unit size so it never
    /// sees a unit cut in half. Only the final piece of a chunk may be shorter.
    fn granularity(&self) -> usize {
        1
    }
}

impl<F> ChunkCopier for F
where
    F: Fn(&mut [u8], &[u8]) -> Result<()> + Send + Sync,
{
    fn copy_into(&self, dst: &mut [u8], src: &[u8]) -> Result<()> {
        self(dst, src)
    }
}

/// Verbatim copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCopy;

impl ChunkCopier for RawCopy {
    fn copy_into(&self, dst: &mut [u8], src: &[u8]) -> Result<()> {
        check_lengths(dst, src)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Swaps the two bytes of every 16-bit unit while copying.
///
/// A trailing odd byte is copied unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwapBytes16;

impl ChunkCopier for SwapBytes16 {
    fn copy_into(&self, dst: &mut [u8], src: &[u8]) -> Result<()> {
        check_lengths(dst, src)?;
        let mut dst_units = dst.chunks_exact_mut(2);
        let mut src_units = src.chunks_exact(2);
        for (d, s) in (&mut dst_units).zip(&mut src_units) {
            d[0] = s[1];
            d[1] = s[0];
        }
        dst_units
            .into_remainder()
            .copy_from_slice(src_units.remainder());
        Ok(())
    }

    fn granularity(&self) -> usize {
        2
    }
}

fn check_lengths(dst: &[u8], src: &[u8]) -> Result<()> {
    if dst.len() != src.len() {
        return Err(Error::Copy(format!(
            "destination holds {} bytes, source has {}",
            dst.len(),
            src.len()
        )));
    }
    Ok(())
}
