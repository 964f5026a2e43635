// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Producer-side handle of a decode session.

use std::{num::NonZeroUsize, sync::Arc, thread::JoinHandle};

use circbuf::{BufferStats, CircularStreamBuffer, RendezvousGate, StreamChunk};
use tracing::{error, info};

use crate::{DecodeSummary, Error, FrameDecoder, FrameSink, Result, SessionConfig, runner};

/// The spawning thread and the decode thread.
const STARTUP_PARTIES: NonZeroUsize = NonZeroUsize::MIN.saturating_add(1);

/// A circular buffer plus the dedicated thread decoding from it.
///
/// The thread calling [`Self::push`] is the buffer's producer; the decode
/// thread is its consumer. A decoder or sink failure aborts the buffer, so
/// the next `push` fails with [`circbuf::Error::ConsumerAborted`] and
/// [`Self::finish`] reports the original error.
///
/// Dropping a session without calling `finish` drains the buffer, waits for
/// the decode thread and logs its outcome.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc;
/// use circbuf::BufferConfig;
/// use circbuf_decode::{DecodeSession, PassThroughDecoder, SessionConfig};
///
/// # fn main() -> Result<(), circbuf_decode::Error> {
/// let (tx, rx) = mpsc::channel();
/// let session = DecodeSession::start(
///     SessionConfig::new(BufferConfig::new(256, 3, false)),
///     PassThroughDecoder::new(100, None)?,
///     tx,
/// )?;
/// session.push(&vec![0u8; 1000])?;
/// let summary = session.finish()?;
///
/// assert_eq!(summary.frames, 10);
/// assert_eq!(rx.iter().count(), 10);
/// # Ok(())
/// # }
/// ```
pub struct DecodeSession {
    buffer: Arc<CircularStreamBuffer>,
    handle: Option<JoinHandle<Result<DecodeSummary>>>,
}

impl DecodeSession {
    /// Creates the buffer, spawns the decode thread and returns once it runs.
    ///
    /// # Errors
    ///
    /// - [`Error::Buffer`] or [`Error::InvalidConfig`] for a bad configuration
    /// - [`Error::Spawn`] if the thread cannot be created
    pub fn start<D, S>(config: SessionConfig, mut decoder: D, mut sink: S) -> Result<Self>
    where
        D: FrameDecoder + Send + 'static,
        S: FrameSink + Send + 'static,
    {
        config.validate()?;
        let buffer = Arc::new(CircularStreamBuffer::new(config.buffer)?);
        let started = Arc::new(RendezvousGate::new(STARTUP_PARTIES));

        let handle = {
            let buffer = buffer.clone();
            let started = started.clone();
            let props = config.thread.clone();
            config
                .thread
                .builder()
                .spawn(move || {
                    props.apply_scheduling();
                    started.meet();
                    runner::run(&buffer, &mut decoder, &mut sink)
                })
                .map_err(Error::Spawn)?
        };
        started.meet();
        info!(
            id = %buffer.id(),
            thread = %config.thread.name,
            window_size = buffer.window_size(),
            capacity = buffer.capacity(),
            "Decode session started"
        );

        Ok(Self {
            buffer,
            handle: Some(handle),
        })
    }

    /// Queues stream data for the decode thread, blocking while the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Buffer`] wrapping [`circbuf::Error::ConsumerAborted`]
    /// once the decode thread has failed.
    pub fn push<'c>(&self, chunk: impl Into<StreamChunk<'c>>) -> Result<()> {
        Ok(self.buffer.queue(chunk)?)
    }

    /// The buffer shared with the decode thread.
    pub fn buffer(&self) -> &Arc<CircularStreamBuffer> {
        &self.buffer
    }

    /// Snapshot of the buffer's positions and counters.
    pub fn stats(&self) -> BufferStats {
        self.buffer.stats()
    }

    /// Signals end of stream and waits for the decode thread to finish.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the decode thread, or
    /// [`Error::ThreadPanicked`].
    pub fn finish(mut self) -> Result<DecodeSummary> {
        self.join()
    }

    fn join(&mut self) -> Result<DecodeSummary> {
        self.buffer.drain(true);
        let Some(handle) = self.handle.take() else {
            return Err(Error::ThreadPanicked);
        };
        let summary = handle.join().map_err(|_| Error::ThreadPanicked)??;
        info!(
            id = %self.buffer.id(),
            windows = summary.windows,
            frames = summary.frames,
            bytes = summary.bytes_decoded,
            "Decode session finished"
        );
        Ok(summary)
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        if self.handle.is_some()
            && let Err(e) = self.join()
        {
            error!(id = %self.buffer.id(), error = %e, "Decode session ended with an error");
        }
    }
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("buffer", &self.buffer)
            .field("running", &self.handle.as_ref().is_some_and(|h| !h.is_finished()))
            .finish()
    }
}

