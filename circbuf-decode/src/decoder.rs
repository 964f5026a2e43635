// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Seams between the decode thread and its collaborators.
//!
//! A session drives a [`FrameDecoder`] with windows taken from the buffer and
//! hands whatever it produces to a [`FrameSink`]. The decoder itself is
//! opaque: a hardware codec wrapper, a software decoder, or the
//! [`PassThroughDecoder`] used for plumbing tests.

use std::{
    convert::Infallible,
    sync::mpsc::{Sender, SyncSender},
    time::Duration,
};

use crate::{Error, Result};

/// A decoded unit of media together with its stream timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub data: Vec<u8>,
    pub pts: Option<Duration>,
    pub duration: Option<Duration>,
}

/// Result of offering one window to a decoder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeOutcome {
    /// Input bytes the decoder used. The rest is offered again, at the start
    /// of the next window.
    pub bytes_consumed: usize,
    /// Stream time covered by the consumed bytes, `None` if the codec cannot tell.
    pub duration: Option<Duration>,
    /// Frame completed by this call, if any.
    pub frame: Option<DecodedFrame>,
}

/// Decoder fed from the buffer's consumer side.
///
/// `decode` is called with at least a full window of input, except at the end
/// of the stream where the last window may be shorter.
pub trait FrameDecoder {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decodes from the start of `input`. `pts` is the stream time of the
    /// first byte, when the producer supplied one.
    fn decode(
        &mut self,
        input: &[u8],
        pts: Option<Duration>,
    ) -> core::result::Result<DecodeOutcome, Self::Error>;

    /// Returns frames still buffered inside the decoder once input has ended.
    fn flush(&mut self) -> core::result::Result<Vec<DecodedFrame>, Self::Error> {
        Ok(Vec::new())
    }
}

/// Receiver of decoded frames.
pub trait FrameSink {
    /// Delivers one frame downstream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkClosed`] once downstream has gone away.
    fn deliver(&mut self, frame: DecodedFrame) -> Result<()>;
}

impl FrameSink for Sender<DecodedFrame> {
    fn deliver(&mut self, frame: DecodedFrame) -> Result<()> {
        self.send(frame).map_err(|_| Error::SinkClosed)
    }
}

impl FrameSink for SyncSender<DecodedFrame> {
    fn deliver(&mut self, frame: DecodedFrame) -> Result<()> {
        self.send(frame).map_err(|_| Error::SinkClosed)
    }
}

/// Cuts the input into frames of `frame_size` bytes without looking at them.
///
/// Each call consumes at most one frame, so a window larger than the frame
/// leaves its remainder in the buffer. Frames are stamped with the window
/// timestamp and the configured per-frame duration.
#[derive(Debug, Clone)]
pub struct PassThroughDecoder {
    frame_size: usize,
    frame_duration: Option<Duration>,
}

impl PassThroughDecoder {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero frame size.
    pub fn new(frame_size: usize, frame_duration: Option<Duration>) -> Result<Self> {
        if frame_size == 0 {
            return Err(Error::InvalidConfig("frame size must be non-zero".into()));
        }
        Ok(Self {
            frame_size,
            frame_duration,
        })
    }
}

impl FrameDecoder for PassThroughDecoder {
    type Error = Infallible;

    fn decode(
        &mut self,
        input: &[u8],
        pts: Option<Duration>,
    ) -> core::result::Result<DecodeOutcome, Infallible> {
        let len = input.len().min(self.frame_size);
        let frame = (len > 0).then(|| DecodedFrame {
            data: input[..len].to_vec(),
            pts,
            duration: self.frame_duration,
        });
        Ok(DecodeOutcome {
            bytes_consumed: len,
            duration: self.frame_duration,
            frame,
        })
    }
}
