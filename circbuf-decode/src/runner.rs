// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Consumer side of a decode session: the loop running on the decode thread.

use circbuf::{BufferStats, CircularStreamBuffer};
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::{Error, FrameDecoder, FrameSink, Result};

/// Windows in a row a decoder may answer with frames but no consumed bytes.
const MAX_IDLE_WINDOWS: u32 = 64;

/// What a finished decode thread did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DecodeSummary {
    /// Non-empty windows offered to the decoder.
    pub windows: u64,
    /// Input bytes the decoder consumed.
    pub bytes_decoded: u64,
    /// Frames delivered to the sink, flushed ones included.
    pub frames: u64,
    /// Bytes discarded from an undecodable tail at end of stream.
    pub bytes_discarded: u64,
    /// Buffer statistics when the thread stopped.
    pub stats: BufferStats,
}

/// Runs the decode loop until end of stream, aborting the buffer on failure
/// so that a blocked producer wakes up.
pub(crate) fn run<D: FrameDecoder, S: FrameSink>(
    buffer: &CircularStreamBuffer,
    decoder: &mut D,
    sink: &mut S,
) -> Result<DecodeSummary> {
    let result = decode_until_drained(buffer, decoder, sink);
    if let Err(e) = &result {
        error!(id = %buffer.id(), error = %e, "Decode loop failed");
        buffer.consumer_aborted();
    }
    result
}

fn decode_until_drained<D: FrameDecoder, S: FrameSink>(
    buffer: &CircularStreamBuffer,
    decoder: &mut D,
    sink: &mut S,
) -> Result<DecodeSummary> {
    let mut windows = 0;
    let mut bytes_decoded = 0;
    let mut frames = 0;
    let mut bytes_discarded = 0;
    let mut idle_windows = 0;

    loop {
        let window = buffer.get_window()?;
        if window.is_empty() {
            buffer.consumed(window, 0)?;
            break;
        }
        windows += 1;

        let len = window.len();
        let outcome = decoder
            .decode(window.data(), window.timestamp())
            .map_err(|e| Error::Decoder(Box::new(e)))?;
        trace!(len, used = outcome.bytes_consumed, "Decoded window");

        let delivered = outcome.frame.is_some();
        if let Some(frame) = outcome.frame {
            sink.deliver(frame)?;
            frames += 1;
        }

        let mut used = outcome.bytes_consumed.min(len);
        idle_windows = if used == 0 { idle_windows + 1 } else { 0 };
        if used == 0 && (!delivered || idle_windows > MAX_IDLE_WINDOWS) {
            if len >= buffer.window_size() {
                return Err(Error::DecoderStalled { len });
            }
            // Only the short end-of-stream window can end up here.
            warn!(len, "Discarding undecodable tail");
            bytes_discarded += len as u64;
            used = len;
            idle_windows = 0;
        } else {
            bytes_decoded += used as u64;
        }

        buffer.consumed(window, used)?;
        buffer.time_consumed(outcome.duration);
    }

    for frame in decoder
        .flush()
        .map_err(|e| Error::Decoder(Box::new(e)))?
    {
        sink.deliver(frame)?;
        frames += 1;
    }

    let summary = DecodeSummary {
        windows,
        bytes_decoded,
        frames,
        bytes_discarded,
        stats: buffer.stats(),
    };
    debug!(id = %buffer.id(), ?summary, "Decode loop finished");
    Ok(summary)
}
