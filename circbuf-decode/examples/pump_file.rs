// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Pumps a file (or generated bytes) through a decode session.
//!
//! The input is cut into packets the way a demuxer would hand them over and
//! pushed from the main thread; a pass-through decoder on the decode thread
//! turns windows into fixed-size frames. The summary is printed as JSON.
//!
//! ```text
//! cargo run --example pump_file -- --input stream.aac --window-size 1536 --display
//! RUST_LOG=circbuf=trace cargo run --example pump_file -- --synthetic-bytes 65536
//! ```

mod common;

use std::{path::PathBuf, sync::mpsc, thread, time::Duration};

use circbuf::{BufferConfig, StreamChunk};
use circbuf_decode::{DecodeSession, PassThroughDecoder, Scheduling, SessionConfig};
use clap::Parser;
use tracing::{info, warn};

/// Pump a byte stream through a circular buffer into a decode thread.
#[derive(Parser, Debug)]
#[command(name = "pump_file")]
#[command(version, about)]
struct Args {
    /// File to pump; generated bytes are used when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Number of generated bytes when no input file is given
    #[arg(long, default_value_t = 1 << 20)]
    synthetic_bytes: usize,

    /// Session configuration as JSON; overrides the geometry options below
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Producer packet size in bytes
    #[arg(long, default_value_t = 1500)]
    packet_size: usize,

    /// Decoder input window in bytes
    #[arg(long, default_value_t = 4096)]
    window_size: usize,

    /// Buffer capacity in windows
    #[arg(long, default_value_t = 4)]
    num_windows: usize,

    /// Move exactly one window per queue and consume
    #[arg(long)]
    fixed_block_size: bool,

    /// Bytes per decoded frame
    #[arg(long, default_value_t = 1024)]
    frame_size: usize,

    /// Nominal frame duration in milliseconds, used for timestamps
    #[arg(long, default_value_t = 20)]
    frame_ms: u64,

    /// Run the decode thread with SCHED_FIFO at this priority
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Log a fill diagram after every queue and consume (needs RUST_LOG=debug)
    #[arg(long)]
    display: bool,
}

fn session_config(args: &Args) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => SessionConfig::new(BufferConfig::new(
            args.window_size,
            args.num_windows,
            args.fixed_block_size,
        )),
    };
    if let Some(priority) = args.rt_priority {
        config.thread.scheduling = Scheduling::Fifo { priority };
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    common::setup_logging();
    let args = Args::parse();

    let data = match &args.input {
        Some(path) => std::fs::read(path)?,
        None => (0..args.synthetic_bytes).map(|i| (i % 251) as u8).collect(),
    };
    let config = session_config(&args)?;
    // Fixed blocks must be queued and consumed whole.
    let (packet_size, frame_size) = if config.buffer.fixed_block_size {
        (config.buffer.window_size, config.buffer.window_size)
    } else {
        (args.packet_size.max(1), args.frame_size)
    };
    let frame_duration = Duration::from_millis(args.frame_ms);

    let (tx, rx) = mpsc::channel();
    let collector = thread::spawn(move || {
        rx.iter()
            .fold((0usize, 0usize), |(frames, bytes), frame: circbuf_decode::DecodedFrame| {
                (frames + 1, bytes + frame.data.len())
            })
    });

    let session = DecodeSession::start(
        config,
        PassThroughDecoder::new(frame_size, Some(frame_duration))?,
        tx,
    )?;
    session.buffer().set_display(args.display);

    // One frame duration per frame_size bytes.
    let mut pts = Duration::ZERO;
    for packet in data.chunks(packet_size) {
        let duration = frame_duration.mul_f64(packet.len() as f64 / frame_size.max(1) as f64);
        let chunk = StreamChunk::new(packet)
            .with_pts(pts)
            .with_duration(duration);
        if let Err(e) = session.push(chunk) {
            warn!(error = %e, "Producer stopped");
            break;
        }
        pts += duration;
    }
    info!(bytes = data.len(), "Input pushed, draining");

    let summary = session.finish()?;
    let (frames, bytes) = collector.join().map_err(|_| "frame collector panicked")?;
    info!(frames, bytes, "Frames received");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
