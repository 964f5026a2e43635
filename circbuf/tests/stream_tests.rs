// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Producer/consumer integration tests for the circular stream buffer.
//!
//! Every test runs a real producer thread against a consumer on the test
//! thread, so blocking, compaction and drain are exercised the way a decode
//! session drives them.
//!
//! # Test Coverage
//!
//! - Byte order survives splitting, compaction and read resets
//! - A held window is never written while the producer keeps queueing
//! - Configuration rejection
//! - Fixed block exactness and wrap at the arena end
//! - Drain and abort termination
//! - Timestamp and duration bookkeeping

use std::{
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

use circbuf::{BufferConfig, BufferPhase, CircularStreamBuffer, Error, StreamChunk, SwapBytes16};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// Upper bound for any blocking step; a test exceeding it has deadlocked.
const DEADLINE: Duration = Duration::from_secs(10);

fn setup_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

/// Deterministic, non-repeating-looking test payload.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Queues `data` in `chunk_sizes`-sized pieces from a new thread, then drains.
fn spawn_producer(
    buffer: Arc<CircularStreamBuffer>,
    data: Vec<u8>,
    chunk_sizes: Vec<usize>,
) -> thread::JoinHandle<Result<(), Error>> {
    thread::spawn(move || {
        let mut offset = 0;
        let mut sizes = chunk_sizes.iter().cycle();
        while offset < data.len() {
            let size = (*sizes.next().unwrap_or(&data.len())).min(data.len() - offset);
            buffer.queue(&data[offset..offset + size])?;
            offset += size;
        }
        buffer.drain(true);
        Ok(())
    })
}

/// Consumes until the end-of-stream window, using `pick(window_len)` bytes of
/// each full window (zero is allowed). Returns the bytes in consumption order.
fn consume_all(buffer: &CircularStreamBuffer, mut pick: impl FnMut(usize) -> usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let window = buffer.get_window().unwrap();
        if window.is_empty() {
            buffer.consumed(window, 0).unwrap();
            return out;
        }
        let used = if window.len() < buffer.window_size() {
            window.len()
        } else {
            pick(window.len()).min(window.len())
        };
        out.extend_from_slice(&window.data()[..used]);
        buffer.consumed(window, used).unwrap();
    }
}

#[test]
fn ten_thousand_bytes_through_four_windows() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(4096, 4, false)).unwrap());
    assert_eq!(buffer.capacity(), 4 * 4096 + 2 * 1024);

    let data = pattern(10_000);
    let producer = spawn_producer(buffer.clone(), data.clone(), vec![10_000]);

    let mut lengths = Vec::new();
    let mut out = Vec::new();
    loop {
        let window = buffer.get_window().unwrap();
        lengths.push(window.len());
        if window.is_empty() {
            buffer.consumed(window, 0).unwrap();
            break;
        }
        out.extend_from_slice(window.data());
        let len = window.len();
        buffer.consumed(window, len).unwrap();
    }
    producer.join().unwrap().unwrap();

    assert_eq!(lengths, vec![4096, 4096, 1808, 0]);
    assert_eq!(out, data);
    assert_eq!(buffer.phase(), BufferPhase::Drained);
    let stats = buffer.stats();
    info!(?stats, "Final stats");
    assert_eq!(stats.bytes_queued, 10_000);
    assert_eq!(stats.bytes_consumed, 10_000);
    assert_eq!(stats.max_consumed, 4096);
}

#[test]
fn wrap_around_with_three_windows_keeps_order() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap());
    assert_eq!(buffer.capacity(), 56);

    let data = pattern(2_000);
    let producer = spawn_producer(buffer.clone(), data.clone(), vec![7, 13, 1, 30]);

    let mut step = 0;
    let out = consume_all(&buffer, |len| {
        step += 1;
        // Mostly partial consumption, as a decoder stopping at frame boundaries.
        if step % 4 == 0 { len } else { 5 + step % 9 }
    });
    producer.join().unwrap().unwrap();

    assert_eq!(out, data);
    let stats = buffer.stats();
    // Which way room is made depends on whether a window was held at the time.
    assert!(stats.shifts + stats.compactions > 0, "{stats:?}");
    assert_eq!(stats.shifts, stats.read_resets, "{stats:?}");
    assert_eq!(stats.data_size, 0);
}

#[test]
fn queue_after_first_window_makes_room_instead_of_blocking() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap();
    let data = pattern(64);
    buffer.queue(&data[..48]).unwrap();

    let window = buffer.get_window().unwrap();
    assert_eq!(window.data(), &data[..16]);
    buffer.consumed(window, 16).unwrap();

    // Only 8 bytes are left at the end of the arena; this must not block.
    buffer.queue(&data[48..]).unwrap();
    assert_eq!(buffer.stats().compactions, 1);
    assert_eq!(buffer.data_size(), 48);

    buffer.drain(true);
    let out = consume_all(&buffer, |len| len);
    assert_eq!(out, &data[16..]);
}

#[test]
fn tail_is_copied_while_a_window_is_held() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap();
    let data = pattern(66);
    buffer.queue(&data[..56]).unwrap();
    for _ in 0..2 {
        let window = buffer.get_window().unwrap();
        buffer.consumed(window, 16).unwrap();
    }

    // The consumer holds [32, 48) while the producer runs out of room.
    let held = buffer.get_window().unwrap();
    buffer.queue(&data[56..]).unwrap();
    let stats = buffer.stats();
    assert_eq!((stats.shifts, stats.compactions), (1, 0));
    assert!(!stats.contiguous);
    assert_eq!(held.data(), &data[32..48]);
    buffer.consumed(held, 16).unwrap();

    // The next window comes from the copy at the front of the arena.
    let window = buffer.get_window().unwrap();
    assert_eq!(window.offset(), 12);
    assert_eq!(window.data(), &data[48..64]);
    buffer.consumed(window, 16).unwrap();
    assert_eq!(buffer.stats().read_resets, 1);

    buffer.drain(true);
    assert_eq!(consume_all(&buffer, |len| len), &data[64..]);
}

#[test]
fn overrunning_queue_while_wrapped_keeps_order() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap());
    let data = pattern(86);
    buffer.queue(&data[..56]).unwrap();
    for _ in 0..2 {
        let window = buffer.get_window().unwrap();
        buffer.consumed(window, 16).unwrap();
    }

    // The tail is shifted for the first 12 bytes, the other 18 must wait.
    let held = buffer.get_window().unwrap();
    let producer = spawn_producer(buffer.clone(), data[56..].to_vec(), vec![30]);
    while buffer.stats().producer_waits == 0 && !producer.is_finished() {
        thread::yield_now();
    }
    let stats = buffer.stats();
    assert_eq!(stats.shifts, 1, "{stats:?}");
    assert!(!stats.contiguous, "{stats:?}");
    assert_eq!((stats.write_pos, stats.write_space), (32, 0), "{stats:?}");
    assert_eq!(held.data(), &data[32..48]);
    buffer.consumed(held, 16).unwrap();

    let out = consume_all(&buffer, |len| len);
    producer.join().unwrap().unwrap();
    assert_eq!(out, &data[48..]);
    assert_eq!(buffer.stats().read_resets, 1);
}

#[test]
fn randomized_interleavings_preserve_fifo_order() {
    setup_logging();
    for seed in 0..64u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let window_size = rng.gen_range(4..64);
        let num_windows = rng.gen_range(3..6);
        let buffer = Arc::new(
            CircularStreamBuffer::new(BufferConfig::new(window_size, num_windows, false)).unwrap(),
        );

        let data: Vec<u8> = (0..5_000).map(|_| rng.r#gen()).collect();
        // Up to a few windows beyond the arena, so chunks are split while wrapped.
        let chunk_sizes: Vec<usize> = (0..32)
            .map(|_| rng.gen_range(1..(num_windows + 3) * window_size))
            .collect();
        let producer = spawn_producer(buffer.clone(), data.clone(), chunk_sizes);

        let mut out = Vec::new();
        loop {
            let window = buffer.get_window().unwrap();
            if window.is_empty() {
                buffer.consumed(window, 0).unwrap();
                break;
            }
            // The producer keeps queueing while the window is held; it must
            // never write into it.
            let seen = window.data().to_vec();
            if rng.gen_bool(0.1) {
                thread::sleep(Duration::from_micros(rng.gen_range(0..200)));
            } else {
                thread::yield_now();
            }
            assert_eq!(window.data(), seen.as_slice(), "seed {seed}");

            let used = if window.len() < window_size {
                window.len()
            } else if rng.gen_bool(0.1) {
                0
            } else {
                rng.gen_range(1..=window.len())
            };
            out.extend_from_slice(&seen[..used]);
            buffer.consumed(window, used).unwrap();
        }
        producer.join().unwrap().unwrap();

        assert_eq!(out, data, "seed {seed}");
        let stats = buffer.stats();
        assert_eq!(stats.bytes_consumed, 5_000, "seed {seed}");
        assert_eq!(stats.shifts, stats.read_resets, "seed {seed}: {stats:?}");
    }
}

#[test]
fn two_windows_rejected_without_fixed_block_size() {
    setup_logging();
    let err = CircularStreamBuffer::new(BufferConfig::new(4096, 2, false)).unwrap_err();
    assert!(matches!(err, Error::TooFewWindows { num_windows: 2 }));

    // The same geometry is fine in fixed block mode.
    CircularStreamBuffer::new(BufferConfig::new(4096, 2, true)).unwrap();
}

#[test]
fn fixed_block_requires_exact_consumption() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(8, 2, true)).unwrap();
    buffer.queue(&pattern(8)).unwrap();

    let window = buffer.get_window().unwrap();
    assert_eq!(window.len(), 8);
    let err = buffer.consumed(window, 5).unwrap_err();
    assert!(matches!(err, Error::PartialBlock { used: 5, len: 8 }));
    assert_eq!(buffer.data_size(), 8);

    // Same block again, this time consumed whole.
    let window = buffer.get_window().unwrap();
    assert_eq!(window.data(), pattern(8).as_slice());
    buffer.consumed(window, 8).unwrap();
    assert!(buffer.is_empty());
}

#[test]
fn fixed_block_wraps_at_arena_end() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(8, 2, true)).unwrap());
    let data = pattern(8 * 25);
    let producer = spawn_producer(buffer.clone(), data.clone(), vec![8]);

    let mut out = Vec::new();
    loop {
        let window = buffer.get_window().unwrap();
        if window.is_empty() {
            break;
        }
        assert_eq!(window.len(), 8);
        assert_eq!(window.offset() % 8, 0);
        out.extend_from_slice(window.data());
        buffer.consumed(window, 8).unwrap();
    }
    producer.join().unwrap().unwrap();

    assert_eq!(out, data);
    let stats = buffer.stats();
    assert_eq!(stats.capacity, 16);
    assert!(stats.read_resets > 0);
}

#[test]
fn fixed_block_producer_resumes_after_read_reset() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(10, 2, true)).unwrap());
    let data = pattern(45);
    buffer.queue(&data[..20]).unwrap();

    // Wraps, then blocks on a chunk that only fits once the ring is contiguous.
    let producer = spawn_producer(buffer.clone(), data[20..].to_vec(), vec![5, 20]);
    let out = consume_all(&buffer, |len| len);
    producer.join().unwrap().unwrap();

    assert_eq!(out, data);
    assert!(buffer.stats().read_resets > 0);
}

#[test]
fn fixed_block_accepts_chunks_of_any_size() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(10, 2, true)).unwrap());
    let data = pattern(2_003);
    let producer = spawn_producer(buffer.clone(), data.clone(), vec![5, 20, 7, 13, 3, 17, 11, 1]);

    let out = consume_all(&buffer, |len| len);
    producer.join().unwrap().unwrap();

    assert_eq!(out, data);
    assert_eq!(buffer.phase(), BufferPhase::Drained);
}

#[test]
fn fixed_block_rejects_chunk_larger_than_arena() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(8, 2, true)).unwrap();
    let err = buffer.queue(&pattern(17)).unwrap_err();
    assert!(matches!(err, Error::ChunkTooLarge { len: 17, capacity: 16 }));
    assert!(buffer.is_empty());
}

#[test]
fn drain_delivers_short_window_then_end_of_stream() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap();
    buffer.queue(&pattern(10)).unwrap();
    buffer.drain(true);
    assert_eq!(buffer.phase(), BufferPhase::Draining);

    let window = buffer.get_window().unwrap();
    assert_eq!(window.len(), 10);
    buffer.consumed(window, 10).unwrap();

    for _ in 0..2 {
        let window = buffer.get_window().unwrap();
        assert!(window.is_empty());
        buffer.consumed(window, 0).unwrap();
    }
    assert_eq!(buffer.phase(), BufferPhase::Drained);

    // Leaving drain mode restarts the stream.
    buffer.drain(false);
    assert_eq!(buffer.phase(), BufferPhase::Active);
    buffer.queue(&pattern(20)).unwrap();
    let window = buffer.get_window().unwrap();
    assert_eq!(window.len(), 16);
}

#[test]
fn drain_wakes_a_waiting_consumer() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap());
    buffer.queue(&pattern(3)).unwrap();

    let (tx, rx) = mpsc::channel();
    let consumer = {
        let buffer = buffer.clone();
        thread::spawn(move || {
            let window = buffer.get_window().unwrap();
            tx.send(window.len()).unwrap();
        })
    };

    // Not enough for a window: the consumer stays blocked.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    buffer.drain(true);
    assert_eq!(rx.recv_timeout(DEADLINE).unwrap(), 3);
    consumer.join().unwrap();
}

#[test]
fn abort_wakes_a_blocked_producer() {
    setup_logging();
    let buffer = Arc::new(CircularStreamBuffer::new(BufferConfig::new(16, 3, false)).unwrap());

    let (tx, rx) = mpsc::channel();
    let producer = {
        let buffer = buffer.clone();
        thread::spawn(move || {
            tx.send(buffer.queue(&pattern(200))).unwrap();
        })
    };

    // The arena holds 56 bytes and nobody consumes: the producer blocks.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(buffer.data_size(), 56);
    assert!(buffer.stats().producer_waits > 0);

    buffer.consumer_aborted();
    let result = rx.recv_timeout(DEADLINE).unwrap();
    assert!(matches!(result, Err(Error::ConsumerAborted)));
    producer.join().unwrap();

    assert!(matches!(
        buffer.queue(&pattern(1)),
        Err(Error::ConsumerAborted)
    ));
    assert!(matches!(
        buffer.queue(&[0u8; 0][..]),
        Err(Error::ConsumerAborted)
    ));
    assert_eq!(buffer.phase(), BufferPhase::Aborted);
}

#[test]
fn timestamps_follow_the_read_position() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(4, 3, false)).unwrap();
    assert_eq!(buffer.duration_remaining(), Some(Duration::ZERO));

    let ms = Duration::from_millis;
    buffer.queue(&[1u8, 2, 3][..]).unwrap();
    buffer
        .queue(StreamChunk::new(&[4, 5, 6]).with_pts(ms(100)).with_duration(ms(20)))
        .unwrap();
    // The first timestamped chunk sets the stream time; later ones do not.
    buffer.queue(StreamChunk::new(&[7]).with_pts(ms(500))).unwrap();
    assert_eq!(buffer.timestamp(), Some(ms(100)));
    assert_eq!(buffer.duration_remaining(), None);

    let window = buffer.get_window().unwrap();
    assert_eq!(window.timestamp(), Some(ms(100)));
    buffer.consumed(window, 4).unwrap();
    buffer.time_consumed(Some(ms(20)));
    assert_eq!(buffer.timestamp(), Some(ms(120)));
    assert_eq!(buffer.duration_remaining(), None);
}

#[test]
fn known_durations_are_tracked_until_one_is_missing() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(4, 3, false)).unwrap();
    let ms = Duration::from_millis;
    for _ in 0..3 {
        buffer
            .queue(StreamChunk::new(&[0, 0]).with_duration(ms(10)))
            .unwrap();
    }
    assert_eq!(buffer.duration_remaining(), Some(ms(30)));

    buffer.time_consumed(Some(ms(10)));
    assert_eq!(buffer.duration_remaining(), Some(ms(20)));
    // No timestamp was ever supplied, so there is none to advance.
    assert_eq!(buffer.timestamp(), None);

    buffer.time_consumed(None);
    assert_eq!(buffer.duration_remaining(), None);
    buffer.time_consumed(Some(ms(10)));
    assert_eq!(buffer.duration_remaining(), None);
}

#[test]
fn second_window_rejected_while_one_is_outstanding() {
    setup_logging();
    let buffer = CircularStreamBuffer::new(BufferConfig::new(4, 3, false)).unwrap();
    buffer.queue(&pattern(10)).unwrap();

    let first = buffer.get_window().unwrap();
    assert!(matches!(buffer.get_window(), Err(Error::WindowOutstanding)));

    // Dropping an unconsumed window hands it back untouched.
    drop(first);
    let again = buffer.get_window().unwrap();
    assert_eq!(again.data(), &pattern(10)[..4]);
    buffer.consumed(again, 4).unwrap();
    assert_eq!(buffer.data_size(), 6);
}

#[test]
fn window_from_another_buffer_rejected() {
    setup_logging();
    let a = CircularStreamBuffer::new(BufferConfig::new(4, 3, false)).unwrap();
    let b = CircularStreamBuffer::new(BufferConfig::new(4, 3, false)).unwrap();
    a.queue(&pattern(5)).unwrap();

    let window = a.get_window().unwrap();
    assert!(matches!(b.consumed(window, 4), Err(Error::ForeignWindow)));
    // The rejected window went back to its own buffer.
    let window = a.get_window().unwrap();
    a.consumed(window, 4).unwrap();
    assert_eq!(a.data_size(), 1);
}

#[test]
fn byte_swapping_copier_never_splits_a_sample() {
    setup_logging();
    let buffer = Arc::new(
        CircularStreamBuffer::with_copier(BufferConfig::new(16, 3, false), SwapBytes16).unwrap(),
    );
    let data = pattern(1_000);
    let producer = spawn_producer(buffer.clone(), data.clone(), vec![50]);

    let out = consume_all(&buffer, |len| len - len % 2);
    producer.join().unwrap().unwrap();

    let expected: Vec<u8> = data.chunks(2).flat_map(|c| [c[1], c[0]]).collect();
    assert_eq!(out, expected);
}
