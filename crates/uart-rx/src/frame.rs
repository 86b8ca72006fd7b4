//! Idle-Timeout Frame Receiver
//!
//! The receive interrupt appends bytes through a [`FrameWriter`]. A scheduler
//! task polls the [`FrameFinalizer`], which declares the frame complete once the
//! line has been idle for `idle_timeout` ticks and hands it to a consumer.
//!
//! The only point where both contexts touch the capture buffer is the
//! copy-and-reset inside [`FrameFinalizer::poll`], which runs in a critical
//! section. A byte racing with the timeout is either part of the handed-off
//! frame or the first byte of the next one.

use crate::FrameConsumer;
use critical_section::Mutex;
use mcu_hal::{elapsed, Tick, TickCounter};
use std::cell::RefCell;
use tracing::{debug, warn};

/// Interrupt-owned capture state
struct CaptureFrame<const N: usize> {
    data: [u8; N],
    /// Next write offset
    len: usize,
    /// Tick of the most recent byte, stamped even when the byte was dropped
    last_byte_tick: Tick,
    overflow: bool,
    /// Bytes discarded since the overflow began
    dropped: usize,
}

impl<const N: usize> CaptureFrame<N> {
    const fn new() -> Self {
        Self {
            data: [0; N],
            len: 0,
            last_byte_tick: 0,
            overflow: false,
            dropped: 0,
        }
    }

    fn append(&mut self, byte: u8, now: Tick) {
        self.last_byte_tick = now;
        if self.overflow || self.len >= N {
            self.overflow = true;
            self.dropped += 1;
            return;
        }
        self.data[self.len] = byte;
        self.len += 1;
    }

    fn reset(&mut self) {
        self.len = 0;
        self.overflow = false;
        self.dropped = 0;
    }
}

/// Result of one finalization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing has been received
    Empty,
    /// Bytes are pending but the line has not been idle long enough
    Receiving,
    /// A complete frame of `len` bytes went to the consumer
    Delivered { len: usize },
    /// The frame overflowed the capture buffer and was dropped whole
    Discarded { len: usize, dropped: usize },
}

/// Counters kept by the finalizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub delivered: u32,
    pub discarded: u32,
    pub bytes_delivered: u64,
}

/// Capture buffer plus the configuration shared by both handles
pub struct FrameReceiver<'c, const N: usize> {
    capture: Mutex<RefCell<CaptureFrame<N>>>,
    clock: &'c TickCounter,
    idle_timeout: Tick,
}

impl<'c, const N: usize> FrameReceiver<'c, N> {
    /// Create a receiver timed by `clock`
    pub fn new(clock: &'c TickCounter, idle_timeout: Tick) -> Self {
        Self {
            capture: Mutex::new(RefCell::new(CaptureFrame::new())),
            clock,
            idle_timeout: idle_timeout.max(1),
        }
    }

    /// Idle timeout in ticks
    pub fn idle_timeout(&self) -> Tick {
        self.idle_timeout
    }

    /// Split into the interrupt-side writer and the task-side finalizer
    pub fn split(&mut self) -> (FrameWriter<'_, N>, FrameFinalizer<'_, N>) {
        let receiver: &Self = self;
        (
            FrameWriter {
                capture: &receiver.capture,
                clock: receiver.clock,
            },
            FrameFinalizer {
                capture: &receiver.capture,
                clock: receiver.clock,
                idle_timeout: receiver.idle_timeout,
                scratch: [0; N],
                stats: FrameStats::default(),
            },
        )
    }
}

/// Interrupt-side handle: appends bytes and stamps the arrival tick
pub struct FrameWriter<'a, const N: usize> {
    capture: &'a Mutex<RefCell<CaptureFrame<N>>>,
    clock: &'a TickCounter,
}

impl<const N: usize> FrameWriter<'_, N> {
    /// Record one received byte (call from the receive interrupt)
    pub fn on_byte(&mut self, byte: u8) {
        critical_section::with(|cs| {
            let now = self.clock.now();
            self.capture.borrow_ref_mut(cs).append(byte, now);
        });
    }

    /// Record a burst of bytes that arrived in one interrupt
    pub fn on_bytes(&mut self, bytes: &[u8]) {
        critical_section::with(|cs| {
            let now = self.clock.now();
            let mut capture = self.capture.borrow_ref_mut(cs);
            for &byte in bytes {
                capture.append(byte, now);
            }
        });
    }
}

enum Handoff {
    Empty,
    Receiving,
    Taken {
        len: usize,
        overflowed: bool,
        dropped: usize,
    },
}

/// Task-side handle: detects idle timeouts and hands frames off
pub struct FrameFinalizer<'a, const N: usize> {
    capture: &'a Mutex<RefCell<CaptureFrame<N>>>,
    clock: &'a TickCounter,
    idle_timeout: Tick,
    /// Frame copy owned by the task, so the consumer runs outside the
    /// critical section
    scratch: [u8; N],
    stats: FrameStats,
}

impl<const N: usize> FrameFinalizer<'_, N> {
    /// Check for a completed frame and hand it to `consumer`
    pub fn poll<C>(&mut self, consumer: &mut C) -> FrameOutcome
    where
        C: FrameConsumer + ?Sized,
    {
        let clock = self.clock;
        let idle_timeout = self.idle_timeout;
        let scratch = &mut self.scratch;

        let handoff = critical_section::with(|cs| {
            let mut capture = self.capture.borrow_ref_mut(cs);
            if capture.len == 0 && !capture.overflow {
                return Handoff::Empty;
            }
            // Sampled inside the critical section so no byte can be stamped
            // after `now`
            let now = clock.now();
            if elapsed(now, capture.last_byte_tick) < idle_timeout {
                return Handoff::Receiving;
            }

            let len = capture.len;
            scratch[..len].copy_from_slice(&capture.data[..len]);
            let handoff = Handoff::Taken {
                len,
                overflowed: capture.overflow,
                dropped: capture.dropped,
            };
            capture.reset();
            handoff
        });

        match handoff {
            Handoff::Empty => FrameOutcome::Empty,
            Handoff::Receiving => FrameOutcome::Receiving,
            Handoff::Taken {
                len,
                overflowed: true,
                dropped,
            } => {
                self.stats.discarded += 1;
                warn!(
                    "Capture overflow: discarded {} byte frame ({} bytes dropped)",
                    len, dropped
                );
                FrameOutcome::Discarded { len, dropped }
            }
            Handoff::Taken { len, .. } => {
                self.stats.delivered += 1;
                self.stats.bytes_delivered += len as u64;
                debug!("Frame complete: {} bytes", len);
                consumer.on_frame(&self.scratch[..len]);
                FrameOutcome::Delivered { len }
            }
        }
    }

    /// Counters since start-up
    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}
