//! Scheduler tasks
//!
//! Each task wraps one subsystem's task-side handle. Interrupt-side handles
//! stay with whoever plays the interrupt.

use crate::filter::MedianFilter;
use embedded_hal::spi::SpiDevice;
use max6675::ThermocoupleMonitor;
use mcu_hal::{AdcChannel, Tick};
use std::sync::atomic::{AtomicU16, Ordering};
use task_scheduler::Task;
use tracing::{debug, info, warn};
use uart_rx::{BulkDrain, FrameConsumer, FrameFinalizer, FrameStats};

/// Application-level frame consumer: counts and logs what arrives
#[derive(Debug, Default)]
pub struct FrameLog {
    source: &'static str,
    frames: u32,
    bytes: u64,
}

impl FrameLog {
    /// Create a log for frames from `source`
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            frames: 0,
            bytes: 0,
        }
    }

    /// Frames seen
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Bytes seen
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FrameConsumer for FrameLog {
    fn on_frame(&mut self, frame: &[u8]) {
        self.frames = self.frames.wrapping_add(1);
        self.bytes += frame.len() as u64;

        match std::str::from_utf8(frame) {
            Ok(text) if text.chars().all(|c| !c.is_control() || c.is_whitespace()) => {
                info!("[{}] {:?}", self.source, text.trim_end());
            }
            _ => debug!("[{}] {} bytes: {:02X?}", self.source, frame.len(), frame),
        }
    }
}

/// Idle-timeout check for the byte-interrupt path. Register first: its
/// latency bounds how soon a frame is recognised.
pub struct FrameCheckTask<'a, const N: usize, C> {
    finalizer: FrameFinalizer<'a, N>,
    consumer: C,
}

impl<'a, const N: usize, C> FrameCheckTask<'a, N, C>
where
    C: FrameConsumer,
{
    /// Create the task around the task-side frame handle
    pub fn new(finalizer: FrameFinalizer<'a, N>, consumer: C) -> Self {
        Self {
            finalizer,
            consumer,
        }
    }

    /// Frame counters
    pub fn stats(&self) -> FrameStats {
        self.finalizer.stats()
    }

    /// The consumer frames are delivered to
    pub fn consumer(&self) -> &C {
        &self.consumer
    }
}

impl<const N: usize, C> Task for FrameCheckTask<'_, N, C>
where
    C: FrameConsumer,
{
    fn run(&mut self, _now: Tick) {
        self.finalizer.poll(&mut self.consumer);
    }
}

/// Drains the DMA ring into a consumer
pub struct BulkDrainTask<'a, const C: usize, S> {
    drain: BulkDrain<'a, C>,
    sink: S,
}

impl<'a, const C: usize, S> BulkDrainTask<'a, C, S>
where
    S: FrameConsumer,
{
    /// Create the task around the ring drain
    pub fn new(drain: BulkDrain<'a, C>, sink: S) -> Self {
        Self { drain, sink }
    }

    /// Bytes drained and bytes lost to ring overflow
    pub fn totals(&self) -> (u64, usize) {
        (self.drain.drained(), self.drain.dropped())
    }

    /// The consumer drained bytes go to
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<const C: usize, S> Task for BulkDrainTask<'_, C, S>
where
    S: FrameConsumer,
{
    fn run(&mut self, _now: Tick) {
        self.drain.drain(&mut self.sink);
    }
}

/// Periodic thermocouple acquisition
pub struct SensorTask<'r, SPI> {
    monitor: ThermocoupleMonitor<'r, SPI>,
}

impl<'r, SPI> SensorTask<'r, SPI>
where
    SPI: SpiDevice,
{
    /// Create the task around a thermocouple monitor
    pub fn new(monitor: ThermocoupleMonitor<'r, SPI>) -> Self {
        Self { monitor }
    }

    /// Sampling counters
    pub fn stats(&self) -> max6675::MonitorStats {
        self.monitor.stats()
    }
}

impl<SPI> Task for SensorTask<'_, SPI>
where
    SPI: SpiDevice,
{
    fn run(&mut self, now: Tick) {
        // Outcome is already published and logged by the monitor
        let _ = self.monitor.poll(now);
    }
}

/// Median window applied to ADC samples
const ADC_FILTER_WINDOW: usize = 5;

/// Samples the ADC and publishes a median-filtered level
pub struct AdcTask<'a, A> {
    adc: A,
    filter: MedianFilter<ADC_FILTER_WINDOW>,
    level: &'a AtomicU16,
    errors: u32,
}

impl<'a, A> AdcTask<'a, A>
where
    A: AdcChannel,
{
    /// Create the task publishing into `level`
    pub fn new(adc: A, level: &'a AtomicU16) -> Self {
        Self {
            adc,
            filter: MedianFilter::new(),
            level,
            errors: 0,
        }
    }

    /// Failed samples
    pub fn errors(&self) -> u32 {
        self.errors
    }
}

impl<A> Task for AdcTask<'_, A>
where
    A: AdcChannel,
{
    fn run(&mut self, _now: Tick) {
        match self.adc.sample() {
            Ok(raw) => {
                let level = self.filter.filter(raw);
                self.level.store(level, Ordering::Relaxed);
            }
            Err(e) => {
                self.errors = self.errors.wrapping_add(1);
                warn!("ADC sample failed: {}", e);
            }
        }
    }
}
