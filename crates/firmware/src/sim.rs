//! Host simulation
//!
//! Runs the firmware wiring on a desktop. Threads play the timer and UART
//! interrupts; simulated peripherals answer the SPI, ADC and DMA calls.

use crate::config::{FirmwareConfig, SimConfig};
use crate::tasks::{AdcTask, BulkDrainTask, FrameCheckTask, FrameLog, SensorTask};
use crate::{BULK_RING_LEN, TASK_SLOTS};
use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
use max6675::{Max6675, MonitorStats, ReadingCell, ThermocoupleMonitor, ThermocoupleReading};
use mcu_hal::{
    AdcChannel, AdcError, BlockReceiver, ReceiverError, Tick, TickCounter, TickDriver,
};
use ring_buffer::RingBuffer;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::time::Duration;
use task_scheduler::{SchedulerBuilder, SchedulerError, TaskStats};
use thiserror::Error;
use tracing::{info, warn};
use uart_rx::{
    BulkDrain, BulkIngest, FrameReceiver, FrameStats, FrameWriter, BULK_CAPTURE_LEN,
    SMALL_CAPTURE_LEN,
};

/// Command sent on the byte-interrupt path
const COMMAND_FRAME: &[u8] = b"T?\r\n";

/// Errors that stop a simulation before it starts
#[derive(Debug, Error)]
pub enum SimError {
    #[error("task table: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("DMA receiver: {0}")]
    Receiver(#[from] ReceiverError),

    #[error("tick driver already taken")]
    TickDriverTaken,
}

/// Outcome of a simulation run
#[derive(Debug, Clone)]
pub struct SimReport {
    pub frames: FrameStats,
    pub frames_seen: u32,
    pub bulk_drained: u64,
    pub bulk_dropped: usize,
    pub dma_rearm_failures: u32,
    pub sensor: MonitorStats,
    pub reading: ThermocoupleReading,
    pub adc_level: u16,
    pub adc_errors: u32,
    pub tasks: Vec<(&'static str, TaskStats)>,
}

/// Thermocouple probe whose temperature and wiring the script controls
pub struct SimProbe {
    connected: AtomicBool,
    quarter_degrees: AtomicU16,
}

impl SimProbe {
    pub fn new(quarter_degrees: u16) -> Self {
        Self {
            connected: AtomicBool::new(true),
            quarter_degrees: AtomicU16::new(quarter_degrees),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn set_quarter_degrees(&self, quarter_degrees: u16) {
        self.quarter_degrees.store(quarter_degrees & 0x0FFF, Ordering::Relaxed);
    }

    fn word(&self) -> u16 {
        if self.connected.load(Ordering::Relaxed) {
            self.quarter_degrees.load(Ordering::Relaxed) << 3
        } else {
            // Open input flag; temperature bits are meaningless
            0x0004
        }
    }
}

/// MAX6675 behind a simulated SPI device
pub struct SimThermocouple<'p> {
    probe: &'p SimProbe,
}

impl<'p> SimThermocouple<'p> {
    pub fn new(probe: &'p SimProbe) -> Self {
        Self { probe }
    }
}

impl ErrorType for SimThermocouple<'_> {
    type Error = ErrorKind;
}

impl SpiDevice for SimThermocouple<'_> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        let bytes = self.probe.word().to_be_bytes();
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) | Operation::TransferInPlace(buf) => {
                    for (dst, src) in buf.iter_mut().zip(bytes.iter()) {
                        *dst = *src;
                    }
                }
                Operation::Transfer(read, _) => {
                    for (dst, src) in read.iter_mut().zip(bytes.iter()) {
                        *dst = *src;
                    }
                }
                Operation::Write(_) | Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

/// ADC returning a noisy level with a periodic spike
#[derive(Default)]
pub struct SimAdc {
    count: u32,
}

impl AdcChannel for SimAdc {
    fn sample(&mut self) -> Result<u16, AdcError> {
        self.count = self.count.wrapping_add(1);
        if self.count % 17 == 0 {
            return Ok(4095);
        }
        Ok(2048 + (self.count.wrapping_mul(2_654_435_761) >> 28) as u16)
    }
}

/// DMA receiver that only counts re-arms
#[derive(Default)]
pub struct SimDma {
    restarts: AtomicU32,
}

impl SimDma {
    /// Times reception was re-armed
    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::Relaxed)
    }
}

impl BlockReceiver for SimDma {
    fn restart(&mut self, _buffer: &mut [u8]) -> Result<(), ReceiverError> {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Run the full firmware wiring for `config.sim.run_ticks` ticks
pub fn run_simulation(config: &FirmwareConfig) -> Result<SimReport, SimError> {
    let sim = &config.sim;
    let clock = TickCounter::new();
    let mut tick_driver = clock.take_driver().ok_or(SimError::TickDriverTaken)?;
    let done = AtomicBool::new(false);

    let probe = SimProbe::new(100);
    let reading = ReadingCell::new();
    let adc_level = AtomicU16::new(0);

    let mut receiver = FrameReceiver::<SMALL_CAPTURE_LEN>::new(&clock, config.idle_timeout_ticks);
    let (mut writer, finalizer) = receiver.split();

    let mut ring = RingBuffer::<BULK_RING_LEN>::new();
    let (producer, consumer) = ring.split();
    let mut ingest =
        BulkIngest::<_, BULK_CAPTURE_LEN, BULK_RING_LEN>::new(producer, SimDma::default());
    ingest.start()?;

    let mut frame_task = FrameCheckTask::new(finalizer, FrameLog::new("uart"));
    let mut bulk_task = BulkDrainTask::new(BulkDrain::new(consumer), FrameLog::new("dma"));
    let mut sensor_task = SensorTask::new(ThermocoupleMonitor::new(
        Max6675::new(SimThermocouple::new(&probe)),
        &reading,
    ));
    let mut adc_task = AdcTask::new(SimAdc::default(), &adc_level);

    let mut builder = SchedulerBuilder::<TASK_SLOTS>::new(&clock);
    builder.register("frame-check", config.frame_check_period_ticks, &mut frame_task)?;
    builder.register("bulk-drain", config.bulk_drain_period_ticks, &mut bulk_task)?;
    builder.register("thermocouple", config.sensor_period_ticks, &mut sensor_task)?;
    builder.register("adc", config.adc_period_ticks, &mut adc_task)?;
    let mut scheduler = builder.build();

    info!(
        "Simulating {} ticks at {} us/tick",
        sim.run_ticks, sim.tick_interval_us
    );

    std::thread::scope(|s| {
        s.spawn(|| timer_interrupt(&mut tick_driver, &done, sim));
        s.spawn(|| uart_interrupts(&clock, &mut writer, &mut ingest, &probe, &done, sim));

        scheduler.run_for(sim.run_ticks);
        done.store(true, Ordering::Release);
    });

    let tasks = scheduler.summary();
    drop(scheduler);

    let (bulk_drained, bulk_dropped) = bulk_task.totals();
    Ok(SimReport {
        frames: frame_task.stats(),
        frames_seen: frame_task.consumer().frames(),
        bulk_drained,
        bulk_dropped,
        dma_rearm_failures: ingest.rearm_failures(),
        sensor: sensor_task.stats(),
        reading: reading.load(),
        adc_level: adc_level.load(Ordering::Relaxed),
        adc_errors: adc_task.errors(),
        tasks,
    })
}

/// Timer ISR stand-in
fn timer_interrupt(driver: &mut TickDriver<'_>, done: &AtomicBool, sim: &SimConfig) {
    let interval = Duration::from_micros(sim.tick_interval_us.max(1));
    while !done.load(Ordering::Acquire) {
        std::thread::sleep(interval);
        driver.advance();
    }
}

/// Wait until the clock reaches `tick`; false if the run ended first
fn wait_for_tick(clock: &TickCounter, tick: Tick, done: &AtomicBool, sim: &SimConfig) -> bool {
    let poll = Duration::from_micros((sim.tick_interval_us / 4).max(1));
    while mcu_hal::elapsed(clock.now(), tick) > Tick::MAX / 2 {
        if done.load(Ordering::Acquire) {
            return false;
        }
        std::thread::sleep(poll);
    }
    true
}

/// DMA completion: stage `block` and hand it to the ingest stage
fn deliver_block<R>(
    ingest: &mut BulkIngest<'_, R, BULK_CAPTURE_LEN, BULK_RING_LEN>,
    block: &[u8],
) where
    R: BlockReceiver,
{
    let len = block.len().min(BULK_CAPTURE_LEN);
    ingest.stage_mut()[..len].copy_from_slice(&block[..len]);
    // Ring drops surface in the drain task
    if let Err(e) = ingest.on_block(len) {
        warn!("DMA re-arm failed after {} blocks: {}", ingest.blocks(), e);
    }
}

/// UART byte ISR, DMA ISR and probe wiring stand-ins
fn uart_interrupts<R>(
    clock: &TickCounter,
    writer: &mut FrameWriter<'_, SMALL_CAPTURE_LEN>,
    ingest: &mut BulkIngest<'_, R, BULK_CAPTURE_LEN, BULK_RING_LEN>,
    probe: &SimProbe,
    done: &AtomicBool,
    sim: &SimConfig,
) where
    R: BlockReceiver,
{
    let start = clock.now();
    let mut next_frame = start.wrapping_add(sim.frame_interval_ticks);
    let mut next_block = start.wrapping_add(sim.bulk_interval_ticks);
    let mut block_seq = 0u32;

    while !done.load(Ordering::Acquire) {
        let now = clock.now();
        let age = mcu_hal::elapsed(now, start);

        probe.set_quarter_degrees(100 + (age / 50) as u16);
        let unplugged = sim.open_circuit_at_tick.is_some_and(|t| age >= t)
            && !sim.reconnect_at_tick.is_some_and(|t| age >= t);
        probe.set_connected(!unplugged);

        if mcu_hal::elapsed(now, next_frame) < Tick::MAX / 2 {
            // One byte per tick, like a slow terminal
            for &byte in COMMAND_FRAME {
                let at = clock.now();
                writer.on_byte(byte);
                if !wait_for_tick(clock, at.wrapping_add(1), done, sim) {
                    return;
                }
            }
            next_frame = next_frame.wrapping_add(sim.frame_interval_ticks);
        }

        if mcu_hal::elapsed(now, next_block) < Tick::MAX / 2 {
            block_seq = block_seq.wrapping_add(1);
            let line = format!("$LOG,{},{},{}\r\n", block_seq, now, probe.word());
            deliver_block(ingest, line.as_bytes());
            next_block = next_block.wrapping_add(sim.bulk_interval_ticks);
        }

        if !wait_for_tick(clock, now.wrapping_add(1), done, sim) {
            return;
        }
    }
}
