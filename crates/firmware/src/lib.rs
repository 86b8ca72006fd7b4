//! Thermocouple Logger Firmware
//!
//! Wires the serial ingestion paths, the MAX6675 acquisition and the ADC
//! channel into one cooperative task table. The `sim` module runs the same
//! wiring on a host with threads standing in for interrupts.

pub mod config;
pub mod filter;
pub mod sim;
pub mod tasks;

pub use crate::config::{ConfigError, FirmwareConfig, SimConfig};
pub use crate::tasks::{AdcTask, BulkDrainTask, FrameCheckTask, FrameLog, SensorTask};

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Number of slots in the firmware task table
pub const TASK_SLOTS: usize = 8;

/// Ring between the DMA interrupt and the drain task
pub const BULK_RING_LEN: usize = ring_buffer::DEFAULT_CAPACITY;

/// Initialize logging; `RUST_LOG` overrides the default `info` level
pub fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
