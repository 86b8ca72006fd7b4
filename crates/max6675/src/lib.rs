//! MAX6675 Thermocouple Acquisition
//!
//! Polls a MAX6675 over SPI, converts the raw word to a temperature and
//! publishes the latest reading for other tasks. Faults never escalate: the
//! last good temperature is kept and only the fault flag and tick move.

mod driver;
mod error;
mod reading;

pub use driver::{decode, Max6675, MonitorStats, ThermocoupleMonitor};
pub use error::SensorFault;
pub use reading::{ReadingCell, Temperature, ThermocoupleReading};

/// MAX6675 conversion time is ~220 ms; sample slightly slower than that
pub const DEFAULT_SAMPLE_PERIOD_TICKS: mcu_hal::Tick = 250;
