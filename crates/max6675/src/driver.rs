//! MAX6675 Driver
//!
//! Word layout (16 bits, MSB first):
//!
//! | bit   | meaning                                   |
//! |-------|-------------------------------------------|
//! | 15    | dummy sign bit, always 0                  |
//! | 14..3 | 12-bit temperature, 0.25 °C per LSB       |
//! | 2     | thermocouple input open                   |
//! | 1     | device ID, always 0                       |
//! | 0     | three-state                               |

use crate::error::SensorFault;
use crate::reading::{ReadingCell, Temperature, ThermocoupleReading};
use embedded_hal::spi::{Error as _, SpiDevice};
use mcu_hal::Tick;
use tracing::{debug, info, warn};

const DUMMY_SIGN_BIT: u16 = 1 << 15;
const OPEN_INPUT_BIT: u16 = 1 << 2;
const DEVICE_ID_BIT: u16 = 1 << 1;
const TEMP_SHIFT: u16 = 3;
const TEMP_MASK: u16 = 0x0FFF;

/// Interpret a raw MAX6675 word
pub fn decode(raw: u16) -> Result<Temperature, SensorFault> {
    if raw & (DUMMY_SIGN_BIT | DEVICE_ID_BIT) != 0 {
        return Err(SensorFault::NoResponse(raw));
    }
    if raw & OPEN_INPUT_BIT != 0 {
        return Err(SensorFault::OpenCircuit);
    }
    Ok(Temperature::from_quarter_degrees((raw >> TEMP_SHIFT) & TEMP_MASK))
}

/// MAX6675 on an SPI device (chip select handled by the device)
pub struct Max6675<SPI> {
    spi: SPI,
}

impl<SPI> Max6675<SPI>
where
    SPI: SpiDevice,
{
    /// Wrap an SPI device
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Read the raw 16-bit word in one bus transaction
    pub fn read_raw(&mut self) -> Result<u16, SensorFault> {
        let mut buf = [0u8; 2];
        self.spi
            .read(&mut buf)
            .map_err(|e| SensorFault::Bus(e.kind()))?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Read and convert one sample
    pub fn sample(&mut self) -> Result<Temperature, SensorFault> {
        decode(self.read_raw()?)
    }

    /// Give the SPI device back
    pub fn release(self) -> SPI {
        self.spi
    }
}

/// Sampling counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub samples: u32,
    pub faults: u32,
    pub bus_errors: u32,
}

/// Periodic acquisition: sample, then publish into a shared [`ReadingCell`]
pub struct ThermocoupleMonitor<'r, SPI> {
    sensor: Max6675<SPI>,
    cell: &'r ReadingCell,
    stats: MonitorStats,
}

impl<'r, SPI> ThermocoupleMonitor<'r, SPI>
where
    SPI: SpiDevice,
{
    /// Create a monitor publishing into `cell`
    pub fn new(sensor: Max6675<SPI>, cell: &'r ReadingCell) -> Self {
        Self {
            sensor,
            cell,
            stats: MonitorStats::default(),
        }
    }

    /// Take one sample at tick `now` and publish the result.
    ///
    /// On a fault the previous temperature is kept; only the fault flag and
    /// the tick change.
    pub fn poll(&mut self, now: Tick) -> Result<Temperature, SensorFault> {
        let previous = self.cell.load();
        let outcome = self.sensor.sample();
        self.stats.samples = self.stats.samples.wrapping_add(1);

        match outcome {
            Ok(temperature) => {
                if previous.fault {
                    info!("Thermocouple recovered at {}", temperature);
                }
                debug!("Thermocouple sample {} at tick {}", temperature, now);
                self.cell.publish(ThermocoupleReading {
                    temperature,
                    fault: false,
                    valid: true,
                    sampled_at: now,
                });
            }
            Err(fault) => {
                self.stats.faults = self.stats.faults.wrapping_add(1);
                if let SensorFault::Bus(_) = fault {
                    self.stats.bus_errors = self.stats.bus_errors.wrapping_add(1);
                }
                if previous.fault {
                    debug!("Thermocouple still faulted: {}", fault);
                } else {
                    warn!("Thermocouple fault: {}", fault);
                }
                self.cell.publish(ThermocoupleReading {
                    fault: true,
                    sampled_at: now,
                    ..previous
                });
            }
        }
        outcome
    }

    /// Counters since start-up
    pub fn stats(&self) -> MonitorStats {
        self.stats
    }
}
