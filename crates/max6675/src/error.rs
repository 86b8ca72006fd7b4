//! Sensor Fault Types

use embedded_hal::spi::ErrorKind;
use thiserror::Error;

/// Why a sample produced no temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorFault {
    /// Thermocouple input is open (probe disconnected)
    #[error("thermocouple open circuit")]
    OpenCircuit,

    /// Word did not look like MAX6675 output (floating MISO, missing chip)
    #[error("no response from MAX6675 (raw word {0:#06X})")]
    NoResponse(u16),

    /// SPI transaction failed or timed out
    #[error("SPI bus error: {0:?}")]
    Bus(ErrorKind),
}
