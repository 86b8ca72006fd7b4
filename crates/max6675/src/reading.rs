//! Published thermocouple reading
//!
//! The reading is packed into a single `AtomicU64` so a publish is one store
//! and a reader can never observe a temperature from one sample next to the
//! fault flag or tick of another.

use mcu_hal::Tick;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Temperature in the MAX6675's native 0.25 °C resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Temperature {
    quarter_degrees: u16,
}

impl Temperature {
    /// Build from a count of 0.25 °C steps
    pub const fn from_quarter_degrees(quarter_degrees: u16) -> Self {
        Self { quarter_degrees }
    }

    /// Raw count of 0.25 °C steps
    pub const fn quarter_degrees(&self) -> u16 {
        self.quarter_degrees
    }

    /// Degrees Celsius
    pub fn celsius(&self) -> f32 {
        self.quarter_degrees as f32 * 0.25
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} °C", self.celsius())
    }
}

/// Latest sensor state as seen by consumers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThermocoupleReading {
    /// Last good temperature (stale while `fault` is set)
    pub temperature: Temperature,
    /// Most recent sample failed
    pub fault: bool,
    /// At least one good sample has been taken
    pub valid: bool,
    /// Tick of the most recent sample attempt
    pub sampled_at: Tick,
}

const TEMP_SHIFT: u32 = 32;
const FAULT_BIT: u64 = 1 << 48;
const VALID_BIT: u64 = 1 << 49;

impl ThermocoupleReading {
    fn pack(&self) -> u64 {
        let mut packed = self.sampled_at as u64;
        packed |= (self.temperature.quarter_degrees as u64) << TEMP_SHIFT;
        if self.fault {
            packed |= FAULT_BIT;
        }
        if self.valid {
            packed |= VALID_BIT;
        }
        packed
    }

    fn unpack(packed: u64) -> Self {
        Self {
            temperature: Temperature::from_quarter_degrees((packed >> TEMP_SHIFT) as u16),
            fault: packed & FAULT_BIT != 0,
            valid: packed & VALID_BIT != 0,
            sampled_at: packed as u32,
        }
    }
}

/// Single-writer, multi-reader holder for the latest reading
pub struct ReadingCell {
    packed: AtomicU64,
}

impl ReadingCell {
    /// Empty cell: no valid reading yet
    pub const fn new() -> Self {
        Self {
            packed: AtomicU64::new(0),
        }
    }

    /// Snapshot of the latest reading
    pub fn load(&self) -> ThermocoupleReading {
        ThermocoupleReading::unpack(self.packed.load(Ordering::Acquire))
    }

    /// Replace the reading in one store
    pub fn publish(&self, reading: ThermocoupleReading) {
        self.packed.store(reading.pack(), Ordering::Release);
    }
}

impl Default for ReadingCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cell_is_invalid() {
        let cell = ReadingCell::new();
        let reading = cell.load();
        assert!(!reading.valid);
        assert!(!reading.fault);
    }

    #[test]
    fn test_publish_is_whole_value() {
        let cell = ReadingCell::new();
        let reading = ThermocoupleReading {
            temperature: Temperature::from_quarter_degrees(4095),
            fault: true,
            valid: true,
            sampled_at: u32::MAX,
        };
        cell.publish(reading);
        assert_eq!(cell.load(), reading);
    }

    #[test]
    fn test_temperature_display() {
        let t = Temperature::from_quarter_degrees(102);
        assert!((t.celsius() - 25.5).abs() < f32::EPSILON);
        assert_eq!(t.to_string(), "25.50 °C");
    }
}
