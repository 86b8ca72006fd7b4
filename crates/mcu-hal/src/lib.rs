//! MCU Collaborator Interfaces
//!
//! The firmware core never touches peripheral registers. It consumes a
//! millisecond tick, an ADC channel and a block-mode serial receiver through
//! the narrow interfaces defined here. The thermocouple bus uses the
//! `embedded-hal` SPI traits directly.

mod error;
mod periph;
mod tick;

pub use error::{AdcError, ReceiverError};
pub use periph::{AdcChannel, BlockReceiver};
pub use tick::{elapsed, Tick, TickCounter, TickDriver};
