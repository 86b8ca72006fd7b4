//! Peripheral collaborator traits

use crate::error::{AdcError, ReceiverError};

/// Perform one analog-to-digital conversion and return the raw sample
pub trait AdcChannel {
    /// Run a single conversion
    fn sample(&mut self) -> Result<u16, AdcError>;
}

/// Block-mode (DMA) serial reception into a caller-provided staging buffer.
///
/// The peripheral reports "N bytes arrived" by invoking the owner's interrupt
/// handler; the handler consumes the staged bytes and calls `restart`.
pub trait BlockReceiver {
    /// Begin (or continue) reception into `buffer`
    fn restart(&mut self, buffer: &mut [u8]) -> Result<(), ReceiverError>;
}
