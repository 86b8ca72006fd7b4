//! Peripheral Error Types

use thiserror::Error;

/// Errors reported by an ADC collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdcError {
    /// Conversion did not finish in time
    #[error("ADC conversion timed out")]
    Timeout,

    /// A new conversion overwrote an unread result
    #[error("ADC data overrun")]
    Overrun,
}

/// Errors reported when re-arming block-mode serial reception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReceiverError {
    /// Peripheral is still busy with the previous transfer
    #[error("serial receiver busy")]
    Busy,

    /// Framing, noise or parity error on the line
    #[error("serial line error")]
    LineError,
}
