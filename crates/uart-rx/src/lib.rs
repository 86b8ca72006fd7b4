//! Serial Ingestion
//!
//! Interrupt-side halves only record bytes; interpretation is deferred to
//! scheduler tasks. Two paths are provided:
//!
//! * [`FrameReceiver`]: byte-per-interrupt reception into a small capture
//!   buffer, with frames delimited by an idle-line timeout.
//! * [`BulkIngest`] / [`BulkDrain`]: block-mode (DMA) reception into a large
//!   staging buffer, forwarded through an SPSC ring to a draining task.

mod bulk;
mod frame;

pub use bulk::{BulkDrain, BulkIngest};
pub use frame::{FrameFinalizer, FrameOutcome, FrameReceiver, FrameStats, FrameWriter};

use mcu_hal::Tick;

/// Capacity of the byte-interrupt capture buffer
pub const SMALL_CAPTURE_LEN: usize = 10;

/// Capacity of the block-mode staging buffer
pub const BULK_CAPTURE_LEN: usize = 1000;

/// Silence (in ticks) after the last byte that ends a frame
pub const DEFAULT_IDLE_TIMEOUT_TICKS: Tick = 10;

/// Application-level receiver of completed frames or drained blocks
pub trait FrameConsumer {
    /// Handle one frame; the slice is only valid for the duration of the call
    fn on_frame(&mut self, frame: &[u8]);
}

impl<F> FrameConsumer for F
where
    F: FnMut(&[u8]),
{
    fn on_frame(&mut self, frame: &[u8]) {
        self(frame)
    }
}
