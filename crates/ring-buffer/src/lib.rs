//! Lock-Free Ring Buffer
//!
//! Provides a fixed-capacity SPSC byte ring for moving serial data from an
//! interrupt handler into the cooperative task loop. No heap, no locks.

mod buffer;

pub use buffer::{Consumer, Producer, RingBuffer, DEFAULT_CAPACITY};
