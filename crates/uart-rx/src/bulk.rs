//! Block-Mode Bulk Ingestion
//!
//! The serial peripheral writes into a staging buffer on its own and signals
//! "N bytes arrived" (idle line, half or full transfer). The interrupt handler
//! forwards the staged bytes into an SPSC ring and re-arms reception; a
//! scheduler task drains the ring later.

use crate::FrameConsumer;
use mcu_hal::{BlockReceiver, ReceiverError};
use ring_buffer::{Consumer, Producer};
use tracing::warn;

/// Interrupt-side half: owns the staging buffer and the ring producer
pub struct BulkIngest<'a, R, const N: usize, const C: usize> {
    stage: [u8; N],
    producer: Producer<'a, C>,
    receiver: R,
    blocks: u32,
    rearm_failures: u32,
}

impl<'a, R, const N: usize, const C: usize> BulkIngest<'a, R, N, C>
where
    R: BlockReceiver,
{
    /// Create an ingest stage feeding `producer`
    pub fn new(producer: Producer<'a, C>, receiver: R) -> Self {
        Self {
            stage: [0; N],
            producer,
            receiver,
            blocks: 0,
            rearm_failures: 0,
        }
    }

    /// Arm the first reception
    pub fn start(&mut self) -> Result<(), ReceiverError> {
        self.receiver.restart(&mut self.stage)
    }

    /// Staging area, for receivers that copy instead of writing directly
    pub fn stage_mut(&mut self) -> &mut [u8; N] {
        &mut self.stage
    }

    /// Handle "`received` bytes arrived" from the peripheral interrupt.
    ///
    /// Returns how many bytes made it into the ring; the rest are counted as
    /// dropped by the ring. Reception is re-armed even when the ring is full.
    pub fn on_block(&mut self, received: usize) -> Result<usize, ReceiverError> {
        let len = received.min(N);
        let accepted = self.producer.push_slice(&self.stage[..len]);
        self.blocks = self.blocks.wrapping_add(1);

        if let Err(e) = self.receiver.restart(&mut self.stage) {
            self.rearm_failures = self.rearm_failures.wrapping_add(1);
            return Err(e);
        }
        Ok(accepted)
    }

    /// Blocks signalled so far
    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    /// Times re-arming the receiver failed
    pub fn rearm_failures(&self) -> u32 {
        self.rearm_failures
    }
}

/// Chunk handed to the consumer per call
const DRAIN_CHUNK: usize = 64;

/// Task-side half: drains the ring into an application consumer
pub struct BulkDrain<'a, const C: usize> {
    consumer: Consumer<'a, C>,
    chunk: [u8; DRAIN_CHUNK],
    drained: u64,
    reported_drops: usize,
}

impl<'a, const C: usize> BulkDrain<'a, C> {
    /// Create a drain reading from `consumer`
    pub fn new(consumer: Consumer<'a, C>) -> Self {
        Self {
            consumer,
            chunk: [0; DRAIN_CHUNK],
            drained: 0,
            reported_drops: 0,
        }
    }

    /// Move what is currently queued to `sink`, in chunks.
    ///
    /// Bounded by one ring's worth of data per call so a producer that keeps
    /// writing cannot hold the task loop.
    pub fn drain<S>(&mut self, sink: &mut S) -> usize
    where
        S: FrameConsumer + ?Sized,
    {
        let mut total = 0;
        while total < C {
            let count = self.consumer.pop_into(&mut self.chunk);
            if count == 0 {
                break;
            }
            sink.on_frame(&self.chunk[..count]);
            total += count;
        }
        self.drained += total as u64;

        let dropped = self.consumer.dropped();
        if dropped != self.reported_drops {
            warn!(
                "Bulk ring overflow: {} bytes dropped since last drain ({} total)",
                dropped.wrapping_sub(self.reported_drops),
                dropped
            );
            self.reported_drops = dropped;
        }
        total
    }

    /// Bytes drained since start-up
    pub fn drained(&self) -> u64 {
        self.drained
    }

    /// Bytes the interrupt side could not queue
    pub fn dropped(&self) -> usize {
        self.consumer.dropped()
    }
}
