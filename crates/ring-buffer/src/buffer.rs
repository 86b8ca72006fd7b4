//! Lock-Free Ring Buffer Implementation

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default ring capacity used for bulk serial ingestion
pub const DEFAULT_CAPACITY: usize = 1024;

/// Lock-free SPSC ring buffer of bytes
///
/// One slot is always left free so that `head == tail` means empty and
/// `(tail + 1) % C == head` means full; `C - 1` bytes are usable.
/// The consumer only ever writes `head`, the producer only ever writes `tail`.
pub struct RingBuffer<const C: usize> {
    /// Inline storage
    storage: UnsafeCell<[u8; C]>,
    /// Read position (owned by the consumer)
    head: AtomicUsize,
    /// Write position (owned by the producer)
    tail: AtomicUsize,
    /// Total bytes accepted (for statistics)
    total_written: AtomicUsize,
    /// Bytes rejected by `Producer::push_slice` because the ring was full
    dropped: AtomicUsize,
}

impl<const C: usize> RingBuffer<C> {
    /// Create an empty ring buffer
    pub const fn new() -> Self {
        assert!(C >= 2, "ring buffer needs at least two slots");
        Self {
            storage: UnsafeCell::new([0; C]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            total_written: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Push a byte; returns false (and leaves the buffer untouched) when full
    pub fn push(&mut self, byte: u8) -> bool {
        self.enqueue(byte)
    }

    /// Pop the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        self.dequeue()
    }

    /// Number of bytes currently queued
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + C - head) % C
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + 1) % C == head
    }

    /// Usable capacity (`C - 1`)
    pub const fn capacity(&self) -> usize {
        C - 1
    }

    /// Total bytes ever accepted
    pub fn total_written(&self) -> usize {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Total bytes rejected by the producer handle
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        let tail = self.tail.load(Ordering::Relaxed);
        self.head.store(tail, Ordering::Release);
    }

    /// Split into producer and consumer handles.
    ///
    /// The handles borrow the ring mutably, so at most one of each can exist
    /// and the owner cannot touch the ring while they are alive.
    pub fn split(&mut self) -> (Producer<'_, C>, Consumer<'_, C>) {
        let ring: &Self = self;
        (
            Producer {
                ring,
                _not_clone: PhantomData,
            },
            Consumer {
                ring,
                _not_clone: PhantomData,
            },
        )
    }

    fn enqueue(&self, byte: u8) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) % C;
        if next_tail == self.head.load(Ordering::Acquire) {
            return false;
        }

        // SAFETY: only the producer writes slot `tail`, and the consumer does
        // not read it until the Release store below publishes it.
        unsafe {
            self.storage.get().cast::<u8>().add(tail).write(byte);
        }

        self.tail.store(next_tail, Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn dequeue(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: slot `head` was published by the producer's Release store
        // and is not rewritten until `head` moves past it.
        let byte = unsafe { self.storage.get().cast::<u8>().add(head).read() };

        self.head.store((head + 1) % C, Ordering::Release);
        Some(byte)
    }
}

impl<const C: usize> Default for RingBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: shared access only happens through the split handles, and `split`
// guarantees a single producer and a single consumer.
unsafe impl<const C: usize> Sync for RingBuffer<C> {}

/// Producer half; lives in the context that fills the ring (usually an ISR)
pub struct Producer<'a, const C: usize> {
    ring: &'a RingBuffer<C>,
    _not_clone: PhantomData<*const ()>,
}

// SAFETY: moving the only producer to another context keeps the SPSC contract.
unsafe impl<const C: usize> Send for Producer<'_, C> {}

impl<const C: usize> Producer<'_, C> {
    /// Push a byte; returns false when full
    pub fn push(&mut self, byte: u8) -> bool {
        self.ring.enqueue(byte)
    }

    /// Push as many bytes as fit; the rest are counted as dropped.
    /// Returns the number of bytes accepted.
    pub fn push_slice(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes
            .iter()
            .take_while(|&&byte| self.ring.enqueue(byte))
            .count();
        let rejected = bytes.len() - accepted;
        if rejected > 0 {
            self.ring.dropped.fetch_add(rejected, Ordering::Relaxed);
        }
        accepted
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

/// Consumer half; lives in the task loop
pub struct Consumer<'a, const C: usize> {
    ring: &'a RingBuffer<C>,
    _not_clone: PhantomData<*const ()>,
}

// SAFETY: moving the only consumer to another context keeps the SPSC contract.
unsafe impl<const C: usize> Send for Consumer<'_, C> {}

impl<const C: usize> Consumer<'_, C> {
    /// Pop the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        self.ring.dequeue()
    }

    /// Pop into `out` until it is full or the ring is empty
    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in out.iter_mut() {
            match self.ring.dequeue() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Number of bytes waiting
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Bytes the producer had to drop
    pub fn dropped(&self) -> usize {
        self.ring.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[test]
    fn test_push_and_pop() {
        let mut ring = RingBuffer::<8>::new();
        assert!(ring.is_empty());

        assert!(ring.push(0x41));
        assert!(ring.push(0x42));
        assert_eq!(ring.len(), 2);

        assert_eq!(ring.pop(), Some(0x41));
        assert_eq!(ring.pop(), Some(0x42));
        assert_eq!(ring.pop(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_fill_to_capacity_then_reject() {
        let mut ring = RingBuffer::<16>::new();
        let usable = ring.capacity();
        assert_eq!(usable, 15);

        for i in 0..usable {
            assert!(ring.push(i as u8));
        }
        assert!(ring.is_full());
        assert_eq!(ring.len(), usable);

        // One more does not fit and must not overwrite
        assert!(!ring.push(0xFF));

        for i in 0..usable {
            assert_eq!(ring.pop(), Some(i as u8));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let mut ring = RingBuffer::<8>::new();
        let mut next = 0u8;
        let mut expected = 0u8;

        // 5 bytes per round against 8 slots: indices cross the end every
        // couple of rounds, well over three full wraps in total
        for _ in 0..20 {
            for _ in 0..5 {
                assert!(ring.push(next));
                next = next.wrapping_add(1);
            }
            for _ in 0..5 {
                assert_eq!(ring.pop(), Some(expected));
                expected = expected.wrapping_add(1);
            }
        }
        assert_eq!(ring.total_written(), 100);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_split_handles_count_drops() {
        let mut ring = RingBuffer::<4>::new();
        {
            let (mut tx, mut rx) = ring.split();
            assert_eq!(tx.push_slice(b"hello"), 3);
            assert!(tx.is_full());
            assert_eq!(rx.dropped(), 2);

            let mut out = [0u8; 8];
            assert_eq!(rx.pop_into(&mut out), 3);
            assert_eq!(&out[..3], b"hel");
            assert!(rx.is_empty());
        }
        assert_eq!(ring.dropped(), 2);
    }

    #[test]
    fn test_clear() {
        let mut ring = RingBuffer::<8>::new();
        ring.push(1);
        ring.push(2);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_cross_thread_handoff() {
        let mut ring = RingBuffer::<32>::new();
        let (mut tx, mut rx) = ring.split();

        std::thread::scope(|s| {
            s.spawn(move || {
                for i in 0..=255u8 {
                    while !tx.push(i) {
                        std::hint::spin_loop();
                    }
                }
            });

            let mut expected = 0u16;
            while expected <= 255 {
                if let Some(byte) = rx.pop() {
                    assert_eq!(byte as u16, expected);
                    expected += 1;
                }
            }
        });
    }

    proptest! {
        #[test]
        fn test_fifo_matches_model(ops in prop::collection::vec(prop::option::of(any::<u8>()), 0..512)) {
            let mut ring = RingBuffer::<16>::new();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Some(byte) => {
                        let accepted = ring.push(byte);
                        prop_assert_eq!(accepted, model.len() < 15);
                        if accepted {
                            model.push_back(byte);
                        }
                    }
                    None => prop_assert_eq!(ring.pop(), model.pop_front()),
                }
                prop_assert_eq!(ring.len(), model.len());
            }
        }
    }
}
