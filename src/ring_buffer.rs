//! Lock-free single-producer/single-consumer byte queue.
//!
//! One producer thread and one consumer thread may call `write` and `read` concurrently on the
//! same buffer without any lock. A full buffer short-writes; an empty buffer short-reads. Neither
//! operation blocks or returns an error — back-pressure is expressed entirely through the returned
//! count.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use error::{Error, Result};

/// A single reserved slot distinguishes "empty" (`head == tail`) from "full" (`head + 1 == tail`,
/// mod capacity) without a separate occupancy counter.
pub struct RingBuffer {
    data: UnsafeCell<Box<[u8]>>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Safety: `data` is only ever touched through raw pointers derived in `write`/`read`, each of
// which is only called by the single producer (`write`) or single consumer (`read`) respectively,
// and the two never overlap the same bytes because of the head/tail protocol below.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Rounds `capacity` up to the next power of two (minimum 2) and allocates zeroed storage.
    /// One slot of the rounded capacity is reserved, so the usable capacity is one less than
    /// `capacity()`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid("ring buffer capacity must be non-zero"));
        }
        let rounded = capacity.next_power_of_two().max(2);
        let storage = vec![0u8; rounded].into_boxed_slice();
        Ok(RingBuffer {
            data: UnsafeCell::new(storage),
            mask: rounded - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        })
    }

    /// The rounded capacity, including the reserved slot.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Current occupancy. A snapshot; may be stale immediately in the presence of a concurrent
    /// peer.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes as many bytes from `data` as fit, returning the count actually stored. Never
    /// blocks.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let occupied = head.wrapping_sub(tail) & self.mask;
        let free = self.capacity() - 1 - occupied;
        let to_write = data.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let storage = unsafe { &mut *self.data.get() };
        for (i, byte) in data[..to_write].iter().enumerate() {
            storage[(head.wrapping_add(i)) & self.mask] = *byte;
        }

        self.head
            .store(head.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Reads as many bytes into `out` as are available, returning the count actually copied.
    /// Never blocks.
    pub fn read(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        let occupied = head.wrapping_sub(tail) & self.mask;
        let to_read = out.len().min(occupied);
        if to_read == 0 {
            return 0;
        }

        let storage = unsafe { &*self.data.get() };
        for (i, slot) in out[..to_read].iter_mut().enumerate() {
            *slot = storage[(tail.wrapping_add(i)) & self.mask];
        }

        self.tail
            .store(tail.wrapping_add(to_read), Ordering::Release);
        to_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    fn init_logging() {
        let _ = ::env_logger::Builder::from_default_env()
            .filter(None, ::log::LevelFilter::Info)
            .try_init();
    }

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        assert_eq!(RingBuffer::new(1).unwrap().capacity(), 2);
        assert_eq!(RingBuffer::new(2).unwrap().capacity(), 2);
        assert_eq!(RingBuffer::new(3).unwrap().capacity(), 4);
        assert_eq!(RingBuffer::new(200).unwrap().capacity(), 256);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(RingBuffer::new(0).is_err());
    }

    #[test]
    fn write_returns_short_count_when_full() {
        let ring = RingBuffer::new(4).unwrap(); // usable capacity 3
        assert_eq!(ring.write(b"abcdef"), 3);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.write(b"z"), 0);
    }

    #[test]
    fn read_returns_short_count_when_empty() {
        let ring = RingBuffer::new(4).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(ring.read(&mut buf), 0);
    }

    #[test]
    fn round_trips_bytes_in_order() {
        let ring = RingBuffer::new(8).unwrap();
        assert_eq!(ring.write(b"hello"), 5);
        let mut buf = [0u8; 5];
        assert_eq!(ring.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn wraps_around_the_backing_storage() {
        let ring = RingBuffer::new(4).unwrap(); // usable capacity 3
        let mut scratch = [0u8; 2];
        for round in 0..100u8 {
            let payload = [round, round.wrapping_add(1)];
            assert_eq!(ring.write(&payload), 2);
            assert_eq!(ring.read(&mut scratch), 2);
            assert_eq!(scratch, payload);
        }
    }

    #[test]
    fn concurrent_stress_preserves_fifo_order() {
        init_logging();
        use rand::Rng;

        let ring = Arc::new(RingBuffer::new(256).unwrap());
        let done = Arc::new(AtomicBool::new(false));
        const TOTAL: usize = 1_000_000;

        let writer_ring = Arc::clone(&ring);
        let writer = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut sent = 0usize;
            let mut next_byte: u8 = 0;
            while sent < TOTAL {
                let chunk_len = rng.gen_range(1..=32).min(TOTAL - sent);
                let chunk: Vec<u8> = (0..chunk_len)
                    .map(|i| next_byte.wrapping_add(i as u8))
                    .collect();
                let mut offset = 0;
                while offset < chunk.len() {
                    offset += writer_ring.write(&chunk[offset..]);
                }
                next_byte = next_byte.wrapping_add(chunk_len as u8);
                sent += chunk_len;
            }
        });

        let reader_ring = Arc::clone(&ring);
        let reader_done = Arc::clone(&done);
        let reader = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut received = 0usize;
            let mut expected: u8 = 0;
            let mut scratch = [0u8; 64];
            while received < TOTAL {
                let want = rng.gen_range(1..=64).min(scratch.len());
                let n = reader_ring.read(&mut scratch[..want]);
                for &byte in &scratch[..n] {
                    assert_eq!(byte, expected);
                    expected = expected.wrapping_add(1);
                }
                received += n;
            }
            reader_done.store(true, Ordering::Relaxed);
        });

        writer.join().unwrap();
        reader.join().unwrap();
        assert!(done.load(Ordering::Relaxed));
    }
}
