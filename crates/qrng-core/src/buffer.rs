//! Bounded FIFO byte pool shared by the producer thread and consumers.
//!
//! Invariants: the fill level never exceeds the capacity, and bytes leave in
//! the order they arrived. The lock is held only for the append or removal
//! itself; noise generation and debiasing happen outside it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe bounded byte queue.
#[derive(Debug)]
pub struct EntropyBuffer {
    capacity: usize,
    queue: Mutex<VecDeque<u8>>,
}

impl EntropyBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1 << 20))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of bytes held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current fill level in bytes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes that can still be appended.
    pub fn free_space(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Fill level as a fraction of capacity.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.len() as f64 / self.capacity as f64
    }

    /// Append as much of `chunk` as fits. The tail that does not fit is
    /// dropped. Returns the number of bytes accepted.
    pub fn fill(&self, chunk: &[u8]) -> usize {
        let mut queue = self.lock();
        let room = self.capacity.saturating_sub(queue.len());
        let accepted = room.min(chunk.len());
        queue.extend(&chunk[..accepted]);
        accepted
    }

    /// Remove exactly `n` bytes from the front, or nothing at all if fewer
    /// than `n` are buffered.
    pub fn take_exact(&self, n: usize) -> Option<Vec<u8>> {
        let mut queue = self.lock();
        if queue.len() < n {
            return None;
        }
        Some(queue.drain(..n).collect())
    }
}
