//! Fixed-capacity FIFO queue that drops its oldest entry on overflow.
//!
//! Both the per-room audio mailboxes and the per-subscription subtitle queues
//! are bounded this way: a consumer that falls behind loses the *oldest*
//! pending items, never the newest, and the producer never waits.
//!
//! # Example
//!
//! ```rust
//! use roomcast::buffer::BoundedQueue;
//!
//! let mut q = BoundedQueue::new(3);
//! for i in 1..=5 {
//!     q.push(i);
//! }
//! assert_eq!(q.take_dropped(), 2);
//! assert_eq!(q.drain(), vec![3, 4, 5]);
//! ```

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// BoundedQueue
// ---------------------------------------------------------------------------

/// A bounded FIFO with drop-oldest overflow.
///
/// The queue counts how many items it has evicted since the last
/// [`take_dropped`](Self::take_dropped) so the consumer can detect a
/// discontinuity.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue capacity must be > 0");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append `item`, evicting and returning the oldest item if full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Remove and return the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Remove every item in FIFO order.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    /// Discard all items.  The dropped counter is left untouched.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Return the number of evictions since the last call and reset it.
    pub fn take_dropped(&mut self) -> u64 {
        std::mem::take(&mut self.dropped)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `true` when the next push would evict.
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Basic push / pop --------------------------------------------------

    #[test]
    fn push_and_drain_within_capacity() {
        let mut q = BoundedQueue::new(8);
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.len(), 3);
        assert!(!q.is_full());

        assert_eq!(q.drain(), vec![1, 2, 3]);
        assert!(q.is_empty());
    }

    #[test]
    fn pop_is_fifo() {
        let mut q = BoundedQueue::new(4);
        q.push("a");
        q.push("b");
        assert_eq!(q.pop(), Some("a"));
        assert_eq!(q.pop(), Some("b"));
        assert_eq!(q.pop(), None);
    }

    // ---- Overflow (oldest item discarded) ----------------------------------

    #[test]
    fn overflow_by_one_evicts_oldest() {
        let mut q = BoundedQueue::new(4);
        for i in 1..=4 {
            assert_eq!(q.push(i), None);
        }
        assert!(q.is_full());
        assert_eq!(q.push(5), Some(1));
        assert_eq!(q.drain(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn dropped_counter_accumulates_and_resets() {
        let mut q = BoundedQueue::new(2);
        for i in 0..7 {
            q.push(i);
        }
        assert_eq!(q.take_dropped(), 5);
        assert_eq!(q.take_dropped(), 0);
        assert_eq!(q.drain(), vec![5, 6]);
    }

    #[test]
    fn clear_keeps_dropped_count() {
        let mut q = BoundedQueue::new(1);
        q.push(1);
        q.push(2);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.take_dropped(), 1);
    }

    #[test]
    fn reuse_after_drain() {
        let mut q = BoundedQueue::new(3);
        q.push(1);
        q.push(2);
        assert_eq!(q.drain(), vec![1, 2]);
        q.push(9);
        assert_eq!(q.drain(), vec![9]);
        assert_eq!(q.capacity(), 3);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "BoundedQueue capacity must be > 0")]
    fn zero_capacity_panics() {
        let _q: BoundedQueue<u8> = BoundedQueue::new(0);
    }
}
