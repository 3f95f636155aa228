//! Bounded FIFO task queue
//!
//! The queue itself is a plain data structure. The pool keeps it inside the
//! same mutex as its worker counters and stopping flag, so every
//! check-and-insert happens under that single lock.

use std::collections::VecDeque;
use std::fmt;

/// Rejected insert into a full queue, carrying the item back to the caller
pub struct QueueFull<T>(pub T);

impl<T> QueueFull<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("task queue is full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

/// Fixed-capacity FIFO that rejects inserts once full
///
/// Capacity is fixed at construction and never resized.
///
/// # Example
///
/// ```
/// use taskpool::worker::BoundedTaskQueue;
///
/// let mut queue = BoundedTaskQueue::new(2);
/// queue.push("a").unwrap();
/// queue.push("b").unwrap();
/// assert_eq!(queue.push("c").unwrap_err().into_inner(), "c");
/// assert_eq!(queue.pop(), Some("a"));
/// ```
#[derive(Debug)]
pub struct BoundedTaskQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedTaskQueue<T> {
    /// Create an empty queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            // Large capacities grow on demand instead of reserving up front
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an item, or hand it back if the queue is at capacity
    pub fn push(&mut self, item: T) -> Result<(), QueueFull<T>> {
        if self.items.len() >= self.capacity {
            return Err(QueueFull(item));
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Remove the oldest item
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Remove every queued item, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
