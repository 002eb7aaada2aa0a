//! Reusable scratch containers.
//!
//! The engine rents one working record and one field set per call. Pools are
//! multi-producer/multi-consumer bags backed by a crossbeam channel; a
//! rented container comes back through [`Pooled`]'s `Drop`, so it is returned
//! on every exit path including `?` returns and unwinding.

use crate::{FieldSet, LogRecord};
use crossbeam_channel::{Receiver, Sender};
use std::ops::{Deref, DerefMut};

/// A container that can be cleared for reuse.
pub trait Poolable: Default + Send {
    /// Drop all contents, keeping allocations.
    fn reset(&mut self);

    /// Whether the container holds nothing.
    fn is_clear(&self) -> bool;
}

impl Poolable for LogRecord {
    fn reset(&mut self) {
        self.clear();
    }

    fn is_clear(&self) -> bool {
        self.is_empty()
    }
}

impl Poolable for FieldSet {
    fn reset(&mut self) {
        self.clear();
    }

    fn is_clear(&self) -> bool {
        self.is_empty()
    }
}

/// A thread-safe bag of reusable containers.
pub struct Pool<T: Poolable> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: Option<usize>,
}

impl<T: Poolable> Pool<T> {
    /// Create a pool with no upper bound on idle containers.
    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            sender,
            receiver,
            capacity: None,
        }
    }

    /// Create a pool that keeps at most `capacity` idle containers.
    ///
    /// Containers returned to a full pool are dropped; `rent` on an empty pool
    /// allocates.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        Self {
            sender,
            receiver,
            capacity: Some(capacity),
        }
    }

    /// Create a pool from an optional capacity.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(cap) => Self::bounded(cap),
            None => Self::unbounded(),
        }
    }

    /// Borrow a cleared container.
    pub fn rent(&self) -> Pooled<'_, T> {
        let item = self.receiver.try_recv().unwrap_or_default();
        Pooled { item, pool: self }
    }

    /// Clear a container and deposit it back.
    pub fn give_back(&self, mut item: T) {
        item.reset();
        // A full bounded pool drops the container.
        let _ = self.sender.try_send(item);
    }

    /// Number of idle containers.
    pub fn idle(&self) -> usize {
        self.receiver.len()
    }

    /// The idle-container ceiling, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A rented container, returned to its pool on drop.
pub struct Pooled<'a, T: Poolable> {
    item: T,
    pool: &'a Pool<T>,
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        let item = std::mem::take(&mut self.item);
        self.pool.give_back(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_allocates_when_empty() {
        let pool: Pool<FieldSet> = Pool::unbounded();
        assert_eq!(pool.idle(), 0);
        let set = pool.rent();
        assert!(set.is_empty());
    }

    #[test]
    fn test_returned_container_is_cleared() {
        let pool: Pool<LogRecord> = Pool::unbounded();
        {
            let mut record = pool.rent();
            record.insert("secret", "value");
        }
        assert_eq!(pool.idle(), 1);
        let record = pool.rent();
        assert!(record.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_bounded_pool_drops_overflow() {
        let pool: Pool<FieldSet> = Pool::bounded(2);
        let a = pool.rent();
        let b = pool.rent();
        let c = pool.rent();
        drop(a);
        drop(b);
        drop(c);
        assert_eq!(pool.idle(), 2);
        assert_eq!(pool.capacity(), Some(2));
    }

    #[test]
    fn test_released_on_early_return() {
        fn fails(pool: &Pool<FieldSet>) -> Result<(), &'static str> {
            let mut set = pool.rent();
            set.insert("x");
            Err("boom")
        }

        let pool = Pool::unbounded();
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle(), 1);
        assert!(pool.rent().is_clear());
    }
}
