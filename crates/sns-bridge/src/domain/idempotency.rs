//! # Idempotency Cache
//!
//! Bounded duplicate filter for notification message ids.
//!
//! ## Design
//!
//! - Insertion order is kept in a ring buffer, membership in a hash set
//! - Eviction is strict FIFO: seeing an id again does not refresh it
//! - Exactly one entry is evicted per insert once the bound is exceeded
//! - Process-lifetime only; a restart forgets all ids

use std::collections::{HashSet, VecDeque};

/// Insertion-ordered set of processed message ids with a fixed bound.
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    /// Ids in insertion order, oldest at the front.
    order: VecDeque<String>,

    /// Same ids, for O(1) membership.
    seen: HashSet<String>,

    /// Maximum number of ids retained.
    capacity: usize,
}

impl IdempotencyCache {
    /// Default number of ids retained.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Create a cache with the default bound of 100 ids.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a cache with a custom bound.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            seen: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Test-and-insert a message id.
    ///
    /// Returns `true` if the id was already present (a duplicate); the order
    /// of existing entries is left untouched. Otherwise the id is recorded
    /// and, if that pushes the cache over its bound, the single oldest id is
    /// evicted.
    pub fn already_processed(&mut self, message_id: &str) -> bool {
        if self.seen.contains(message_id) {
            return true;
        }

        self.seen.insert(message_id.to_string());
        self.order.push_back(message_id.to_string());

        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        false
    }

    /// Check if an id is currently retained without recording it.
    #[must_use]
    pub fn contains(&self, message_id: &str) -> bool {
        self.seen.contains(message_id)
    }

    /// Number of ids retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no ids are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Configured bound.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new()
    }
}
