//! # Change Queue
//!
//! Bounded priority queue feeding the frame scheduler.
//!
//! ## Features
//!
//! - **Priority order**: entries are kept sorted by `(priority, logical
//!   time)` using [`Change::queue_cmp`], FIFO among equal keys
//! - **Bounded**: on overflow the oldest entry of the lowest priority present
//!   is evicted and reported, the retained order is untouched
//! - **Batch drain**: the scheduler takes up to `batch_size` entries per tick
//!
//! ## Usage
//!
//! ```rust
//! use xfcanvas::shared::change::{Change, Payload, Priority};
//! use xfcanvas::shared::value::Value;
//! use xfcanvas::sync::queue::ChangeQueue;
//!
//! let mut queue = ChangeQueue::new(10);
//! let insert = |t: u64| Payload::Insert { target: format!("s{}", t), value: Value::Bool(true) };
//! queue.push(Change::new("draw", 1, insert(1)).with_priority(Priority::Background));
//! queue.push(Change::new("draw", 2, insert(2)));
//!
//! let batch = queue.drain(10);
//! assert_eq!(batch[0].priority, Priority::UserAction);
//! ```

use crate::shared::change::Change;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::Instant;

/// Queued change with arrival metadata
#[derive(Debug, Clone)]
pub struct QueuedChange {
    pub change: Change,
    /// Arrival sequence, breaks ties FIFO
    seq: u64,
    pub queued_at: Instant,
}

/// Queue counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub drained: u64,
    pub evicted: u64,
    /// Largest depth observed
    pub high_water: usize,
}

/// Bounded priority queue of pending changes
#[derive(Debug)]
pub struct ChangeQueue {
    entries: VecDeque<QueuedChange>,
    capacity: usize,
    next_seq: u64,
    stats: QueueStats,
}

impl ChangeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            next_seq: 0,
            stats: QueueStats::default(),
        }
    }

    /// Insert a change in priority order.
    ///
    /// Returns the evicted change when the queue was over capacity.
    pub fn push(&mut self, change: Change) -> Option<Change> {
        let index = self
            .entries
            .partition_point(|entry| entry.change.queue_cmp(&change) != Ordering::Greater);
        let entry = QueuedChange {
            change,
            seq: self.next_seq,
            queued_at: Instant::now(),
        };
        self.next_seq += 1;
        self.entries.insert(index, entry);
        self.stats.enqueued += 1;
        self.stats.high_water = self.stats.high_water.max(self.entries.len());

        if self.entries.len() > self.capacity {
            let evicted = self.evict();
            if let Some(change) = &evicted {
                self.stats.evicted += 1;
                tracing::warn!(
                    "[Queue] Capacity {} reached, evicted {:?} change {} from '{}'",
                    self.capacity,
                    change.priority,
                    change.id,
                    change.source_surface
                );
            }
            return evicted;
        }
        None
    }

    /// Remove the oldest entry of the lowest priority present
    fn evict(&mut self) -> Option<Change> {
        let lowest = self.entries.iter().map(|entry| entry.change.priority).max()?;
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.change.priority == lowest)
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(index, _)| index)?;
        self.entries.remove(index).map(|entry| entry.change)
    }

    /// Take up to `max` changes from the front
    pub fn drain(&mut self, max: usize) -> Vec<Change> {
        let count = max.min(self.entries.len());
        self.stats.drained += count as u64;
        self.entries
            .drain(..count)
            .map(|entry| entry.change)
            .collect()
    }

    pub fn peek(&self) -> Option<&Change> {
        self.entries.front().map(|entry| &entry.change)
    }

    /// Age of the oldest queued entry
    pub fn oldest_wait(&self) -> Option<std::time::Duration> {
        self.entries
            .iter()
            .map(|entry| entry.queued_at.elapsed())
            .max()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}
