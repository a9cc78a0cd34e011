//! # Site Identity
//!
//! A [`Site`] is one replica of the shared canvas. It issues operation ids
//! and the per-surface logical times stamped onto local changes.
//!
//! ## Features
//!
//! - **Unique site ids**: random by default, fixed for tests and demos
//! - **Lamport times**: one monotonic counter per surface, advanced past any
//!   remote time observed on that surface
//!
//! ## Usage
//!
//! ```rust
//! use xfcanvas::shared::site::Site;
//!
//! let mut site = Site::new("studio-a");
//! assert_eq!(site.next_logical_time("draw"), 1);
//! site.observe("draw", 10);
//! assert_eq!(site.next_logical_time("draw"), 11);
//! ```

use crate::shared::clock::{SiteId, VectorClock};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Site {
    id: SiteId,
    /// Logical time per surface
    times: VectorClock,
}

impl Site {
    pub fn new(id: impl Into<SiteId>) -> Self {
        Self {
            id: id.into(),
            times: VectorClock::new(),
        }
    }

    /// Site with a random id
    pub fn random() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Generate a fresh operation id
    pub fn next_operation_id(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Next logical time for a change on `surface`
    pub fn next_logical_time(&mut self, surface: &str) -> u64 {
        self.times.tick(surface)
    }

    /// Current logical time on `surface` (0 before the first change)
    pub fn current_time(&self, surface: &str) -> u64 {
        self.times.get(surface)
    }

    /// Advance past a time observed from another replica
    pub fn observe(&mut self, surface: &str, time: u64) {
        self.times.observe(surface, time);
    }
}

impl Default for Site {
    fn default() -> Self {
        Self::random()
    }
}
