//! # Loop Guard
//!
//! Detects echo cycles between surfaces. A translator that turns a draw edit
//! into a parametric edit, whose own translator turns it back into a draw
//! edit, would otherwise bounce changes between the two forever.
//!
//! Submissions are counted per `(source surface, label)` key inside a window.
//! Once a key has been seen `threshold` times, further submissions of that
//! key are rejected with [`SyncError::LoopDetected`] until its window
//! expires. The whole table is cleared once it tracks more keys than the
//! configured bound. Undo/redo replays are exempt; history bounds them.
//! Remote changes are exempt as well; each peer guards its own translators.

use crate::shared::change::Change;
use crate::shared::config::EngineConfig;
use crate::shared::error::SyncError;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct WindowCount {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct LoopGuard {
    window: Duration,
    threshold: u32,
    overrides: BTreeMap<String, u32>,
    table_bound: usize,
    counts: HashMap<(String, String), WindowCount>,
    rejected: u64,
}

impl LoopGuard {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.loop_window(),
            threshold: config.loop_threshold,
            overrides: config.loop_threshold_overrides.clone(),
            table_bound: config.loop_table_bound,
            counts: HashMap::new(),
            rejected: 0,
        }
    }

    /// Count `change` and reject it if its key is over the threshold
    pub fn check(&mut self, change: &Change) -> Result<(), SyncError> {
        self.check_at(change, Instant::now())
    }

    pub fn check_at(&mut self, change: &Change, now: Instant) -> Result<(), SyncError> {
        if change.origin.is_replay() || change.origin.is_remote() {
            return Ok(());
        }
        if self.counts.len() > self.table_bound {
            tracing::debug!("[LoopGuard] Clearing {} tracked keys", self.counts.len());
            self.counts.clear();
        }

        let threshold = self.threshold_for(&change.label);
        let key = (change.source_surface.clone(), change.label.clone());
        let entry = self.counts.entry(key).or_insert(WindowCount {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = WindowCount {
                started: now,
                count: 0,
            };
        }
        entry.count += 1;

        if entry.count > threshold {
            self.rejected += 1;
            tracing::warn!(
                "[LoopGuard] Rejecting {}/{} ({} in window, threshold {})",
                change.source_surface,
                change.label,
                entry.count,
                threshold
            );
            return Err(SyncError::loop_detected(
                &change.source_surface,
                &change.label,
                entry.count,
            ));
        }
        Ok(())
    }

    /// `true` when the change may proceed
    pub fn observe(&mut self, change: &Change) -> bool {
        self.check(change).is_ok()
    }

    pub fn threshold_for(&self, label: &str) -> u32 {
        self.overrides.get(label).copied().unwrap_or(self.threshold)
    }

    /// Submissions counted for a key in its current window
    pub fn count(&self, surface: &str, label: &str) -> u32 {
        self.counts
            .get(&(surface.to_string(), label.to_string()))
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    pub fn tracked_keys(&self) -> usize {
        self.counts.len()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }
}
