//! # History Manager
//!
//! Bounded log of applied batches with their inverses, driving undo/redo.
//!
//! `index` points at the most recent entry that is currently applied and is
//! always within `-1..len`. Undo hands back the inverse batch of the entry at
//! `index` and steps back; redo hands back the entry after `index` and steps
//! forward. The engine re-submits both through the full pipeline.

use crate::shared::change::{Change, Origin};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub batch_id: Uuid,
    /// Applied changes with captured snapshots, in apply order
    pub forward: Vec<Change>,
    /// Compensating changes, in reverse apply order
    pub inverse: Vec<Change>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(batch_id: Uuid, forward: Vec<Change>) -> Self {
        let inverse = forward.iter().rev().filter_map(Change::invert).collect();
        Self {
            batch_id,
            forward,
            inverse,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    index: i64,
    limit: usize,
}

impl HistoryManager {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            index: -1,
            limit: limit.max(1),
        }
    }

    /// Record the applied changes of one batch.
    ///
    /// Only local and translated changes are undoable; replays and remote
    /// changes are skipped. Returns whether an entry was appended.
    pub fn record_batch(&mut self, batch_id: Uuid, applied: &[Change]) -> bool {
        let forward: Vec<Change> = applied
            .iter()
            .filter(|change| matches!(change.origin, Origin::Local | Origin::Translated))
            .cloned()
            .collect();
        if forward.is_empty() {
            return false;
        }

        // Drop the redo tail
        self.entries.truncate((self.index + 1) as usize);
        self.entries.push_back(HistoryEntry::new(batch_id, forward));
        self.index = self.entries.len() as i64 - 1;

        while self.entries.len() > self.limit {
            self.entries.pop_front();
            self.index -= 1;
        }
        true
    }

    /// Inverse batch of the current entry, stepping back
    pub fn undo(&mut self) -> Option<Vec<Change>> {
        if !self.can_undo() {
            return None;
        }
        let entry = self.entries.get(self.index as usize)?;
        let inverse = entry.inverse.clone();
        self.index -= 1;
        tracing::debug!("[History] Undo batch {} ({} changes)", entry.batch_id, inverse.len());
        Some(inverse)
    }

    /// Re-application of the next entry, stepping forward.
    ///
    /// Built by inverting the stored inverse so re-created elements get
    /// fresh identities anchored where the originals were.
    pub fn redo(&mut self) -> Option<Vec<Change>> {
        if !self.can_redo() {
            return None;
        }
        let entry = self.entries.get((self.index + 1) as usize)?;
        let forward: Vec<Change> = entry.inverse.iter().rev().filter_map(Change::invert).collect();
        self.index += 1;
        tracing::debug!("[History] Redo batch {} ({} changes)", entry.batch_id, forward.len());
        Some(forward)
    }

    /// Replace the inverse of the entry just undone with the changes that
    /// were actually submitted, so a later redo inverts the right identities
    pub fn rebase_undone(&mut self, inverse: Vec<Change>) {
        if let Some(entry) = self.entries.get_mut((self.index + 1) as usize) {
            entry.inverse = inverse;
        }
    }

    /// Replace the entry just redone with the changes that were actually
    /// submitted, recomputing its inverse
    pub fn rebase_redone(&mut self, forward: Vec<Change>) {
        if self.index < 0 {
            return;
        }
        if let Some(entry) = self.entries.get_mut(self.index as usize) {
            entry.inverse = forward.iter().rev().filter_map(Change::invert).collect();
            entry.forward = forward;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len() as i64
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::change::{ChangeKind, Payload};
    use crate::shared::value::Value;

    fn insert(target: &str) -> Change {
        Change::new(
            "draw",
            1,
            Payload::Insert {
                target: target.to_string(),
                value: Value::Bool(true),
            },
        )
    }

    #[test]
    fn test_undo_redo_moves_index() {
        let mut history = HistoryManager::new(10);
        assert_eq!(history.index(), -1);
        assert!(history.undo().is_none());

        history.record_batch(Uuid::new_v4(), &[insert("a")]);
        history.record_batch(Uuid::new_v4(), &[insert("b")]);
        assert_eq!(history.index(), 1);

        let undo = history.undo().unwrap();
        assert_eq!(undo.len(), 1);
        assert_eq!(undo[0].kind(), ChangeKind::Delete);
        assert_eq!(undo[0].target_key(), "b");
        assert_eq!(history.index(), 0);

        let redo = history.redo().unwrap();
        assert_eq!(redo[0].kind(), ChangeKind::Insert);
        assert_eq!(redo[0].target_key(), "b");
        assert_eq!(history.index(), 1);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_inverse_is_reversed() {
        let mut history = HistoryManager::new(10);
        history.record_batch(Uuid::new_v4(), &[insert("a"), insert("b")]);
        let targets: Vec<String> = history
            .undo()
            .unwrap()
            .iter()
            .map(|c| c.target_key().to_string())
            .collect();
        assert_eq!(targets, vec!["b", "a"]);
    }

    #[test]
    fn test_record_truncates_redo_tail() {
        let mut history = HistoryManager::new(10);
        history.record_batch(Uuid::new_v4(), &[insert("a")]);
        history.record_batch(Uuid::new_v4(), &[insert("b")]);
        history.undo();
        history.record_batch(Uuid::new_v4(), &[insert("c")]);
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.index(), 1);
    }

    #[test]
    fn test_eviction_decrements_index() {
        let mut history = HistoryManager::new(2);
        for target in ["a", "b", "c"] {
            history.record_batch(Uuid::new_v4(), &[insert(target)]);
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.index(), 1);

        history.undo();
        history.undo();
        assert_eq!(history.index(), -1);
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_rebase_redone_recomputes_inverse() {
        let mut history = HistoryManager::new(10);
        history.record_batch(Uuid::new_v4(), &[insert("a")]);
        history.undo();
        let redo = history.redo().unwrap();
        let restamped: Vec<Change> = redo
            .into_iter()
            .map(|mut change| {
                change.logical_time = 42;
                change
            })
            .collect();
        history.rebase_redone(restamped);

        let undo = history.undo().unwrap();
        assert_eq!(undo[0].logical_time, 42);
        assert_eq!(undo[0].kind(), ChangeKind::Delete);
    }

    #[test]
    fn test_replays_and_remote_not_recorded() {
        let mut history = HistoryManager::new(10);
        let changes = [
            insert("a").with_origin(Origin::Undo),
            insert("b").with_origin(Origin::Remote),
        ];
        assert!(!history.record_batch(Uuid::new_v4(), &changes));
        assert!(history.is_empty());
    }
}
