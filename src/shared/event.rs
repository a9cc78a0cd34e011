//! Engine Event System
//!
//! Events published by the engine on its [`EventBus`](crate::realtime::EventBus).
//! They describe what happened during a tick: applied and rejected changes,
//! conflict resolutions, loop and corruption detections, translator failures,
//! dirty regions, history movement and transport status.

use crate::conflict::ConflictRecord;
use crate::transport::TransportStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of engine event, used for subscription filtering
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ChangeApplied,
    ChangeRejected,
    ConflictResolved,
    CorruptionDetected,
    LoopDetected,
    TranslationFailed,
    DirtyRegions,
    HistoryChanged,
    Transport,
}

/// Event broadcast to every subscriber
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A change mutated its surface
    ChangeApplied {
        id: Uuid,
        surface: String,
        target: String,
        /// Surface version after the change
        version: u64,
    },
    /// A change was refused (validation, duplicate, conflict loser)
    ChangeRejected {
        id: Uuid,
        surface: String,
        reason: String,
    },
    ConflictResolved { record: ConflictRecord },
    /// Structurally invalid operations were rolled back. User-visible.
    CorruptionDetected { operations: usize, reason: String },
    LoopDetected {
        surface: String,
        label: String,
        count: u32,
    },
    TranslationFailed {
        translator: String,
        change_id: Uuid,
        message: String,
    },
    DirtyRegions { regions: Vec<String> },
    HistoryChanged { len: usize, index: i64 },
    Transport { status: TransportStatus },
}

impl EngineEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            EngineEvent::ChangeApplied { .. } => EventType::ChangeApplied,
            EngineEvent::ChangeRejected { .. } => EventType::ChangeRejected,
            EngineEvent::ConflictResolved { .. } => EventType::ConflictResolved,
            EngineEvent::CorruptionDetected { .. } => EventType::CorruptionDetected,
            EngineEvent::LoopDetected { .. } => EventType::LoopDetected,
            EngineEvent::TranslationFailed { .. } => EventType::TranslationFailed,
            EngineEvent::DirtyRegions { .. } => EventType::DirtyRegions,
            EngineEvent::HistoryChanged { .. } => EventType::HistoryChanged,
            EngineEvent::Transport { .. } => EventType::Transport,
        }
    }

    /// Whether the event must reach the user rather than only metrics
    pub fn is_user_visible(&self) -> bool {
        matches!(self, EngineEvent::CorruptionDetected { .. })
    }

    pub fn rejected(id: Uuid, surface: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineEvent::ChangeRejected {
            id,
            surface: surface.into(),
            reason: reason.into(),
        }
    }
}
