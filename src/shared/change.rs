//! # Change Model
//!
//! A [`Change`] is the immutable unit of work flowing through the engine.
//! Transforms and merges never mutate a change in place; they produce new
//! values.
//!
//! ## Features
//!
//! - **Typed payloads**: [`Payload`] is a sum type, and the change kind is
//!   derived from it so the two can never disagree
//! - **Central ordering**: [`Priority`] is an ordered enum and
//!   [`Change::queue_cmp`] is the single comparator used by the queue
//! - **Total tie-break**: [`OrderKey`] orders changes identically on every
//!   replica
//! - **Inversion**: [`Change::invert`] builds the compensating change from
//!   captured snapshots

use crate::crdt::CrdtOp;
use crate::ot::OtOp;
use crate::shared::clock::{SiteId, VectorClock};
use crate::shared::value::{Fields, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Processing priority. Declaration order is processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Direct user input
    UserAction,
    /// Output of an editing algorithm
    AlgorithmUpdate,
    /// Produced by translating another change
    Derived,
    Background,
}

impl Priority {
    pub fn is_user_action(self) -> bool {
        self == Priority::UserAction
    }
}

/// Change kind, derived from the payload variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Modify,
    Delete,
    Execute,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Modify => "modify",
            ChangeKind::Delete => "delete",
            ChangeKind::Execute => "execute",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a change entered the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Local,
    /// Received from a peer through the transport
    Remote,
    /// Produced by a translator from another surface's change
    Translated,
    Undo,
    Redo,
}

impl Origin {
    /// Replays produced by the history manager
    pub fn is_replay(self) -> bool {
        matches!(self, Origin::Undo | Origin::Redo)
    }

    pub fn is_remote(self) -> bool {
        self == Origin::Remote
    }
}

/// Kind-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Create (or replace) the entity `target`
    Insert { target: String, value: Value },
    /// Assign fields of `target`; `Null` removes a field
    Modify {
        target: String,
        fields: Fields,
        /// Values overwritten at apply time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prior: Option<Fields>,
    },
    /// Remove the entity `target`
    Delete {
        target: String,
        /// Entity removed at apply time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<Value>,
    },
    /// Run a command against `target` (e.g. evaluate a code cell)
    Execute {
        target: String,
        command: String,
        #[serde(default)]
        args: Fields,
    },
}

impl Payload {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Payload::Insert { .. } => ChangeKind::Insert,
            Payload::Modify { .. } => ChangeKind::Modify,
            Payload::Delete { .. } => ChangeKind::Delete,
            Payload::Execute { .. } => ChangeKind::Execute,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Payload::Insert { target, .. }
            | Payload::Modify { target, .. }
            | Payload::Delete { target, .. }
            | Payload::Execute { target, .. } => target,
        }
    }

    /// Compensating payload, `None` without a captured snapshot
    pub fn invert(&self) -> Option<Payload> {
        match self {
            Payload::Insert { target, value } => Some(Payload::Delete {
                target: target.clone(),
                snapshot: Some(value.clone()),
            }),
            Payload::Delete { target, snapshot } => snapshot.as_ref().map(|value| Payload::Insert {
                target: target.clone(),
                value: value.clone(),
            }),
            Payload::Modify {
                target,
                fields,
                prior,
            } => prior.as_ref().map(|prior| Payload::Modify {
                target: target.clone(),
                fields: prior.clone(),
                prior: Some(fields.clone()),
            }),
            Payload::Execute { .. } => None,
        }
    }

    /// Descriptive inverse for payloads whose mutation is carried by an
    /// attached CRDT or OT op. Only the kind and target are meaningful.
    fn mirror(&self) -> Option<Payload> {
        match self {
            Payload::Delete { target, .. } => Some(Payload::Insert {
                target: target.clone(),
                value: Value::Map(Fields::new()),
            }),
            Payload::Modify { target, fields, .. } => Some(Payload::Modify {
                target: target.clone(),
                fields: fields.keys().map(|name| (name.clone(), Value::Null)).collect(),
                prior: None,
            }),
            other => other.invert(),
        }
    }
}

/// Total order used for deterministic tie-breaks on every replica
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderKey {
    pub logical_time: u64,
    pub site: SiteId,
    pub surface: String,
    pub id: Uuid,
}

/// Immutable operation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub id: Uuid,
    /// Strictly increasing per (site, source surface)
    pub logical_time: u64,
    pub source_surface: String,
    /// Replica that issued the change
    pub site: SiteId,
    /// Domain event name, the Loop Guard key (defaults to the kind)
    pub label: String,
    pub priority: Priority,
    pub payload: Payload,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crdt_op: Option<CrdtOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ot_op: Option<OtOp>,
    /// Changes the issuing replica had applied when this one was made,
    /// keyed `"{site}/{surface}"`. Stamped on OT changes at submit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<VectorClock>,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_SITE: &str = "local";

impl Change {
    /// A local user-action change with a fresh id
    pub fn new(source_surface: impl Into<String>, logical_time: u64, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            logical_time,
            source_surface: source_surface.into(),
            site: DEFAULT_SITE.to_string(),
            label: payload.kind().as_str().to_string(),
            priority: Priority::UserAction,
            payload,
            origin: Origin::Local,
            batch_id: None,
            crdt_op: None,
            ot_op: None,
            context: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_site(mut self, site: impl Into<SiteId>) -> Self {
        self.site = site.into();
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_batch(mut self, batch_id: Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_crdt(mut self, op: CrdtOp) -> Self {
        self.crdt_op = Some(op);
        self
    }

    pub fn with_ot(mut self, op: OtOp) -> Self {
        self.ot_op = Some(op);
        self
    }

    pub fn with_context(mut self, context: VectorClock) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn kind(&self) -> ChangeKind {
        self.payload.kind()
    }

    /// Logical target: OT context, else CRDT path, else payload target
    pub fn target_key(&self) -> &str {
        if let Some(op) = &self.ot_op {
            return &op.context_id;
        }
        if let Some(path) = self.crdt_op.as_ref().and_then(CrdtOp::path) {
            return path;
        }
        self.payload.target()
    }

    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            logical_time: self.logical_time,
            site: self.site.clone(),
            surface: self.source_surface.clone(),
            id: self.id,
        }
    }

    /// Queue order: priority, then logical time
    pub fn queue_cmp(&self, other: &Change) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.logical_time.cmp(&other.logical_time))
    }

    /// Structural defects that make the change unsafe to apply
    pub fn defects(&self) -> Vec<&'static str> {
        let mut defects = Vec::new();
        if self.id.is_nil() {
            defects.push("missing id");
        }
        if self.logical_time == 0 {
            defects.push("non-positive logical time");
        }
        if self.payload.target().is_empty() {
            defects.push("missing target");
        }
        match &self.payload {
            Payload::Insert { value, .. } if value.is_null() => defects.push("missing payload value"),
            Payload::Modify { fields, .. } if fields.is_empty() => defects.push("empty field set"),
            Payload::Execute { command, .. } if command.is_empty() => defects.push("missing command"),
            _ => {}
        }
        if let Some(op) = &self.ot_op {
            if op.context_id.is_empty() {
                defects.push("missing OT context");
            }
        }
        defects
    }

    pub fn is_well_formed(&self) -> bool {
        self.defects().is_empty()
    }

    /// Compensating change with a fresh id.
    ///
    /// Every mutating layer must be invertible: the OT op or CRDT op when
    /// one is attached, otherwise the payload. The caller restamps logical
    /// time and origin.
    pub fn invert(&self) -> Option<Change> {
        let payload = if self.crdt_op.is_some() || self.ot_op.is_some() {
            self.payload.invert().or_else(|| self.payload.mirror())?
        } else {
            self.payload.invert()?
        };
        let crdt_op = match &self.crdt_op {
            Some(op) => Some(op.invert()?),
            None => None,
        };
        let ot_op = match &self.ot_op {
            Some(op) => Some(op.invert()?),
            None => None,
        };
        Some(Change {
            id: Uuid::new_v4(),
            payload,
            crdt_op,
            ot_op,
            batch_id: None,
            context: None,
            created_at: Utc::now(),
            ..self.clone()
        })
    }
}
