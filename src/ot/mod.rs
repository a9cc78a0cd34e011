//! # Operational Transform Layer
//!
//! Pairwise transform, compose and invert for two operation families:
//!
//! - **Linear** (text-like documents): position-dependent inserts and
//!   deletes over a character sequence. Contexts prefixed `text:` or
//!   `code:` are linear.
//! - **Spatial** (vector entities): moves, field modifies, inserts and
//!   deletes of one entity. Every other context is spatial.
//!
//! `transform(a, b)` returns `(a', b')` where `a'` is `a` rewritten to apply
//! after `b`, and `b'` is `b` rewritten to apply after `a`. Applying `a`
//! then `b'` yields the same state as applying `b` then `a'`.
//!
//! Ties between concurrent operations are broken by [`OrderKey`]: the
//! smaller key is treated as the earlier arrival.

pub mod linear;
pub mod spatial;

use crate::shared::change::OrderKey;
use crate::shared::value::{Fields, Point, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operation family, selected by context id convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Linear,
    Spatial,
}

pub const LINEAR_PREFIXES: [&str; 2] = ["text:", "code:"];

pub fn family_of(context_id: &str) -> Family {
    if LINEAR_PREFIXES.iter().any(|prefix| context_id.starts_with(prefix)) {
        Family::Linear
    } else {
        Family::Spatial
    }
}

/// Offset into a linear document, or a canvas point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Offset(usize),
    Point(Point),
}

impl Position {
    pub fn offset(&self) -> Option<usize> {
        match self {
            Position::Offset(offset) => Some(*offset),
            Position::Point(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OtKind {
    /// Linear: insert text at an offset. Spatial: create the entity.
    Insert { position: Position, content: Value },
    /// Linear: remove `length` characters. Spatial: remove the entity.
    Delete {
        position: Position,
        length: usize,
        /// Content removed at apply time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        removed: Option<Value>,
    },
    /// Translate the entity's `position` field
    Move { delta: Point },
    /// Assign entity fields
    Modify {
        fields: Fields,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prior: Option<Fields>,
    },
    /// Sequential replay; empty means no-op
    Composite { ops: Vec<OtKind> },
}

impl OtKind {
    pub fn noop() -> Self {
        OtKind::Composite { ops: Vec::new() }
    }

    pub fn is_noop(&self) -> bool {
        match self {
            OtKind::Composite { ops } => ops.iter().all(OtKind::is_noop),
            OtKind::Delete { length: 0, position: Position::Offset(_), .. } => true,
            OtKind::Move { delta } => delta.is_zero(),
            OtKind::Modify { fields, .. } => fields.is_empty(),
            _ => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OtKind::Insert { .. } => "insert",
            OtKind::Delete { .. } => "delete",
            OtKind::Move { .. } => "move",
            OtKind::Modify { .. } => "modify",
            OtKind::Composite { .. } => "composite",
        }
    }

    /// Exact compensation, `None` without a captured snapshot
    pub fn invert(&self) -> Option<OtKind> {
        match self {
            OtKind::Insert { position, content } => Some(OtKind::Delete {
                position: *position,
                length: content_len(content),
                removed: Some(content.clone()),
            }),
            OtKind::Delete {
                position, removed, ..
            } => removed.as_ref().map(|content| OtKind::Insert {
                position: *position,
                content: content.clone(),
            }),
            OtKind::Move { delta } => Some(OtKind::Move {
                delta: delta.negate(),
            }),
            OtKind::Modify { fields, prior } => prior.as_ref().map(|prior| OtKind::Modify {
                fields: prior.clone(),
                prior: Some(fields.clone()),
            }),
            OtKind::Composite { ops } => ops
                .iter()
                .rev()
                .map(OtKind::invert)
                .collect::<Option<Vec<_>>>()
                .map(|ops| OtKind::Composite { ops }),
        }
    }
}

/// Character length of linear insert content
pub(crate) fn content_len(content: &Value) -> usize {
    content.as_text().map(|text| text.chars().count()).unwrap_or(0)
}

/// OT operation attached to a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtOp {
    /// Logical target, e.g. a stroke id or `text:title`
    pub context_id: String,
    #[serde(flatten)]
    pub kind: OtKind,
    /// Set when a transform had to arbitrate between the two operations
    #[serde(default)]
    pub conflict: bool,
    /// Tie-break key, filled from the owning change
    #[serde(default)]
    pub stamp: OrderKey,
}

impl OtOp {
    pub fn new(context_id: impl Into<String>, kind: OtKind) -> Self {
        Self {
            context_id: context_id.into(),
            kind,
            conflict: false,
            stamp: OrderKey::default(),
        }
    }

    pub fn insert_text(context_id: impl Into<String>, offset: usize, text: impl Into<String>) -> Self {
        Self::new(
            context_id,
            OtKind::Insert {
                position: Position::Offset(offset),
                content: Value::text(text),
            },
        )
    }

    pub fn delete_text(context_id: impl Into<String>, offset: usize, length: usize) -> Self {
        Self::new(
            context_id,
            OtKind::Delete {
                position: Position::Offset(offset),
                length,
                removed: None,
            },
        )
    }

    pub fn move_by(context_id: impl Into<String>, delta: Point) -> Self {
        Self::new(context_id, OtKind::Move { delta })
    }

    pub fn modify(context_id: impl Into<String>, fields: Fields) -> Self {
        Self::new(context_id, OtKind::Modify { fields, prior: None })
    }

    pub fn with_stamp(mut self, stamp: OrderKey) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn family(&self) -> Family {
        family_of(&self.context_id)
    }

    pub fn is_noop(&self) -> bool {
        self.kind.is_noop()
    }

    /// Same operation with a new kind, conflict flag optionally raised
    pub(crate) fn rewrite(&self, kind: OtKind, conflict: bool) -> OtOp {
        OtOp {
            context_id: self.context_id.clone(),
            kind,
            conflict: self.conflict || conflict,
            stamp: self.stamp.clone(),
        }
    }

    pub(crate) fn flagged(&self) -> OtOp {
        self.rewrite(self.kind.clone(), true)
    }

    pub fn invert(&self) -> Option<OtOp> {
        self.kind.invert().map(|kind| OtOp {
            context_id: self.context_id.clone(),
            kind,
            conflict: false,
            stamp: self.stamp.clone(),
        })
    }
}

/// Transform two concurrent operations against each other.
///
/// Operations on different contexts never interact.
pub fn transform(a: &OtOp, b: &OtOp) -> (OtOp, OtOp) {
    if a.context_id != b.context_id {
        return (a.clone(), b.clone());
    }
    // Composites replay their members in sequence
    if let OtKind::Composite { ops } = &a.kind {
        let mut against = b.clone();
        let mut rewritten = Vec::with_capacity(ops.len());
        let mut conflict = false;
        for member in ops {
            let (member, next) = transform(&a.rewrite(member.clone(), false), &against);
            conflict |= member.conflict;
            rewritten.push(member.kind);
            against = next;
        }
        return (a.rewrite(OtKind::Composite { ops: rewritten }, conflict), against);
    }
    if let OtKind::Composite { .. } = &b.kind {
        let (b2, a2) = transform(b, a);
        return (a2, b2);
    }
    match a.family() {
        Family::Linear => linear::transform(a, b),
        Family::Spatial => spatial::transform(a, b),
    }
}

/// Rewrite `op` to apply after every operation of `applied`, in order
pub fn transform_against(op: &OtOp, applied: &[OtOp]) -> OtOp {
    applied
        .iter()
        .fold(op.clone(), |current, earlier| transform(&current, earlier).0)
}

/// Combine `a` followed by `b` into one operation.
///
/// Merges algebraically where valid, otherwise returns a composite that
/// replays both in order.
pub fn compose(a: &OtOp, b: &OtOp) -> OtOp {
    if a.context_id == b.context_id {
        let merged = match a.family() {
            Family::Linear => linear::compose(&a.kind, &b.kind),
            Family::Spatial => spatial::compose(&a.kind, &b.kind),
        };
        if let Some(kind) = merged {
            return a.rewrite(kind, b.conflict);
        }
    }
    let mut ops = Vec::new();
    for kind in [&a.kind, &b.kind] {
        match kind {
            OtKind::Composite { ops: members } => ops.extend(members.iter().cloned()),
            other => ops.push(other.clone()),
        }
    }
    a.rewrite(OtKind::Composite { ops }, b.conflict)
}

/// OT layer errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OtError {
    #[error("position {position} out of range for document of length {length}")]
    OutOfRange { position: usize, length: usize },

    #[error("{op} operation does not fit the {family:?} family")]
    FamilyMismatch { op: &'static str, family: Family },
}

/// Counters exposed through the metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtStats {
    pub transforms: u64,
    pub conflicts: u64,
    pub compositions: u64,
    pub inversions: u64,
}

impl OtStats {
    pub fn record_transform(&mut self, result: &OtOp) {
        self.transforms += 1;
        if result.conflict {
            self.conflicts += 1;
        }
    }
}
