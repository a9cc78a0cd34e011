//! # Surface State
//!
//! One editing surface's copy of the shared artifact.
//!
//! ## Features
//!
//! - **Single mutation path**: [`SurfaceState::apply`] is the only way data
//!   changes; the scheduler is its only caller
//! - **Snapshot capture**: applying returns the change with everything it
//!   overwrote filled in, so its inverse is exact
//! - **Versioning**: `version` grows by exactly one per applied change, and
//!   `checksum` is a pure function of `data`
//! - **Last-writer-wins payloads**: entity inserts, modifies and deletes are
//!   stamped with the change's [`OrderKey`]; a write older than the stamp
//!   already in place is refused, so every replica keeps the same winner
//!   whatever order writes arrive in
//!
//! Each change mutates through one layer: its OT op when it has one (linear
//! contexts edit `documents`, spatial contexts edit `entities`), otherwise
//! its CRDT op (edits `replicas`), otherwise its payload (edits `entities`,
//! or logs a command).

use crate::crdt::{Composite, CrdtOp, CrdtState, MergeOutcome};
use crate::ot::{self, Family};
use crate::shared::change::{Change, OrderKey, Payload};
use crate::shared::error::SyncError;
use crate::shared::value::{assign_fields, Fields, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Executed command log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub change_id: Uuid,
    pub target: String,
    pub command: String,
    pub args: Fields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceData {
    /// Payload and spatial OT targets
    pub entities: BTreeMap<String, Value>,
    /// Linear OT documents by context id
    pub documents: BTreeMap<String, String>,
    pub replicas: Composite,
    pub commands: Vec<CommandRecord>,
}

impl SurfaceData {
    /// FNV-1a hash of the canonical JSON encoding. Stable across builds and
    /// platforms, so replicas can compare checksums.
    pub fn checksum(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        format!("{:016x}", fnv1a(&canonical))
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

/// Order keys of the payload writes that own an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStamp {
    /// Last whole-entity insert or delete
    pub base: OrderKey,
    /// Field writes newer than `base`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, OrderKey>,
}

impl EntityStamp {
    fn field(&self, name: &str) -> &OrderKey {
        self.fields.get(name).unwrap_or(&self.base)
    }

    /// Field writes that a whole-entity write stamped `key` must keep
    fn newer_fields(&self, key: &OrderKey) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, stamp)| *stamp > key)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn rebase(&mut self, key: OrderKey) {
        self.fields.retain(|_, stamp| *stamp > key);
        self.base = key;
    }
}

/// Outcome of applying one change
#[derive(Debug, Clone)]
pub struct Applied {
    /// The change with captured snapshots
    pub change: Change,
    /// Replica outcome when the change mutated through its CRDT op
    pub crdt_outcome: Option<MergeOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceState {
    pub name: String,
    pub version: u64,
    pub last_update: DateTime<Utc>,
    pub checksum: String,
    pub data: SurfaceData,
    /// Payload write stamps per entity; tombstones outlive their entity
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stamps: BTreeMap<String, EntityStamp>,
}

impl SurfaceState {
    pub fn new(name: impl Into<String>) -> Self {
        let data = SurfaceData::default();
        Self {
            name: name.into(),
            version: 0,
            last_update: Utc::now(),
            checksum: data.checksum(),
            data,
            stamps: BTreeMap::new(),
        }
    }

    /// Apply a change. On error the data is left untouched.
    pub fn apply(&mut self, change: &Change) -> Result<Applied, SyncError> {
        let mut captured = change.clone();
        let mut crdt_outcome = None;

        if let Some(op) = &change.ot_op {
            let kind = match op.family() {
                Family::Linear => {
                    let mut document = self
                        .data
                        .documents
                        .get(&op.context_id)
                        .cloned()
                        .unwrap_or_default();
                    let kind = ot::linear::apply(&mut document, &op.kind)
                        .map_err(|e| SyncError::invalid("ot_op", e.to_string()))?;
                    self.data.documents.insert(op.context_id.clone(), document);
                    kind
                }
                Family::Spatial => {
                    ot::spatial::apply(&mut self.data.entities, &op.context_id, &op.kind)
                        .map_err(|e| SyncError::invalid("ot_op", e.to_string()))?
                }
            };
            captured.ot_op = Some(op.rewrite(kind, false));
        } else if let Some(op) = &change.crdt_op {
            let (op, outcome) = self.apply_crdt(change.payload.target(), op)?;
            captured.crdt_op = Some(op);
            crdt_outcome = Some(outcome);
        } else {
            captured.payload = self.apply_payload(change)?;
        }

        self.version += 1;
        self.last_update = Utc::now();
        self.checksum = self.data.checksum();
        Ok(Applied {
            change: captured,
            crdt_outcome,
        })
    }

    fn apply_crdt(&mut self, target: &str, op: &CrdtOp) -> Result<(CrdtOp, MergeOutcome), SyncError> {
        let replicas = &mut self.data.replicas;
        let captured = match op {
            CrdtOp::Composite { path, op } => CrdtOp::Composite {
                path: path.clone(),
                op: Box::new(replicas.capture_at(path, op)),
            },
            other => replicas.capture_at(target, other),
        };
        let result = match &captured {
            CrdtOp::Composite { .. } => replicas.apply(&captured),
            other => replicas.apply_at(target, other),
        };
        let outcome = result.map_err(|e| SyncError::invalid("crdt_op", e.to_string()))?;
        Ok((captured, outcome))
    }

    fn apply_payload(&mut self, change: &Change) -> Result<Payload, SyncError> {
        let key = change.order_key();
        let entities = &mut self.data.entities;
        let stamp = self.stamps.get(change.payload.target()).cloned().unwrap_or_default();
        match &change.payload {
            Payload::Insert { target, value } => {
                if stamp.base > key {
                    return Err(SyncError::superseded(target));
                }
                let mut value = value.clone();
                let current = entities.get(target).and_then(Value::as_map);
                if let (Some(fields), Some(current)) = (value.as_map_mut(), current) {
                    for name in stamp.newer_fields(&key) {
                        match current.get(&name) {
                            Some(newer) => fields.insert(name, newer.clone()),
                            None => fields.remove(&name),
                        };
                    }
                }
                entities.insert(target.clone(), value.clone());
                self.stamp(target).rebase(key);
                Ok(Payload::Insert {
                    target: target.clone(),
                    value,
                })
            }
            Payload::Modify { target, fields, .. } => {
                let accepted: Fields = fields
                    .iter()
                    .filter(|(name, _)| *stamp.field(name) <= key)
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                if accepted.is_empty() {
                    return Err(SyncError::superseded(target));
                }
                let entity = entities
                    .entry(target.clone())
                    .or_insert_with(|| Value::Map(Fields::new()));
                let current = entity.as_map_mut().ok_or_else(|| {
                    SyncError::invalid("target", format!("'{}' is not a field map", target))
                })?;
                let prior = assign_fields(current, &accepted);
                let owner = self.stamp(target);
                for name in accepted.keys() {
                    owner.fields.insert(name.clone(), key.clone());
                }
                Ok(Payload::Modify {
                    target: target.clone(),
                    fields: accepted,
                    prior: Some(prior),
                })
            }
            Payload::Delete { target, .. } => {
                if stamp.base > key {
                    return Err(SyncError::superseded(target));
                }
                let newer = stamp.newer_fields(&key);
                let snapshot = match entities.get_mut(target).and_then(Value::as_map_mut) {
                    Some(fields) if !newer.is_empty() => {
                        let snapshot = Value::Map(fields.clone());
                        fields.retain(|name, _| newer.contains(name));
                        Some(snapshot)
                    }
                    _ => entities.remove(target),
                };
                self.stamp(target).rebase(key);
                Ok(Payload::Delete {
                    target: target.clone(),
                    snapshot,
                })
            }
            Payload::Execute {
                target,
                command,
                args,
            } => {
                self.data.commands.push(CommandRecord {
                    change_id: change.id,
                    target: target.clone(),
                    command: command.clone(),
                    args: args.clone(),
                });
                Ok(change.payload.clone())
            }
        }
    }

    fn stamp(&mut self, target: &str) -> &mut EntityStamp {
        self.stamps.entry(target.to_string()).or_default()
    }

    pub fn entity(&self, target: &str) -> Option<&Value> {
        self.data.entities.get(target)
    }

    pub fn document(&self, context_id: &str) -> Option<&str> {
        self.data.documents.get(context_id).map(String::as_str)
    }

    pub fn replicas(&self) -> &Composite {
        &self.data.replicas
    }

    /// `(version, checksum)` pair identifying the current state
    pub fn fingerprint(&self) -> (u64, &str) {
        (self.version, &self.checksum)
    }
}
