//! Spatial (vector entity) transforms
//!
//! Operations sharing a context edit the same entity. Arbitration between
//! two concurrent edits of one entity:
//!
//! - a delete beats everything, then an insert (entity replacement)
//! - a modify that sets `position` beats a move
//! - move vs move: the later arrival wins, the other becomes a no-op
//! - modify vs modify: field-level merge, see [`merge_modifies`]

use super::{Family, OtError, OtKind, OtOp, Position};
use crate::shared::value::{assign_fields, join_points, Fields, Point, Value};
use std::collections::BTreeMap;

/// Field moved by [`OtKind::Move`]
pub const POSITION_FIELD: &str = "position";

/// Entity table keyed by context id
pub type Entities = BTreeMap<String, Value>;

pub(crate) fn transform(a: &OtOp, b: &OtOp) -> (OtOp, OtOp) {
    let a_later = a.stamp > b.stamp;
    let noop = OtKind::noop();
    match (&a.kind, &b.kind) {
        (OtKind::Delete { .. }, OtKind::Delete { .. }) => {
            (a.rewrite(noop.clone(), true), b.rewrite(noop, true))
        }
        (OtKind::Delete { .. }, _) => (a.flagged(), b.rewrite(noop, true)),
        (_, OtKind::Delete { .. }) => (a.rewrite(noop, true), b.flagged()),
        (OtKind::Insert { .. }, OtKind::Insert { .. }) => latest_wins(a, b, a_later),
        (OtKind::Insert { .. }, _) => (a.flagged(), b.rewrite(noop, true)),
        (_, OtKind::Insert { .. }) => (a.rewrite(noop, true), b.flagged()),
        (OtKind::Move { delta: da }, OtKind::Move { delta: db }) => {
            // The winner's replay undoes the loser's displacement
            if a_later {
                (
                    a.rewrite(OtKind::Move { delta: difference(*da, *db) }, true),
                    b.rewrite(noop, true),
                )
            } else {
                (
                    a.rewrite(noop, true),
                    b.rewrite(OtKind::Move { delta: difference(*db, *da) }, true),
                )
            }
        }
        (OtKind::Modify { fields, .. }, OtKind::Move { .. }) => {
            if fields.contains_key(POSITION_FIELD) {
                (a.flagged(), b.rewrite(noop, true))
            } else {
                (a.clone(), b.clone())
            }
        }
        (OtKind::Move { .. }, OtKind::Modify { fields, .. }) => {
            if fields.contains_key(POSITION_FIELD) {
                (a.rewrite(noop, true), b.flagged())
            } else {
                (a.clone(), b.clone())
            }
        }
        (OtKind::Modify { .. }, OtKind::Modify { .. }) => merge_modifies(a, b, a_later),
        _ => (a.clone(), b.clone()),
    }
}

fn latest_wins(a: &OtOp, b: &OtOp, a_later: bool) -> (OtOp, OtOp) {
    if a_later {
        (a.flagged(), b.rewrite(OtKind::noop(), true))
    } else {
        (a.rewrite(OtKind::noop(), true), b.flagged())
    }
}

fn difference(winner: Point, loser: Point) -> Point {
    winner.offset(loser.negate())
}

/// Field-level merge of two modifies of one entity.
///
/// Disjoint fields are kept from both. An overlapping scalar field keeps the
/// later value: the earlier modify drops it. An overlapping point-array field
/// becomes the concatenation (earlier first, duplicated boundary point
/// removed) on both sides.
fn merge_modifies(a: &OtOp, b: &OtOp, a_later: bool) -> (OtOp, OtOp) {
    let (OtKind::Modify { fields: fa, prior: pa }, OtKind::Modify { fields: fb, prior: pb }) =
        (&a.kind, &b.kind)
    else {
        return (a.clone(), b.clone());
    };

    let mut a_fields = fa.clone();
    let mut b_fields = fb.clone();
    let mut conflict = false;

    for (name, value_a) in fa {
        let Some(value_b) = fb.get(name) else { continue };
        conflict = true;
        match (value_a, value_b) {
            (Value::Points(points_a), Value::Points(points_b)) => {
                let joined = if a_later {
                    join_points(points_b, points_a)
                } else {
                    join_points(points_a, points_b)
                };
                a_fields.insert(name.clone(), Value::Points(joined.clone()));
                b_fields.insert(name.clone(), Value::Points(joined));
            }
            _ if a_later => {
                b_fields.remove(name);
            }
            _ => {
                a_fields.remove(name);
            }
        }
    }

    let a2 = OtKind::Modify {
        prior: retain_prior(pa, &a_fields),
        fields: a_fields,
    };
    let b2 = OtKind::Modify {
        prior: retain_prior(pb, &b_fields),
        fields: b_fields,
    };
    (a.rewrite(a2, conflict), b.rewrite(b2, conflict))
}

fn retain_prior(prior: &Option<Fields>, fields: &Fields) -> Option<Fields> {
    prior.as_ref().map(|prior| {
        prior
            .iter()
            .filter(|(name, _)| fields.contains_key(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    })
}

/// Algebraic composition of `a` then `b` on one entity, if one exists
pub(crate) fn compose(a: &OtKind, b: &OtKind) -> Option<OtKind> {
    match (a, b) {
        (OtKind::Move { delta: da }, OtKind::Move { delta: db }) => Some(OtKind::Move {
            delta: da.offset(*db),
        }),
        (
            OtKind::Modify {
                fields: fa,
                prior: pa,
            },
            OtKind::Modify {
                fields: fb,
                prior: pb,
            },
        ) => {
            let mut fields = fa.clone();
            fields.extend(fb.iter().map(|(k, v)| (k.clone(), v.clone())));
            // The first write to a field holds its original value
            let prior = match (pa, pb) {
                (Some(pa), Some(pb)) => {
                    let mut prior = pb.clone();
                    prior.extend(pa.iter().map(|(k, v)| (k.clone(), v.clone())));
                    Some(prior)
                }
                _ => None,
            };
            Some(OtKind::Modify { fields, prior })
        }
        _ => None,
    }
}

/// Apply to the entity `context_id`, returning the operation with snapshots
/// captured. The table is left untouched when any member fails.
pub fn apply(entities: &mut Entities, context_id: &str, kind: &OtKind) -> Result<OtKind, OtError> {
    // Only the target entity is ever touched
    let before = entities.get(context_id).cloned();
    let result = apply_in_place(entities, context_id, kind);
    if result.is_err() {
        match before {
            Some(entity) => entities.insert(context_id.to_string(), entity),
            None => entities.remove(context_id),
        };
    }
    result
}

fn apply_in_place(entities: &mut Entities, context_id: &str, kind: &OtKind) -> Result<OtKind, OtError> {
    match kind {
        OtKind::Insert { position, content } => {
            let mut content = content.clone();
            if let (Position::Point(point), Some(fields)) = (position, content.as_map_mut()) {
                fields.insert(POSITION_FIELD.to_string(), Value::Point(*point));
            }
            entities.insert(context_id.to_string(), content.clone());
            Ok(OtKind::Insert {
                position: *position,
                content,
            })
        }
        OtKind::Delete {
            position, length, ..
        } => Ok(OtKind::Delete {
            position: *position,
            length: *length,
            removed: entities.remove(context_id),
        }),
        OtKind::Move { delta } => {
            match entities.get_mut(context_id) {
                Some(Value::Point(point)) => *point = point.offset(*delta),
                Some(Value::Map(fields)) => {
                    let current = fields
                        .get(POSITION_FIELD)
                        .and_then(Value::as_point)
                        .unwrap_or_default();
                    fields.insert(POSITION_FIELD.to_string(), Value::Point(current.offset(*delta)));
                }
                _ => {}
            }
            Ok(kind.clone())
        }
        OtKind::Modify { fields, .. } => {
            let entity = entities
                .entry(context_id.to_string())
                .or_insert_with(|| Value::Map(Fields::new()));
            let target = entity.as_map_mut().ok_or(OtError::FamilyMismatch {
                op: "modify",
                family: Family::Spatial,
            })?;
            let prior = assign_fields(target, fields);
            Ok(OtKind::Modify {
                fields: fields.clone(),
                prior: Some(prior),
            })
        }
        OtKind::Composite { ops } => ops
            .iter()
            .map(|member| apply_in_place(entities, context_id, member))
            .collect::<Result<Vec<_>, _>>()
            .map(|ops| OtKind::Composite { ops }),
    }
}
