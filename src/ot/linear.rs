//! Linear (text-like) transforms
//!
//! Positions are character offsets. Inserts carry text content; deletes
//! carry a length and, once applied, the removed text.

use super::{content_len, Family, OtError, OtKind, OtOp, Position};
use crate::shared::value::Value;

pub(crate) fn transform(a: &OtOp, b: &OtOp) -> (OtOp, OtOp) {
    match (&a.kind, &b.kind) {
        (OtKind::Insert { .. }, OtKind::Insert { .. }) => insert_insert(a, b),
        (OtKind::Delete { .. }, OtKind::Delete { .. }) => (
            delete_after_delete(a, b),
            delete_after_delete(b, a),
        ),
        (OtKind::Insert { .. }, OtKind::Delete { .. }) => insert_delete(a, b),
        (OtKind::Delete { .. }, OtKind::Insert { .. }) => {
            let (b2, a2) = insert_delete(b, a);
            (a2, b2)
        }
        _ => (a.clone(), b.clone()),
    }
}

/// `(offset, length)` of an insert or delete at an offset position
fn span(kind: &OtKind) -> Option<(usize, usize)> {
    match kind {
        OtKind::Insert {
            position: Position::Offset(offset),
            content,
        } => Some((*offset, content_len(content))),
        OtKind::Delete {
            position: Position::Offset(offset),
            length,
            ..
        } => Some((*offset, *length)),
        _ => None,
    }
}

fn removed_text(kind: &OtKind) -> Option<&str> {
    match kind {
        OtKind::Delete {
            removed: Some(removed),
            ..
        } => removed.as_text(),
        _ => None,
    }
}

fn with_offset(kind: &OtKind, offset: usize) -> OtKind {
    match kind {
        OtKind::Insert { content, .. } => OtKind::Insert {
            position: Position::Offset(offset),
            content: content.clone(),
        },
        OtKind::Delete { length, removed, .. } => OtKind::Delete {
            position: Position::Offset(offset),
            length: *length,
            removed: removed.clone(),
        },
        other => other.clone(),
    }
}

fn delete(offset: usize, length: usize, removed: Option<String>) -> OtKind {
    OtKind::Delete {
        position: Position::Offset(offset),
        length,
        removed: removed.map(Value::Text),
    }
}

/// Characters `[start, end)` of `text`
fn slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

fn insert_insert(a: &OtOp, b: &OtOp) -> (OtOp, OtOp) {
    let (Some((pa, la)), Some((pb, lb))) = (span(&a.kind), span(&b.kind)) else {
        return (a.clone(), b.clone());
    };
    let tie = pa == pb;
    let a_first = pa < pb || (tie && a.stamp <= b.stamp);
    if a_first {
        (
            a.rewrite(a.kind.clone(), tie),
            b.rewrite(with_offset(&b.kind, pb + la), tie),
        )
    } else {
        (
            a.rewrite(with_offset(&a.kind, pa + lb), tie),
            b.rewrite(b.kind.clone(), tie),
        )
    }
}

/// Rewrite delete `op` to apply after delete `applied`
fn delete_after_delete(op: &OtOp, applied: &OtOp) -> OtOp {
    let (Some((p, l)), Some((q, m))) = (span(&op.kind), span(&applied.kind)) else {
        return op.clone();
    };
    let (end, applied_end) = (p + l, q + m);

    if end <= q {
        return op.clone();
    }
    if p >= applied_end {
        return op.rewrite(with_offset(&op.kind, p - m), false);
    }

    // Overlap: keep only the part `applied` did not already remove
    let overlap = end.min(applied_end) - p.max(q);
    let removed = removed_text(&op.kind).map(|text| {
        let mut rest = slice(text, 0, q.saturating_sub(p));
        if applied_end < end {
            rest.push_str(&slice(text, applied_end - p, l));
        }
        rest
    });
    op.rewrite(delete(p.min(q), l - overlap, removed), true)
}

/// Transform an insert against a delete, returning `(insert', delete')`
fn insert_delete(ins: &OtOp, del: &OtOp) -> (OtOp, OtOp) {
    let (Some((p, li)), Some((q, ld))) = (span(&ins.kind), span(&del.kind)) else {
        return (ins.clone(), del.clone());
    };
    let end = q + ld;

    if p <= q {
        (ins.clone(), del.rewrite(with_offset(&del.kind, q + li), false))
    } else if p >= end {
        (ins.rewrite(with_offset(&ins.kind, p - ld), false), del.clone())
    } else {
        // Insert strictly inside the deleted range: it survives at the
        // delete start, and the delete splits around it
        let removed = removed_text(&del.kind);
        let head = delete(q, p - q, removed.map(|text| slice(text, 0, p - q)));
        let tail = delete(q + li, end - p, removed.map(|text| slice(text, p - q, ld)));
        (
            ins.rewrite(with_offset(&ins.kind, q), true),
            del.rewrite(OtKind::Composite { ops: vec![head, tail] }, true),
        )
    }
}

/// Algebraic composition of `a` then `b`, if one exists
pub(crate) fn compose(a: &OtKind, b: &OtKind) -> Option<OtKind> {
    match (a, b) {
        (
            OtKind::Insert {
                position: Position::Offset(pa),
                content: Value::Text(ta),
            },
            OtKind::Insert {
                position: Position::Offset(pb),
                content: Value::Text(tb),
            },
        ) => {
            let la = ta.chars().count();
            if *pb < *pa || *pb > pa + la {
                return None;
            }
            let split = pb - pa;
            let mut text = slice(ta, 0, split);
            text.push_str(tb);
            text.push_str(&slice(ta, split, la));
            Some(OtKind::Insert {
                position: Position::Offset(*pa),
                content: Value::Text(text),
            })
        }
        (
            OtKind::Delete {
                position: Position::Offset(pa),
                length: la,
                ..
            },
            OtKind::Delete {
                position: Position::Offset(pb),
                length: lb,
                ..
            },
        ) => {
            // `b` runs over the point where `a` removed its range
            if *pa < *pb || *pa > pb + lb {
                return None;
            }
            let removed = match (removed_text(a), removed_text(b)) {
                (Some(ra), Some(rb)) => {
                    let split = pa - pb;
                    let mut text = slice(rb, 0, split);
                    text.push_str(ra);
                    text.push_str(&slice(rb, split, *lb));
                    Some(text)
                }
                _ => None,
            };
            Some(delete(*pb, la + lb, removed))
        }
        _ => None,
    }
}

fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Apply to a document, returning the operation with snapshots captured.
///
/// The document is left untouched when any member fails.
pub fn apply(document: &mut String, kind: &OtKind) -> Result<OtKind, OtError> {
    let mut scratch = document.clone();
    let applied = apply_in_place(&mut scratch, kind)?;
    *document = scratch;
    Ok(applied)
}

fn apply_in_place(document: &mut String, kind: &OtKind) -> Result<OtKind, OtError> {
    let length = document.chars().count();
    match kind {
        OtKind::Insert {
            position: Position::Offset(offset),
            content,
        } => {
            let text = content.as_text().ok_or(OtError::FamilyMismatch {
                op: "insert",
                family: Family::Linear,
            })?;
            if *offset > length {
                return Err(OtError::OutOfRange {
                    position: *offset,
                    length,
                });
            }
            document.insert_str(byte_index(document, *offset), text);
            Ok(kind.clone())
        }
        OtKind::Delete {
            position: Position::Offset(offset),
            length: count,
            ..
        } => {
            if offset + count > length {
                return Err(OtError::OutOfRange {
                    position: offset + count,
                    length,
                });
            }
            let start = byte_index(document, *offset);
            let end = byte_index(document, offset + count);
            let removed: String = document.drain(start..end).collect();
            Ok(delete(*offset, *count, Some(removed)))
        }
        OtKind::Composite { ops } => ops
            .iter()
            .map(|member| apply_in_place(document, member))
            .collect::<Result<Vec<_>, _>>()
            .map(|ops| OtKind::Composite { ops }),
        other => Err(OtError::FamilyMismatch {
            op: other.name(),
            family: Family::Linear,
        }),
    }
}
