//! Built-in resolution strategies, from highest to lowest weight:
//!
//! | Strategy | Weight | Applies when |
//! |---|---|---|
//! | [`RollbackOnCorruption`] | 200 | a member is structurally invalid |
//! | [`UserActionPriority`] | 100 | user actions compete with other priorities |
//! | [`SmartMerge`] | 90 | two modifies from a compatible pair |
//! | [`UserPreference`] | 85 | a member surface has a registered preference |
//! | [`ModePriority`] | 75 | members come from several surfaces |
//! | [`LatestWins`] | 50 | always |
//!
//! Strategies receive the group sorted by [`Change::order_key`], so "latest"
//! is always the last matching member.

use super::{ConflictKind, ConflictRecord, ConflictStrategy, Preference, ResolutionContext};
use crate::shared::change::{Change, Payload};
use crate::shared::config::SurfaceKind;
use crate::shared::value::{join_points, Fields, Value};
use crate::ot::OtKind;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Split the group into the member `winner` and everything else
fn partition(ops: &[Change], winner: Uuid) -> (Change, Vec<Change>) {
    let mut rejected = Vec::with_capacity(ops.len().saturating_sub(1));
    let mut applied = None;
    for change in ops {
        if applied.is_none() && change.id == winner {
            applied = Some(change.clone());
        } else {
            rejected.push(change.clone());
        }
    }
    match applied {
        Some(applied) => (applied, rejected),
        // Winner ids always come from the group
        None => (rejected.remove(rejected.len() - 1), rejected),
    }
}

fn pick(name: &str, reason: String, ops: &[Change], ctx: &ResolutionContext<'_>, winner: &Change) -> ConflictRecord {
    let (applied, rejected) = partition(ops, winner.id);
    ConflictRecord::new(name, reason, ctx.kind, applied, rejected)
}

/// Latest member by order key
fn latest<'a>(ops: impl IntoIterator<Item = &'a Change>) -> Option<&'a Change> {
    ops.into_iter().max_by_key(|change| change.order_key())
}

/// Rejects structurally invalid members
#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackOnCorruption;

impl ConflictStrategy for RollbackOnCorruption {
    fn name(&self) -> &str {
        "rollback-on-corruption"
    }

    fn weight(&self) -> u32 {
        200
    }

    fn applies(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> bool {
        ctx.kind == ConflictKind::Corruption || ops.iter().any(|change| !change.is_well_formed())
    }

    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord {
        let defects: BTreeSet<&str> = ops.iter().flat_map(Change::defects).collect();
        let reason = defects.into_iter().collect::<Vec<_>>().join(", ");

        match latest(ops.iter().filter(|change| change.is_well_formed())) {
            Some(valid) => pick(
                self.name(),
                format!("rejected invalid members ({})", reason),
                ops,
                ctx,
                valid,
            ),
            None => {
                let mut record = ConflictRecord::new(
                    self.name(),
                    format!("no valid member ({}), kept first as a no-op", reason),
                    ctx.kind,
                    ops[0].clone(),
                    ops[1..].to_vec(),
                );
                record.is_noop = true;
                record
            }
        }
    }
}

/// User actions beat every other priority
#[derive(Debug, Clone, Copy, Default)]
pub struct UserActionPriority;

impl ConflictStrategy for UserActionPriority {
    fn name(&self) -> &str {
        "user-action-priority"
    }

    fn weight(&self) -> u32 {
        100
    }

    fn applies(&self, ops: &[Change], _ctx: &ResolutionContext<'_>) -> bool {
        let users = ops.iter().filter(|c| c.priority.is_user_action()).count();
        users > 0 && users < ops.len()
    }

    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord {
        let users = ops.iter().filter(|c| c.priority.is_user_action());
        match latest(users) {
            Some(winner) => pick(
                self.name(),
                "user action wins over automated changes".to_string(),
                ops,
                ctx,
                winner,
            ),
            None => LatestWins.resolve(ops, ctx),
        }
    }
}

/// Field-wise merge of two compatible modifies into one synthetic change
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartMerge;

impl SmartMerge {
    fn fields(change: &Change) -> Option<&Fields> {
        match &change.payload {
            Payload::Modify { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Later fields overlay earlier ones; point arrays are concatenated
    fn merge_fields(earlier: &Fields, later: &Fields) -> Fields {
        let mut merged = earlier.clone();
        for (name, value) in later {
            let joined = match (merged.get(name), value) {
                (Some(Value::Points(first)), Value::Points(second)) => {
                    Value::Points(join_points(first, second))
                }
                _ => value.clone(),
            };
            merged.insert(name.clone(), joined);
        }
        merged
    }
}

impl ConflictStrategy for SmartMerge {
    fn name(&self) -> &str {
        "smart-merge"
    }

    fn weight(&self) -> u32 {
        90
    }

    fn applies(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> bool {
        let [a, b] = ops else { return false };
        if Self::fields(a).is_none() || Self::fields(b).is_none() {
            return false;
        }
        if a.payload.target() != b.payload.target() {
            return false;
        }
        ctx.config.is_compatible(
            &SurfaceKind::new(a.source_surface.clone(), a.kind()),
            &SurfaceKind::new(b.source_surface.clone(), b.kind()),
        )
    }

    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord {
        let (earlier, later) = (&ops[0], &ops[1]);
        let (Some(first), Some(second)) = (Self::fields(earlier), Self::fields(later)) else {
            return LatestWins.resolve(ops, ctx);
        };
        let fields = Self::merge_fields(first, second);

        let mut merged = later.clone();
        merged.id = Uuid::from_u128(earlier.id.as_u128() ^ later.id.as_u128());
        merged.logical_time = earlier.logical_time.max(later.logical_time);
        merged.priority = earlier.priority.min(later.priority);
        merged.created_at = earlier.created_at.max(later.created_at);
        merged.payload = Payload::Modify {
            target: later.payload.target().to_string(),
            fields: fields.clone(),
            prior: None,
        };
        if let Some(op) = merged.ot_op.as_mut() {
            if matches!(op.kind, OtKind::Modify { .. }) {
                op.kind = OtKind::Modify { fields, prior: None };
            }
        }

        let mut record = ConflictRecord::new(
            self.name(),
            format!(
                "merged {}/{} with {}/{}",
                earlier.source_surface,
                earlier.kind(),
                later.source_surface,
                later.kind()
            ),
            ctx.kind,
            merged,
            Vec::new(),
        );
        record.merged_from = vec![earlier.id, later.id];
        record
    }
}

/// Honours a preference registered for a member surface
#[derive(Debug, Clone, Copy, Default)]
pub struct UserPreference;

impl UserPreference {
    /// Preference of the first (lexicographic) member surface that has one
    fn preference(ops: &[Change], ctx: &ResolutionContext<'_>) -> Option<(String, Preference)> {
        let surfaces: BTreeSet<&str> = ops.iter().map(|c| c.source_surface.as_str()).collect();
        surfaces.into_iter().find_map(|surface| {
            ctx.preferences
                .get(surface)
                .map(|preference| (surface.to_string(), *preference))
        })
    }
}

impl ConflictStrategy for UserPreference {
    fn name(&self) -> &str {
        "user-preference"
    }

    fn weight(&self) -> u32 {
        85
    }

    fn applies(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> bool {
        Self::preference(ops, ctx).is_some()
    }

    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord {
        let Some((surface, preference)) = Self::preference(ops, ctx) else {
            return LatestWins.resolve(ops, ctx);
        };
        let winner = match preference {
            Preference::Latest => latest(ops),
            Preference::UserActionFirst => {
                latest(ops.iter().filter(|c| c.priority.is_user_action())).or_else(|| latest(ops))
            }
        };
        match winner {
            Some(winner) => pick(
                self.name(),
                format!("{:?} preference registered for {}", preference, surface),
                ops,
                ctx,
                winner,
            ),
            None => LatestWins.resolve(ops, ctx),
        }
    }
}

/// Fixed surface ranking plus a user-action bonus
#[derive(Debug, Clone, Copy, Default)]
pub struct ModePriority;

impl ModePriority {
    fn score(change: &Change, ctx: &ResolutionContext<'_>) -> u32 {
        let bonus = if change.priority.is_user_action() {
            ctx.config.user_action_bonus
        } else {
            0
        };
        ctx.config.surface_rank(&change.source_surface) + bonus
    }
}

impl ConflictStrategy for ModePriority {
    fn name(&self) -> &str {
        "mode-priority"
    }

    fn weight(&self) -> u32 {
        75
    }

    fn applies(&self, ops: &[Change], _ctx: &ResolutionContext<'_>) -> bool {
        let surfaces: BTreeSet<&str> = ops.iter().map(|c| c.source_surface.as_str()).collect();
        surfaces.len() > 1
    }

    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord {
        let winner = ops
            .iter()
            .max_by_key(|change| (Self::score(change, ctx), change.order_key()));
        match winner {
            Some(winner) => pick(
                self.name(),
                format!(
                    "{} scored {} on surface ranking",
                    winner.source_surface,
                    Self::score(winner, ctx)
                ),
                ops,
                ctx,
                winner,
            ),
            None => LatestWins.resolve(ops, ctx),
        }
    }
}

/// Highest logical time wins; the default fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestWins;

impl ConflictStrategy for LatestWins {
    fn name(&self) -> &str {
        "latest-wins"
    }

    fn weight(&self) -> u32 {
        50
    }

    fn applies(&self, _ops: &[Change], _ctx: &ResolutionContext<'_>) -> bool {
        true
    }

    fn resolve(&self, ops: &[Change], ctx: &ResolutionContext<'_>) -> ConflictRecord {
        match latest(ops) {
            Some(winner) => pick(
                self.name(),
                format!("logical time {} is latest", winner.logical_time),
                ops,
                ctx,
                winner,
            ),
            None => ConflictRecord::new(self.name(), "empty group", ctx.kind, ops[0].clone(), Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictResolver;
    use crate::ot::OtOp;
    use crate::shared::change::Priority;
    use crate::shared::config::EngineConfig;
    use crate::shared::value::Point;
    use pretty_assertions::assert_eq;

    fn modify(surface: &str, time: u64, fields: Fields) -> Change {
        Change::new(
            surface,
            time,
            Payload::Modify {
                target: "stroke-1".to_string(),
                fields,
                prior: None,
            },
        )
    }

    fn field(name: &str, value: Value) -> Fields {
        Fields::from([(name.to_string(), value)])
    }

    #[test]
    fn test_user_move_beats_background_modify() {
        let mut resolver = ConflictResolver::new(&EngineConfig::default());
        let movement = Change::new(
            "draw",
            1,
            Payload::Modify {
                target: "stroke-1".to_string(),
                fields: field("position", Value::Point(Point::new(3.0, 4.0))),
                prior: None,
            },
        )
        .with_ot(OtOp::move_by("stroke-1", Point::new(3.0, 4.0)));
        let background = modify("growth", 2, field("width", Value::Number(1.0)))
            .with_priority(Priority::Background)
            .with_ot(OtOp::modify("stroke-1", field("width", Value::Number(1.0))));

        let record = resolver.resolve(&[background.clone(), movement.clone()]).unwrap();
        assert_eq!(record.strategy, "user-action-priority");
        assert_eq!(record.applied.id, movement.id);
        assert_eq!(record.rejected.len(), 1);
        assert_eq!(record.rejected[0].id, background.id);
    }

    #[test]
    fn test_corrupt_member_rejected() {
        let mut resolver = ConflictResolver::new(&EngineConfig::default());
        let valid = modify("draw", 1, field("width", Value::Number(1.0)));
        let corrupt = modify("draw", 2, Fields::new());

        let record = resolver.resolve(&[valid.clone(), corrupt.clone()]).unwrap();
        assert_eq!(record.strategy, "rollback-on-corruption");
        assert_eq!(record.kind, ConflictKind::Corruption);
        assert_eq!(record.applied.id, valid.id);
        assert!(!record.is_noop);
    }

    #[test]
    fn test_all_corrupt_keeps_first_as_noop() {
        let mut resolver = ConflictResolver::new(&EngineConfig::default());
        let a = modify("draw", 1, Fields::new());
        let b = modify("draw", 2, Fields::new());
        let record = resolver.resolve(&[b, a.clone()]).unwrap();
        assert!(record.is_noop);
        assert_eq!(record.applied.id, a.id);
        assert_eq!(resolver.stats().resolved, 0);
    }

    #[test]
    fn test_smart_merge_combines_fields() {
        let mut resolver = ConflictResolver::new(&EngineConfig::default());
        let draw = modify("draw", 1, field("color", Value::text("red")))
            .with_priority(Priority::AlgorithmUpdate);
        let code = modify("code", 2, field("width", Value::Number(3.0)))
            .with_priority(Priority::AlgorithmUpdate);

        let record = resolver.resolve(&[draw.clone(), code.clone()]).unwrap();
        assert_eq!(record.strategy, "smart-merge");
        assert!(record.rejected.is_empty());
        assert_eq!(record.merged_from, vec![draw.id, code.id]);
        match &record.applied.payload {
            Payload::Modify { fields, .. } => {
                assert_eq!(fields["color"], Value::text("red"));
                assert_eq!(fields["width"], Value::Number(3.0));
            }
            other => panic!("Expected modify, got {:?}", other),
        }
        assert_eq!(record.applied.logical_time, 2);
    }

    #[test]
    fn test_preference_user_action_first() {
        let mut resolver = ConflictResolver::new(&EngineConfig::default());
        resolver.unregister("user-action-priority");
        resolver.set_preference("draw", Preference::UserActionFirst);

        let user = modify("draw", 1, field("width", Value::Number(1.0)));
        let algorithm = Change::new(
            "draw",
            2,
            Payload::Insert {
                target: "stroke-1".to_string(),
                value: Value::Number(1.0),
            },
        )
        .with_priority(Priority::AlgorithmUpdate);

        let record = resolver.resolve(&[user.clone(), algorithm]).unwrap();
        assert_eq!(record.strategy, "user-preference");
        assert_eq!(record.applied.id, user.id);
    }

    #[test]
    fn test_mode_priority_uses_ranking() {
        let mut resolver = ConflictResolver::new(&EngineConfig::default());
        let draw = Change::new(
            "draw",
            1,
            Payload::Insert {
                target: "stroke-1".to_string(),
                value: Value::Number(1.0),
            },
        );
        let growth = Change::new(
            "growth",
            5,
            Payload::Insert {
                target: "stroke-1".to_string(),
                value: Value::Number(2.0),
            },
        );
        let record = resolver.resolve(&[growth, draw.clone()]).unwrap();
        assert_eq!(record.strategy, "mode-priority");
        assert_eq!(record.applied.id, draw.id);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = modify("draw", 3, field("width", Value::Number(1.0)));
        let b = modify("draw", 3, field("width", Value::Number(2.0)));
        let c = modify("draw", 1, field("width", Value::Number(3.0)));

        let mut first = ConflictResolver::new(&EngineConfig::default());
        let mut second = ConflictResolver::new(&EngineConfig::default());
        let left = first.resolve(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let right = second.resolve(&[c, b, a]).unwrap();
        assert_eq!(left.partition(), right.partition());
    }
}
