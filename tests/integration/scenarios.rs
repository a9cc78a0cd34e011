//! End-to-end engine scenarios
//!
//! Each test drives a synchronous engine tick by tick.

use crate::common::*;
use crate::{assert_document, assert_err, assert_ok};
use xfcanvas::ot::OtOp;
use xfcanvas::shared::{
    Change, EngineEvent, EventType, Fields, Payload, Point, Priority, SyncError, Value,
};
use xfcanvas::sync::FnTranslator;

const BASE: &str = "abcdefghijklmnopqrstuvwxyz0123";

#[test]
fn test_concurrent_inserts_same_position() {
    let mut engine = engine("site-a");
    seed_document(&mut engine, BASE);

    let local = insert_text(&mut engine, "code", 18, &"L".repeat(22));
    let remote = remote_text("site-b", 5, OtOp::insert_text(DOC, 18, "R".repeat(24)));
    assert_ok!(engine.submit(local));
    assert_ok!(engine.submit(remote));
    let report = engine.tick();
    assert_eq!(report.applied, 2);

    let expected = format!("{}{}{}{}", &BASE[..18], "L".repeat(22), "R".repeat(24), &BASE[18..]);
    assert_document!(engine, "code", expected);

    let metrics = engine.metrics();
    assert_eq!(metrics.ot_stats.transforms, 1);
    assert_eq!(metrics.ot_stats.conflicts, 1);
}

#[test]
fn test_overlapping_deletes() {
    let mut engine = engine("site-a");
    seed_document(&mut engine, BASE);

    let local = delete_text(&mut engine, "code", 10, 10);
    let remote = remote_text("site-b", 5, OtOp::delete_text(DOC, 15, 10));
    assert_ok!(engine.submit(local));
    assert_ok!(engine.submit(remote));
    engine.tick();

    let expected = format!("{}{}", &BASE[..10], &BASE[25..]);
    assert_document!(engine, "code", expected);
    assert_eq!(BASE.len() - expected.len(), 15);
}

#[test]
fn test_user_move_beats_background_modify() {
    let mut engine = engine("site-a");
    let seed = engine.change("draw", stroke("stroke-1"));
    assert_ok!(engine.submit(seed));
    settle(&mut engine);

    let delta = Point::new(5.0, 5.0);
    let moved = engine
        .change(
            "draw",
            modify(
                "stroke-1",
                Fields::from([("position".to_string(), Value::Point(delta))]),
            ),
        )
        .with_ot(OtOp::move_by("stroke-1", delta));
    let recolor = Fields::from([("color".to_string(), Value::text("red"))]);
    let background = engine
        .change("growth", modify("stroke-1", recolor.clone()))
        .with_priority(Priority::Background)
        .with_ot(OtOp::modify("stroke-1", recolor));
    let (move_id, background_id) = (moved.id, background.id);

    let mut resolved = engine.subscribe().only([EventType::ConflictResolved]);
    assert_ok!(engine.submit(moved));
    assert_ok!(engine.submit(background));
    let report = engine.tick();
    assert_eq!(report.applied, 1);
    assert_eq!(report.rejected, 1);

    match resolved.try_recv() {
        Some(EngineEvent::ConflictResolved { record }) => {
            assert_eq!(record.strategy, "user-action-priority");
            assert_eq!(record.applied.id, move_id);
            assert_eq!(record.rejected.len(), 1);
            assert_eq!(record.rejected[0].id, background_id);
        }
        other => panic!("Expected ConflictResolved, got {:?}", other),
    }

    let stroke = engine.surface("draw").unwrap().entity("stroke-1").unwrap();
    let position = stroke.as_map().unwrap()["position"].as_point();
    assert_eq!(position, Some(delta));
    assert!(engine.surface("growth").unwrap().entity("stroke-1").is_none());
    assert_eq!(engine.resolver().audit_log().count(), 1);
}

#[test]
fn test_sixth_stroke_added_is_loop() {
    let mut engine = strict_engine("site-a");
    for i in 0..5 {
        let change = engine
            .change("draw", stroke(&format!("stroke-{}", i)))
            .with_label("stroke_added");
        assert_ok!(engine.submit(change));
    }
    let sixth = engine
        .change("draw", stroke("stroke-5"))
        .with_label("stroke_added");
    assert_err!(engine.submit(sixth), SyncError::LoopDetected { .. });

    settle(&mut engine);
    let draw = engine.surface("draw").unwrap();
    assert_eq!(draw.data.entities.len(), 5);
    assert!(draw.entity("stroke-5").is_none());
    assert_eq!(engine.metrics().loop_rejected, 1);
}

#[test]
fn test_undo_removes_only_last_batch() {
    let mut engine = engine("site-a");
    let a = engine.change("draw", stroke("A"));
    assert_ok!(engine.submit(a));
    settle(&mut engine);
    let b = engine.change("draw", stroke("B"));
    assert_ok!(engine.submit(b));
    settle(&mut engine);

    assert!(assert_ok!(engine.undo()));
    settle(&mut engine);
    let draw = engine.surface("draw").unwrap();
    assert!(draw.entity("A").is_some());
    assert!(draw.entity("B").is_none());

    assert!(assert_ok!(engine.redo()));
    settle(&mut engine);
    let draw = engine.surface("draw").unwrap();
    assert!(draw.entity("A").is_some());
    assert!(draw.entity("B").is_some());
    assert_eq!(engine.history().index(), 1);
}

#[test]
fn test_undo_text_edit_restores_document() {
    let mut engine = engine("site-a");
    seed_document(&mut engine, BASE);
    let delete = delete_text(&mut engine, "code", 3, 4);
    assert_ok!(engine.submit(delete));
    settle(&mut engine);
    assert_document!(engine, "code", format!("{}{}", &BASE[..3], &BASE[7..]));

    assert_ok!(engine.undo());
    settle(&mut engine);
    assert_document!(engine, "code", BASE);

    assert_ok!(engine.redo());
    settle(&mut engine);
    assert_document!(engine, "code", format!("{}{}", &BASE[..3], &BASE[7..]));
}

#[test]
fn test_priority_order_within_tick() {
    let mut engine = engine("site-a");
    let mut applied = engine.subscribe().only([EventType::ChangeApplied]);

    let mut expected = Vec::new();
    for (target, priority) in [
        ("bg", Priority::Background),
        ("user", Priority::UserAction),
        ("derived", Priority::Derived),
    ] {
        let change = engine.change("draw", stroke(target)).with_priority(priority);
        expected.push((priority, change.id));
        assert_ok!(engine.submit(change));
    }
    engine.tick();

    expected.sort();
    let order: Vec<_> = applied
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::ChangeApplied { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    let expected: Vec<_> = expected.into_iter().map(|(_, id)| id).collect();
    assert_eq!(order, expected);
}

#[test]
fn test_translator_echo_is_bounded() {
    let mut engine = strict_engine("site-a");
    engine.register_translator(Box::new(FnTranslator::new("echo", |change: &Change| {
        let other = if change.source_surface == "draw" {
            "parametric"
        } else {
            "draw"
        };
        Ok(vec![Change::new(
            other,
            1,
            Payload::Insert {
                target: format!("{}'", change.payload.target()),
                value: Value::Bool(true),
            },
        )
        .with_label("echo")
        .with_priority(Priority::Derived)])
    })));

    let start = engine.change("draw", stroke("s"));
    assert_ok!(engine.submit(start));
    let ticks = settle(&mut engine);

    assert!(ticks < 100, "echo cycle ran for {} ticks", ticks);
    assert!(engine.metrics().loop_rejected >= 1);
    assert_eq!(engine.queue_len(), 0);
}

#[test]
fn test_dirty_regions_accumulate_until_cleared() {
    let mut engine = engine("site-a");
    for target in ["stroke-1", "stroke-2"] {
        let change = engine.change("draw", stroke(target));
        assert_ok!(engine.submit(change));
    }
    seed_document(&mut engine, "x");

    assert_eq!(
        engine.dirty_regions(),
        vec![
            "code:text:doc".to_string(),
            "draw:stroke-1".to_string(),
            "draw:stroke-2".to_string(),
        ]
    );
    engine.clear_dirty_regions();
    assert!(engine.dirty_regions().is_empty());
}
