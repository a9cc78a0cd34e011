//! Two synchronous engines exchanging envelopes by hand
//!
//! Every edit is applied in its own tick before the replicas trade
//! changes, so nothing is reconciled inside a shared batch.

use crate::common::*;
use crate::{assert_converged, assert_document};
use xfcanvas::ot::OtOp;
use xfcanvas::shared::{Payload, Value, VectorClock};
use xfcanvas::sync::Engine;
use xfcanvas::transport::Envelope;

fn document(engine: &Engine) -> String {
    engine
        .surface("code")
        .and_then(|surface| surface.document(DOC))
        .unwrap_or_default()
        .to_string()
}

fn number(value: f64) -> Payload {
    Payload::Insert {
        target: "s".to_string(),
        value: Value::Number(value),
    }
}

#[test]
fn test_inserts_at_same_offset_in_separate_ticks() {
    let mut alpha = engine("alpha");
    let mut beta = engine("beta");

    let ours = insert_text(&mut alpha, "code", 0, "aa");
    commit(&mut alpha, ours);
    let theirs = insert_text(&mut beta, "code", 0, "bb");
    commit(&mut beta, theirs);

    exchange(&mut alpha, &mut beta);

    assert_document!(alpha, "code", "aabb");
    assert_document!(beta, "code", "aabb");
    assert_converged!(alpha, beta, "code");
    assert_eq!(beta.metrics().ot_stats.transforms, 1);
}

#[test]
fn test_edit_rebased_before_send_not_transformed_twice() {
    let mut alpha = engine("alpha");
    let mut beta = engine("beta");

    let ours = insert_text(&mut alpha, "code", 0, "aa");
    commit(&mut alpha, ours);

    // Beta's edit is still queued when alpha's arrives
    let theirs = insert_text(&mut beta, "code", 0, "bb");
    beta.submit(theirs).unwrap();
    for envelope in alpha.take_outbound() {
        assert!(beta.handle_envelope(&envelope).is_empty());
    }
    settle(&mut beta);

    exchange(&mut alpha, &mut beta);

    assert_document!(alpha, "code", "aabb");
    assert_converged!(alpha, beta, "code");
}

#[test]
fn test_edit_sequences_converge_after_shared_seed() {
    let mut alpha = engine("alpha");
    let mut beta = engine("beta");
    seed_document(&mut alpha, "hello world");
    exchange(&mut alpha, &mut beta);
    assert_document!(beta, "code", "hello world");

    let grow = insert_text(&mut alpha, "code", 6, "big ");
    commit(&mut alpha, grow);
    let trim = delete_text(&mut alpha, "code", 0, 1);
    commit(&mut alpha, trim);

    let shout = insert_text(&mut beta, "code", 11, "!");
    commit(&mut beta, shout);
    let mark = insert_text(&mut beta, "code", 0, "X");
    commit(&mut beta, mark);

    exchange(&mut alpha, &mut beta);

    assert_converged!(alpha, beta, "code");
    assert_eq!(document(&alpha), "Xello big world!");
}

#[test]
fn test_remote_op_rebased_over_unseen_local_history() {
    let mut alpha = engine("alpha");
    seed_document(&mut alpha, "0123456789");

    // Authored against the seed only, delivered after two local edits
    let mut context = VectorClock::new();
    context.observe("alpha/code", 1);
    let remote = remote_text("beta", 2, OtOp::delete_text(DOC, 5, 5)).with_context(context);

    let head = insert_text(&mut alpha, "code", 0, "ab");
    commit(&mut alpha, head);
    let tail = insert_text(&mut alpha, "code", 12, "cd");
    commit(&mut alpha, tail);
    commit(&mut alpha, remote);

    assert_eq!(document(&alpha), "ab01234cd");
}

#[test]
fn test_competing_inserts_keep_newest_on_both() {
    let mut alpha = engine("alpha");
    let mut beta = engine("beta");

    let first = alpha.change("draw", number(1.0));
    commit(&mut alpha, first);
    let second = beta.change("draw", number(2.0));
    commit(&mut beta, second);

    exchange(&mut alpha, &mut beta);

    assert_converged!(alpha, beta, "draw");
    let draw = alpha.surface("draw").unwrap();
    assert_eq!(draw.entity("s"), Some(&Value::Number(2.0)));
    assert_eq!(beta.metrics().superseded_writes, 1);
    assert_eq!(alpha.metrics().superseded_writes, 0);
}

#[test]
fn test_sync_burst_not_loop_checked() {
    let mut alpha = engine("alpha");
    for i in 0..8 {
        let change = alpha
            .change("draw", stroke(&format!("stroke-{}", i)))
            .with_label("stroke_added");
        commit(&mut alpha, change);
    }

    let mut beta = strict_engine("beta");
    let request = Envelope::sync(beta.vector_clock()).unwrap();
    let responses = alpha.handle_envelope(&request);
    assert_eq!(responses.len(), 1);
    for response in &responses {
        assert!(beta.handle_envelope(response).is_empty());
    }
    settle(&mut beta);

    assert_eq!(beta.surface("draw").unwrap().data.entities.len(), 8);
    assert_eq!(beta.metrics().loop_rejected, 0);
    assert_converged!(alpha, beta, "draw");
}
