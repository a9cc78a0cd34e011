//! Engine and change fixtures

use std::time::Duration;
use xfcanvas::ot::OtOp;
use xfcanvas::shared::{Change, EngineConfig, Fields, Origin, Payload, Point, Site, Value};
use xfcanvas::sync::{Engine, EngineHandle, SurfaceState};

/// Linear context shared by the text fixtures
pub const DOC: &str = "text:doc";

/// Default config with a loop threshold high enough for bulk edits
pub fn config() -> EngineConfig {
    EngineConfig::builder()
        .loop_threshold(1_000)
        .build()
        .unwrap()
}

pub fn engine(site: &str) -> Engine {
    Engine::with_site(config(), Site::new(site)).unwrap()
}

/// Engine with the default loop threshold
pub fn strict_engine(site: &str) -> Engine {
    Engine::with_site(EngineConfig::default(), Site::new(site)).unwrap()
}

pub fn stroke(id: &str) -> Payload {
    Payload::Insert {
        target: id.to_string(),
        value: Value::map([
            ("position", Value::Point(Point::new(0.0, 0.0))),
            ("width", Value::Number(1.0)),
        ]),
    }
}

pub fn modify(target: &str, fields: Fields) -> Payload {
    Payload::Modify {
        target: target.to_string(),
        fields,
        prior: None,
    }
}

fn text_payload() -> Payload {
    modify(DOC, Fields::from([("edited".to_string(), Value::Bool(true))]))
}

pub fn insert_text(engine: &mut Engine, surface: &str, offset: usize, text: &str) -> Change {
    engine
        .change(surface, text_payload())
        .with_ot(OtOp::insert_text(DOC, offset, text))
}

pub fn delete_text(engine: &mut Engine, surface: &str, offset: usize, length: usize) -> Change {
    engine
        .change(surface, text_payload())
        .with_ot(OtOp::delete_text(DOC, offset, length))
}

/// A change from another replica, as it arrives over the transport
pub fn remote_text(site: &str, time: u64, op: OtOp) -> Change {
    Change::new("code", time, text_payload())
        .with_ot(op)
        .with_site(site)
        .with_origin(Origin::Remote)
}

/// Tick until the queue is empty; returns the tick count
pub fn settle(engine: &mut Engine) -> usize {
    let mut ticks = 0;
    loop {
        engine.tick();
        ticks += 1;
        if engine.queue_len() == 0 || ticks > 1_000 {
            return ticks;
        }
    }
}

/// Deliver each engine's outbound envelopes to the other, replies
/// included, until both are quiet; settles both engines between rounds
pub fn exchange(left: &mut Engine, right: &mut Engine) {
    for _ in 0..16 {
        let to_right = left.take_outbound();
        let to_left = right.take_outbound();
        if to_right.is_empty() && to_left.is_empty() {
            return;
        }
        for envelope in &to_right {
            for reply in right.handle_envelope(envelope) {
                right.queue_envelope(reply);
            }
        }
        for envelope in &to_left {
            for reply in left.handle_envelope(envelope) {
                left.queue_envelope(reply);
            }
        }
        settle(left);
        settle(right);
    }
}

/// Submit a change and tick until it is applied
pub fn commit(engine: &mut Engine, change: Change) {
    engine.submit(change).unwrap();
    settle(engine);
}

/// Submit a text insert at offset 0 and apply it
pub fn seed_document(engine: &mut Engine, text: &str) {
    let change = insert_text(engine, "code", 0, text);
    engine.submit(change).unwrap();
    settle(engine);
}

/// Poll a running engine until `predicate` holds on `surface`
pub async fn wait_for<F>(handle: &EngineHandle, surface: &str, predicate: F) -> SurfaceState
where
    F: Fn(&SurfaceState) -> bool,
{
    let poll = async {
        loop {
            if let Ok(Some(state)) = handle.surface(surface).await {
                if predicate(&state) {
                    return state;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .unwrap_or_else(|_| panic!("surface '{}' never reached the expected state", surface))
}
