//! Transport lifecycle and wire format

use crate::assert_ok;
use crate::common::*;
use std::sync::Arc;
use std::time::Duration;
use xfcanvas::shared::{EngineConfig, Site, TransportConfig};
use xfcanvas::sync::{Engine, EngineHandle};
use xfcanvas::transport::{decode_frame, encode_frame, memory, spawn_client, Envelope, TransportStatus};

fn fast_reconnect(max_attempts: Option<u32>) -> EngineConfig {
    EngineConfig::builder()
        .loop_threshold(1_000)
        .transport(TransportConfig {
            reconnect_delay_ms: 20,
            max_reconnect_attempts: max_attempts,
            ..TransportConfig::default()
        })
        .build()
        .unwrap()
}

async fn wait_for_status(handle: &EngineHandle, expected: impl Fn(TransportStatus) -> bool) {
    let poll = async {
        loop {
            if let Ok(metrics) = handle.metrics().await {
                if expected(metrics.transport_status) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("transport never reached the expected status");
}

#[tokio::test]
async fn test_changes_made_offline_arrive_after_reconnect() {
    let (hub, left, right) = memory::pair();
    let config = fast_reconnect(None);
    let alpha = Engine::with_site(config.clone(), Site::new("alpha"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let beta = Engine::with_site(config.clone(), Site::new("beta"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(right), &config.transport));
    let (a, b) = (alpha.handle(), beta.handle());

    assert_ok!(a.create("draw", stroke("online")).await);
    wait_for(&b, "draw", |state| state.entity("online").is_some()).await;

    hub.set_online(false);
    wait_for_status(&a, |status| status != TransportStatus::Connected).await;
    assert_ok!(a.create("draw", stroke("offline")).await);
    wait_for(&a, "draw", |state| state.entity("offline").is_some()).await;

    hub.set_online(true);
    wait_for(&b, "draw", |state| state.entity("offline").is_some()).await;

    assert_ok!(alpha.stop().await);
    assert_ok!(beta.stop().await);
}

#[tokio::test]
async fn test_exhausted_reconnects_fail() {
    let (hub, left, _right) = memory::pair();
    hub.set_online(false);
    let config = fast_reconnect(Some(2));
    let alpha = Engine::with_site(config.clone(), Site::new("alpha"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let a = alpha.handle();

    wait_for_status(&a, |status| status == TransportStatus::Failed).await;

    // The engine keeps working locally
    assert_ok!(a.create("draw", stroke("local")).await);
    wait_for(&a, "draw", |state| state.entity("local").is_some()).await;
    assert_ok!(alpha.stop().await);
}

#[tokio::test]
async fn test_full_transport_channel_does_not_stall_replication() {
    let (_hub, left, right) = memory::pair();
    let config = EngineConfig::builder()
        .loop_threshold(1_000)
        .transport(TransportConfig {
            reconnect_delay_ms: 20,
            outbound_buffer: 1,
            ..TransportConfig::default()
        })
        .build()
        .unwrap();
    let alpha = Engine::with_site(config.clone(), Site::new("alpha"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let beta = Engine::with_site(config.clone(), Site::new("beta"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(right), &config.transport));
    let (a, b) = (alpha.handle(), beta.handle());

    let writes = |handle: EngineHandle, site: &'static str| async move {
        for i in 0..40 {
            assert_ok!(handle.create("draw", stroke(&format!("{}-{}", site, i))).await);
        }
    };
    tokio::join!(writes(a.clone(), "alpha"), writes(b.clone(), "beta"));

    wait_for(&a, "draw", |state| state.data.entities.len() == 80).await;
    wait_for(&b, "draw", |state| state.data.entities.len() == 80).await;

    assert_ok!(alpha.stop().await);
    assert_ok!(beta.stop().await);
}

#[tokio::test]
async fn test_failed_transport_replaced_without_losing_changes() {
    let (hub, left, right) = memory::pair();
    hub.set_online(false);
    let config = fast_reconnect(Some(1));
    let patient = fast_reconnect(None);
    let alpha = Engine::with_site(config.clone(), Site::new("alpha"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(left.clone()), &config.transport));
    let beta = Engine::with_site(patient.clone(), Site::new("beta"))
        .unwrap()
        .start_with_transport(spawn_client(Arc::new(right), &patient.transport));
    let (a, b) = (alpha.handle(), beta.handle());

    assert_ok!(a.create("draw", stroke("early")).await);
    wait_for_status(&a, |status| status == TransportStatus::Failed).await;
    assert_ok!(a.create("draw", stroke("late")).await);

    // A live transport cannot be replaced
    let spare = spawn_client(Arc::new(left.clone()), &patient.transport);
    assert!(b.attach_transport(spare).await.is_err());

    hub.set_online(true);
    let attach = async {
        loop {
            let transport = spawn_client(Arc::new(left.clone()), &config.transport);
            if a.attach_transport(transport).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), attach)
        .await
        .expect("replacement transport never attached");

    wait_for(&b, "draw", |state| {
        state.entity("early").is_some() && state.entity("late").is_some()
    })
    .await;

    assert_ok!(alpha.stop().await);
    assert_ok!(beta.stop().await);
}

#[test]
fn test_envelope_wire_shape() {
    let mut engine = engine("alpha");
    let change = engine.change("draw", stroke("stroke-1"));
    let envelope = Envelope::change(&change).unwrap();

    let frame = encode_frame(&envelope).unwrap();
    assert!(frame.ends_with('\n'));
    let json: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
    assert_eq!(json["type"], "change");
    assert_eq!(json["data"]["source_surface"], "draw");

    assert_eq!(decode_frame(&frame).unwrap(), envelope);
}

#[test]
fn test_unknown_envelope_ignored() {
    let mut engine = engine("alpha");
    let envelope = decode_frame(r#"{"type":"presence","data":{"cursor":3}}"#).unwrap();

    let replies = engine.handle_envelope(&envelope);
    assert!(replies.is_empty());
    assert_eq!(engine.queue_len(), 0);
}

#[test]
fn test_heartbeat_ignored() {
    let mut engine = engine("alpha");
    assert!(engine.handle_envelope(&Envelope::heartbeat()).is_empty());
    assert_eq!(engine.queue_len(), 0);
}
