//! Running engines replicating through the in-memory transport

use crate::common::*;
use crate::{assert_converged, assert_err, assert_ok};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use xfcanvas::shared::{EngineEvent, EventType, Site, SyncError};
use xfcanvas::sync::Engine;
use xfcanvas::transport::{memory, spawn_client, TransportStatus};

#[tokio::test]
async fn test_two_engines_converge() {
    let (_hub, left, right) = memory::pair();
    let config = config();
    let alpha = engine("alpha").start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let beta = engine("beta").start_with_transport(spawn_client(Arc::new(right), &config.transport));
    let (a, b) = (alpha.handle(), beta.handle());

    for i in 0..3 {
        assert_ok!(a.create("draw", stroke(&format!("a-{}", i))).await);
        assert_ok!(b.create("draw", stroke(&format!("b-{}", i))).await);
    }

    wait_for(&a, "draw", |state| state.data.entities.len() == 6).await;
    wait_for(&b, "draw", |state| state.data.entities.len() == 6).await;

    let alpha = assert_ok!(alpha.stop().await);
    let beta = assert_ok!(beta.stop().await);
    assert_converged!(alpha, beta, "draw");
    assert!(beta.history().entries().all(|entry| entry
        .forward
        .iter()
        .all(|change| change.site == "beta")));
}

#[tokio::test]
async fn test_late_joiner_catches_up_through_sync() {
    let (hub, left, right) = memory::pair();
    let config = config();
    let alpha = engine("alpha").start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let a = alpha.handle();

    for i in 0..4 {
        assert_ok!(a.create("draw", stroke(&format!("stroke-{}", i))).await);
    }
    wait_for(&a, "draw", |state| state.data.entities.len() == 4).await;
    assert_eq!(hub.peer_count(), 1);

    let beta = engine("beta").start_with_transport(spawn_client(Arc::new(right), &config.transport));
    let b = beta.handle();
    let state = wait_for(&b, "draw", |state| state.data.entities.len() == 4).await;
    assert_eq!(state.version, 4);

    let alpha = assert_ok!(alpha.stop().await);
    let beta = assert_ok!(beta.stop().await);
    assert_converged!(alpha, beta, "draw");
}

#[tokio::test]
async fn test_undo_replicates() {
    let (_hub, left, right) = memory::pair();
    let config = config();
    let alpha = engine("alpha").start_with_transport(spawn_client(Arc::new(left), &config.transport));
    let beta = engine("beta").start_with_transport(spawn_client(Arc::new(right), &config.transport));
    let (a, b) = (alpha.handle(), beta.handle());

    assert_ok!(a.create("draw", stroke("stroke-1")).await);
    wait_for(&b, "draw", |state| state.entity("stroke-1").is_some()).await;

    assert!(assert_ok!(a.undo().await));
    wait_for(&b, "draw", |state| state.entity("stroke-1").is_none()).await;

    assert_ok!(alpha.stop().await);
    assert_ok!(beta.stop().await);
}

#[tokio::test]
async fn test_transport_status_published() {
    let (_hub, left, _right) = memory::pair();
    let engine = Engine::with_site(config(), Site::new("alpha")).unwrap();
    let transport = spawn_client(Arc::new(left), &engine.config().transport);
    let mut events = engine.subscribe().only([EventType::Transport]);
    let running = engine.start_with_transport(transport);

    let connected = timeout(Duration::from_secs(1), async {
        loop {
            match events.recv().await {
                Some(EngineEvent::Transport {
                    status: TransportStatus::Connected,
                }) => return,
                Some(_) => continue,
                None => panic!("event bus closed"),
            }
        }
    })
    .await;
    assert!(connected.is_ok());

    let metrics = assert_ok!(running.handle().metrics().await);
    assert_eq!(metrics.transport_status, TransportStatus::Connected);
    assert_ok!(running.stop().await);
}

#[test]
fn test_handle_fails_after_stop() {
    tokio_test::block_on(async {
        let running = engine("alpha").start();
        let handle = running.handle();
        assert_ok!(handle.create("draw", stroke("stroke-1")).await);

        assert_ok!(running.stop().await);
        assert!(!handle.is_running());
        assert_err!(handle.metrics().await, SyncError::EngineStopped);
    });
}
