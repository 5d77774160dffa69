//! Admission gate behaviour under concurrent load.

use std::sync::Arc;
use std::time::Duration;

use fleetnode::admission::{ConcurrencyGate, HandlerError, StatusCode};
use fleetnode::health::{HealthPublisher, HealthStatus};

mod common;
use common::{submit, wait_until, RecordingSink};

#[tokio::test]
async fn test_saturated_gate_admits_waiter_when_a_slot_frees() {
    let sink = Arc::new(RecordingSink::default());
    let health = Arc::new(HealthPublisher::with_status(HealthStatus::Unknown));
    health.update_status(HealthStatus::Serving);
    let gate = Arc::new(ConcurrencyGate::new(2, health, sink.clone()));
    let mut samples = gate.subscribe_in_flight();

    let (release_1, r1) = submit(&gate, "r1");
    let (release_2, r2) = submit(&gate, "r2");
    wait_until(Duration::from_secs(1), || gate.in_flight() == 2).await;

    let (release_3, r3) = submit(&gate, "r3");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!r3.is_finished());
    assert_eq!(gate.in_flight(), 2);
    assert_eq!(gate.available_slots(), 0);

    release_1.send(()).unwrap();
    assert_eq!(r1.await.unwrap(), Ok("r1"));
    wait_until(Duration::from_secs(1), || gate.in_flight() == 2).await;

    release_2.send(()).unwrap();
    assert_eq!(r2.await.unwrap(), Ok("r2"));
    release_3.send(()).unwrap();
    assert_eq!(r3.await.unwrap(), Ok("r3"));

    // Each completion is published before its slot frees, so R3's admission
    // follows R1's completion.
    let mut observed = Vec::new();
    while let Ok(count) = samples.try_recv() {
        observed.push(count);
    }
    assert_eq!(observed, vec![1, 2, 1, 2, 1, 0]);
    assert_eq!(sink.in_flight_samples(), vec![0, 1, 2, 1, 2, 1, 0]);
}

#[tokio::test]
async fn test_n_requests_within_capacity_all_succeed() {
    let health = Arc::new(HealthPublisher::with_status(HealthStatus::Serving));
    let gate = Arc::new(ConcurrencyGate::new(8, health, Arc::new(RecordingSink::default())));

    let mut pending = Vec::new();
    for _ in 0..8 {
        pending.push(submit(&gate, "job"));
    }
    wait_until(Duration::from_secs(1), || gate.in_flight() == 8).await;

    for (release, task) in pending {
        release.send(()).unwrap();
        assert_eq!(task.await.unwrap(), Ok("job"));
    }
    assert_eq!(gate.in_flight(), 0);
}

#[tokio::test]
async fn test_health_flip_rejects_new_but_finishes_admitted() {
    let health = Arc::new(HealthPublisher::with_status(HealthStatus::Serving));
    let sink = Arc::new(RecordingSink::default());
    let gate = Arc::new(ConcurrencyGate::new(2, health.clone(), sink.clone()));

    let (release, admitted) = submit(&gate, "admitted");
    wait_until(Duration::from_secs(1), || gate.in_flight() == 1).await;

    health.drain();
    let rejected = gate
        .handle((), |_| async { Ok::<_, HandlerError>(()) }, "late")
        .await
        .unwrap_err();
    assert_eq!(rejected.code(), StatusCode::Unavailable);
    assert_eq!(gate.in_flight(), 1);

    release.send(()).unwrap();
    assert_eq!(admitted.await.unwrap(), Ok("admitted"));

    let drained = tokio::time::timeout(Duration::from_secs(1), gate.drain())
        .await
        .unwrap();
    assert_eq!(drained, 0);
    assert_eq!(
        *sink.requests.lock().unwrap(),
        vec![("invoke".to_string(), true)]
    );
}

#[tokio::test]
async fn test_drain_blocks_while_handler_never_returns() {
    let health = Arc::new(HealthPublisher::with_status(HealthStatus::Serving));
    let gate = Arc::new(ConcurrencyGate::new(3, health, Arc::new(RecordingSink::default())));

    let (_never_released, _stuck) = submit(&gate, "stuck");
    wait_until(Duration::from_secs(1), || gate.in_flight() == 1).await;

    assert!(tokio::time::timeout(Duration::from_millis(100), gate.drain())
        .await
        .is_err());
    assert_eq!(gate.in_flight(), 1);
}
