//! Engine lifecycle: single launch under contention, idle shutdown and
//! relaunch.

mod common;

use common::FakeLauncher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use webshot::engine::EngineHandle;
use webshot::{CaptureQueue, CaptureTarget, CaptureTask, ServiceConfig};

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_acquires_launch_exactly_one_engine() {
    let launcher = FakeLauncher::new();
    let stats = Arc::clone(&launcher.stats);
    let handle = Arc::new(EngineHandle::new(Arc::new(launcher)));

    let mut joins = Vec::new();
    for _ in 0..8 {
        let handle = Arc::clone(&handle);
        joins.push(tokio::spawn(async move { handle.acquire().await }));
    }
    for join in joins {
        assert!(join.await.unwrap().is_ok());
    }

    assert_eq!(stats.launches.load(Ordering::SeqCst), 1);
    assert!(handle.is_active());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_captures_share_one_engine() {
    let config = ServiceConfig {
        max_concurrent_jobs: 5,
        ..Default::default()
    };
    let launcher = FakeLauncher::new().with_capture_delay(Duration::from_millis(30));
    let stats = Arc::clone(&launcher.stats);
    let queue = CaptureQueue::new(&config, Arc::new(launcher));

    let submissions: Vec<_> = (0..5)
        .map(|i| queue.submit(CaptureTask::page(CaptureTarget::new(format!("http://page/{}", i)))))
        .collect();
    let results = futures::future::join_all(submissions).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(stats.launches.load(Ordering::SeqCst), 1);
    assert_eq!(stats.captures.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_monitor_shuts_down_and_next_capture_relaunches() {
    let config = ServiceConfig {
        max_concurrent_jobs: 2,
        idle_shutdown_ms: 100,
        monitor_poll_ms: 25,
        ..Default::default()
    };
    let launcher = FakeLauncher::new();
    let stats = Arc::clone(&launcher.stats);
    let queue = CaptureQueue::new(&config, Arc::new(launcher));
    let monitor = queue.start_idle_monitor();

    queue
        .submit(CaptureTask::page(CaptureTarget::new("http://warmup")))
        .await
        .unwrap();
    assert!(queue.status().engine_active);

    // Wait past the idle threshold plus a few monitor polls.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!queue.status().engine_active);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);

    queue
        .submit(CaptureTask::page(CaptureTarget::new("http://again")))
        .await
        .unwrap();
    assert!(queue.status().engine_active);
    assert_eq!(stats.launches.load(Ordering::SeqCst), 2);

    monitor.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_is_skipped_when_locked_recheck_sees_activity() {
    let launcher = FakeLauncher::new();
    let stats = Arc::clone(&launcher.stats);
    let handle = EngineHandle::new(Arc::new(launcher));
    handle.acquire().await.unwrap();

    // An acquire or completion that slips in between an idle check and the
    // shutdown flips the condition; the re-run under the slot lock must
    // then keep the engine.
    assert!(!handle.shutdown_if(|| false).await);
    assert!(handle.is_active());
    assert_eq!(stats.closes.load(Ordering::SeqCst), 0);

    assert!(handle.shutdown_if(|| true).await);
    assert!(!handle.is_active());
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);

    // Nothing left to close.
    assert!(!handle.shutdown_if(|| true).await);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn capture_longer_than_idle_threshold_survives_completion() {
    let config = ServiceConfig {
        max_concurrent_jobs: 1,
        idle_shutdown_ms: 40,
        monitor_poll_ms: 10,
        ..Default::default()
    };
    let launcher = FakeLauncher::new().with_capture_delay(Duration::from_millis(200));
    let stats = Arc::clone(&launcher.stats);
    let queue = CaptureQueue::new(&config, Arc::new(launcher));
    let monitor = queue.start_idle_monitor();

    // The capture outlives the idle threshold several times over. Its
    // completion counts as activity, so the monitor tick landing right
    // after it must not tear the engine down on a stale timestamp.
    queue
        .submit(CaptureTask::page(CaptureTarget::new("http://slow")))
        .await
        .unwrap();
    assert!(queue.status().engine_active);
    assert_eq!(stats.closes.load(Ordering::SeqCst), 0);

    monitor.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn busy_engine_is_not_shut_down() {
    let config = ServiceConfig {
        max_concurrent_jobs: 1,
        idle_shutdown_ms: 50,
        monitor_poll_ms: 20,
        ..Default::default()
    };
    let launcher = FakeLauncher::new().with_capture_delay(Duration::from_millis(300));
    let stats = Arc::clone(&launcher.stats);
    let queue = CaptureQueue::new(&config, Arc::new(launcher));
    let monitor = queue.start_idle_monitor();

    // Long capture keeps in_flight at 1 well past the idle threshold.
    let result = queue
        .submit(CaptureTask::page(CaptureTarget::new("http://slow")))
        .await;
    assert!(result.is_ok());
    assert_eq!(stats.closes.load(Ordering::SeqCst), 0);
    assert_eq!(stats.launches.load(Ordering::SeqCst), 1);

    monitor.abort();
}
