//! Bounded-concurrency admission queue
//!
//! Capture tasks are admitted in FIFO order whenever a concurrency slot is
//! free; completion order is not guaranteed. A task's failure resolves only
//! its own future and never tears down the queue or the engine. The queue
//! exclusively owns the [`EngineHandle`]; nothing else launches or shuts
//! down the engine.

use crate::engine::{EngineHandle, EngineLauncher, EngineRef};
use crate::{Error, Result, ServiceConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

type TaskFn = Box<dyn FnOnce(EngineRef) -> BoxFuture<'static, Result<Vec<u8>>> + Send>;

/// A single unit of capture work.
///
/// Runs exactly once; the queue owns it until it is dispatched. The body
/// receives the live engine and produces the image bytes.
pub struct CaptureTask {
    run: TaskFn,
    deadline: Option<Duration>,
}

impl CaptureTask {
    /// Build a task from an arbitrary async body.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(EngineRef) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
    {
        Self {
            run: Box::new(move |engine| f(engine).boxed()),
            deadline: None,
        }
    }

    /// The standard task: navigate to the target and screenshot it.
    pub fn page(target: crate::CaptureTarget) -> Self {
        Self::from_fn(move |engine| async move { engine.capture(target).await })
    }

    /// Abandon the task after `deadline`; expiry is a failure for this task
    /// only and does not touch the shared engine.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

struct Admitted {
    id: u64,
    task: CaptureTask,
    tx: oneshot::Sender<Result<Vec<u8>>>,
}

struct QueueState {
    pending: VecDeque<Admitted>,
    in_flight: usize,
}

struct QueueInner {
    state: Mutex<QueueState>,
    limit: usize,
    idle_shutdown: Duration,
    monitor_poll: Duration,
    engine: EngineHandle,
    next_id: AtomicU64,
}

/// Queue status snapshot, serialized with camelCase wire names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub queue_length: usize,
    pub in_flight: usize,
    pub limit: usize,
    pub engine_active: bool,
    pub last_activity_at: String,
}

/// Bounded-concurrency dispatcher for capture tasks.
///
/// Cheap to clone; all clones share the same queue and engine handle.
#[derive(Clone)]
pub struct CaptureQueue {
    inner: Arc<QueueInner>,
}

impl CaptureQueue {
    pub fn new(config: &ServiceConfig, launcher: Arc<dyn EngineLauncher>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    in_flight: 0,
                }),
                limit: config.max_concurrent_jobs,
                idle_shutdown: Duration::from_millis(config.idle_shutdown_ms),
                monitor_poll: Duration::from_millis(config.monitor_poll_ms),
                engine: EngineHandle::new(launcher),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Enqueue a task; the returned future resolves with the capture result
    /// once a slot frees up and the task has run.
    pub fn submit(&self, task: CaptureTask) -> impl Future<Output = Result<Vec<u8>>> + Send {
        let (tx, rx) = oneshot::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.inner.state.lock().unwrap();
            state.pending.push_back(Admitted { id, task, tx });
        }
        debug!("task {} queued", id);
        QueueInner::dispatch(&self.inner);
        async move { rx.await.map_err(|_| Error::Closed)? }
    }

    /// Lock-brief snapshot of queue and engine state.
    pub fn status(&self) -> QueueStatus {
        let (queue_length, in_flight) = {
            let state = self.inner.state.lock().unwrap();
            (state.pending.len(), state.in_flight)
        };
        QueueStatus {
            queue_length,
            in_flight,
            limit: self.inner.limit,
            engine_active: self.inner.engine.is_active(),
            last_activity_at: self.inner.engine.last_activity_iso(),
        }
    }

    /// Spawn the periodic idle check: when the engine is live, nothing is
    /// in flight, and the idle threshold has passed, the engine is shut
    /// down. The next capture relaunches it.
    pub fn start_idle_monitor(&self) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(inner.monitor_poll);
            // The first tick fires immediately; skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                let in_flight = inner.state.lock().unwrap().in_flight;
                if inner.engine.is_active()
                    && in_flight == 0
                    && inner.engine.idle_for() >= inner.idle_shutdown
                {
                    // The idle condition is re-evaluated under the slot
                    // lock: a task admitted or completed between the poll
                    // above and the lock keeps its engine.
                    let closed = inner
                        .engine
                        .shutdown_if(|| {
                            inner.state.lock().unwrap().in_flight == 0
                                && inner.engine.idle_for() >= inner.idle_shutdown
                        })
                        .await;
                    if closed {
                        info!(
                            "engine idle for at least {:?}, shut down to save resources",
                            inner.idle_shutdown
                        );
                    }
                }
            }
        })
    }
}

impl QueueInner {
    /// Admit pending tasks while slots are free. Safe to call from any
    /// context that holds an `Arc<QueueInner>`; completions re-invoke it so
    /// a freed slot is reused without delay.
    fn dispatch(inner: &Arc<QueueInner>) {
        loop {
            let admitted = {
                let mut state = inner.state.lock().unwrap();
                if state.in_flight >= inner.limit {
                    return;
                }
                match state.pending.pop_front() {
                    Some(admitted) => {
                        state.in_flight += 1;
                        admitted
                    }
                    None => return,
                }
            };
            debug!("task {} admitted", admitted.id);
            let inner = Arc::clone(inner);
            tokio::spawn(async move {
                QueueInner::run_admitted(inner, admitted).await;
            });
        }
    }

    async fn run_admitted(inner: Arc<QueueInner>, admitted: Admitted) {
        let Admitted { id, task, tx } = admitted;
        let result = QueueInner::run_capture(&inner, task).await;
        if let Err(e) = &result {
            warn!("task {} failed: {}", id, e);
        }
        // Caller may have stopped waiting; that is not an error here.
        let _ = tx.send(result);

        // Completion counts as activity. Refresh before freeing the slot
        // so a capture longer than the idle threshold is never observed
        // as `in_flight == 0` with a stale timestamp.
        inner.engine.touch();
        {
            let mut state = inner.state.lock().unwrap();
            state.in_flight -= 1;
        }
        QueueInner::dispatch(&inner);
    }

    async fn run_capture(inner: &Arc<QueueInner>, task: CaptureTask) -> Result<Vec<u8>> {
        let engine = inner.engine.acquire().await?;
        let fut = (task.run)(engine);
        match task.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| Error::CaptureTimeout(deadline.as_millis() as u64))?,
            None => fut.await,
        }
    }
}
