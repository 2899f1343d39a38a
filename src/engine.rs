//! Engine lifecycle management
//!
//! Owns zero-or-one live rendering engine. The engine is launched lazily by
//! the first capture that needs it and shut down again by the idle monitor
//! (see [`crate::queue::CaptureQueue::start_idle_monitor`]) once nothing has
//! used it for a while. Launching is a critical section: concurrent
//! acquires observe a single launch.

use crate::{CaptureTarget, Error, Result};
use chrono::{SecondsFormat, Utc};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// A live rendering engine instance.
///
/// Implementations must be callable from multiple capture tasks at once;
/// each capture runs on a blocking worker thread.
pub trait EngineDriver: Send + Sync {
    /// Navigate to the target and produce a PNG screenshot.
    fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>>;

    /// Release engine resources ahead of drop. Called by the idle monitor
    /// before the handle lets go of the instance.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Starts a new engine instance. Launching is expensive and fallible
/// (an external process is spawned); failures surface as
/// [`Error::EngineStart`].
pub trait EngineLauncher: Send + Sync {
    fn launch(&self) -> Result<Arc<dyn EngineDriver>>;
}

/// A reference to the currently live engine, handed out by
/// [`EngineHandle::acquire`]. Cloning is cheap; the underlying instance is
/// shared.
#[derive(Clone)]
pub struct EngineRef {
    driver: Arc<dyn EngineDriver>,
}

impl EngineRef {
    /// Run a capture on a blocking worker thread and await the result.
    pub async fn capture(&self, target: CaptureTarget) -> Result<Vec<u8>> {
        let driver = Arc::clone(&self.driver);
        tokio::task::spawn_blocking(move || driver.capture(&target))
            .await
            .map_err(|e| Error::Capture(format!("capture worker panicked: {}", e)))?
    }
}

/// Owns the optional live engine and its last-activity timestamp.
///
/// Invariant: `is_active()` is true iff an instance is held. Only
/// `acquire` and `shutdown` mutate the slot, and both serialize on the
/// same async mutex.
pub struct EngineHandle {
    launcher: Arc<dyn EngineLauncher>,
    slot: Mutex<Option<Arc<dyn EngineDriver>>>,
    active: AtomicBool,
    last_activity_ms: AtomicI64,
}

impl EngineHandle {
    pub fn new(launcher: Arc<dyn EngineLauncher>) -> Self {
        Self {
            launcher,
            slot: Mutex::new(None),
            active: AtomicBool::new(false),
            last_activity_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    /// Return the live engine, launching one if none exists.
    ///
    /// Refreshes the last-activity timestamp. A failed launch leaves the
    /// handle empty so the next acquire retries.
    pub async fn acquire(&self) -> Result<EngineRef> {
        let mut slot = self.slot.lock().await;
        if let Some(driver) = slot.as_ref() {
            let driver = Arc::clone(driver);
            self.touch();
            return Ok(EngineRef { driver });
        }

        info!("launching rendering engine");
        let launcher = Arc::clone(&self.launcher);
        let driver = tokio::task::spawn_blocking(move || launcher.launch())
            .await
            .map_err(|e| Error::EngineStart(format!("launch task failed: {}", e)))??;

        *slot = Some(Arc::clone(&driver));
        self.active.store(true, Ordering::SeqCst);
        self.touch();
        Ok(EngineRef { driver })
    }

    /// Shut down the live engine, if any, and clear the handle.
    pub async fn shutdown(&self) {
        self.shutdown_if(|| true).await;
    }

    /// Shut down the live engine only if `should_close` still holds once
    /// the slot lock is taken. The predicate runs under the same lock that
    /// `acquire` serializes on, so an acquire racing the caller's idle
    /// check either wins the lock first (the predicate then sees the fresh
    /// activity) or waits and finds the slot empty, relaunching. Returns
    /// whether the engine was closed.
    pub async fn shutdown_if(&self, should_close: impl Fn() -> bool) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.is_none() || !should_close() {
            return false;
        }
        if let Some(driver) = slot.take() {
            self.active.store(false, Ordering::SeqCst);
            if let Err(e) = driver.close() {
                warn!("engine close reported an error: {}", e);
            }
        }
        true
    }

    /// Refresh the last-activity timestamp.
    pub fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Time since the last acquire or capture completion.
    pub fn idle_for(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::SeqCst);
        let elapsed = Utc::now().timestamp_millis().saturating_sub(last);
        Duration::from_millis(elapsed.max(0) as u64)
    }

    /// Last-activity timestamp as an ISO-8601 string.
    pub fn last_activity_iso(&self) -> String {
        let ms = self.last_activity_ms.load(Ordering::SeqCst);
        chrono::DateTime::from_timestamp_millis(ms)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
