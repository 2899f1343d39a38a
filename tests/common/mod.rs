//! Scripted fake engine shared by the integration tests (no Chrome needed).

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use webshot::{CaptureTarget, EngineDriver, EngineLauncher, Error, Result};

/// Counters shared between a launcher, its drivers, and the test body.
#[derive(Default)]
pub struct EngineStats {
    /// Successful launches
    pub launches: AtomicUsize,
    /// Driver close calls
    pub closes: AtomicUsize,
    /// Captures currently executing
    pub active: AtomicUsize,
    /// High-water mark of concurrently executing captures
    pub max_active: AtomicUsize,
    /// Total captures attempted
    pub captures: AtomicUsize,
}

pub struct FakeLauncher {
    pub stats: Arc<EngineStats>,
    capture_delay: Duration,
    fail_launches: AtomicUsize,
    fail_captures: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(EngineStats::default()),
            capture_delay: Duration::ZERO,
            fail_launches: AtomicUsize::new(0),
            fail_captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every capture blocks for this long before returning.
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// The next `n` launch attempts fail with `EngineStart`.
    pub fn fail_next_launches(self, n: usize) -> Self {
        self.fail_launches.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` captures fail with `Capture`.
    pub fn fail_next_captures(self, n: usize) -> Self {
        self.fail_captures.store(n, Ordering::SeqCst);
        self
    }
}

impl EngineLauncher for FakeLauncher {
    fn launch(&self) -> Result<Arc<dyn EngineDriver>> {
        let remaining = self.fail_launches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_launches.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::EngineStart("scripted launch failure".to_string()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeDriver {
            stats: Arc::clone(&self.stats),
            capture_delay: self.capture_delay,
            fail_captures: Arc::clone(&self.fail_captures),
        }))
    }
}

pub struct FakeDriver {
    stats: Arc<EngineStats>,
    capture_delay: Duration,
    fail_captures: Arc<AtomicUsize>,
}

impl EngineDriver for FakeDriver {
    fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> {
        let now = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.capture_delay.is_zero() {
            std::thread::sleep(self.capture_delay);
        }
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
        self.stats.captures.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_captures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_captures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Capture("scripted capture failure".to_string()));
        }
        Ok(format!("png:{}", target.url).into_bytes())
    }

    fn close(&self) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
