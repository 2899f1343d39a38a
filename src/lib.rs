//! Webshot capture service core
//!
//! On-demand and recurring capture of rendered pages (screenshots), driven
//! by a headless rendering engine behind a bounded-concurrency admission
//! queue and a managed engine lifecycle.
//!
//! # Features
//!
//! - **Admission queue**: at most N captures run concurrently, FIFO
//!   admission among waiting tasks
//! - **Engine lifecycle**: the engine process is launched lazily on first
//!   use and shut down again after a period of inactivity
//! - **Recurring jobs**: named interval-driven captures persisted to disk
//!   with bounded retention
//! - **CDP Backend** (default): drives headless Chrome via the Chrome
//!   DevTools Protocol
//!
//! # Example
//!
//! ```no_run
//! use webshot::{CaptureTarget, CaptureTask, Service, ServiceConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> webshot::Result<()> {
//! let service = Service::with_cdp(ServiceConfig::default());
//!
//! let target = CaptureTarget::new("https://example.com");
//! let png = service.queue.submit(CaptureTask::page(target)).await?;
//! std::fs::write("example.png", &png)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub mod error;
pub use error::{Error, Result};

pub mod engine;
pub mod queue;
pub mod scheduler;
pub mod status;
pub mod store;

// CDP backend (feature-gated)
#[cfg(feature = "cdp")]
pub mod cdp;

pub use engine::{EngineDriver, EngineLauncher, EngineRef};
pub use queue::{CaptureQueue, CaptureTask, QueueStatus};
pub use scheduler::{JobConfig, JobOverrides, JobSnapshot, Scheduler};
pub use status::ServiceStatus;
pub use store::{DiskStore, ResultStore};

/// Configuration for the capture service
///
/// One explicit struct passed into the queue, engine handle, and scheduler
/// constructors; there is no ambient global configuration. The defaults
/// are conservative: five concurrent captures, a five minute idle shutdown
/// checked once a minute, and a 1920x1080 viewport.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum number of captures running concurrently
    pub max_concurrent_jobs: usize,
    /// Shut the engine down after this much idle time (milliseconds)
    pub idle_shutdown_ms: u64,
    /// How often the idle monitor checks the engine (milliseconds)
    pub monitor_poll_ms: u64,
    /// Default viewport for captures that do not specify one
    pub viewport: Viewport,
    /// Default per-operation timeout (milliseconds)
    pub timeout_ms: u64,
    /// Default page navigation timeout (milliseconds)
    pub navigation_timeout_ms: u64,
    /// Delay before a failed recurring cycle is retried (milliseconds)
    pub retry_backoff_ms: u64,
    /// User agent string the engine sends with requests
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            idle_shutdown_ms: 300_000,
            monitor_poll_ms: 60_000,
            viewport: Viewport::default(),
            timeout_ms: 30_000,
            navigation_timeout_ms: 60_000,
            retry_backoff_ms: 5_000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// What to capture and how
///
/// `CaptureTarget::new` fills in the service defaults; override individual
/// fields before building a [`CaptureTask`] from it.
#[derive(Debug, Clone)]
pub struct CaptureTarget {
    /// Page URL to navigate to
    pub url: String,
    /// Viewport dimensions for this capture
    pub viewport: Viewport,
    /// Per-operation timeout in milliseconds (selector waits, rendering)
    pub timeout_ms: u64,
    /// Navigation timeout in milliseconds
    pub navigation_timeout_ms: u64,
    /// Capture only this element instead of the viewport
    pub selector: Option<String>,
    /// Capture the full page height instead of the viewport
    pub full_page: bool,
    /// Extra settle time after navigation, in milliseconds
    pub wait_for_ms: Option<u64>,
}

impl CaptureTarget {
    /// Create a target for `url` with the default viewport and timeouts
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            viewport: Viewport::default(),
            timeout_ms: 30_000,
            navigation_timeout_ms: 60_000,
            selector: None,
            full_page: false,
            wait_for_ms: None,
        }
    }
}

/// The assembled capture service: admission queue plus recurring scheduler
///
/// Must be created inside a Tokio runtime; construction spawns the engine
/// idle monitor.
pub struct Service {
    /// Concurrency-gated capture queue (owns the engine handle)
    pub queue: CaptureQueue,
    /// Recurring capture scheduler
    pub scheduler: Scheduler,
}

impl Service {
    /// Assemble a service from an engine launcher and a result store
    pub fn new(
        config: ServiceConfig,
        launcher: Arc<dyn EngineLauncher>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let queue = CaptureQueue::new(&config, launcher);
        // Detach the monitor; it lives as long as the runtime.
        let _ = queue.start_idle_monitor();
        let scheduler = Scheduler::new(queue.clone(), store, &config);
        Self { queue, scheduler }
    }

    /// Assemble a service backed by headless Chrome and on-disk persistence
    #[cfg(feature = "cdp")]
    pub fn with_cdp(config: ServiceConfig) -> Self {
        let launcher = Arc::new(cdp::CdpLauncher::new(&config));
        Self::new(config, launcher, Arc::new(DiskStore))
    }

    /// Combined snapshot of queue state and all recurring jobs
    pub fn status(&self) -> ServiceStatus {
        status::service_status(&self.queue, &self.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_concurrent_jobs, 5);
        assert_eq!(config.idle_shutdown_ms, 300_000);
        assert_eq!(config.monitor_poll_ms, 60_000);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.navigation_timeout_ms, 60_000);
    }

    #[test]
    fn test_default_viewport() {
        let viewport = Viewport::default();
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, 1080);
    }

    #[test]
    fn test_capture_target_defaults() {
        let target = CaptureTarget::new("https://example.com");
        assert_eq!(target.url, "https://example.com");
        assert_eq!(target.viewport, Viewport::default());
        assert!(target.selector.is_none());
        assert!(!target.full_page);
    }
}
