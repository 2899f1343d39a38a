//! Recurring capture scheduler
//!
//! Each recurring job repeatedly submits a capture to the admission queue
//! at a fixed interval, writes results to its own directory, and keeps only
//! the most recent N files. Jobs are resilient to transient failures: a
//! failed cycle is logged and retried after a short fixed backoff, forever.
//! Stop signals are cooperative and observed at cycle boundaries; an
//! in-progress capture always completes. Stopped jobs stay queryable in the
//! registry until process exit.

use crate::queue::{CaptureQueue, CaptureTask};
use crate::store::ResultStore;
use crate::{CaptureTarget, Error, Result, ServiceConfig, Viewport};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration for one recurring job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Unique job id; duplicate starts are rejected
    pub id: String,
    /// Page to capture each cycle
    pub url: String,
    /// Delay between successful cycles, in milliseconds
    pub interval_ms: u64,
    /// Directory results are written to (created if missing)
    pub output_dir: PathBuf,
    /// Viewport override; service default when `None`
    pub viewport: Option<Viewport>,
    /// Capture only this element
    pub selector: Option<String>,
    /// Capture the full page height
    pub full_page: bool,
    /// Extra settle time after navigation, in milliseconds
    pub wait_for_ms: Option<u64>,
    /// Keep at most this many result files on disk
    pub max_retained: Option<usize>,
}

impl JobConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            interval_ms: 5_000,
            output_dir: output_dir.into(),
            viewport: None,
            selector: None,
            full_page: false,
            wait_for_ms: None,
            max_retained: None,
        }
    }
}

/// Fields a restart may override. `None` keeps the prior value; the url and
/// output directory are immutable across restarts.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub interval_ms: Option<u64>,
    pub viewport: Option<Viewport>,
    pub selector: Option<String>,
    pub full_page: Option<bool>,
    pub wait_for_ms: Option<u64>,
    pub max_retained: Option<usize>,
}

/// Read-only view of one registry entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub url: String,
    pub interval_ms: u64,
    pub output_dir: PathBuf,
    pub is_running: bool,
    pub last_result_path: Option<PathBuf>,
    pub result_count: u64,
    pub started_at: String,
}

struct JobProgress {
    running: bool,
    last_result_path: Option<PathBuf>,
    result_count: u64,
}

/// One registry entry. A restart installs a fresh entry under the same id;
/// the superseded loop keeps its own detached `Arc` and cannot clobber the
/// replacement when it finally observes its stop flag.
struct JobEntry {
    config: JobConfig,
    started_at: DateTime<Utc>,
    stop: AtomicBool,
    progress: Mutex<JobProgress>,
}

impl JobEntry {
    fn new(config: JobConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            started_at: Utc::now(),
            stop: AtomicBool::new(false),
            progress: Mutex::new(JobProgress {
                running: true,
                last_result_path: None,
                result_count: 0,
            }),
        })
    }

    fn snapshot(&self) -> JobSnapshot {
        let progress = self.progress.lock().unwrap();
        JobSnapshot {
            id: self.config.id.clone(),
            url: self.config.url.clone(),
            interval_ms: self.config.interval_ms,
            output_dir: self.config.output_dir.clone(),
            is_running: progress.running,
            last_result_path: progress.last_result_path.clone(),
            result_count: progress.result_count,
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

struct SchedulerInner {
    queue: CaptureQueue,
    store: Arc<dyn ResultStore>,
    jobs: Mutex<HashMap<String, Arc<JobEntry>>>,
    retry_backoff: Duration,
    default_viewport: Viewport,
    timeout_ms: u64,
    navigation_timeout_ms: u64,
}

/// Registry and control plane for recurring capture jobs.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(queue: CaptureQueue, store: Arc<dyn ResultStore>, config: &ServiceConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                queue,
                store,
                jobs: Mutex::new(HashMap::new()),
                retry_backoff: Duration::from_millis(config.retry_backoff_ms),
                default_viewport: config.viewport,
                timeout_ms: config.timeout_ms,
                navigation_timeout_ms: config.navigation_timeout_ms,
            }),
        }
    }

    /// Register a job and launch its capture loop.
    ///
    /// Returns as soon as the loop has been scheduled, not after the first
    /// capture. Fails with [`Error::DuplicateJob`] if the id is taken (the
    /// existing job is untouched) and with [`Error::Persistence`] if the
    /// output directory cannot be created.
    pub fn start(&self, config: JobConfig) -> Result<String> {
        let id = config.id.clone();

        let entry = {
            let mut jobs = self.inner.jobs.lock().unwrap();
            if jobs.contains_key(&id) {
                return Err(Error::DuplicateJob(id));
            }
            // Only after the id is known to be free; a rejected duplicate
            // must not touch the filesystem.
            self.inner.store.ensure_dir(&config.output_dir)?;
            let entry = JobEntry::new(config);
            jobs.insert(id.clone(), Arc::clone(&entry));
            entry
        };

        info!("[{}] recurring capture started: {}", id, entry.config.url);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            SchedulerInner::run_loop(inner, entry).await;
        });
        Ok(id)
    }

    /// Request a cooperative stop. The current cycle finishes; the loop
    /// halts at its next boundary. Returns false for unknown ids.
    pub fn stop(&self, id: &str) -> bool {
        let jobs = self.inner.jobs.lock().unwrap();
        match jobs.get(id) {
            Some(entry) => {
                entry.stop.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Stop the existing loop and start a fresh one under the same id,
    /// merging `overrides` over the prior configuration. The url and
    /// output directory always carry over.
    pub fn restart(&self, id: &str, overrides: JobOverrides) -> Result<()> {
        let entry = {
            let mut jobs = self.inner.jobs.lock().unwrap();
            let old = jobs
                .get(id)
                .ok_or_else(|| Error::JobNotFound(id.to_string()))?;
            old.stop.store(true, Ordering::SeqCst);

            let prior = old.config.clone();
            let merged = JobConfig {
                id: prior.id,
                url: prior.url,
                output_dir: prior.output_dir,
                interval_ms: overrides.interval_ms.unwrap_or(prior.interval_ms),
                viewport: overrides.viewport.or(prior.viewport),
                selector: overrides.selector.or(prior.selector),
                full_page: overrides.full_page.unwrap_or(prior.full_page),
                wait_for_ms: overrides.wait_for_ms.or(prior.wait_for_ms),
                max_retained: overrides.max_retained.or(prior.max_retained),
            };
            let entry = JobEntry::new(merged);
            jobs.insert(id.to_string(), Arc::clone(&entry));
            entry
        };

        info!("[{}] recurring capture restarted", id);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            SchedulerInner::run_loop(inner, entry).await;
        });
        Ok(())
    }

    /// Snapshot of one job, if it exists (running or stopped).
    pub fn status(&self, id: &str) -> Option<JobSnapshot> {
        let jobs = self.inner.jobs.lock().unwrap();
        jobs.get(id).map(|entry| entry.snapshot())
    }

    /// Snapshots of every registry entry, stopped jobs included.
    pub fn statuses(&self) -> Vec<JobSnapshot> {
        let jobs = self.inner.jobs.lock().unwrap();
        jobs.values().map(|entry| entry.snapshot()).collect()
    }
}

impl SchedulerInner {
    async fn run_loop(inner: Arc<SchedulerInner>, entry: Arc<JobEntry>) {
        let id = entry.config.id.clone();
        let interval = Duration::from_millis(entry.config.interval_ms);

        loop {
            if entry.stop.load(Ordering::SeqCst) {
                break;
            }
            match SchedulerInner::run_cycle(&inner, &entry).await {
                Ok(path) => {
                    info!("[{}] capture written to {}", id, path.display());
                    tokio::time::sleep(interval).await;
                }
                Err(e) => {
                    // Recurring jobs survive transient failures: log and
                    // retry after a fixed backoff, without giving up.
                    error!("[{}] capture cycle failed: {}", id, e);
                    tokio::time::sleep(inner.retry_backoff).await;
                }
            }
        }

        entry.progress.lock().unwrap().running = false;
        info!("[{}] recurring capture stopped", id);
    }

    async fn run_cycle(inner: &Arc<SchedulerInner>, entry: &Arc<JobEntry>) -> Result<PathBuf> {
        let config = &entry.config;
        let target = CaptureTarget {
            url: config.url.clone(),
            viewport: config.viewport.unwrap_or(inner.default_viewport),
            timeout_ms: inner.timeout_ms,
            navigation_timeout_ms: inner.navigation_timeout_ms,
            selector: config.selector.clone(),
            full_page: config.full_page,
            wait_for_ms: config.wait_for_ms,
        };

        let bytes = inner.queue.submit(CaptureTask::page(target)).await?;

        let filename = format!(
            "capture_{}_{}.png",
            config.id,
            Utc::now().timestamp_millis()
        );
        let path = config.output_dir.join(&filename);
        inner.store.write(&path, &bytes)?;

        {
            let mut progress = entry.progress.lock().unwrap();
            progress.last_result_path = Some(path.clone());
            progress.result_count += 1;
        }

        if let Some(keep) = config.max_retained {
            let prefix = format!("capture_{}_", config.id);
            if let Err(e) = prune(inner.store.as_ref(), &config.output_dir, &prefix, keep) {
                warn!("[{}] pruning old captures failed: {}", config.id, e);
            }
        }

        Ok(path)
    }
}

/// Delete the oldest result files until at most `keep` remain. Filenames
/// embed a millisecond timestamp, so lexicographic order is chronological.
fn prune(store: &dyn ResultStore, dir: &Path, prefix: &str, keep: usize) -> Result<()> {
    let mut files: Vec<String> = store
        .list(dir)?
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .collect();
    files.sort();

    if files.len() > keep {
        let excess = files.len() - keep;
        for name in &files[..excess] {
            store.remove(&dir.join(name))?;
        }
    }
    Ok(())
}
