//! Combined status reporting
//!
//! Pure aggregation over the queue snapshot and the job registry; no state
//! of its own. The route layer serializes this straight to JSON.

use crate::queue::{CaptureQueue, QueueStatus};
use crate::scheduler::{JobSnapshot, Scheduler};
use serde::Serialize;

/// Everything an external reporter needs in one snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub queue: QueueStatus,
    pub jobs: Vec<JobSnapshot>,
}

pub fn service_status(queue: &CaptureQueue, scheduler: &Scheduler) -> ServiceStatus {
    ServiceStatus {
        queue: queue.status(),
        jobs: scheduler.statuses(),
    }
}
