//! Job lifecycle events, fanned out over a broadcast channel.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::jobs::error_codes::ErrorCode;
use crate::jobs::model::{JobId, JobOutput, LaneKind, Priority};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    JobAdded {
        lane: LaneKind,
        job_id: JobId,
        priority: Priority,
    },
    JobStarted {
        lane: LaneKind,
        job_id: JobId,
        attempt: u32,
    },
    JobProgress {
        lane: LaneKind,
        job_id: JobId,
        percent: u8,
        message: String,
    },
    JobCompleted {
        lane: LaneKind,
        job_id: JobId,
        result: JobOutput,
    },
    /// Emitted once, when the failure is terminal.
    JobFailed {
        lane: LaneKind,
        job_id: JobId,
        error: String,
        code: ErrorCode,
        attempts: u32,
    },
}

impl JobEvent {
    pub fn lane(&self) -> LaneKind {
        match self {
            JobEvent::JobAdded { lane, .. }
            | JobEvent::JobStarted { lane, .. }
            | JobEvent::JobProgress { lane, .. }
            | JobEvent::JobCompleted { lane, .. }
            | JobEvent::JobFailed { lane, .. } => *lane,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::JobAdded { job_id, .. }
            | JobEvent::JobStarted { job_id, .. }
            | JobEvent::JobProgress { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. } => *job_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::JobAdded { .. } => "job_added",
            JobEvent::JobStarted { .. } => "job_started",
            JobEvent::JobProgress { .. } => "job_progress",
            JobEvent::JobCompleted { .. } => "job_completed",
            JobEvent::JobFailed { .. } => "job_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<JobEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Having no subscribers is not an error.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

/// Handed to executors so they can report checkpoints for the job they run.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    hub: EventHub,
    lane: LaneKind,
    job_id: JobId,
}

impl ProgressReporter {
    pub fn new(hub: EventHub, lane: LaneKind, job_id: JobId) -> Self {
        Self { hub, lane, job_id }
    }

    pub fn report(&self, percent: u8, message: impl Into<String>) {
        self.hub.publish(JobEvent::JobProgress {
            lane: self.lane,
            job_id: self.job_id,
            percent: percent.min(100),
            message: message.into(),
        });
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}
