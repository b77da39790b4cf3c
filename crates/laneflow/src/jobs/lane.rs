use std::collections::VecDeque;

use serde::Serialize;

use crate::jobs::model::{Job, JobId, JobPayload, JobStatus, Priority};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Pending jobs for one lane: one FIFO bucket per priority level.
#[derive(Debug)]
pub struct PriorityLane {
    next_id: JobId,
    buckets: [VecDeque<Job>; 3],
}

impl Default for PriorityLane {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityLane {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            buckets: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
        }
    }

    /// Id the next `enqueue` will hand out.
    pub fn next_id(&self) -> JobId {
        self.next_id
    }

    /// Creates a queued job and appends it to the tail of its priority bucket.
    pub fn enqueue(&mut self, payload: JobPayload, priority: Priority) -> JobId {
        let id = self.next_id;
        self.next_id += 1;

        self.buckets[priority.index()].push_back(Job::new(id, payload, priority));
        id
    }

    /// Puts an existing job back (retry path). Its id is kept.
    pub fn requeue(&mut self, mut job: Job) {
        job.status = JobStatus::Queued;
        self.buckets[job.priority.index()].push_back(job);
    }

    pub fn dequeue_next(&mut self) -> Option<Job> {
        self.buckets.iter_mut().find_map(|bucket| bucket.pop_front())
    }

    pub fn find_by_id(&self, id: JobId) -> Option<&Job> {
        self.buckets.iter().flatten().find(|job| job.id == id)
    }

    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        for bucket in self.buckets.iter_mut() {
            if let Some(pos) = bucket.iter().position(|job| job.id == id) {
                return bucket.remove(pos);
            }
        }
        None
    }

    pub fn waiting(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn waiting_by_priority(&self) -> PriorityCounts {
        PriorityCounts {
            high: self.buckets[Priority::High.index()].len(),
            medium: self.buckets[Priority::Medium.index()].len(),
            low: self.buckets[Priority::Low.index()].len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }
}
