use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::jobs::model::{Job, JobId, JobStatus};

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// At least one job is always kept, so the last terminal job stays inspectable.
    pub max_jobs: usize,
    /// `None` keeps terminal jobs until they are evicted by `max_jobs`.
    pub ttl: Option<Duration>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_jobs: 1000,
            ttl: Some(Duration::from_secs(24 * 60 * 60)),
        }
    }
}

/// Terminal jobs of one lane, oldest first.
#[derive(Debug)]
pub struct JobHistory {
    policy: RetentionPolicy,
    jobs: VecDeque<Job>,
    completed_total: u64,
    failed_total: u64,
}

impl JobHistory {
    pub fn new(mut policy: RetentionPolicy) -> Self {
        policy.max_jobs = policy.max_jobs.max(1);
        Self {
            policy,
            jobs: VecDeque::new(),
            completed_total: 0,
            failed_total: 0,
        }
    }

    /// Returns how many jobs were evicted to make room.
    pub fn record(&mut self, job: Job) -> usize {
        match job.status {
            JobStatus::Completed => self.completed_total += 1,
            JobStatus::Failed => self.failed_total += 1,
            _ => {}
        }

        let mut evicted = 0;
        while self.jobs.len() >= self.policy.max_jobs {
            self.jobs.pop_front();
            evicted += 1;
        }
        self.jobs.push_back(job);
        evicted
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Drops jobs that finished before `now - ttl`. Returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.policy.ttl else {
            return 0;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = now - ttl;

        let before = self.jobs.len();
        self.jobs
            .retain(|job| job.finished_at().map_or(true, |at| at >= cutoff));
        before - self.jobs.len()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Lifetime counters; not reduced by eviction or pruning.
    pub fn completed_total(&self) -> u64 {
        self.completed_total
    }

    pub fn failed_total(&self) -> u64 {
        self.failed_total
    }
}
