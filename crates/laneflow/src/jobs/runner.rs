use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::jobs::error_codes::JobError;
use crate::jobs::events::{JobEvent, ProgressReporter};
use crate::jobs::model::{Job, JobId, JobOutput, JobStatus, LaneKind};
use crate::jobs::queue::QueueInner;
use crate::jobs::retry::{self, RetryDecision};

/// Runs one attempt of a dispatched job and settles its outcome.
pub(crate) async fn run_job(inner: Arc<QueueInner>, job: Job) {
    let lane = job.lane();
    let attempt = job.attempts + 1;
    let mut guard = InFlight::new(Arc::clone(&inner), lane, job.id);

    let executor = inner.executor(lane);
    let progress = ProgressReporter::new(inner.events.clone(), lane, job.id);
    let timeout = inner.cfg.job_timeout;
    let started = Instant::now();

    let outcome = match tokio::time::timeout(timeout, executor.execute(&job, &progress)).await {
        Ok(res) => res,
        Err(_) => Err(JobError::TimedOut {
            after_ms: timeout.as_millis() as u64,
        }),
    };

    debug!(
        lane = %lane,
        job_id = job.id,
        attempt,
        latency_ms = started.elapsed().as_millis() as u64,
        ok = outcome.is_ok(),
        "attempt finished"
    );

    guard.finish(outcome);
}

/// Settles the in-flight entry exactly once. If the task is aborted or the
/// executor panics before `finish`, dropping the guard records the attempt as
/// failed.
struct InFlight {
    inner: Arc<QueueInner>,
    lane: LaneKind,
    job_id: JobId,
    settled: bool,
}

impl InFlight {
    fn new(inner: Arc<QueueInner>, lane: LaneKind, job_id: JobId) -> Self {
        Self {
            inner,
            lane,
            job_id,
            settled: false,
        }
    }

    fn finish(&mut self, outcome: Result<JobOutput, JobError>) {
        self.settled = true;
        settle(&self.inner, self.lane, self.job_id, outcome);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            warn!(lane = %self.lane, job_id = self.job_id, "job execution aborted");
            self.finish(Err(JobError::other("job execution aborted")));
        }
    }
}

fn settle(inner: &Arc<QueueInner>, lane: LaneKind, id: JobId, outcome: Result<JobOutput, JobError>) {
    let mut event = None;
    let mut retry_after = None;

    {
        let mut state = inner.lock();
        let (lane_state, dedup) = state.split(lane);

        let Some(mut job) = lane_state.in_flight.remove(&id) else {
            warn!(lane = %lane, job_id = id, "finished job was not in flight");
            return;
        };

        match outcome {
            Ok(output) => {
                job.status = JobStatus::Completed;
                job.completed_at = Some(Utc::now());
                job.result = Some(output.clone());
                if let Some(key) = &job.resource_key {
                    dedup.mark_processed(key, id);
                }

                info!(lane = %lane, job_id = id, attempts = job.attempts, "job completed");
                event = Some(JobEvent::JobCompleted {
                    lane,
                    job_id: id,
                    result: output,
                });
                lane_state.history.record(job);
            }
            Err(err) => {
                // A retry no longer holds the key; another job may own it now.
                if let Some(key) = &job.resource_key {
                    dedup.release(key, id);
                }

                let code = err.code();
                job.attempts += 1;
                job.last_error = Some(err.to_string());
                job.last_error_code = Some(code);

                let decision =
                    retry::decide(job.attempts, &err, &inner.cfg.retry, &mut rand::thread_rng());

                match decision {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            lane = %lane,
                            job_id = id,
                            attempt = job.attempts,
                            code = %code,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "job attempt failed; retry scheduled"
                        );
                        job.status = JobStatus::Queued;
                        lane_state.delayed.insert(id, job);
                        retry_after = Some(delay);
                    }
                    RetryDecision::Fail(reason) => {
                        error!(
                            lane = %lane,
                            job_id = id,
                            attempts = job.attempts,
                            code = %code,
                            reason = reason.as_str(),
                            error = %err,
                            "job failed"
                        );
                        job.status = JobStatus::Failed;
                        job.failed_at = Some(Utc::now());
                        event = Some(JobEvent::JobFailed {
                            lane,
                            job_id: id,
                            error: err.to_string(),
                            code,
                            attempts: job.attempts,
                        });
                        lane_state.history.record(job);
                    }
                }
            }
        }
    }

    if let Some(event) = event {
        inner.events.publish(event);
    }
    if let Some(delay) = retry_after {
        schedule_retry(Arc::clone(inner), lane, id, delay);
    }
}

fn schedule_retry(inner: Arc<QueueInner>, lane: LaneKind, id: JobId, delay: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!(lane = %lane, job_id = id, "no runtime to schedule retry; job stays delayed");
        return;
    };

    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        requeue_delayed(&inner, lane, id);
    });
}

/// Moves a job from the retry-delay set back into its lane. A job cancelled
/// while waiting is simply gone.
fn requeue_delayed(inner: &QueueInner, lane: LaneKind, id: JobId) {
    let mut state = inner.lock();
    let lane_state = state.lane_mut(lane);
    if let Some(job) = lane_state.delayed.remove(&id) {
        debug!(lane = %lane, job_id = id, attempts = job.attempts, "job re-enqueued for retry");
        lane_state.pending.requeue(job);
    }
}
