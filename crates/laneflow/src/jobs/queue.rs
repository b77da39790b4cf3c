use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::jobs::dedup::DedupGuard;
use crate::jobs::error_codes::EnqueueError;
use crate::jobs::events::{EventHub, JobEvent};
use crate::jobs::executor::Executor;
use crate::jobs::history::{JobHistory, RetentionPolicy};
use crate::jobs::lane::PriorityLane;
use crate::jobs::metrics::{LaneStatus, MemoryProbe, QueueStatus};
use crate::jobs::model::{Job, JobId, JobPayload, JobStatus, LaneKind, Priority, QaPayload, VideoPayload};
use crate::jobs::retry::RetryConfig;
use crate::jobs::runner;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_video_concurrency: usize,
    pub max_qa_concurrency: usize,
    pub job_timeout: Duration,
    pub retry: RetryConfig,
    pub poll_interval: Duration,
    pub retention: RetentionPolicy,
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_video_concurrency: 2,
            max_qa_concurrency: 10,
            job_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
            poll_interval: Duration::from_millis(1000),
            retention: RetentionPolicy::default(),
            event_capacity: 1024,
        }
    }
}

impl QueueConfig {
    pub fn max_concurrency(&self, lane: LaneKind) -> usize {
        match lane {
            LaneKind::Video => self.max_video_concurrency,
            LaneKind::Qa => self.max_qa_concurrency,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LaneState {
    pub(crate) pending: PriorityLane,
    pub(crate) in_flight: HashMap<JobId, Job>,
    pub(crate) delayed: HashMap<JobId, Job>,
    pub(crate) history: JobHistory,
    pub(crate) max_concurrent: usize,
}

impl LaneState {
    fn new(max_concurrent: usize, retention: RetentionPolicy) -> Self {
        Self {
            pending: PriorityLane::new(),
            in_flight: HashMap::new(),
            delayed: HashMap::new(),
            history: JobHistory::new(retention),
            max_concurrent: max_concurrent.max(1),
        }
    }

    fn find(&self, id: JobId) -> Option<&Job> {
        self.pending
            .find_by_id(id)
            .or_else(|| self.in_flight.get(&id))
            .or_else(|| self.delayed.get(&id))
            .or_else(|| self.history.get(id))
    }

    fn status(&self) -> LaneStatus {
        LaneStatus {
            waiting: self.pending.waiting(),
            processing: self.in_flight.len(),
            delayed: self.delayed.len(),
            max_concurrent: self.max_concurrent,
            completed: self.history.completed_total(),
            failed: self.history.failed_total(),
            retained: self.history.len(),
            waiting_by_priority: self.pending.waiting_by_priority(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct QueueState {
    video: LaneState,
    qa: LaneState,
    dedup: DedupGuard,
}

impl QueueState {
    pub(crate) fn lane_mut(&mut self, lane: LaneKind) -> &mut LaneState {
        match lane {
            LaneKind::Video => &mut self.video,
            LaneKind::Qa => &mut self.qa,
        }
    }

    fn lane(&self, lane: LaneKind) -> &LaneState {
        match lane {
            LaneKind::Video => &self.video,
            LaneKind::Qa => &self.qa,
        }
    }

    /// Lane state and the dedup guard borrowed together.
    pub(crate) fn split(&mut self, lane: LaneKind) -> (&mut LaneState, &mut DedupGuard) {
        let QueueState { video, qa, dedup } = self;
        match lane {
            LaneKind::Video => (video, dedup),
            LaneKind::Qa => (qa, dedup),
        }
    }
}

struct Dispatcher {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct QueueInner {
    pub(crate) cfg: QueueConfig,
    pub(crate) events: EventHub,
    state: Mutex<QueueState>,
    video_exec: Arc<dyn Executor>,
    qa_exec: Arc<dyn Executor>,
    dispatcher: Mutex<Option<Dispatcher>>,
    memory: MemoryProbe,
}

impl QueueInner {
    /// Never held across an `.await`.
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn executor(&self, lane: LaneKind) -> Arc<dyn Executor> {
        match lane {
            LaneKind::Video => Arc::clone(&self.video_exec),
            LaneKind::Qa => Arc::clone(&self.qa_exec),
        }
    }
}

/// Cloneable handle to the in-process queue: two priority lanes, their
/// dispatcher, the video dedup guard and the lifecycle event stream.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(
        mut cfg: QueueConfig,
        video_exec: Arc<dyn Executor>,
        qa_exec: Arc<dyn Executor>,
    ) -> Self {
        cfg.max_video_concurrency = cfg.max_video_concurrency.max(1);
        cfg.max_qa_concurrency = cfg.max_qa_concurrency.max(1);

        let state = QueueState {
            video: LaneState::new(cfg.max_video_concurrency, cfg.retention.clone()),
            qa: LaneState::new(cfg.max_qa_concurrency, cfg.retention.clone()),
            dedup: DedupGuard::new(),
        };

        Self {
            inner: Arc::new(QueueInner {
                events: EventHub::new(cfg.event_capacity),
                cfg,
                state: Mutex::new(state),
                video_exec,
                qa_exec,
                dispatcher: Mutex::new(None),
                memory: MemoryProbe::new(),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.cfg
    }

    /// Rejects the video if the same URL + company is in progress or already done.
    pub fn enqueue_video(
        &self,
        payload: VideoPayload,
        priority: Priority,
    ) -> Result<JobId, EnqueueError> {
        let resource_key = payload.resource_key();

        let id = {
            let mut state = self.inner.lock();
            let id = state.video.pending.next_id();
            if let Err(e) = state.dedup.admit(&resource_key, id) {
                warn!(lane = "video", resource_key = %resource_key, code = e.code(), "enqueue rejected");
                return Err(e);
            }
            state.video.pending.enqueue(JobPayload::Video(payload), priority)
        };

        info!(
            lane = "video",
            job_id = id,
            priority = priority.level(),
            resource_key = %resource_key,
            "job enqueued"
        );
        self.inner.events.publish(JobEvent::JobAdded {
            lane: LaneKind::Video,
            job_id: id,
            priority,
        });
        Ok(id)
    }

    pub fn enqueue_qa(&self, payload: QaPayload, priority: Priority) -> JobId {
        let id = {
            let mut state = self.inner.lock();
            state.qa.pending.enqueue(JobPayload::Qa(payload), priority)
        };

        info!(lane = "qa", job_id = id, priority = priority.level(), "job enqueued");
        self.inner.events.publish(JobEvent::JobAdded {
            lane: LaneKind::Qa,
            job_id: id,
            priority,
        });
        id
    }

    /// Snapshot of the job wherever it currently lives.
    pub fn get_job(&self, id: JobId, lane: LaneKind) -> Option<Job> {
        let state = self.inner.lock();
        state.lane(lane).find(id).cloned()
    }

    /// Removes a job that is waiting in its lane or waiting for a retry.
    /// Running and finished jobs are left alone.
    pub fn cancel_queued(&self, id: JobId, lane: LaneKind) -> Option<Job> {
        let job = {
            let mut state = self.inner.lock();
            let (lane_state, dedup) = state.split(lane);
            let job = lane_state
                .pending
                .remove(id)
                .or_else(|| lane_state.delayed.remove(&id))?;

            if let Some(key) = &job.resource_key {
                dedup.release(key, job.id);
            }
            job
        };

        info!(lane = %lane, job_id = id, attempts = job.attempts, "queued job cancelled");
        Some(job)
    }

    pub fn status(&self) -> QueueStatus {
        let memory = self.inner.memory.sample();
        let running = self.is_running();

        let state = self.inner.lock();
        QueueStatus {
            at: Utc::now(),
            running,
            video: state.video.status(),
            qa: state.qa.status(),
            processing_resource_keys: state.dedup.processing_keys(),
            processed_resource_keys: state.dedup.processed_keys(),
            memory,
        }
    }

    pub fn clear_dedup_cache(&self) {
        self.inner.lock().dedup.clear();
        info!("dedup cache cleared");
    }

    pub fn clear_resource(&self, resource_key: &str) -> bool {
        let cleared = self.inner.lock().dedup.clear_resource(resource_key);
        info!(resource_key = %resource_key, cleared, "dedup entry cleared");
        cleared
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Drops retained terminal jobs older than the history TTL.
    pub fn prune_history(&self) -> usize {
        let now = Utc::now();
        let mut state = self.inner.lock();
        let pruned: usize = LaneKind::ALL
            .iter()
            .map(|lane| state.lane_mut(*lane).history.prune_expired(now))
            .sum();
        drop(state);

        if pruned > 0 {
            info!(pruned, "expired jobs pruned from history");
        }
        pruned
    }

    /// Spawns the dispatch loop. Returns false if it is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut slot = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(dispatch_loop(self.clone(), token.clone()));
        *slot = Some(Dispatcher { token, handle });
        true
    }

    /// Stops the dispatch loop. Jobs already running finish on their own.
    pub async fn stop(&self) {
        let dispatcher = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(dispatcher) = dispatcher else {
            return;
        };

        dispatcher.token.cancel();
        if let Err(e) = dispatcher.handle.await {
            warn!(error = %e, "dispatcher task ended abnormally");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// One scheduling pass over both lanes. Returns how many jobs were started.
    pub fn dispatch_pending(&self) -> usize {
        let mut started = 0;

        for lane in LaneKind::ALL {
            let jobs = {
                let mut state = self.inner.lock();
                let lane_state = state.lane_mut(lane);
                let mut jobs = Vec::new();

                while lane_state.in_flight.len() < lane_state.max_concurrent {
                    let Some(mut job) = lane_state.pending.dequeue_next() else {
                        break;
                    };
                    job.status = JobStatus::Processing;
                    if job.started_at.is_none() {
                        job.started_at = Some(Utc::now());
                    }
                    lane_state.in_flight.insert(job.id, job.clone());
                    jobs.push(job);
                }
                jobs
            };

            for job in jobs {
                let attempt = job.attempts + 1;
                debug!(lane = %lane, job_id = job.id, attempt, "job dispatched");
                self.inner.events.publish(JobEvent::JobStarted {
                    lane,
                    job_id: job.id,
                    attempt,
                });
                tokio::spawn(runner::run_job(Arc::clone(&self.inner), job));
                started += 1;
            }
        }

        started
    }
}

async fn dispatch_loop(queue: JobQueue, token: CancellationToken) {
    let mut tick = tokio::time::interval(queue.inner.cfg.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        poll_interval_ms = queue.inner.cfg.poll_interval.as_millis() as u64,
        max_video = queue.inner.cfg.max_video_concurrency,
        max_qa = queue.inner.cfg.max_qa_concurrency,
        "dispatcher started"
    );

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tick.tick() => {
                let started = queue.dispatch_pending();
                if started > 0 {
                    debug!(started, "dispatch pass");
                }
            }
        }
    }

    info!("dispatcher stopped");
}
