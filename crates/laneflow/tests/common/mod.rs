#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use laneflow::jobs::history::RetentionPolicy;
use laneflow::jobs::{
    Executor, Job, JobError, JobEvent, JobId, JobOutput, JobQueue, LaneKind, ProgressReporter,
    QaOutcome, QaPayload, QueueConfig, RetryConfig, VideoOutcome, VideoPayload,
};
use laneflow::services::{
    AskRequest, AskResponse, Company, NewDemoRecord, NewQaRecord, NewVideoRecord,
    ProcessVideoRequest, ProcessVideoResponse, ProcessingService, RecordStore,
};
use tokio::sync::broadcast;
use uuid::Uuid;

type ExecFuture = Pin<Box<dyn Future<Output = Result<JobOutput, JobError>> + Send>>;

/// Executor backed by a closure; counts how often it was called.
pub struct FnExecutor {
    f: Box<dyn Fn(Job, ProgressReporter) -> ExecFuture + Send + Sync>,
    calls: AtomicUsize,
}

impl FnExecutor {
    pub fn new<F, Fut>(f: F) -> Arc<Self>
    where
        F: Fn(Job, ProgressReporter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutput, JobError>> + Send + 'static,
    {
        Arc::new(Self {
            f: Box::new(move |job, progress| -> ExecFuture { Box::pin(f(job, progress)) }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for FnExecutor {
    async fn execute(&self, job: &Job, progress: &ProgressReporter) -> Result<JobOutput, JobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(job.clone(), progress.clone()).await
    }
}

pub fn ok_output(job: &Job) -> JobOutput {
    match job.lane() {
        LaneKind::Video => JobOutput::Video(VideoOutcome {
            video_record_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            upstream_video_id: format!("up-{}", job.id),
            transcript_chunks: 3,
            demo_record_id: None,
        }),
        LaneKind::Qa => JobOutput::Qa(QaOutcome {
            qa_record_id: Uuid::new_v4(),
            answer: "42".into(),
            confidence: 0.9,
            sources: vec![],
        }),
    }
}

pub fn succeed() -> Arc<FnExecutor> {
    FnExecutor::new(|job, _| async move { Ok(ok_output(&job)) })
}

pub fn fail_with(err: JobError) -> Arc<FnExecutor> {
    FnExecutor::new(move |_, _| {
        let err = err.clone();
        async move { Err(err) }
    })
}

pub fn video(n: u32) -> VideoPayload {
    VideoPayload::new(format!("https://videos.example/{n}.mp4"), "acme")
}

pub fn qa(n: u32) -> QaPayload {
    QaPayload {
        question: format!("question {n}?"),
        interaction_id: format!("interaction-{n}"),
        company_name: "acme".into(),
    }
}

pub fn test_config() -> QueueConfig {
    QueueConfig {
        max_video_concurrency: 2,
        max_qa_concurrency: 10,
        job_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter_pct: 0.0,
        },
        poll_interval: Duration::from_millis(10),
        retention: RetentionPolicy {
            max_jobs: 100,
            ttl: None,
        },
        event_capacity: 1024,
    }
}

pub fn queue_with(
    cfg: QueueConfig,
    video_exec: Arc<dyn Executor>,
    qa_exec: Arc<dyn Executor>,
) -> JobQueue {
    JobQueue::new(cfg, video_exec, qa_exec)
}

/// Polls until the job satisfies `pred`.
pub async fn wait_for_job(
    queue: &JobQueue,
    lane: LaneKind,
    id: JobId,
    pred: impl Fn(&Job) -> bool,
) -> Job {
    for _ in 0..10_000 {
        if let Some(job) = queue.get_job(id, lane) {
            if pred(&job) {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {lane}/{id} never reached the expected state: {:?}", queue.get_job(id, lane));
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

/// Everything currently buffered on the receiver.
pub fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

/// Scriptable stand-in for the AI service.
pub struct FakeService {
    pub health: Mutex<Result<(), JobError>>,
    pub video: Mutex<Result<ProcessVideoResponse, JobError>>,
    pub ask: Mutex<Result<AskResponse, JobError>>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeService {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            health: Mutex::new(Ok(())),
            video: Mutex::new(Ok(ProcessVideoResponse {
                video_id: "vid-1".into(),
                transcript_chunks: 12,
                title: Some("Product tour".into()),
            })),
            ask: Mutex::new(Ok(AskResponse {
                answer: "It integrates over REST.".into(),
                confidence: 0.8,
                sources: vec!["vid-1".into()],
            })),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessingService for FakeService {
    async fn health(&self) -> Result<(), JobError> {
        self.calls.lock().unwrap().push("health");
        self.health.lock().unwrap().clone()
    }

    async fn process_video(&self, _req: &ProcessVideoRequest) -> Result<ProcessVideoResponse, JobError> {
        self.calls.lock().unwrap().push("process_video");
        self.video.lock().unwrap().clone()
    }

    async fn answer_question(&self, _req: &AskRequest) -> Result<AskResponse, JobError> {
        self.calls.lock().unwrap().push("answer_question");
        self.ask.lock().unwrap().clone()
    }
}

/// In-memory record store.
#[derive(Default)]
pub struct FakeStore {
    pub companies: Mutex<HashMap<String, Company>>,
    pub videos: Mutex<Vec<NewVideoRecord>>,
    pub demos: Mutex<Vec<NewDemoRecord>>,
    pub qas: Mutex<Vec<NewQaRecord>>,
    pub fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_company(name: &str) -> Arc<Self> {
        let store = Self::default();
        store.companies.lock().unwrap().insert(
            name.to_string(),
            Company {
                id: Uuid::new_v4(),
                name: name.to_string(),
            },
        );
        Arc::new(store)
    }

    fn check_writes(&self) -> Result<(), JobError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(JobError::persistence("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn find_company(&self, name: &str) -> Result<Option<Company>, JobError> {
        Ok(self.companies.lock().unwrap().get(name).cloned())
    }

    async fn upsert_company(&self, name: &str) -> Result<Company, JobError> {
        self.check_writes()?;
        let mut companies = self.companies.lock().unwrap();
        let company = companies.entry(name.to_string()).or_insert_with(|| Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
        });
        Ok(company.clone())
    }

    async fn insert_video(&self, rec: &NewVideoRecord) -> Result<Uuid, JobError> {
        self.check_writes()?;
        self.videos.lock().unwrap().push(rec.clone());
        Ok(Uuid::new_v4())
    }

    async fn insert_demo(&self, rec: &NewDemoRecord) -> Result<Uuid, JobError> {
        self.check_writes()?;
        self.demos.lock().unwrap().push(rec.clone());
        Ok(Uuid::new_v4())
    }

    async fn insert_qa(&self, rec: &NewQaRecord) -> Result<Uuid, JobError> {
        self.check_writes()?;
        self.qas.lock().unwrap().push(rec.clone());
        Ok(Uuid::new_v4())
    }
}
