use std::sync::Arc;

use async_trait::async_trait;

use crate::jobs::error_codes::JobError;
use crate::jobs::events::ProgressReporter;
use crate::jobs::executor::Executor;
use crate::jobs::model::{Job, JobOutput, JobPayload, VideoOutcome};
use crate::services::{
    NewDemoRecord, NewVideoRecord, ProcessVideoRequest, ProcessingService, RecordStore,
};

/// Transcribes a video through the AI service and records it for the company.
pub struct VideoExecutor {
    service: Arc<dyn ProcessingService>,
    store: Arc<dyn RecordStore>,
}

impl VideoExecutor {
    pub fn new(service: Arc<dyn ProcessingService>, store: Arc<dyn RecordStore>) -> Self {
        Self { service, store }
    }
}

#[async_trait]
impl Executor for VideoExecutor {
    async fn execute(&self, job: &Job, progress: &ProgressReporter) -> Result<JobOutput, JobError> {
        let JobPayload::Video(payload) = &job.payload else {
            return Err(JobError::other("video executor received a non-video job"));
        };

        self.service.health().await?;

        let processed = self
            .service
            .process_video(&ProcessVideoRequest {
                video_url: payload.video_url.clone(),
                company_name: payload.company_name.clone(),
                is_youtube: payload.is_youtube,
            })
            .await?;

        if processed.video_id.trim().is_empty() {
            return Err(JobError::malformed("process-video response has an empty video_id"));
        }
        progress.report(50, "transcript ready");

        let company = self.store.upsert_company(&payload.company_name).await?;

        let video_record_id = self
            .store
            .insert_video(&NewVideoRecord {
                company_id: company.id,
                video_url: payload.video_url.clone(),
                is_youtube: payload.is_youtube,
                upstream_video_id: processed.video_id.clone(),
                transcript_chunks: processed.transcript_chunks,
            })
            .await?;

        let demo_record_id = if payload.create_demo {
            let title = payload
                .demo_title
                .clone()
                .or_else(|| processed.title.clone())
                .unwrap_or_else(|| format!("{} demo", company.name));

            let id = self
                .store
                .insert_demo(&NewDemoRecord {
                    company_id: company.id,
                    video_id: video_record_id,
                    title,
                })
                .await?;
            Some(id)
        } else {
            None
        };

        progress.report(100, "video stored");

        Ok(JobOutput::Video(VideoOutcome {
            video_record_id,
            company_id: company.id,
            upstream_video_id: processed.video_id,
            transcript_chunks: processed.transcript_chunks,
            demo_record_id,
        }))
    }
}
