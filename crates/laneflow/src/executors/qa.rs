use std::sync::Arc;

use async_trait::async_trait;

use crate::jobs::error_codes::JobError;
use crate::jobs::events::ProgressReporter;
use crate::jobs::executor::Executor;
use crate::jobs::model::{Job, JobOutput, JobPayload, QaOutcome};
use crate::services::{AskRequest, AskResponse, NewQaRecord, ProcessingService, RecordStore};

/// Answers a question about a company's videos and records the interaction.
pub struct QaExecutor {
    service: Arc<dyn ProcessingService>,
    store: Arc<dyn RecordStore>,
}

impl QaExecutor {
    pub fn new(service: Arc<dyn ProcessingService>, store: Arc<dyn RecordStore>) -> Self {
        Self { service, store }
    }
}

fn validate_answer(resp: &AskResponse) -> Result<(), JobError> {
    if resp.answer.trim().is_empty() {
        return Err(JobError::malformed("ask response has an empty answer"));
    }
    if !(0.0..=1.0).contains(&resp.confidence) {
        return Err(JobError::malformed(format!(
            "ask response confidence {} is outside 0..=1",
            resp.confidence
        )));
    }
    Ok(())
}

#[async_trait]
impl Executor for QaExecutor {
    async fn execute(&self, job: &Job, progress: &ProgressReporter) -> Result<JobOutput, JobError> {
        let JobPayload::Qa(payload) = &job.payload else {
            return Err(JobError::other("qa executor received a non-qa job"));
        };

        let answer = self
            .service
            .answer_question(&AskRequest {
                question: payload.question.clone(),
                company_name: payload.company_name.clone(),
                interaction_id: payload.interaction_id.clone(),
            })
            .await?;

        validate_answer(&answer)?;
        progress.report(80, "answer received");

        let company = self
            .store
            .find_company(&payload.company_name)
            .await?
            .ok_or_else(|| JobError::not_found(format!("company {:?}", payload.company_name)))?;

        let qa_record_id = self
            .store
            .insert_qa(&NewQaRecord {
                company_id: company.id,
                interaction_id: payload.interaction_id.clone(),
                question: payload.question.clone(),
                answer: answer.answer.clone(),
                confidence: answer.confidence,
                sources: answer.sources.clone(),
            })
            .await?;

        progress.report(100, "interaction stored");

        Ok(JobOutput::Qa(QaOutcome {
            qa_record_id,
            answer: answer.answer,
            confidence: answer.confidence,
            sources: answer.sources,
        }))
    }
}
