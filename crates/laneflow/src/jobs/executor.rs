use async_trait::async_trait;

use crate::jobs::error_codes::JobError;
use crate::jobs::events::ProgressReporter;
use crate::jobs::model::{Job, JobOutput};

/// The unit of work behind a lane. One call is one attempt; the queue applies
/// the timeout and the retry policy around it.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, job: &Job, progress: &ProgressReporter) -> Result<JobOutput, JobError>;
}
