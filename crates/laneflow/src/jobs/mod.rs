pub mod dedup;
pub mod error_codes;
pub mod events;
pub mod executor;
pub mod history;
pub mod lane;
pub mod metrics;
pub mod model;
pub mod queue;
pub mod retry;
mod runner;

pub use error_codes::{suggested_action, EnqueueError, ErrorCode, JobError};
pub use events::{EventHub, JobEvent, ProgressReporter};
pub use executor::Executor;
pub use metrics::{LaneStatus, MemoryProbe, MemoryUsage, QueueStatus};
pub use model::{
    Job, JobId, JobOutput, JobPayload, JobStatus, LaneKind, Priority, QaOutcome, QaPayload,
    VideoOutcome, VideoPayload,
};
pub use queue::{JobQueue, QueueConfig};
pub use retry::RetryConfig;
