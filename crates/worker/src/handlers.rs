use std::sync::Arc;

use laneflow::config::Config;
use laneflow::executors::{QaExecutor, VideoExecutor};
use laneflow::jobs::Executor;
use laneflow::services::{AiServiceClient, PgStore, ProcessingService, RecordStore};
use sqlx::PgPool;

pub struct Executors {
    pub video: Arc<dyn Executor>,
    pub qa: Arc<dyn Executor>,
}

/// Both lanes share one AI client and one record store.
pub fn build_executors(cfg: &Config, pool: PgPool) -> anyhow::Result<Executors> {
    let service: Arc<dyn ProcessingService> =
        Arc::new(AiServiceClient::new(cfg.ai_service_url.clone(), cfg.ai_timeout)?);
    let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool));

    Ok(Executors {
        video: Arc::new(VideoExecutor::new(Arc::clone(&service), Arc::clone(&store))),
        qa: Arc::new(QaExecutor::new(service, store)),
    })
}
