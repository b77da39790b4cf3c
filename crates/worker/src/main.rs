use laneflow::api;
use laneflow::config;
use laneflow::db;
use laneflow::jobs::{JobEvent, JobQueue};
use laneflow::telemetry;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

mod handlers;
use handlers::build_executors;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::Config::from_env()?;
    telemetry::init(cfg.log_format);

    let api_addr = cfg.admin_addr.clone();
    let maintenance_interval = cfg.maintenance_interval;

    info!(
        api = api_addr.as_deref().unwrap_or("disabled"),
        ai_service = %cfg.ai_service_url,
        max_video = cfg.queue.max_video_concurrency,
        max_qa = cfg.queue.max_qa_concurrency,
        job_timeout_ms = cfg.queue.job_timeout.as_millis() as u64,
        retry_attempts = cfg.queue.retry.max_attempts,
        migrate_on_startup = cfg.migrate_on_startup,
        "laneflow starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let executors = build_executors(&cfg, pool.clone())?;
    let queue = JobQueue::new(cfg.queue.clone(), executors.video, executors.qa);

    // ---- Event log task ----
    let mut events = queue.subscribe();
    let events_handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    });

    // ---- API task ----
    let app = api::router(api::ApiState {
        queue: queue.clone(),
    });
    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("admin api listening on http://{addr}");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    // ---- Maintenance task ----
    let maintenance_handle = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(maintenance_interval);
            loop {
                tick.tick().await;
                queue.prune_history();
            }
            #[allow(unreachable_code)]
            Ok::<(), anyhow::Error>(())
        })
    };

    queue.start();

    let outcome = tokio::select! {
        res = api_handle => res.map_err(anyhow::Error::from).and_then(|r| r),
        res = maintenance_handle => res.map_err(anyhow::Error::from).and_then(|r| r),
        res = events_handle => res.map_err(anyhow::Error::from).and_then(|r| r),
        res = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            res.map_err(anyhow::Error::from)
        }
    };

    queue.stop().await;
    pool.close().await;

    if let Err(e) = &outcome {
        error!(error = %e, "laneflow stopped with an error");
    }
    outcome
}

fn log_event(event: &JobEvent) {
    match event {
        JobEvent::JobFailed {
            error, code, attempts, ..
        } => warn!(
            event = event.name(),
            lane = %event.lane(),
            job_id = event.job_id(),
            attempts,
            code = %code,
            error = %error,
            "job event"
        ),
        JobEvent::JobProgress {
            percent, message, ..
        } => info!(
            event = event.name(),
            lane = %event.lane(),
            job_id = event.job_id(),
            percent,
            message = %message,
            "job event"
        ),
        _ => info!(
            event = event.name(),
            lane = %event.lane(),
            job_id = event.job_id(),
            "job event"
        ),
    }
}
