//! Explicit, single-creation wiring of the reconciliation components.
//!
//! The worker pool and the database connection pool are created exactly
//! once here and injected everywhere they are used; no component reaches
//! for hidden process-wide state.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::alarm::{AlarmChannel, AlarmService, WebhookAlarmChannel};
use crate::api::ReconApi;
use crate::config::ReconConfig;
use crate::error::ReconResult;
use crate::exception::ExceptionRecordService;
use crate::ledger::{PgReconStore, ReconStore};
use crate::recon::{RealtimeReconService, ReconWorkerPool, TimingReconService, TimingTrigger};

/// Build a [`ReconApi`] over the Postgres store: connect, migrate, wire.
pub async fn initialize(database_url: &str, config: ReconConfig) -> ReconResult<ReconApi> {
    let pool = initialize_database(database_url).await?;
    let store = PgReconStore::new(pool);
    store.migrate().await?;
    Ok(initialize_with_store(Arc::new(store), config))
}

/// Build a [`ReconApi`] over any persistence collaborator.
pub fn initialize_with_store(store: Arc<dyn ReconStore>, config: ReconConfig) -> ReconApi {
    let mut alarms = AlarmService::new();
    if let Some(url) = &config.alarm_webhook_url {
        let channel: Arc<dyn AlarmChannel> = Arc::new(WebhookAlarmChannel::new(url.clone()));
        alarms = alarms.with_channel(channel);
    }
    let alarms = Arc::new(alarms);
    let exceptions = Arc::new(ExceptionRecordService::new(store.clone()));
    let worker_pool = Arc::new(ReconWorkerPool::new(&config.worker_pool));
    info!(workers = worker_pool.worker_count(), "reconciliation worker pool ready");

    let realtime = RealtimeReconService::new(
        store.clone(),
        exceptions.clone(),
        alarms.clone(),
        worker_pool,
        config.clone(),
    );
    let timing = TimingReconService::new(store.clone(), exceptions, alarms, config.clone());

    let timing_task = if config.timing_enabled {
        info!(hour = config.timing_hour_utc, "starting daily timing trigger");
        Some(TimingTrigger::new(timing.clone(), config.timing_hour_utc).start())
    } else {
        None
    };

    ReconApi::new(realtime, timing, store, timing_task)
}

async fn initialize_database(database_url: &str) -> ReconResult<PgPool> {
    info!("connecting to reconciliation database...");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;
    info!("database pool ready");
    Ok(pool)
}
