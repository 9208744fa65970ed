use log::*;
use marketplace_engine::{events::EventProducers, OrderFlowApi, ReconciliationApi, SqliteDatabase};

use crate::{config::WorkerConfig, errors::WorkerError, reconciliation_worker::start_reconciliation_worker};

/// Connects to the database, brings its schema up to date and runs the reconciliation worker until Ctrl-C.
pub async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| WorkerError::InitializeError(e.to_string()))?;
    db.migrate().await?;
    let api = reconciliation_api(db, &config);
    if config.run_once {
        let report = api.run_once().await?;
        info!("🕰️ Single reconciliation pass complete. {report:?}");
        return Ok(());
    }
    let worker = start_reconciliation_worker(api, config.reconcile_interval);
    let abort = worker.abort_handle();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("🕰️ Shutdown requested. Stopping the reconciliation worker");
            abort.abort();
            Ok(())
        },
        result = worker => {
            let msg = match result {
                Ok(()) => "The worker loop returned".to_string(),
                Err(e) => e.to_string(),
            };
            Err(WorkerError::TaskFailed(msg))
        },
    }
}

pub fn reconciliation_api(db: SqliteDatabase, config: &WorkerConfig) -> ReconciliationApi<SqliteDatabase, SqliteDatabase> {
    let flow = OrderFlowApi::new(db.clone(), db, EventProducers::default()).with_retry_policy(config.retry_policy());
    ReconciliationApi::new(flow)
}
