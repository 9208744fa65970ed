use std::time::Duration;

use log::*;
use marketplace_engine::{ReconciliationApi, SqliteDatabase};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_reconciliation_worker(
    api: ReconciliationApi<SqliteDatabase, SqliteDatabase>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ Reconciliation worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running reconciliation job");
            match api.run_once().await {
                Ok(report) if report.is_empty() => trace!("🕰️ No open flags or exceptions"),
                Ok(report) => {
                    info!(
                        "🕰️ {} of {} flagged transitions resolved. {} skipped items settled on {} orders, {} still open, \
                         {} closed",
                        report.flags_resolved,
                        report.flags_checked,
                        report.items_settled,
                        report.orders_replayed,
                        report.items_still_open,
                        report.exceptions_closed
                    );
                },
                Err(e) => {
                    error!("🕰️ Error running reconciliation job: {e}");
                },
            }
        }
    })
}
