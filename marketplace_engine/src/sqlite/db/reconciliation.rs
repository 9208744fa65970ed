use log::warn;
use sqlx::SqliteConnection;

use crate::db_types::{OrderId, OrderStatusType, ReconciliationFlag, SettlementException};

/// Records a skipped line item. If an open exception already exists for the item, that one is returned.
pub async fn record_exception(
    order_id: OrderId,
    line_item_id: Option<i64>,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<SettlementException, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO settlement_exceptions (order_id, line_item_id, reason) VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING;
        "#,
    )
    .bind(order_id)
    .bind(line_item_id)
    .bind(reason)
    .execute(&mut *conn)
    .await?;
    let exception = sqlx::query_as(
        r#"
        SELECT * FROM settlement_exceptions
        WHERE order_id = $1 AND COALESCE(line_item_id, 0) = COALESCE($2, 0) AND resolved_at IS NULL
        "#,
    )
    .bind(order_id)
    .bind(line_item_id)
    .fetch_one(conn)
    .await?;
    Ok(exception)
}

pub async fn resolve_exception(exception_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE settlement_exceptions SET resolved_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(exception_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Marks every open exception on the order as resolved, returning how many were closed.
pub async fn close_open_exceptions(order_id: OrderId, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE settlement_exceptions SET resolved_at = CURRENT_TIMESTAMP WHERE order_id = $1 AND resolved_at IS NULL",
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_exceptions_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<SettlementException>, sqlx::Error> {
    let exceptions = sqlx::query_as("SELECT * FROM settlement_exceptions WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(exceptions)
}

pub async fn fetch_open_exceptions(conn: &mut SqliteConnection) -> Result<Vec<SettlementException>, sqlx::Error> {
    let exceptions = sqlx::query_as("SELECT * FROM settlement_exceptions WHERE resolved_at IS NULL ORDER BY id")
        .fetch_all(conn)
        .await?;
    Ok(exceptions)
}

/// Opens a flag, or bumps the attempt count if one is already open for this order and status.
pub async fn upsert_flag(
    order_id: OrderId,
    requested: OrderStatusType,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationFlag, sqlx::Error> {
    let flag: ReconciliationFlag = sqlx::query_as(
        r#"
        INSERT INTO reconciliation_flags (order_id, requested_status, reason) VALUES ($1, $2, $3)
        ON CONFLICT (order_id, requested_status) WHERE resolved_at IS NULL
        DO UPDATE SET attempts = attempts + 1, reason = excluded.reason
        RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(requested)
    .bind(reason)
    .fetch_one(conn)
    .await?;
    warn!(
        "🗃️ Order {order_id} flagged for reconciliation (requested {requested}, attempt {}). {reason}",
        flag.attempts
    );
    Ok(flag)
}

pub async fn resolve_flag(flag_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reconciliation_flags SET resolved_at = CURRENT_TIMESTAMP WHERE id = $1 AND resolved_at IS NULL",
    )
    .bind(flag_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_open_flags(conn: &mut SqliteConnection) -> Result<Vec<ReconciliationFlag>, sqlx::Error> {
    let flags = sqlx::query_as("SELECT * FROM reconciliation_flags WHERE resolved_at IS NULL ORDER BY created_at, id")
        .fetch_all(conn)
        .await?;
    Ok(flags)
}
