use sqlx::SqliteConnection;

use crate::{
    db_types::{CommissionRecord, CommissionStatus, NewCommissionRecord, OrderId, PayeeType},
    traits::MarketplaceError,
};

/// Inserts a commission record that is already `Paid`. A second record for the same order, line item and payee
/// violates the unique index and is reported as [`MarketplaceError::QueryError`].
pub async fn insert_paid_commission(
    commission: &NewCommissionRecord,
    conn: &mut SqliteConnection,
) -> Result<CommissionRecord, MarketplaceError> {
    let record = sqlx::query_as(
        r#"
        INSERT INTO commission_records (
            order_id,
            line_item_id,
            payee_id,
            payee_type,
            basis,
            order_amount,
            distance,
            commission_rate,
            commission_amount,
            status,
            paid_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, CURRENT_TIMESTAMP)
        RETURNING *;
        "#,
    )
    .bind(commission.order_id)
    .bind(commission.line_item_id)
    .bind(commission.payee_id)
    .bind(commission.payee_type)
    .bind(commission.basis)
    .bind(commission.order_amount)
    .bind(commission.distance)
    .bind(commission.commission_rate)
    .bind(commission.commission_amount)
    .bind(CommissionStatus::Paid)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref err) if err.is_unique_violation() => MarketplaceError::QueryError(format!(
            "A commission for {} {} on order {} already exists",
            commission.payee_type, commission.payee_id, commission.order_id
        )),
        e => e.into(),
    })?;
    Ok(record)
}

pub async fn set_payment_reference(
    commission_id: i64,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<CommissionRecord, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
        UPDATE commission_records SET payment_reference = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(commission_id)
    .fetch_one(conn)
    .await?;
    Ok(record)
}

/// Flips a `Paid` record to `Cancelled`. Returns `None` if the record was not `Paid`.
pub async fn cancel_paid_commission(
    commission_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CommissionRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
        UPDATE commission_records SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status = $3
        RETURNING *;
        "#,
    )
    .bind(CommissionStatus::Cancelled)
    .bind(commission_id)
    .bind(CommissionStatus::Paid)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

pub async fn count_for_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM commission_records WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

pub async fn fetch_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, sqlx::Error> {
    let records = sqlx::query_as("SELECT * FROM commission_records WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}

pub async fn fetch_for_payee(
    payee_type: PayeeType,
    payee_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, sqlx::Error> {
    let records =
        sqlx::query_as("SELECT * FROM commission_records WHERE payee_type = $1 AND payee_id = $2 ORDER BY id")
            .bind(payee_type)
            .bind(payee_id)
            .fetch_all(conn)
            .await?;
    Ok(records)
}

/// True if the order already has a commission for this line item (or the delivery leg, when `line_item_id` is
/// `None`).
pub async fn exists_for_item(
    order_id: OrderId,
    line_item_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM commission_records
        WHERE order_id = $1 AND COALESCE(line_item_id, 0) = COALESCE($2, 0)
        "#,
    )
    .bind(order_id)
    .bind(line_item_id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}
