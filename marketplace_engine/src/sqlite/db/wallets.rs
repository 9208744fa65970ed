//! The wallet ledger. Rows are append-only; the cached payee balance is kept in step by database triggers.
use log::trace;
use mkt_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWalletTransaction, PayeeType, WalletTransaction},
    traits::MarketplaceError,
};

/// Appends a completed transaction. The payee's balance changes in the same statement.
pub async fn append_completed(
    tx: NewWalletTransaction,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, MarketplaceError> {
    let record: WalletTransaction = sqlx::query_as(
        r#"
        INSERT INTO wallet_transactions (
            payee_id,
            payee_type,
            amount,
            transaction_type,
            description,
            reference,
            status,
            commission_id
        ) VALUES ($1, $2, $3, $4, $5, $6, 'Completed', $7)
        RETURNING *;
        "#,
    )
    .bind(tx.payee_id)
    .bind(tx.payee_type)
    .bind(tx.amount)
    .bind(tx.transaction_type)
    .bind(&tx.description)
    .bind(&tx.reference)
    .bind(tx.commission_id)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref err) if err.is_unique_violation() => {
            MarketplaceError::QueryError(format!("Wallet transaction reference {} has already been used", tx.reference))
        },
        e => e.into(),
    })?;
    trace!("💰️ {} of {} for {} {} [{}]", record.transaction_type, record.amount, tx.payee_type, tx.payee_id, record.reference);
    Ok(record)
}

/// The credit that paid out the given commission, if there is one.
pub async fn fetch_credit_for_commission(
    commission_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, sqlx::Error> {
    let tx = sqlx::query_as(
        "SELECT * FROM wallet_transactions WHERE commission_id = $1 AND transaction_type = 'Credit' ORDER BY id LIMIT 1",
    )
    .bind(commission_id)
    .fetch_optional(conn)
    .await?;
    Ok(tx)
}

pub async fn fetch_for_payee(
    payee_type: PayeeType,
    payee_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, sqlx::Error> {
    let txs = sqlx::query_as("SELECT * FROM wallet_transactions WHERE payee_type = $1 AND payee_id = $2 ORDER BY id")
        .bind(payee_type)
        .bind(payee_id)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

/// The sum of the payee's completed transactions.
pub async fn ledger_balance(
    payee_type: PayeeType,
    payee_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Money, sqlx::Error> {
    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(balance), 0) FROM payee_ledger_balances WHERE payee_type = $1 AND payee_id = $2",
    )
    .bind(payee_type)
    .bind(payee_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from_cents(balance))
}
