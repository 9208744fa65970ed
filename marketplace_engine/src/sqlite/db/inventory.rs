//! Stock adjustments. Each one is a single conditional UPDATE, so concurrent reservations on the same product can
//! never lose an update.
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{db_types::InventoryRecord, traits::MarketplaceError};

fn check_quantity(product_id: i64, quantity: i64) -> Result<(), MarketplaceError> {
    if quantity <= 0 {
        return Err(MarketplaceError::QueryError(format!(
            "Stock adjustments must be positive. Got {quantity} for product {product_id}"
        )));
    }
    Ok(())
}

pub async fn fetch_inventory(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<InventoryRecord>, sqlx::Error> {
    let record =
        sqlx::query_as("SELECT * FROM inventory WHERE product_id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(record)
}

pub async fn restock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryRecord, MarketplaceError> {
    check_quantity(product_id, quantity)?;
    let record: Option<InventoryRecord> = sqlx::query_as(
        r#"
        UPDATE inventory SET current_stock = current_stock + $1, updated_at = CURRENT_TIMESTAMP
        WHERE product_id = $2
        RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    let record = record.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    debug!("📦️ Product {product_id} restocked by {quantity}. {} now in stock", record.current_stock);
    Ok(record)
}

/// Reserves `quantity` units if that many are available. The availability check and the increment happen in the
/// same statement.
pub async fn reserve(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryRecord, MarketplaceError> {
    check_quantity(product_id, quantity)?;
    let record: Option<InventoryRecord> = sqlx::query_as(
        r#"
        UPDATE inventory SET reserved_stock = reserved_stock + $1, updated_at = CURRENT_TIMESTAMP
        WHERE product_id = $2 AND current_stock - reserved_stock >= $1
        RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    match record {
        Some(record) => {
            trace!("📦️ Reserved {quantity} of product {product_id}. {} available", record.available_stock());
            Ok(record)
        },
        None => {
            let existing =
                fetch_inventory(product_id, conn).await?.ok_or(MarketplaceError::ProductNotFound(product_id))?;
            debug!("📦️ Cannot reserve {quantity} of product {product_id}. Only {} available", existing.available_stock());
            Err(MarketplaceError::InsufficientStock {
                product_id,
                requested: quantity,
                available: existing.available_stock(),
            })
        },
    }
}

/// Returns `quantity` units from reserved stock, floored at zero.
pub async fn release(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryRecord, MarketplaceError> {
    check_quantity(product_id, quantity)?;
    let record: Option<InventoryRecord> = sqlx::query_as(
        r#"
        UPDATE inventory SET reserved_stock = MAX(0, reserved_stock - $1), updated_at = CURRENT_TIMESTAMP
        WHERE product_id = $2
        RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    let record = record.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    trace!("📦️ Released {quantity} of product {product_id}. {} available", record.available_stock());
    Ok(record)
}

/// Turns a reservation into a sale: both current and reserved stock drop by `quantity`, each floored at zero.
pub async fn commit(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryRecord, MarketplaceError> {
    check_quantity(product_id, quantity)?;
    let record: Option<InventoryRecord> = sqlx::query_as(
        r#"
        UPDATE inventory SET
            current_stock = MAX(0, current_stock - $1),
            reserved_stock = MAX(0, reserved_stock - $1),
            updated_at = CURRENT_TIMESTAMP
        WHERE product_id = $2
        RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    let record = record.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    trace!("📦️ Committed {quantity} of product {product_id}. {} left in stock", record.current_stock);
    Ok(record)
}
