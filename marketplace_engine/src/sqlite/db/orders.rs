use log::{debug, trace};
use mkt_common::Money;
use sqlx::SqliteConnection;

use super::catalog;
use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType},
    traits::MarketplaceError,
};

/// Inserts the order and its line items. This is not atomic. Embed the call inside a transaction and pass `&mut tx`
/// as the connection argument.
///
/// Each line item takes its seller from the product, so every product must exist.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, MarketplaceError> {
    if order.items.is_empty() {
        return Err(MarketplaceError::InvalidOrder("An order must have at least one line item".into()));
    }
    if let Some(item) = order.items.iter().find(|i| i.quantity <= 0) {
        return Err(MarketplaceError::InvalidOrder(format!(
            "Quantity for product {} must be positive, not {}",
            item.product_id, item.quantity
        )));
    }
    if let Some(item) = order.items.iter().find(|i| i.unit_price < Money::ZERO) {
        return Err(MarketplaceError::InvalidOrder(format!(
            "Unit price for product {} cannot be negative, not {}",
            item.product_id, item.unit_price
        )));
    }
    if order.discount < Money::ZERO || order.shipping_fee < Money::ZERO || order.platform_fee < Money::ZERO {
        return Err(MarketplaceError::InvalidOrder("Fees and discounts cannot be negative".into()));
    }
    if fetch_order_by_number(&order.order_number, conn).await?.is_some() {
        return Err(MarketplaceError::OrderAlreadyExists(order.order_number));
    }
    let result: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                customer_id,
                status,
                subtotal,
                shipping_fee,
                platform_fee,
                discount,
                total,
                delivery_distance,
                delivery_agent_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(&order.order_number)
    .bind(&order.customer_id)
    .bind(OrderStatusType::Received)
    .bind(order.subtotal())
    .bind(order.shipping_fee)
    .bind(order.platform_fee)
    .bind(order.discount)
    .bind(order.total())
    .bind(order.delivery_distance)
    .bind(order.delivery_agent_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref err) if err.is_unique_violation() => {
            MarketplaceError::OrderAlreadyExists(order.order_number.clone())
        },
        e => e.into(),
    })?;
    for item in &order.items {
        let product = catalog::fetch_product(item.product_id, conn)
            .await?
            .ok_or(MarketplaceError::ProductNotFound(item.product_id))?;
        sqlx::query(
            r#"
            INSERT INTO line_items (order_id, seller_id, product_id, quantity, unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(result.id)
        .bind(product.seller_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_total())
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {} [{}] inserted with {} line items", result.id, result.order_number, order.items.len());
    Ok(result)
}

pub async fn fetch_order(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_number(
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(order_number).fetch_optional(conn).await?;
    Ok(order)
}

/// The order's line items, in the order they were placed
pub async fn fetch_line_items(order_id: OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items =
        sqlx::query_as("SELECT * FROM line_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await?;
    Ok(items)
}

/// Sets the status to `new_status`, but only if it is still `expected`. Returns `None` if the order was changed by
/// someone else in the meantime.
pub async fn compare_and_set_status(
    order_id: OrderId,
    expected: OrderStatusType,
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
        UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status = $3
        RETURNING *;
        "#,
    )
    .bind(new_status)
    .bind(order_id)
    .bind(expected)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Status for order {order_id} moved from {expected} to {new_status}: {}", order.is_some());
    Ok(order)
}

pub async fn update_delivery_agent(
    order_id: OrderId,
    agent_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET delivery_agent_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *;",
    )
    .bind(agent_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn update_payment_reference(
    order_id: OrderId,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "UPDATE orders SET payment_reference = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *;",
    )
    .bind(reference)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}
