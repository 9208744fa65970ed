use log::debug;
use mkt_common::{Money, Rate};
use sqlx::SqliteConnection;

use crate::{
    commission::{SellerRateInputs, MAX_CATEGORY_DEPTH},
    db_types::{Category, NewCategory, NewPayee, NewProduct, Payee, PayeeType, Product},
    traits::MarketplaceError,
};

fn payee_table(payee_type: PayeeType) -> &'static str {
    match payee_type {
        PayeeType::Seller => "sellers",
        PayeeType::DeliveryAgent => "delivery_agents",
    }
}

pub(crate) fn payee_not_found(payee_type: PayeeType, payee_id: i64) -> MarketplaceError {
    match payee_type {
        PayeeType::Seller => MarketplaceError::SellerNotFound(payee_id),
        PayeeType::DeliveryAgent => MarketplaceError::DeliveryAgentNotFound(payee_id),
    }
}

fn payee_columns(payee_type: PayeeType) -> String {
    format!("id, '{payee_type}' AS payee_type, name, commission_rate, balance, created_at, updated_at")
}

pub async fn insert_payee(
    payee_type: PayeeType,
    payee: NewPayee,
    conn: &mut SqliteConnection,
) -> Result<Payee, sqlx::Error> {
    let sql = format!(
        "INSERT INTO {} (name, commission_rate) VALUES ($1, $2) RETURNING {};",
        payee_table(payee_type),
        payee_columns(payee_type)
    );
    let payee: Payee = sqlx::query_as(&sql).bind(payee.name).bind(payee.commission_rate).fetch_one(conn).await?;
    debug!("🗃️ {} {} [{}] created", payee.payee_type, payee.id, payee.name);
    Ok(payee)
}

pub async fn fetch_payee(
    payee_type: PayeeType,
    payee_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payee>, sqlx::Error> {
    let sql = format!("SELECT {} FROM {} WHERE id = $1", payee_columns(payee_type), payee_table(payee_type));
    let payee = sqlx::query_as(&sql).bind(payee_id).fetch_optional(conn).await?;
    Ok(payee)
}

pub async fn update_payee_rate(
    payee_type: PayeeType,
    payee_id: i64,
    rate: Option<Rate>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payee>, sqlx::Error> {
    let sql = format!(
        "UPDATE {} SET commission_rate = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING {};",
        payee_table(payee_type),
        payee_columns(payee_type)
    );
    let payee = sqlx::query_as(&sql).bind(rate).bind(payee_id).fetch_optional(conn).await?;
    Ok(payee)
}

/// Overwrites the cached balance. Only balance reconciliation should call this.
pub async fn overwrite_balance(
    payee_type: PayeeType,
    payee_id: i64,
    balance: Money,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let sql =
        format!("UPDATE {} SET balance = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2", payee_table(payee_type));
    sqlx::query(&sql).bind(balance).bind(payee_id).execute(conn).await?;
    Ok(())
}

pub async fn insert_category(category: NewCategory, conn: &mut SqliteConnection) -> Result<Category, MarketplaceError> {
    if let Some(parent_id) = category.parent_id {
        fetch_category(parent_id, conn).await?.ok_or(MarketplaceError::CategoryNotFound(parent_id))?;
    }
    let category = sqlx::query_as(
        "INSERT INTO categories (name, parent_id, commission_rate) VALUES ($1, $2, $3) RETURNING *;",
    )
    .bind(category.name)
    .bind(category.parent_id)
    .bind(category.commission_rate)
    .fetch_one(conn)
    .await?;
    Ok(category)
}

pub async fn fetch_category(category_id: i64, conn: &mut SqliteConnection) -> Result<Option<Category>, sqlx::Error> {
    let category =
        sqlx::query_as("SELECT * FROM categories WHERE id = $1").bind(category_id).fetch_optional(conn).await?;
    Ok(category)
}

pub async fn update_category_rate(
    category_id: i64,
    rate: Option<Rate>,
    conn: &mut SqliteConnection,
) -> Result<Option<Category>, sqlx::Error> {
    let category = sqlx::query_as("UPDATE categories SET commission_rate = $1 WHERE id = $2 RETURNING *;")
        .bind(rate)
        .bind(category_id)
        .fetch_optional(conn)
        .await?;
    Ok(category)
}

/// The category and all of its ancestors, narrowest first. Empty if the category does not exist.
pub async fn fetch_category_chain(
    category_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Category>, sqlx::Error> {
    let chain = sqlx::query_as(
        r#"
        WITH RECURSIVE chain(id, name, parent_id, commission_rate, depth) AS (
            SELECT id, name, parent_id, commission_rate, 0 FROM categories WHERE id = $1
            UNION ALL
            SELECT c.id, c.name, c.parent_id, c.commission_rate, chain.depth + 1
            FROM categories c JOIN chain ON c.id = chain.parent_id
            WHERE chain.depth + 1 < $2
        )
        SELECT id, name, parent_id, commission_rate FROM chain ORDER BY depth;
        "#,
    )
    .bind(category_id)
    .bind(MAX_CATEGORY_DEPTH as i64)
    .fetch_all(conn)
    .await?;
    Ok(chain)
}

/// Inserts the product and an inventory record holding its initial stock. Not atomic on its own.
pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    if product.initial_stock < 0 {
        return Err(MarketplaceError::QueryError("Initial stock cannot be negative".into()));
    }
    fetch_payee(PayeeType::Seller, product.seller_id, conn)
        .await?
        .ok_or(MarketplaceError::SellerNotFound(product.seller_id))?;
    if let Some(category_id) = product.category_id {
        fetch_category(category_id, conn).await?.ok_or(MarketplaceError::CategoryNotFound(category_id))?;
    }
    let result: Product = sqlx::query_as(
        "INSERT INTO products (sku, name, category_id, seller_id) VALUES ($1, $2, $3, $4) RETURNING *;",
    )
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.category_id)
    .bind(product.seller_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref err) if err.is_unique_violation() => {
            MarketplaceError::QueryError(format!("A product with SKU {} already exists", product.sku))
        },
        e => e.into(),
    })?;
    sqlx::query("INSERT INTO inventory (product_id, current_stock, reserved_stock) VALUES ($1, $2, 0)")
        .bind(result.id)
        .bind(product.initial_stock)
        .execute(&mut *conn)
        .await?;
    debug!("🗃️ Product {} [{}] created with {} in stock", result.id, result.sku, product.initial_stock);
    Ok(result)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

/// Collects everything the seller rate resolver needs for this product and seller.
pub async fn fetch_seller_rate_inputs(
    product_id: i64,
    seller_id: i64,
    conn: &mut SqliteConnection,
) -> Result<SellerRateInputs, MarketplaceError> {
    let seller =
        fetch_payee(PayeeType::Seller, seller_id, conn).await?.ok_or(MarketplaceError::SellerNotFound(seller_id))?;
    let product = fetch_product(product_id, conn).await?.ok_or(MarketplaceError::ProductNotFound(product_id))?;
    let category_chain = match product.category_id {
        Some(category_id) => fetch_category_chain(category_id, conn).await?,
        None => vec![],
    };
    Ok(SellerRateInputs { seller_id, seller_rate: seller.commission_rate, category_chain })
}
