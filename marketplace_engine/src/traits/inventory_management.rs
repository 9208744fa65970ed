use crate::{db_types::InventoryRecord, traits::MarketplaceError};

/// Per-product stock levels.
///
/// Every adjustment is a single atomic update on the stock row. Implementations must never read the record, change
/// it in memory and write it back, since reservations for different orders can touch the same product concurrently.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn fetch_inventory(&self, product_id: i64) -> Result<Option<InventoryRecord>, MarketplaceError>;

    /// Adds `quantity` to current stock.
    async fn restock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError>;

    /// Moves `quantity` into reserved stock, only if at least that much is available.
    ///
    /// Fails with [`MarketplaceError::InsufficientStock`] otherwise, leaving the record unchanged.
    async fn reserve_stock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError>;

    /// Returns `quantity` from reserved stock. Reserved stock never drops below zero.
    async fn release_stock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError>;
}
