use std::fmt::Debug;

use crate::{
    db_types::InventoryRecord,
    traits::{InventoryManagement, MarketplaceError},
};

/// Stock levels. Reservations for orders happen as part of order transitions; this API is for reading stock and
/// restocking.
pub struct InventoryApi<B> {
    db: B,
}

impl<B: Debug> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi ({:?})", self.db)
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn inventory(&self, product_id: i64) -> Result<InventoryRecord, MarketplaceError> {
        self.db.fetch_inventory(product_id).await?.ok_or(MarketplaceError::ProductNotFound(product_id))
    }

    pub async fn available_stock(&self, product_id: i64) -> Result<i64, MarketplaceError> {
        Ok(self.inventory(product_id).await?.available_stock())
    }

    pub async fn restock(&self, product_id: i64, quantity: i64) -> Result<InventoryRecord, MarketplaceError> {
        self.db.restock(product_id, quantity).await
    }
}
