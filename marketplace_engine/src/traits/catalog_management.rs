use mkt_common::Rate;

use crate::{
    commission::SellerRateInputs,
    db_types::{Category, NewCategory, NewPayee, NewProduct, Payee, PayeeType, Product},
    traits::MarketplaceError,
};

/// Sellers, delivery agents, the category tree, products and system settings.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn create_payee(&self, payee_type: PayeeType, payee: NewPayee) -> Result<Payee, MarketplaceError>;

    /// Sets (or clears, with `None`) the payee's individual commission rate.
    async fn set_payee_rate(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
        rate: Option<Rate>,
    ) -> Result<Payee, MarketplaceError>;

    /// Fails with [`MarketplaceError::CategoryNotFound`] if the parent does not exist.
    async fn create_category(&self, category: NewCategory) -> Result<Category, MarketplaceError>;

    async fn set_category_rate(&self, category_id: i64, rate: Option<Rate>) -> Result<Category, MarketplaceError>;

    /// Creates the product and its inventory record in one transaction.
    async fn create_product(&self, product: NewProduct) -> Result<Product, MarketplaceError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError>;

    /// Gathers the rate overrides that apply to this product when sold by this seller.
    ///
    /// Fails with [`MarketplaceError::SellerNotFound`] or [`MarketplaceError::ProductNotFound`].
    async fn fetch_seller_rate_inputs(
        &self,
        product_id: i64,
        seller_id: i64,
    ) -> Result<SellerRateInputs, MarketplaceError>;

    /// Inserts or replaces a system setting.
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), MarketplaceError>;
}
