use std::fmt::Debug;

use mkt_common::Rate;

use crate::{
    db_types::{Category, NewCategory, NewPayee, NewProduct, Payee, PayeeType, Product},
    settings::{
        DeliveryCommissionMode,
        DEFAULT_COMMISSION_RATE_KEY,
        DEFAULT_DELIVERY_COMMISSION_RATE_KEY,
        DELIVERY_COMMISSION_MODE_KEY,
        DELIVERY_RATE_PER_KM_KEY,
    },
    traits::{CatalogManagement, LedgerManagement, MarketplaceError},
};

/// Sellers, delivery agents, the category tree, products and the commission settings.
pub struct CatalogApi<B> {
    db: B,
}

impl<B: Debug> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi ({:?})", self.db)
    }
}

impl<B> CatalogApi<B>
where B: CatalogManagement + LedgerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn add_seller(&self, seller: NewPayee) -> Result<Payee, MarketplaceError> {
        self.db.create_payee(PayeeType::Seller, seller).await
    }

    pub async fn add_delivery_agent(&self, agent: NewPayee) -> Result<Payee, MarketplaceError> {
        self.db.create_payee(PayeeType::DeliveryAgent, agent).await
    }

    pub async fn payee(&self, payee_type: PayeeType, payee_id: i64) -> Result<Option<Payee>, MarketplaceError> {
        self.db.fetch_payee(payee_type, payee_id).await
    }

    pub async fn set_payee_rate(
        &self,
        payee_type: PayeeType,
        payee_id: i64,
        rate: Option<Rate>,
    ) -> Result<Payee, MarketplaceError> {
        check_percentage(rate)?;
        self.db.set_payee_rate(payee_type, payee_id, rate).await
    }

    pub async fn add_category(&self, category: NewCategory) -> Result<Category, MarketplaceError> {
        check_percentage(category.commission_rate)?;
        self.db.create_category(category).await
    }

    pub async fn set_category_rate(&self, category_id: i64, rate: Option<Rate>) -> Result<Category, MarketplaceError> {
        check_percentage(rate)?;
        self.db.set_category_rate(category_id, rate).await
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, MarketplaceError> {
        self.db.create_product(product).await
    }

    pub async fn product(&self, product_id: i64) -> Result<Option<Product>, MarketplaceError> {
        self.db.fetch_product(product_id).await
    }

    pub async fn set_default_commission_rate(&self, rate: Rate) -> Result<(), MarketplaceError> {
        check_percentage(Some(rate))?;
        self.db.put_setting(DEFAULT_COMMISSION_RATE_KEY, &rate.to_string()).await
    }

    pub async fn set_default_delivery_commission_rate(&self, rate: Rate) -> Result<(), MarketplaceError> {
        check_percentage(Some(rate))?;
        self.db.put_setting(DEFAULT_DELIVERY_COMMISSION_RATE_KEY, &rate.to_string()).await
    }

    /// Switches delivery commissions to a fixed amount per kilometre of delivery distance.
    pub async fn use_distance_delivery_commissions(&self, rate_per_km: Rate) -> Result<(), MarketplaceError> {
        self.db.put_setting(DELIVERY_RATE_PER_KM_KEY, &rate_per_km.to_string()).await?;
        self.db.put_setting(DELIVERY_COMMISSION_MODE_KEY, mode_name(DeliveryCommissionMode::Distance)).await
    }

    pub async fn use_percentage_delivery_commissions(&self) -> Result<(), MarketplaceError> {
        self.db.put_setting(DELIVERY_COMMISSION_MODE_KEY, mode_name(DeliveryCommissionMode::Percentage)).await
    }
}

fn mode_name(mode: DeliveryCommissionMode) -> &'static str {
    match mode {
        DeliveryCommissionMode::Percentage => "percentage",
        DeliveryCommissionMode::Distance => "distance",
    }
}

fn check_percentage(rate: Option<Rate>) -> Result<(), MarketplaceError> {
    match rate {
        Some(rate) if !rate.is_valid_percentage() => {
            Err(MarketplaceError::CalculationError(format!("{rate} is not a percentage between 0 and 100")))
        },
        _ => Ok(()),
    }
}
