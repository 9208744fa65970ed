//! Pure commission logic: rate resolution, commission arithmetic and settlement planning.
//!
//! Nothing in here touches storage. The storage backends gather the inputs, call these functions and persist the
//! results.
mod calculator;
mod rates;
mod settlement;

pub use calculator::{distance_commission, percentage_commission, CommissionBreakdown};
pub use rates::{
    resolve_delivery_rate,
    resolve_seller_rate,
    DeliveryRate,
    RateSource,
    ResolvedRate,
    SellerRateInputs,
    MAX_CATEGORY_DEPTH,
};
pub use settlement::{
    credit_reference,
    debit_reference,
    delivery_commission,
    seller_commission,
    summarize_commissions,
    CommissionSummary,
    EarningsBucket,
};
