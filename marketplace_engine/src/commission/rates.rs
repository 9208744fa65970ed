use mkt_common::{Distance, Rate};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Category, Payee},
    settings::{CommissionSettings, BUILT_IN_COMMISSION_PERCENT, BUILT_IN_DELIVERY_COMMISSION_PERCENT},
};

/// Category chains longer than this are cut off. It guards against cycles in badly edited taxonomies.
pub const MAX_CATEGORY_DEPTH: usize = 16;

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    /// A category override. `depth` is 0 for the product's own category, 1 for its parent, and so on.
    Category { category_id: i64, depth: usize },
    Seller { seller_id: i64 },
    DeliveryAgent { agent_id: i64 },
    /// The system-wide default from the settings store
    SystemSetting,
    /// Nothing was configured anywhere
    BuiltIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub rate: Rate,
    pub source: RateSource,
}

impl ResolvedRate {
    pub fn new(rate: Rate, source: RateSource) -> Self {
        Self { rate, source }
    }
}

/// Everything needed to resolve a seller's rate for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SellerRateInputs {
    pub seller_id: i64,
    pub seller_rate: Option<Rate>,
    /// The product's category followed by its ancestors, narrowest first.
    pub category_chain: Vec<Category>,
}

/// Walks the priority chain and returns the first positive rate: the category chain from narrowest to broadest,
/// then the seller's own rate, then the system default, then the built-in default. This never fails.
pub fn resolve_seller_rate(inputs: &SellerRateInputs, settings: &CommissionSettings) -> ResolvedRate {
    let category_rate = inputs.category_chain.iter().take(MAX_CATEGORY_DEPTH).enumerate().find_map(|(depth, c)| {
        c.commission_rate
            .filter(Rate::is_configured)
            .map(|rate| ResolvedRate::new(rate, RateSource::Category { category_id: c.id, depth }))
    });
    category_rate
        .or_else(|| {
            inputs
                .seller_rate
                .filter(Rate::is_configured)
                .map(|rate| ResolvedRate::new(rate, RateSource::Seller { seller_id: inputs.seller_id }))
        })
        .unwrap_or_else(|| fallback(settings.configured_default_rate(), BUILT_IN_COMMISSION_PERCENT))
}

fn fallback(setting: Option<Rate>, built_in_percent: i64) -> ResolvedRate {
    match setting {
        Some(rate) => ResolvedRate::new(rate, RateSource::SystemSetting),
        None => ResolvedRate::new(Rate::from_percent(built_in_percent), RateSource::BuiltIn),
    }
}

/// How the delivery leg of an order is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryRate {
    /// `distance × rate.rate`, where the rate is currency per km
    Distance { distance: Distance, rate: ResolvedRate },
    /// A percentage of the order subtotal
    Percentage { rate: ResolvedRate },
}

impl DeliveryRate {
    pub fn rate(&self) -> Rate {
        match self {
            DeliveryRate::Distance { rate, .. } | DeliveryRate::Percentage { rate } => rate.rate,
        }
    }
}

/// Distance-based pricing applies only when distance mode is on, a positive per-km rate is set, and the order
/// carries a positive distance. Anything else falls back to a percentage of the subtotal, using the agent's own
/// rate, then the default delivery rate from settings, then the built-in default.
pub fn resolve_delivery_rate(
    agent: &Payee,
    distance: Option<Distance>,
    settings: &CommissionSettings,
) -> DeliveryRate {
    let distance = distance.filter(Distance::is_positive);
    if let (Some(distance), Some(rate)) = (distance, settings.distance_rate()) {
        return DeliveryRate::Distance { distance, rate: ResolvedRate::new(rate, RateSource::SystemSetting) };
    }
    let rate = agent
        .commission_rate
        .filter(Rate::is_configured)
        .map(|rate| ResolvedRate::new(rate, RateSource::DeliveryAgent { agent_id: agent.id }))
        .unwrap_or_else(|| fallback(settings.configured_delivery_rate(), BUILT_IN_DELIVERY_COMMISSION_PERCENT));
    DeliveryRate::Percentage { rate }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use mkt_common::Money;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::*;
    use crate::db_types::PayeeType;

    fn category(id: i64, rate: Option<i64>) -> Category {
        Category { id, name: format!("cat-{id}"), parent_id: None, commission_rate: rate.map(Rate::from_percent) }
    }

    fn agent(rate: Option<Rate>) -> Payee {
        let now = Utc::now();
        Payee {
            id: 7,
            payee_type: PayeeType::DeliveryAgent,
            name: "Speedy".into(),
            commission_rate: rate,
            balance: Money::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn narrowest_category_wins() {
        let inputs = SellerRateInputs {
            seller_id: 1,
            seller_rate: Some(Rate::from_percent(5)),
            category_chain: vec![category(3, Some(12)), category(2, Some(8)), category(1, Some(4))],
        };
        let rate = resolve_seller_rate(&inputs, &CommissionSettings::default());
        assert_eq!(rate, ResolvedRate::new(Rate::from_percent(12), RateSource::Category { category_id: 3, depth: 0 }));
    }

    #[test]
    fn zero_rates_are_skipped() {
        let inputs = SellerRateInputs {
            seller_id: 1,
            seller_rate: Some(Rate::from_percent(5)),
            category_chain: vec![category(3, Some(0)), category(2, None), category(1, Some(4))],
        };
        let rate = resolve_seller_rate(&inputs, &CommissionSettings::default());
        assert_eq!(rate.source, RateSource::Category { category_id: 1, depth: 2 });

        let inputs = SellerRateInputs { seller_id: 1, seller_rate: Some(Rate::ZERO), category_chain: vec![] };
        let settings = CommissionSettings::default().with_default_commission_rate(Rate::from_percent(15));
        let rate = resolve_seller_rate(&inputs, &settings);
        assert_eq!(rate, ResolvedRate::new(Rate::from_percent(15), RateSource::SystemSetting));
    }

    #[test]
    fn seller_rate_beats_defaults() {
        let inputs =
            SellerRateInputs { seller_id: 9, seller_rate: Some(Rate::from_percent(5)), category_chain: vec![] };
        let settings = CommissionSettings::default().with_default_commission_rate(Rate::from_percent(15));
        let rate = resolve_seller_rate(&inputs, &settings);
        assert_eq!(rate, ResolvedRate::new(Rate::from_percent(5), RateSource::Seller { seller_id: 9 }));
    }

    #[test]
    fn nothing_configured_uses_built_in() {
        let rate = resolve_seller_rate(&SellerRateInputs::default(), &CommissionSettings::default());
        assert_eq!(rate, ResolvedRate::new(Rate::from_percent(10), RateSource::BuiltIn));
        let settings = CommissionSettings::default().with_default_commission_rate(Rate::ZERO);
        assert_eq!(resolve_seller_rate(&SellerRateInputs::default(), &settings).source, RateSource::BuiltIn);
    }

    #[test]
    fn distance_mode_needs_a_distance() {
        let settings = CommissionSettings::default().with_distance_mode(Rate::from_percent(8));
        let distance = Distance::new(Decimal::new(125, 1));
        let rate = resolve_delivery_rate(&agent(None), Some(distance), &settings);
        assert!(matches!(rate, DeliveryRate::Distance { distance: d, .. } if d == distance));
        assert_eq!(rate.rate(), Rate::from_percent(8));

        let rate = resolve_delivery_rate(&agent(Some(Rate::from_percent(6))), None, &settings);
        assert_eq!(rate, DeliveryRate::Percentage {
            rate: ResolvedRate::new(Rate::from_percent(6), RateSource::DeliveryAgent { agent_id: 7 })
        });
        let zero = Distance::new(Decimal::ZERO);
        let rate = resolve_delivery_rate(&agent(None), Some(zero), &settings);
        assert_eq!(rate, DeliveryRate::Percentage { rate: ResolvedRate::new(Rate::from_percent(10), RateSource::BuiltIn) });
    }

    #[test]
    fn percentage_mode_ignores_distance() {
        let settings = CommissionSettings::default().with_default_delivery_commission_rate(Rate::from_percent(4));
        let distance = Distance::new(Decimal::from(20));
        let rate = resolve_delivery_rate(&agent(None), Some(distance), &settings);
        assert_eq!(rate, DeliveryRate::Percentage { rate: ResolvedRate::new(Rate::from_percent(4), RateSource::SystemSetting) });
    }

    fn optional_rate() -> impl Strategy<Value = Option<Rate>> {
        prop_oneof![Just(None), Just(Some(Rate::ZERO)), (1i64..=100).prop_map(|p| Some(Rate::from_percent(p)))]
    }

    proptest! {
        #[test]
        fn resolved_rate_is_always_positive(
            chain in prop::collection::vec(optional_rate(), 0..5),
            seller_rate in optional_rate(),
            default_rate in optional_rate(),
        ) {
            let category_chain = chain
                .iter()
                .enumerate()
                .map(|(i, rate)| Category { id: i as i64 + 1, name: String::new(), parent_id: None, commission_rate: *rate })
                .collect::<Vec<_>>();
            let inputs = SellerRateInputs { seller_id: 1, seller_rate, category_chain };
            let settings = CommissionSettings { default_commission_rate: default_rate, ..Default::default() };
            let resolved = resolve_seller_rate(&inputs, &settings);
            prop_assert!(resolved.rate.is_configured());
            let first_category = chain.iter().position(|r| r.map(|r| r.is_configured()).unwrap_or(false));
            match first_category {
                Some(depth) => prop_assert_eq!(resolved.source, RateSource::Category { category_id: depth as i64 + 1, depth }),
                None if seller_rate.map(|r| r.is_configured()).unwrap_or(false) => {
                    prop_assert_eq!(resolved.source, RateSource::Seller { seller_id: 1 })
                },
                None => prop_assert!(matches!(resolved.source, RateSource::SystemSetting | RateSource::BuiltIn)),
            }
        }
    }
}
