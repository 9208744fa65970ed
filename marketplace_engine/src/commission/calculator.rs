use mkt_common::{Distance, Money, MoneyConversionError, Rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The result of a commission calculation. `net_earning` is what the payee is credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    pub base: Money,
    pub rate: Rate,
    pub commission: Money,
    pub net_earning: Money,
}

/// `commission = round(base × rate / 100)` and `net_earning = base − commission`.
///
/// The product is computed in full decimal precision and rounded to cents once, half away from zero.
pub fn percentage_commission(base: Money, rate: Rate) -> Result<CommissionBreakdown, MoneyConversionError> {
    let exact = base
        .to_decimal()
        .checked_mul(rate.value())
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| MoneyConversionError::new(format!("{base} at {rate}% overflows")))?;
    let commission = Money::from_decimal(exact)?;
    Ok(CommissionBreakdown { base, rate, commission, net_earning: base - commission })
}

/// `commission = round(distance × rate)`. The commission is the delivery agent's earning in full; it is not taken
/// out of any order amount, so `base` is reported as the commission itself.
pub fn distance_commission(distance: Distance, rate: Rate) -> Result<CommissionBreakdown, MoneyConversionError> {
    let exact = distance
        .value()
        .checked_mul(rate.value())
        .ok_or_else(|| MoneyConversionError::new(format!("{distance} km at {rate} per km overflows")))?;
    let commission = Money::from_decimal(exact)?;
    Ok(CommissionBreakdown { base: commission, rate, commission, net_earning: commission })
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ten_percent_of_a_thousand() {
        let result = percentage_commission(Money::from_major(1000), Rate::from_percent(10)).unwrap();
        assert_eq!(result.commission, Money::from_major(100));
        assert_eq!(result.net_earning, Money::from_major(900));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 0.25 × 10% = 0.025
        let result = percentage_commission(Money::from_cents(25), Rate::from_percent(10)).unwrap();
        assert_eq!(result.commission, Money::from_cents(3));
        assert_eq!(result.net_earning, Money::from_cents(22));
        // 0.05 × 50% = 0.025
        let result = percentage_commission(Money::from_cents(5), Rate::from_percent(50)).unwrap();
        assert_eq!(result.commission, Money::from_cents(3));
        // 0.24 × 10% = 0.024
        let result = percentage_commission(Money::from_cents(24), Rate::from_percent(10)).unwrap();
        assert_eq!(result.commission, Money::from_cents(2));
    }

    #[test]
    fn fractional_rates() {
        let rate: Rate = "12.5".parse().unwrap();
        let result = percentage_commission(Money::from_cents(1999), rate).unwrap();
        // 19.99 × 12.5% = 2.49875
        assert_eq!(result.commission, Money::from_cents(250));
        assert_eq!(result.net_earning, Money::from_cents(1749));
    }

    #[test]
    fn distance_based() {
        let distance = Distance::new(Decimal::new(125, 1));
        let result = distance_commission(distance, Rate::new(Decimal::from(8))).unwrap();
        assert_eq!(result.commission, Money::from_major(100));
        assert_eq!(result.net_earning, Money::from_major(100));
        let distance = Distance::new(Decimal::new(3333, 3));
        let result = distance_commission(distance, Rate::new(Decimal::new(15, 1))).unwrap();
        // 3.333 × 1.5 = 4.9995
        assert_eq!(result.commission, Money::from_cents(500));
    }

    #[test]
    fn overflowing_inputs_are_errors() {
        let distance = Distance::new(Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0));
        let rate = Rate::new(Decimal::from(10_000_000_000i64));
        assert!(distance_commission(distance, rate).is_err());
        let rate = Rate::new(Decimal::MAX);
        assert!(percentage_commission(Money::from_cents(i64::MAX), rate).is_err());
    }

    proptest! {
        #[test]
        fn commission_and_net_add_up(cents in 0i64..100_000_000, basis_points in 0i64..=10_000) {
            let rate = Rate::new(Decimal::new(basis_points, 2));
            let result = percentage_commission(Money::from_cents(cents), rate).unwrap();
            prop_assert_eq!(result.commission + result.net_earning, Money::from_cents(cents));
            prop_assert!(result.commission >= Money::ZERO);
            prop_assert!(result.commission <= Money::from_cents(cents));
        }

        #[test]
        fn rounding_error_is_at_most_half_a_cent(cents in 0i64..100_000_000, basis_points in 0i64..=10_000) {
            let rate = Rate::new(Decimal::new(basis_points, 2));
            let exact = Decimal::new(cents, 2) * rate.value() / Decimal::ONE_HUNDRED;
            let result = percentage_commission(Money::from_cents(cents), rate).unwrap();
            let error = (result.commission.to_decimal() - exact).abs();
            prop_assert!(error <= Decimal::new(5, 3));
        }
    }
}
