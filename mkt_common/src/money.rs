use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of decimal places kept for every persisted monetary amount.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of money in minor currency units (cents).
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as money: {0}")]
pub struct MoneyConversionError(String);

impl MoneyConversionError {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self(reason.into())
    }
}

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim()).map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        Self::from_decimal(value)
    }
}

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MONEY_DECIMAL_PLACES)
    }

    /// Converts a computed amount into money, rounding half away from zero to two decimal places.
    ///
    /// This is the only place where rounding happens.
    pub fn from_decimal(value: Decimal) -> Result<Self, MoneyConversionError> {
        let rounded = value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Self)
            .ok_or_else(|| MoneyConversionError(format!("{value} is out of range")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Money::from_cents(123_450).to_string(), "1234.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1205).to_string(), "-12.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn parse() {
        assert_eq!("900.00".parse::<Money>().unwrap(), Money::from_major(900));
        assert_eq!("0.125".parse::<Money>().unwrap(), Money::from_cents(13));
        assert!("nine hundred".parse::<Money>().is_err());
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(Money::from_decimal(Decimal::new(1005, 3)).unwrap(), Money::from_cents(101));
        assert_eq!(Money::from_decimal(Decimal::new(-1005, 3)).unwrap(), Money::from_cents(-101));
        assert_eq!(Money::from_decimal(Decimal::new(1004, 3)).unwrap(), Money::from_cents(100));
        assert_eq!(Money::from_decimal(Decimal::new(1015, 3)).unwrap(), Money::from_cents(102));
    }

    #[test]
    fn huge_amounts_are_rejected() {
        assert!(Money::from_decimal(Decimal::MAX).is_err());
        assert!(Money::from_decimal(Decimal::from(i64::MAX)).is_err());
    }

    #[test]
    fn arithmetic() {
        let mut a = Money::from_major(10);
        a += Money::from_cents(50);
        a -= Money::from_cents(25);
        assert_eq!(a, Money::from_cents(1025));
        assert_eq!(-a, Money::from_cents(-1025));
        assert_eq!(a * 3, Money::from_cents(3075));
        let total: Money = [Money::from_major(1), Money::from_major(2)].into_iter().sum();
        assert_eq!(total, Money::from_major(3));
    }

    #[test]
    fn serde_is_transparent_cents() {
        let json = serde_json::to_string(&Money::from_cents(4250)).unwrap();
        assert_eq!(json, "4250");
    }
}
