//! Decimal-valued quantities (commission rates and delivery distances).
//!
//! SQLite has no decimal column type, so these are stored as TEXT and parsed back exactly. They are never rounded
//! here; rounding only happens when a computed amount becomes [`crate::Money`].
use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef},
    Decode,
    Encode,
    Sqlite,
    Type,
};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid decimal value: {0}")]
pub struct DecimalConversionError(String);

fn parse_decimal(s: &str) -> Result<Decimal, DecimalConversionError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| DecimalConversionError(format!("{s}: {e}")))
}

macro_rules! decimal_text_type {
    ($name:ident) => {
        impl From<Decimal> for $name {
            fn from(value: Decimal) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = DecimalConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_decimal(s).map(Self)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0.normalize())
            }
        }

        impl Type<Sqlite> for $name {
            fn type_info() -> SqliteTypeInfo {
                <String as Type<Sqlite>>::type_info()
            }

            fn compatible(ty: &SqliteTypeInfo) -> bool {
                <String as Type<Sqlite>>::compatible(ty)
                    || <i64 as Type<Sqlite>>::compatible(ty)
                    || <f64 as Type<Sqlite>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, Sqlite> for $name {
            fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> IsNull {
                <String as Encode<'q, Sqlite>>::encode(self.0.normalize().to_string(), buf)
            }
        }

        impl<'r> Decode<'r, Sqlite> for $name {
            fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
                let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
                Ok(Self(parse_decimal(text)?))
            }
        }
    };
}

//--------------------------------------        Rate         ---------------------------------------------------------
/// A commission rate. Percentage rates lie in `0..=100`; distance rates are currency per distance unit.
///
/// A rate of exactly zero means "not configured" wherever rates are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rate(Decimal);

decimal_text_type!(Rate);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn from_percent(percent: i64) -> Self {
        Self(Decimal::from(percent))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Only strictly positive rates count as configured.
    pub fn is_configured(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_valid_percentage(&self) -> bool {
        self.0 >= Decimal::ZERO && self.0 <= Decimal::ONE_HUNDRED
    }
}

//--------------------------------------      Distance       ---------------------------------------------------------
/// A delivery distance in kilometres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Distance(Decimal);

decimal_text_type!(Distance);

impl Distance {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}
