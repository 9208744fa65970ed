//! System-wide commission settings.
//!
//! Settings are optional. Anything missing, zero or unparsable falls back to the built-in defaults, so a fresh
//! database settles orders at 10% with percentage-based delivery commissions.
use std::{collections::HashMap, str::FromStr};

use log::*;
use mkt_common::Rate;
use serde::{Deserialize, Serialize};

use crate::traits::MarketplaceError;

pub const DEFAULT_COMMISSION_RATE_KEY: &str = "default_commission_rate";
pub const DEFAULT_DELIVERY_COMMISSION_RATE_KEY: &str = "default_delivery_commission_rate";
pub const DELIVERY_COMMISSION_MODE_KEY: &str = "delivery_commission_mode";
pub const DELIVERY_RATE_PER_KM_KEY: &str = "delivery_rate_per_km";

pub const BUILT_IN_COMMISSION_PERCENT: i64 = 10;
pub const BUILT_IN_DELIVERY_COMMISSION_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryCommissionMode {
    #[default]
    Percentage,
    Distance,
}

impl FromStr for DeliveryCommissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" => Ok(Self::Percentage),
            "distance" => Ok(Self::Distance),
            s => Err(format!("{s} is not a delivery commission mode")),
        }
    }
}

/// The raw settings as stored. Use the accessor methods to get effective values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSettings {
    pub default_commission_rate: Option<Rate>,
    pub default_delivery_commission_rate: Option<Rate>,
    pub delivery_commission_mode: DeliveryCommissionMode,
    pub delivery_rate_per_km: Option<Rate>,
}

impl CommissionSettings {
    pub fn with_default_commission_rate(mut self, rate: Rate) -> Self {
        self.default_commission_rate = Some(rate);
        self
    }

    pub fn with_default_delivery_commission_rate(mut self, rate: Rate) -> Self {
        self.default_delivery_commission_rate = Some(rate);
        self
    }

    pub fn with_distance_mode(mut self, rate_per_km: Rate) -> Self {
        self.delivery_commission_mode = DeliveryCommissionMode::Distance;
        self.delivery_rate_per_km = Some(rate_per_km);
        self
    }

    /// The configured global default, if it is positive.
    pub fn configured_default_rate(&self) -> Option<Rate> {
        self.default_commission_rate.filter(Rate::is_configured)
    }

    pub fn configured_delivery_rate(&self) -> Option<Rate> {
        self.default_delivery_commission_rate.filter(Rate::is_configured)
    }

    /// The per-km delivery rate, but only when distance mode is switched on and the rate is positive.
    pub fn distance_rate(&self) -> Option<Rate> {
        match self.delivery_commission_mode {
            DeliveryCommissionMode::Distance => self.delivery_rate_per_km.filter(Rate::is_configured),
            DeliveryCommissionMode::Percentage => None,
        }
    }

    /// Builds settings from key/value rows. Unknown keys are ignored and bad values are logged and skipped.
    pub fn from_pairs<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let values = pairs.into_iter().collect::<HashMap<String, String>>();
        let rate = |key: &str| -> Option<Rate> {
            let value = values.get(key)?;
            match value.parse::<Rate>() {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warn!("🪛️ Setting {key}={value} is not a valid rate. {e}. Using the default instead.");
                    None
                },
            }
        };
        let delivery_commission_mode = values
            .get(DELIVERY_COMMISSION_MODE_KEY)
            .map(|v| {
                v.parse().unwrap_or_else(|e| {
                    warn!("🪛️ {e}. Using percentage-based delivery commissions.");
                    DeliveryCommissionMode::Percentage
                })
            })
            .unwrap_or_default();
        Self {
            default_commission_rate: rate(DEFAULT_COMMISSION_RATE_KEY),
            default_delivery_commission_rate: rate(DEFAULT_DELIVERY_COMMISSION_RATE_KEY),
            delivery_commission_mode,
            delivery_rate_per_km: rate(DELIVERY_RATE_PER_KM_KEY),
        }
    }
}

/// Read-only access to the system-wide commission settings.
///
/// Missing settings are not an error. Implementations only fail when the underlying store cannot be read.
#[allow(async_fn_in_trait)]
pub trait SettingsProvider: Clone {
    async fn commission_settings(&self) -> Result<CommissionSettings, MarketplaceError>;
}

/// A fixed set of settings. Useful in tests, or when settings come from somewhere other than the database.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(CommissionSettings);

impl StaticSettings {
    pub fn new(settings: CommissionSettings) -> Self {
        Self(settings)
    }
}

impl SettingsProvider for StaticSettings {
    async fn commission_settings(&self) -> Result<CommissionSettings, MarketplaceError> {
        Ok(self.0.clone())
    }
}
