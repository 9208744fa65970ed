mod decimal;
pub mod helpers;
mod money;

pub mod op;

pub use decimal::{DecimalConversionError, Distance, Rate};
pub use money::{Money, MoneyConversionError, MONEY_DECIMAL_PLACES};
