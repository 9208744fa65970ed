use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mkt_common::{Distance, Money, Rate};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub i64);

impl From<i64> for OrderId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been placed at checkout.
    Received,
    /// Payment is confirmed and the order waits for the sellers.
    Pending,
    /// The sellers have accepted the order. Stock is reserved from here on.
    Processed,
    Shipped,
    #[sqlx(rename = "Out for Delivery")]
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    /// The customer has the goods. Commissions are settled on entry.
    Delivered,
    Cancelled,
    Rejected,
    Returned,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 9] = [
        OrderStatusType::Received,
        OrderStatusType::Pending,
        OrderStatusType::Processed,
        OrderStatusType::Shipped,
        OrderStatusType::OutForDelivery,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
        OrderStatusType::Rejected,
        OrderStatusType::Returned,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Rejected | Self::Returned)
    }

    /// Statuses in which the order's stock is held as reserved.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, Self::Processed | Self::Shipped | Self::OutForDelivery)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "Received",
            Self::Pending => "Pending",
            Self::Processed => "Processed",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Rejected => "Rejected",
            Self::Returned => "Returned",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        Self::ALL
            .iter()
            .find(|status| status.as_str().to_ascii_lowercase() == normalized)
            .copied()
            .or_else(|| if normalized == "outfordelivery" { Some(Self::OutForDelivery) } else { None })
            .ok_or_else(|| ConversionError(format!("Invalid order status: {s}")))
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Received");
            OrderStatusType::Received
        })
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// The human-readable order number shown to customers
    pub order_number: String,
    pub customer_id: String,
    pub status: OrderStatusType,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub platform_fee: Money,
    pub discount: Money,
    pub total: Money,
    pub delivery_distance: Option<Distance>,
    pub delivery_agent_id: Option<i64>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub customer_id: String,
    pub items: Vec<NewLineItem>,
    pub shipping_fee: Money,
    pub platform_fee: Money,
    pub discount: Money,
    pub delivery_distance: Option<Distance>,
    pub delivery_agent_id: Option<i64>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(order_number: S, customer_id: S) -> Self {
        Self {
            order_number: order_number.into(),
            customer_id: customer_id.into(),
            items: Vec::new(),
            shipping_fee: Money::ZERO,
            platform_fee: Money::ZERO,
            discount: Money::ZERO,
            delivery_distance: None,
            delivery_agent_id: None,
        }
    }

    pub fn with_item(mut self, product_id: i64, quantity: i64, unit_price: Money) -> Self {
        self.items.push(NewLineItem { product_id, quantity, unit_price });
        self
    }

    pub fn with_shipping_fee(mut self, fee: Money) -> Self {
        self.shipping_fee = fee;
        self
    }

    pub fn with_platform_fee(mut self, fee: Money) -> Self {
        self.platform_fee = fee;
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_delivery(mut self, agent_id: i64, distance: Option<Distance>) -> Self {
        self.delivery_agent_id = Some(agent_id);
        self.delivery_distance = distance;
        self
    }

    pub fn subtotal(&self) -> Money {
        self.items.iter().map(NewLineItem::line_total).sum()
    }

    /// `subtotal + shipping + platform fee - discount`, never negative.
    pub fn total(&self) -> Money {
        let total = self.subtotal() + self.shipping_fee + self.platform_fee - self.discount;
        total.max(Money::ZERO)
    }
}

//--------------------------------------       LineItem        ---------------------------------------------------------
/// One seller's contribution to an order. Never modified after the order is placed.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub order_id: OrderId,
    pub seller_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewLineItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------    InventoryRecord    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: i64,
    pub current_stock: i64,
    pub reserved_stock: i64,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Always derived from current and reserved stock, floored at zero.
    pub fn available_stock(&self) -> i64 {
        (self.current_stock - self.reserved_stock).max(0)
    }
}

//--------------------------------------   Catalog objects     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub commission_rate: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<i64>,
    pub commission_rate: Option<Rate>,
}

impl NewCategory {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), parent_id: None, commission_rate: None }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.commission_rate = Some(rate);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub seller_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub seller_id: i64,
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(sku: S, name: S, seller_id: i64) -> Self {
        Self { sku: sku.into(), name: name.into(), category_id: None, seller_id, initial_stock: 0 }
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.initial_stock = stock;
        self
    }
}

//--------------------------------------       PayeeType       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PayeeType {
    Seller,
    DeliveryAgent,
}

impl PayeeType {
    /// What the payee actually earns from a commission record.
    ///
    /// A seller's commission is the platform's cut, so the seller keeps the rest of the order amount. A delivery
    /// agent's commission is the fee paid to them, so it is their earning in full.
    pub fn earning(&self, order_amount: Money, commission_amount: Money) -> Money {
        match self {
            PayeeType::Seller => order_amount - commission_amount,
            PayeeType::DeliveryAgent => commission_amount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayeeType::Seller => "Seller",
            PayeeType::DeliveryAgent => "DeliveryAgent",
        }
    }
}

impl Display for PayeeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayeeType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Seller" => Ok(Self::Seller),
            "DeliveryAgent" => Ok(Self::DeliveryAgent),
            s => Err(ConversionError(format!("Invalid payee type: {s}"))),
        }
    }
}

//--------------------------------------         Payee         ---------------------------------------------------------
/// A seller or delivery agent. `balance` is a cache of the payee's completed wallet transactions.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payee {
    pub id: i64,
    pub payee_type: PayeeType,
    pub name: String,
    pub commission_rate: Option<Rate>,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayee {
    pub name: String,
    pub commission_rate: Option<Rate>,
}

impl NewPayee {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), commission_rate: None }
    }

    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.commission_rate = Some(rate);
        self
    }
}

//--------------------------------------   CommissionStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
}

impl Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionStatus::Pending => write!(f, "Pending"),
            CommissionStatus::Paid => write!(f, "Paid"),
            CommissionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How the commission amount was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommissionBasis {
    /// `order_amount × rate / 100`
    Percentage,
    /// `distance × rate`
    Distance,
}

//--------------------------------------   CommissionRecord    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: i64,
    pub order_id: OrderId,
    /// `None` for the delivery leg of an order
    pub line_item_id: Option<i64>,
    pub payee_id: i64,
    pub payee_type: PayeeType,
    pub basis: CommissionBasis,
    pub order_amount: Money,
    pub distance: Option<Distance>,
    pub commission_rate: Rate,
    pub commission_amount: Money,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommissionRecord {
    pub fn earning(&self) -> Money {
        self.payee_type.earning(self.order_amount, self.commission_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommissionRecord {
    pub order_id: OrderId,
    pub line_item_id: Option<i64>,
    pub payee_id: i64,
    pub payee_type: PayeeType,
    pub basis: CommissionBasis,
    pub order_amount: Money,
    pub distance: Option<Distance>,
    pub commission_rate: Rate,
    pub commission_amount: Money,
}

impl NewCommissionRecord {
    pub fn earning(&self) -> Money {
        self.payee_type.earning(self.order_amount, self.commission_amount)
    }
}

//--------------------------------------   WalletTransaction   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionType {
    Credit,
    Debit,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Credit => write!(f, "Credit"),
            TransactionType::Debit => write!(f, "Debit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// An append-only ledger entry. Reversals are new offsetting entries.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub payee_id: i64,
    pub payee_type: PayeeType,
    /// Signed: credits are positive, debits negative
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub description: String,
    pub reference: String,
    pub status: TransactionStatus,
    pub commission_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWalletTransaction {
    pub payee_id: i64,
    pub payee_type: PayeeType,
    pub amount: Money,
    pub transaction_type: TransactionType,
    pub description: String,
    pub reference: String,
    pub commission_id: Option<i64>,
}

//-------------------------------------- SettlementException   ---------------------------------------------------------
/// A line item (or the delivery leg, when `line_item_id` is `None`) that could not be settled. Kept for replay.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SettlementException {
    pub id: i64,
    pub order_id: OrderId,
    pub line_item_id: Option<i64>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

//--------------------------------------  ReconciliationFlag   ---------------------------------------------------------
/// An order whose requested transition could not be applied because its transactional scope was unavailable.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReconciliationFlag {
    pub id: i64,
    pub order_id: OrderId,
    pub requested_status: OrderStatusType,
    pub reason: String,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips_through_display_names() {
        for status in OrderStatusType::ALL {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert_eq!("out_for_delivery".parse::<OrderStatusType>().unwrap(), OrderStatusType::OutForDelivery);
        assert!("Failed".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn earning_asymmetry() {
        let order_amount = Money::from_major(1000);
        let commission = Money::from_major(100);
        assert_eq!(PayeeType::Seller.earning(order_amount, commission), Money::from_major(900));
        assert_eq!(PayeeType::DeliveryAgent.earning(order_amount, commission), Money::from_major(100));
    }

    #[test]
    fn order_totals() {
        let order = NewOrder::new("ORD-1", "alice")
            .with_item(1, 2, Money::from_major(250))
            .with_item(2, 1, Money::from_major(500))
            .with_shipping_fee(Money::from_major(20))
            .with_platform_fee(Money::from_major(5))
            .with_discount(Money::from_major(25));
        assert_eq!(order.subtotal(), Money::from_major(1000));
        assert_eq!(order.total(), Money::from_major(1000));
        let free = NewOrder::new("ORD-2", "bob").with_item(1, 1, Money::from_major(10)).with_discount(Money::from_major(50));
        assert_eq!(free.total(), Money::ZERO);
    }

    #[test]
    fn available_stock_is_floored() {
        let now = Utc::now();
        let record = InventoryRecord { product_id: 1, current_stock: 3, reserved_stock: 5, updated_at: now };
        assert_eq!(record.available_stock(), 0);
        let record = InventoryRecord { product_id: 1, current_stock: 10, reserved_stock: 4, updated_at: now };
        assert_eq!(record.available_stock(), 6);
    }
}
