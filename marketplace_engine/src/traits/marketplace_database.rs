use mkt_common::MoneyConversionError;
use sqlx::error::DatabaseError;
use thiserror::Error;

use crate::{
    db_types::{LineItem, NewOrder, Order, OrderId, OrderStatusType, ReconciliationFlag, SettlementException},
    order_status::InvalidTransition,
    settings::CommissionSettings,
    traits::{
        data_objects::{ReversalOutcome, SettlementOutcome, TransitionOutcome},
        InventoryManagement,
        LedgerManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the marketplace engine.
///
/// This behaviour includes:
/// * Placing orders
/// * Applying validated status transitions together with their inventory and ledger side effects
/// * Settling and reversing commissions
/// * Keeping track of work that needs reconciliation
///
/// Backends carry out side effects; they do not decide them. The effect list for a transition comes from
/// [`crate::order_status::plan_transition`], and commission amounts come from [`crate::commission`].
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase: Clone + InventoryManagement + LedgerManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order and its line items in `Received` status, in a single atomic transaction.
    ///
    /// Each line item's seller is taken from its product. Fails with [`MarketplaceError::OrderAlreadyExists`] if the
    /// order number is taken, and with [`MarketplaceError::ProductNotFound`] if a product does not exist.
    async fn place_order(&self, order: NewOrder) -> Result<Order, MarketplaceError>;

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_order_by_number(&self, order_number: &str) -> Result<Option<Order>, MarketplaceError>;

    async fn fetch_line_items(&self, order_id: OrderId) -> Result<Vec<LineItem>, MarketplaceError>;

    /// Moves the order to `requested`, applying every side effect of the transition in the same transaction as the
    /// status write.
    ///
    /// The status write is a compare-and-set against the status the plan was made from. If another writer got there
    /// first, nothing commits and [`MarketplaceError::SettlementUnavailable`] is returned.
    ///
    /// ## Failure modes:
    /// - The order does not exist.
    /// - The transition is not allowed. The error carries the allowed statuses.
    /// - A product has too little stock to reserve.
    /// - The database is contended or unavailable.
    async fn apply_transition(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
        settings: &CommissionSettings,
    ) -> Result<TransitionOutcome, MarketplaceError>;

    /// Creates and credits the commissions for a delivered order.
    ///
    /// This call is idempotent. If the order already has commission records the call does nothing and returns an
    /// outcome with `already_settled` set. Line items whose seller no longer exists are skipped and recorded as
    /// settlement exceptions; the rest of the order still settles.
    ///
    /// The order must be in `Delivered` status. Settlement as part of a transition to `Delivered` happens inside
    /// [`MarketplaceDatabase::apply_transition`].
    async fn settle_on_delivery(
        &self,
        order_id: OrderId,
        settings: &CommissionSettings,
    ) -> Result<SettlementOutcome, MarketplaceError>;

    /// For every `Paid` commission on the order, flips the record to `Cancelled` and appends an offsetting debit to
    /// the payee. Records that are not `Paid` are left untouched. An order with no commissions is a successful no-op.
    async fn reverse_commissions(&self, order_id: OrderId) -> Result<ReversalOutcome, MarketplaceError>;

    /// Settles the line items (and delivery leg) of a delivered order that were previously skipped, and marks their
    /// exceptions as resolved. Items that still cannot be settled stay open.
    async fn replay_skipped_items(
        &self,
        order_id: OrderId,
        settings: &CommissionSettings,
    ) -> Result<SettlementOutcome, MarketplaceError>;

    /// Records that the requested transition for this order could not be applied. Flagging the same order and
    /// status again bumps the attempt count on the open flag.
    async fn flag_for_reconciliation(
        &self,
        order_id: OrderId,
        requested: OrderStatusType,
        reason: &str,
    ) -> Result<ReconciliationFlag, MarketplaceError>;

    async fn resolve_reconciliation_flag(&self, flag_id: i64) -> Result<(), MarketplaceError>;

    async fn open_reconciliation_flags(&self) -> Result<Vec<ReconciliationFlag>, MarketplaceError>;

    async fn open_settlement_exceptions(&self) -> Result<Vec<SettlementException>, MarketplaceError>;

    /// Resolves the open settlement exceptions of an order that will never be settled, such as a returned order.
    /// Returns the number of exceptions closed.
    async fn close_settlement_exceptions(&self, order_id: OrderId) -> Result<usize, MarketplaceError>;

    /// Assigns a delivery agent to the order. Only allowed before the order is delivered.
    async fn assign_delivery_agent(&self, order_id: OrderId, agent_id: i64) -> Result<Order, MarketplaceError>;

    /// Sets the payment reference. This is metadata, so it may be changed in any status.
    async fn set_payment_reference(&self, order_id: OrderId, reference: &str) -> Result<Order, MarketplaceError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), MarketplaceError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The query could not be completed: {0}")]
    QueryError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No order with number {0} exists")]
    OrderNumberNotFound(String),
    #[error("Seller {0} does not exist")]
    SellerNotFound(i64),
    #[error("Delivery agent {0} does not exist")]
    DeliveryAgentNotFound(i64),
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Category {0} does not exist")]
    CategoryNotFound(i64),
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Not enough stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Cannot insert order, since an order with number {0} already exists")]
    OrderAlreadyExists(String),
    #[error("The order is invalid. {0}")]
    InvalidOrder(String),
    #[error("Order {order_id} is {status}. Only delivered orders can be settled")]
    OrderNotSettleable { order_id: OrderId, status: OrderStatusType },
    #[error("Settlement is temporarily unavailable. {0}")]
    SettlementUnavailable(String),
    #[error("Order {order_id} was only partially updated and needs manual reconciliation. {reason}")]
    PartialFailure { order_id: OrderId, reason: String },
    #[error("Could not calculate a commission. {0}")]
    CalculationError(String),
}

impl MarketplaceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::OrderNotFound(_)
                | Self::OrderNumberNotFound(_)
                | Self::SellerNotFound(_)
                | Self::DeliveryAgentNotFound(_)
                | Self::ProductNotFound(_)
                | Self::CategoryNotFound(_)
        )
    }

    /// Errors that might go away if the operation is tried again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SettlementUnavailable(_))
    }
}

/// SQLITE_BUSY and SQLITE_LOCKED, including their extended codes.
fn is_contention(err: &dyn DatabaseError) -> bool {
    let primary_code = err.code().and_then(|c| c.parse::<i32>().ok()).map(|c| c & 0xff);
    matches!(primary_code, Some(5) | Some(6)) || err.message().contains("database is locked")
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => {
                MarketplaceError::SettlementUnavailable("Timed out waiting for a database connection".into())
            },
            sqlx::Error::Database(err) if is_contention(&*err) => {
                MarketplaceError::SettlementUnavailable(err.message().to_string())
            },
            e => MarketplaceError::DatabaseError(e.to_string()),
        }
    }
}

impl From<MoneyConversionError> for MarketplaceError {
    fn from(e: MoneyConversionError) -> Self {
        MarketplaceError::CalculationError(e.to_string())
    }
}
