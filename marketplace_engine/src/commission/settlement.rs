use mkt_common::{Money, MoneyConversionError};
use serde::{Deserialize, Serialize};

use super::{
    calculator::{distance_commission, percentage_commission},
    rates::{DeliveryRate, ResolvedRate},
};
use crate::db_types::{
    CommissionBasis,
    CommissionRecord,
    CommissionStatus,
    LineItem,
    NewCommissionRecord,
    Order,
    PayeeType,
};

/// The commission owed on one line item, charged to the item's seller.
pub fn seller_commission(item: &LineItem, rate: &ResolvedRate) -> Result<NewCommissionRecord, MoneyConversionError> {
    let breakdown = percentage_commission(item.line_total, rate.rate)?;
    Ok(NewCommissionRecord {
        order_id: item.order_id,
        line_item_id: Some(item.id),
        payee_id: item.seller_id,
        payee_type: PayeeType::Seller,
        basis: CommissionBasis::Percentage,
        order_amount: breakdown.base,
        distance: None,
        commission_rate: breakdown.rate,
        commission_amount: breakdown.commission,
    })
}

/// The commission paid to the delivery agent for the delivery leg of `order`.
pub fn delivery_commission(
    order: &Order,
    agent_id: i64,
    rate: &DeliveryRate,
) -> Result<NewCommissionRecord, MoneyConversionError> {
    let (basis, distance, breakdown) = match rate {
        DeliveryRate::Distance { distance, rate } => {
            (CommissionBasis::Distance, Some(*distance), distance_commission(*distance, rate.rate)?)
        },
        DeliveryRate::Percentage { rate } => {
            (CommissionBasis::Percentage, None, percentage_commission(order.subtotal, rate.rate)?)
        },
    };
    Ok(NewCommissionRecord {
        order_id: order.id,
        line_item_id: None,
        payee_id: agent_id,
        payee_type: PayeeType::DeliveryAgent,
        basis,
        order_amount: breakdown.base,
        distance,
        commission_rate: breakdown.rate,
        commission_amount: breakdown.commission,
    })
}

/// Commission ids are never reused, so the reference is globally unique.
pub fn credit_reference(record: &CommissionRecord) -> String {
    format!("CR-{}-{}-{}-{}", record.order_id.value(), record.payee_type, record.payee_id, record.id)
}

pub fn debit_reference(record: &CommissionRecord) -> String {
    format!("DR-{}-{}-{}-{}", record.order_id.value(), record.payee_type, record.payee_id, record.id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsBucket {
    pub count: usize,
    pub commission: Money,
    pub earning: Money,
}

impl EarningsBucket {
    fn add(&mut self, record: &CommissionRecord) {
        self.count += 1;
        self.commission += record.commission_amount;
        self.earning += record.earning();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub payee_id: i64,
    pub payee_type: PayeeType,
    /// Paid and pending records together. Cancelled records are reported on their own.
    pub total: EarningsBucket,
    pub paid: EarningsBucket,
    pub pending: EarningsBucket,
    pub cancelled: EarningsBucket,
}

/// Aggregates a payee's commission records. Records for other payees are ignored.
pub fn summarize_commissions(payee_id: i64, payee_type: PayeeType, records: &[CommissionRecord]) -> CommissionSummary {
    let mut summary = CommissionSummary {
        payee_id,
        payee_type,
        total: EarningsBucket::default(),
        paid: EarningsBucket::default(),
        pending: EarningsBucket::default(),
        cancelled: EarningsBucket::default(),
    };
    for record in records.iter().filter(|r| r.payee_id == payee_id && r.payee_type == payee_type) {
        match record.status {
            CommissionStatus::Paid => {
                summary.paid.add(record);
                summary.total.add(record);
            },
            CommissionStatus::Pending => {
                summary.pending.add(record);
                summary.total.add(record);
            },
            CommissionStatus::Cancelled => summary.cancelled.add(record),
        }
    }
    summary
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use mkt_common::{Distance, Rate};
    use rust_decimal::Decimal;

    use super::*;
    use crate::{commission::RateSource, db_types::OrderId};

    fn record(id: i64, payee_type: PayeeType, amount: i64, commission: i64, status: CommissionStatus) -> CommissionRecord {
        let now = Utc::now();
        CommissionRecord {
            id,
            order_id: OrderId(1),
            line_item_id: Some(id),
            payee_id: 5,
            payee_type,
            basis: CommissionBasis::Percentage,
            order_amount: Money::from_major(amount),
            distance: None,
            commission_rate: Rate::from_percent(10),
            commission_amount: Money::from_major(commission),
            status,
            paid_at: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(42),
            order_number: "ORD-42".into(),
            customer_id: "alice".into(),
            status: crate::db_types::OrderStatusType::OutForDelivery,
            subtotal: Money::from_major(1500),
            shipping_fee: Money::ZERO,
            platform_fee: Money::ZERO,
            discount: Money::ZERO,
            total: Money::from_major(1500),
            delivery_distance: Some(Distance::new(Decimal::new(125, 1))),
            delivery_agent_id: Some(3),
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn seller_summary_subtracts_commission() {
        let records = vec![
            record(1, PayeeType::Seller, 1000, 100, CommissionStatus::Paid),
            record(2, PayeeType::Seller, 500, 50, CommissionStatus::Pending),
            record(3, PayeeType::Seller, 200, 20, CommissionStatus::Cancelled),
            record(4, PayeeType::DeliveryAgent, 1500, 150, CommissionStatus::Paid),
        ];
        let summary = summarize_commissions(5, PayeeType::Seller, &records);
        assert_eq!(summary.total, EarningsBucket { count: 2, commission: Money::from_major(150), earning: Money::from_major(1350) });
        assert_eq!(summary.paid.earning, Money::from_major(900));
        assert_eq!(summary.pending.earning, Money::from_major(450));
        assert_eq!(summary.cancelled.count, 1);
    }

    #[test]
    fn agent_summary_counts_commission_as_earning() {
        let records = vec![
            record(4, PayeeType::DeliveryAgent, 1500, 150, CommissionStatus::Paid),
            record(5, PayeeType::DeliveryAgent, 800, 80, CommissionStatus::Pending),
        ];
        let summary = summarize_commissions(5, PayeeType::DeliveryAgent, &records);
        assert_eq!(summary.total.earning, Money::from_major(230));
        assert_eq!(summary.total.commission, Money::from_major(230));
        assert_eq!(summary.paid.earning, Money::from_major(150));
    }

    #[test]
    fn references_are_distinct_per_commission() {
        let a = record(11, PayeeType::Seller, 10, 1, CommissionStatus::Paid);
        let b = record(12, PayeeType::Seller, 10, 1, CommissionStatus::Paid);
        assert_eq!(credit_reference(&a), "CR-1-Seller-5-11");
        assert_eq!(debit_reference(&a), "DR-1-Seller-5-11");
        assert_ne!(credit_reference(&a), credit_reference(&b));
    }

    #[test]
    fn delivery_leg_by_distance_ignores_subtotal() {
        let rate = DeliveryRate::Distance {
            distance: Distance::new(Decimal::new(125, 1)),
            rate: ResolvedRate::new(Rate::new(Decimal::from(8)), RateSource::SystemSetting),
        };
        let commission = delivery_commission(&order(), 3, &rate).unwrap();
        assert_eq!(commission.basis, CommissionBasis::Distance);
        assert_eq!(commission.commission_amount, Money::from_major(100));
        assert_eq!(commission.earning(), Money::from_major(100));
        assert_eq!(commission.line_item_id, None);
    }

    #[test]
    fn delivery_leg_by_percentage_uses_subtotal() {
        let rate = DeliveryRate::Percentage { rate: ResolvedRate::new(Rate::from_percent(10), RateSource::BuiltIn) };
        let commission = delivery_commission(&order(), 3, &rate).unwrap();
        assert_eq!(commission.order_amount, Money::from_major(1500));
        assert_eq!(commission.commission_amount, Money::from_major(150));
        assert_eq!(commission.earning(), Money::from_major(150));
    }
}
