//! Settlement and reversal, written against a single connection.
//!
//! None of these functions commit. The caller runs them inside a transaction so that every commission record and
//! wallet transaction for an order lands together.
use log::*;
use sqlx::SqliteConnection;

use super::{catalog, commissions, orders, reconciliation, wallets};
use crate::{
    commission::{
        credit_reference,
        debit_reference,
        delivery_commission,
        resolve_delivery_rate,
        resolve_seller_rate,
        seller_commission,
    },
    db_types::{
        CommissionRecord,
        LineItem,
        NewCommissionRecord,
        NewWalletTransaction,
        Order,
        PayeeType,
        SettlementException,
        TransactionType,
        WalletTransaction,
    },
    settings::CommissionSettings,
    traits::{MarketplaceError, ReversalOutcome, SettlementOutcome},
};

enum LegResult {
    Settled(CommissionRecord, WalletTransaction),
    Skipped(SettlementException),
}

/// Creates and credits every commission for the order, unless it already has commission records.
pub async fn settle_order(
    order: &Order,
    settings: &CommissionSettings,
    conn: &mut SqliteConnection,
) -> Result<SettlementOutcome, MarketplaceError> {
    let existing = commissions::count_for_order(order.id, conn).await?;
    if existing > 0 {
        debug!("💰️ Order {} already has {existing} commission records. Nothing to settle", order.id);
        return Ok(SettlementOutcome::already_settled());
    }
    let mut outcome = SettlementOutcome::default();
    let items = orders::fetch_line_items(order.id, conn).await?;
    for item in &items {
        let result = settle_line_item(item, settings, conn).await?;
        collect(&mut outcome, result);
    }
    if let Some(agent_id) = order.delivery_agent_id {
        let result = settle_delivery_leg(order, agent_id, settings, conn).await?;
        collect(&mut outcome, result);
    }
    info!(
        "💰️ Order {} settled. {} commissions, {} credited, {} items skipped",
        order.id,
        outcome.commissions.len(),
        outcome.total_credited(),
        outcome.skipped.len()
    );
    Ok(outcome)
}

fn collect(outcome: &mut SettlementOutcome, result: LegResult) {
    match result {
        LegResult::Settled(commission, credit) => {
            outcome.commissions.push(commission);
            outcome.credits.push(credit);
        },
        LegResult::Skipped(exception) => outcome.skipped.push(exception),
    }
}

async fn settle_line_item(
    item: &LineItem,
    settings: &CommissionSettings,
    conn: &mut SqliteConnection,
) -> Result<LegResult, MarketplaceError> {
    let inputs = match catalog::fetch_seller_rate_inputs(item.product_id, item.seller_id, conn).await {
        Ok(inputs) => inputs,
        Err(e) if e.is_not_found() => {
            warn!("💰️ Skipping line item {} on order {}. {e}", item.id, item.order_id);
            let exception = reconciliation::record_exception(item.order_id, Some(item.id), &e.to_string(), conn).await?;
            return Ok(LegResult::Skipped(exception));
        },
        Err(e) => return Err(e),
    };
    let rate = resolve_seller_rate(&inputs, settings);
    trace!("💰️ Line item {} settles at {}% ({:?})", item.id, rate.rate, rate.source);
    let commission = seller_commission(item, &rate)?;
    let (record, credit) = record_and_credit(&commission, conn).await?;
    Ok(LegResult::Settled(record, credit))
}

async fn settle_delivery_leg(
    order: &Order,
    agent_id: i64,
    settings: &CommissionSettings,
    conn: &mut SqliteConnection,
) -> Result<LegResult, MarketplaceError> {
    let agent = match catalog::fetch_payee(PayeeType::DeliveryAgent, agent_id, conn).await? {
        Some(agent) => agent,
        None => {
            let e = MarketplaceError::DeliveryAgentNotFound(agent_id);
            warn!("💰️ Skipping the delivery leg of order {}. {e}", order.id);
            let exception = reconciliation::record_exception(order.id, None, &e.to_string(), conn).await?;
            return Ok(LegResult::Skipped(exception));
        },
    };
    let rate = resolve_delivery_rate(&agent, order.delivery_distance, settings);
    trace!("💰️ Delivery leg of order {} settles with {rate:?}", order.id);
    let commission = delivery_commission(order, agent.id, &rate)?;
    let (record, credit) = record_and_credit(&commission, conn).await?;
    Ok(LegResult::Settled(record, credit))
}

/// Writes the commission record, then the credit for the payee's earning. The record exists before the credit does.
async fn record_and_credit(
    commission: &NewCommissionRecord,
    conn: &mut SqliteConnection,
) -> Result<(CommissionRecord, WalletTransaction), MarketplaceError> {
    let record = commissions::insert_paid_commission(commission, conn).await?;
    let reference = credit_reference(&record);
    let earning = record.earning();
    let credit = NewWalletTransaction {
        payee_id: record.payee_id,
        payee_type: record.payee_type,
        amount: earning,
        transaction_type: TransactionType::Credit,
        description: describe(&record, "Earnings"),
        reference: reference.clone(),
        commission_id: Some(record.id),
    };
    let credit = wallets::append_completed(credit, conn).await?;
    let record = commissions::set_payment_reference(record.id, &reference, conn).await?;
    Ok((record, credit))
}

fn describe(record: &CommissionRecord, what: &str) -> String {
    match record.line_item_id {
        Some(item) => format!("{what} for order {} line item {item}", record.order_id),
        None => format!("{what} for delivering order {}", record.order_id),
    }
}

/// Reverses every `Paid` commission on the order with an offsetting debit of exactly what was credited.
pub async fn reverse_order(order: &Order, conn: &mut SqliteConnection) -> Result<ReversalOutcome, MarketplaceError> {
    let records = commissions::fetch_for_order(order.id, conn).await?;
    let mut outcome = ReversalOutcome::default();
    for record in records {
        let Some(cancelled) = commissions::cancel_paid_commission(record.id, conn).await? else {
            trace!("💰️ Commission {} on order {} is {}. Leaving it alone", record.id, order.id, record.status);
            continue;
        };
        let credited = match wallets::fetch_credit_for_commission(record.id, conn).await? {
            Some(credit) => credit.amount,
            None => {
                warn!("💰️ Commission {} was marked Paid but has no credit. Reversing its computed earning", record.id);
                record.earning()
            },
        };
        let debit = NewWalletTransaction {
            payee_id: record.payee_id,
            payee_type: record.payee_type,
            amount: -credited,
            transaction_type: TransactionType::Debit,
            description: describe(&record, "Reversal of earnings"),
            reference: debit_reference(&record),
            commission_id: Some(record.id),
        };
        let debit = wallets::append_completed(debit, conn).await?;
        outcome.reversed.push(cancelled);
        outcome.debits.push(debit);
    }
    let closed = reconciliation::close_open_exceptions(order.id, conn).await?;
    if closed > 0 {
        info!("💰️ Closed {closed} skipped items on order {} since its settlement is reversed", order.id);
    }
    outcome.exceptions_closed = usize::try_from(closed).unwrap_or(usize::MAX);
    if outcome.is_noop() {
        debug!("💰️ Order {} has no paid commissions to reverse", order.id);
    } else {
        info!(
            "💰️ Reversed {} commissions on order {} ({} debited)",
            outcome.reversed.len(),
            order.id,
            outcome.total_debited()
        );
    }
    Ok(outcome)
}

/// Retries the open settlement exceptions for the order. Exceptions are resolved once their item has a commission.
pub async fn replay_exceptions(
    order: &Order,
    settings: &CommissionSettings,
    conn: &mut SqliteConnection,
) -> Result<SettlementOutcome, MarketplaceError> {
    let exceptions = reconciliation::fetch_exceptions_for_order(order.id, conn).await?;
    let items = orders::fetch_line_items(order.id, conn).await?;
    let mut outcome = SettlementOutcome::default();
    for exception in exceptions.into_iter().filter(|e| e.resolved_at.is_none()) {
        if commissions::exists_for_item(order.id, exception.line_item_id, conn).await? {
            debug!("💰️ Exception {} on order {} was already settled", exception.id, order.id);
            reconciliation::resolve_exception(exception.id, conn).await?;
            continue;
        }
        let result = match exception.line_item_id {
            Some(item_id) => match items.iter().find(|i| i.id == item_id) {
                Some(item) => settle_line_item(item, settings, conn).await?,
                None => {
                    warn!("💰️ Exception {} refers to line item {item_id}, which is not on order {}", exception.id, order.id);
                    continue;
                },
            },
            None => match order.delivery_agent_id {
                Some(agent_id) => settle_delivery_leg(order, agent_id, settings, conn).await?,
                None => {
                    reconciliation::resolve_exception(exception.id, conn).await?;
                    continue;
                },
            },
        };
        if let LegResult::Settled(..) = result {
            reconciliation::resolve_exception(exception.id, conn).await?;
            info!("💰️ Exception {} on order {} has been settled", exception.id, order.id);
        }
        collect(&mut outcome, result);
    }
    Ok(outcome)
}
