//! Side-effect free trade simulation

use rust_decimal::Decimal;

use super::types::{Instrument, TradeAction, TradeProposal};
use crate::portfolio::Portfolio;

/// Portfolio as it would look after `proposal` executed
///
/// The input snapshot is never modified. Closing more than a leg holds
/// only flattens the leg; closing a contract that is not held is a no-op.
pub fn apply_trade(portfolio: &Portfolio, proposal: &TradeProposal) -> Portfolio {
    let quantity = proposal.quantity.abs();
    match (&proposal.instrument, proposal.action) {
        (Instrument::Equity, TradeAction::Buy | TradeAction::Open) => {
            portfolio.with_equity_delta(&proposal.underlying, quantity)
        }
        (Instrument::Equity, TradeAction::Sell) => {
            portfolio.with_equity_delta(&proposal.underlying, -quantity)
        }
        (Instrument::Equity, TradeAction::Close) => {
            let held = portfolio
                .group(&proposal.underlying)
                .map(|g| g.equity_quantity())
                .unwrap_or_default();
            portfolio.with_equity_delta(&proposal.underlying, towards_zero(held, quantity))
        }
        (Instrument::Option { contract }, TradeAction::Buy | TradeAction::Open) => {
            portfolio.with_contract_delta(contract, quantity)
        }
        (Instrument::Option { contract }, TradeAction::Sell) => {
            portfolio.with_contract_delta(contract, -quantity)
        }
        (Instrument::Option { contract }, TradeAction::Close) => match portfolio.find_contract(contract) {
            Some(leg) => portfolio.with_contract_delta(contract, towards_zero(leg.quantity, quantity)),
            None => portfolio.clone(),
        },
    }
}

/// Signed delta that moves `held` towards zero by at most `amount`
fn towards_zero(held: Decimal, amount: Decimal) -> Decimal {
    let amount = amount.min(held.abs());
    if held.is_sign_negative() {
        amount
    } else {
        -amount
    }
}
