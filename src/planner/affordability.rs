//! Affordability checks for planner purchases

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use super::types::{Instrument, TradeAction, TradeProposal};
use crate::common::traits::AffordabilityCheck;
use crate::portfolio::canonical_symbol;

/// Every trade is affordable
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl AffordabilityCheck for Unlimited {
    fn can_afford(&self, _proposal: &TradeProposal, _committed: &[TradeProposal]) -> bool {
        true
    }
}

/// Cash available for equity purchases at known prices
///
/// Only equity purchases draw on the budget; option premiums are not
/// priced by the core. A purchase in a symbol without a price is
/// treated as unaffordable.
#[derive(Debug, Clone, Default)]
pub struct CashBudget {
    pub available_cash: Decimal,
    pub prices: BTreeMap<String, Decimal>,
}

impl CashBudget {
    pub fn new(available_cash: Decimal) -> Self {
        Self {
            available_cash,
            prices: BTreeMap::new(),
        }
    }

    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(canonical_symbol(symbol), price);
        self
    }

    /// Cash drawn by a proposal, `None` when it cannot be priced
    fn cost(&self, proposal: &TradeProposal) -> Option<Decimal> {
        match (&proposal.instrument, proposal.action) {
            (Instrument::Equity, TradeAction::Buy) => self
                .prices
                .get(&proposal.underlying)
                .and_then(|price| price.checked_mul(proposal.quantity)),
            _ => Some(Decimal::ZERO),
        }
    }
}

impl AffordabilityCheck for CashBudget {
    fn can_afford(&self, proposal: &TradeProposal, committed: &[TradeProposal]) -> bool {
        let Some(cost) = self.cost(proposal) else {
            debug!("Cannot price {}, treating it as unaffordable", proposal.describe());
            return false;
        };
        let spent = committed
            .iter()
            .filter_map(|p| self.cost(p))
            .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c));
        let Some(spent) = spent else {
            return false;
        };
        let affordable = spent
            .checked_add(cost)
            .is_some_and(|total| total <= self.available_cash);
        debug!(
            "{} costs {} with {} already committed of {}: {}",
            proposal.describe(),
            cost,
            spent,
            self.available_cash,
            if affordable { "affordable" } else { "unaffordable" }
        );
        affordable
    }
}
