//! Canonical portfolio representation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::types::{CioRating, OptionType};

/// Stable identifier of an option leg within one portfolio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegId(pub u32);

impl std::fmt::Display for LegId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Net equity holding in one underlying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquityLot {
    pub symbol: String,
    /// Signed share count, negative = short
    pub quantity: Decimal,
    /// Acquisition identifiers of the merged records, sorted
    #[serde(default)]
    pub acquisition_ids: Vec<String>,
    #[serde(default)]
    pub cio_rating: Option<CioRating>,
}

impl EquityLot {
    /// Shares available to back short calls or be hedged by long puts
    pub fn long_shares(&self) -> Decimal {
        self.quantity.max(Decimal::ZERO)
    }
}

/// Fields that make two option legs the same contract
///
/// Field order gives the canonical ordering: strike, then expiry, then type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractKey {
    pub symbol: String,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub multiplier: Decimal,
}

/// A single option position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub id: LegId,
    pub symbol: String,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub expiry: NaiveDate,
    /// Signed contract count, positive = long
    pub quantity: Decimal,
    /// Shares per contract
    pub multiplier: Decimal,
}

impl OptionLeg {
    pub fn is_short(&self) -> bool {
        self.quantity.is_sign_negative() && !self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.quantity.is_sign_positive() && !self.quantity.is_zero()
    }

    /// Absolute exposure in underlying shares
    pub fn share_equivalent(&self) -> Decimal {
        self.quantity.abs() * self.multiplier
    }

    pub fn contract_key(&self) -> ContractKey {
        ContractKey {
            symbol: self.symbol.clone(),
            strike: self.strike,
            expiry: self.expiry,
            option_type: self.option_type,
            multiplier: self.multiplier,
        }
    }

    /// Canonical sort key used before any greedy matching
    pub fn sort_key(&self) -> (Decimal, NaiveDate, OptionType, Decimal, LegId) {
        (self.strike, self.expiry, self.option_type, self.multiplier, self.id)
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} {} {} x{}",
            self.symbol, self.expiry, self.strike, self.option_type, self.quantity
        )
    }
}

/// Everything held in one underlying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingGroup {
    pub symbol: String,
    pub equity: Option<EquityLot>,
    pub legs: Vec<OptionLeg>,
}

impl UnderlyingGroup {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            equity: None,
            legs: Vec::new(),
        }
    }

    pub fn equity_quantity(&self) -> Decimal {
        self.equity
            .as_ref()
            .map(|lot| lot.quantity)
            .unwrap_or_default()
    }

    pub fn long_equity_shares(&self) -> Decimal {
        self.equity
            .as_ref()
            .map(EquityLot::long_shares)
            .unwrap_or_default()
    }

    pub fn cio_rating(&self) -> Option<CioRating> {
        self.equity.as_ref().and_then(|lot| lot.cio_rating)
    }

    /// Legs in canonical order: strike, expiry, type, multiplier, id
    pub fn canonical_legs(&self) -> Vec<&OptionLeg> {
        let mut legs: Vec<&OptionLeg> = self.legs.iter().collect();
        legs.sort_by_key(|leg| leg.sort_key());
        legs
    }

    fn is_empty(&self) -> bool {
        self.equity.is_none() && self.legs.is_empty()
    }
}

/// Canonical portfolio keyed by underlying symbol
///
/// Groups are kept in a `BTreeMap` so every downstream pass walks the
/// underlyings in the same order. Zero quantities never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    groups: BTreeMap<String, UnderlyingGroup>,
    next_leg_id: u32,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> impl Iterator<Item = &UnderlyingGroup> {
        self.groups.values()
    }

    pub fn group(&self, symbol: &str) -> Option<&UnderlyingGroup> {
        self.groups.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn leg_count(&self) -> usize {
        self.groups.values().map(|g| g.legs.len()).sum()
    }

    /// Find the leg with the given contract terms
    pub fn find_contract(&self, key: &ContractKey) -> Option<&OptionLeg> {
        self.groups
            .get(&key.symbol)
            .and_then(|g| g.legs.iter().find(|leg| leg.contract_key() == *key))
    }

    fn group_mut(&mut self, symbol: &str) -> &mut UnderlyingGroup {
        self.groups
            .entry(symbol.to_string())
            .or_insert_with(|| UnderlyingGroup::new(symbol))
    }

    /// Insert a merged equity lot. Zero quantities are ignored.
    pub(crate) fn insert_equity(&mut self, lot: EquityLot) {
        if lot.quantity.is_zero() {
            return;
        }
        let symbol = lot.symbol.clone();
        self.group_mut(&symbol).equity = Some(lot);
    }

    /// Insert a new leg with the next free id. Zero quantities are ignored.
    pub(crate) fn insert_leg(&mut self, key: ContractKey, quantity: Decimal) -> Option<LegId> {
        if quantity.is_zero() {
            return None;
        }
        let id = LegId(self.next_leg_id);
        self.next_leg_id += 1;
        let leg = OptionLeg {
            id,
            symbol: key.symbol.clone(),
            option_type: key.option_type,
            strike: key.strike,
            expiry: key.expiry,
            quantity,
            multiplier: key.multiplier,
        };
        self.group_mut(&key.symbol).legs.push(leg);
        Some(id)
    }

    /// Copy of this portfolio with `delta` shares added to an underlying
    pub fn with_equity_delta(&self, symbol: &str, delta: Decimal) -> Portfolio {
        let mut next = self.clone();
        let group = next.group_mut(symbol);
        match group.equity.as_mut() {
            Some(lot) => lot.quantity = (lot.quantity + delta).normalize(),
            None => {
                group.equity = Some(EquityLot {
                    symbol: symbol.to_string(),
                    quantity: delta.normalize(),
                    acquisition_ids: Vec::new(),
                    cio_rating: None,
                })
            }
        }
        if group.equity.as_ref().is_some_and(|lot| lot.quantity.is_zero()) {
            group.equity = None;
        }
        next.prune(symbol);
        next
    }

    /// Copy of this portfolio with `delta` contracts added to a contract,
    /// merging into an existing leg or opening a new one
    pub fn with_contract_delta(&self, key: &ContractKey, delta: Decimal) -> Portfolio {
        let mut next = self.clone();
        let existing = next
            .groups
            .get(&key.symbol)
            .and_then(|g| g.legs.iter().position(|leg| leg.contract_key() == *key));
        match existing {
            Some(index) => {
                let group = next.group_mut(&key.symbol);
                let leg = &mut group.legs[index];
                leg.quantity = (leg.quantity + delta).normalize();
            }
            None => {
                next.insert_leg(key.clone(), delta.normalize());
            }
        }
        if let Some(group) = next.groups.get_mut(&key.symbol) {
            group.legs.retain(|leg| !leg.quantity.is_zero());
        }
        next.prune(&key.symbol);
        next
    }

    fn prune(&mut self, symbol: &str) {
        if self.groups.get(symbol).is_some_and(UnderlyingGroup::is_empty) {
            self.groups.remove(symbol);
        }
    }
}
