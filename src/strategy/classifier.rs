//! Strategy classifier
//!
//! Rules are applied per underlying in a fixed precedence, each one
//! consuming share-equivalent quantity from the legs it matches:
//!
//! 1. short calls are covered by long equity
//! 2. long puts protect long equity
//! 3. leftover legs are paired greedily, same type first, then call
//!    against put (collar when long equity is held)
//! 4. leftover short quantity is naked, leftover long puts are
//!    protective-excess, leftover long calls are unclassified
//!
//! Legs are visited in canonical order (strike, expiry, type,
//! multiplier, id) so the outcome never depends on input order.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::combos::detect_combos;
use super::types::{
    Classification, ClassificationResults, Evidence, PairKind, StrategyTag,
    UnderlyingClassification,
};
use crate::common::types::OptionType;
use crate::portfolio::{OptionLeg, Portfolio, UnderlyingGroup};

/// Unclassified quantity of one leg while the rules run
struct LegState<'a> {
    leg: &'a OptionLeg,
    shares: Decimal,
    contracts: Decimal,
}

impl<'a> LegState<'a> {
    fn new(leg: &'a OptionLeg) -> Self {
        Self {
            leg,
            shares: leg.share_equivalent(),
            contracts: leg.quantity.abs(),
        }
    }

    fn is_open(&self) -> bool {
        self.shares > Decimal::ZERO
    }

    fn is_short(&self) -> bool {
        self.leg.is_short()
    }

    /// Consume up to `shares` and return the classified portion
    ///
    /// The final portion of a leg takes the exact remaining contracts so
    /// portions always add back up to the leg quantity.
    fn take(&mut self, shares: Decimal) -> (Decimal, Decimal) {
        let shares = shares.min(self.shares);
        let contracts = if shares == self.shares {
            self.contracts
        } else {
            shares / self.leg.multiplier
        };
        self.shares -= shares;
        self.contracts -= contracts;
        let signed = if self.leg.is_short() {
            -contracts
        } else {
            contracts
        };
        (signed.normalize(), shares.normalize())
    }
}

/// Classify every underlying in the portfolio
pub fn classify_portfolio(portfolio: &Portfolio) -> ClassificationResults {
    let underlyings = portfolio
        .groups()
        .map(|group| (group.symbol.clone(), classify_group(group)))
        .collect();
    ClassificationResults { underlyings }
}

/// Classify the legs of a single underlying
pub fn classify_group(group: &UnderlyingGroup) -> UnderlyingClassification {
    let mut states: Vec<LegState> = group.canonical_legs().into_iter().map(LegState::new).collect();
    let mut out = Vec::new();
    let mut warnings = Vec::new();
    let long_equity = group.long_equity_shares();

    // 1. covered calls
    let mut call_budget = long_equity;
    for state in states
        .iter_mut()
        .filter(|s| s.is_short() && s.leg.option_type == OptionType::Call)
    {
        if call_budget.is_zero() {
            break;
        }
        let (contracts, shares) = state.take(call_budget);
        call_budget -= shares;
        debug!("{} covered by {} shares", state.leg.describe(), shares);
        out.push(portion(
            state.leg,
            StrategyTag::Covered,
            contracts,
            shares,
            Evidence::Equity { shares },
        ));
    }

    // 2. protective puts
    let mut put_budget = long_equity;
    for state in states
        .iter_mut()
        .filter(|s| !s.is_short() && s.leg.option_type == OptionType::Put)
    {
        if put_budget.is_zero() {
            break;
        }
        let (contracts, shares) = state.take(put_budget);
        put_budget -= shares;
        debug!("{} protects {} shares", state.leg.describe(), shares);
        out.push(portion(
            state.leg,
            StrategyTag::Protective,
            contracts,
            shares,
            Evidence::Equity { shares },
        ));
    }

    // 3. spreads, then collars and cross-type pairs
    pair_legs(&mut states, &mut out, long_equity > Decimal::ZERO, true);
    pair_legs(&mut states, &mut out, long_equity > Decimal::ZERO, false);

    // 4. whatever is left
    for state in states.iter_mut().filter(|s| s.is_open()) {
        let leg = state.leg;
        let shares = state.shares;
        let (contracts, shares) = state.take(shares);
        let (tag, evidence) = match (leg.is_short(), leg.option_type) {
            (true, _) => (StrategyTag::Naked, Evidence::Unhedged),
            (false, OptionType::Put) => (StrategyTag::ProtectiveExcess, Evidence::Unmatched),
            (false, OptionType::Call) => {
                let message = format!(
                    "{} has no equity offset or pairing; left unclassified",
                    leg.describe()
                );
                warn!("{}", message);
                warnings.push(message);
                (StrategyTag::Unclassified, Evidence::Unmatched)
            }
        };
        debug!("{} tagged {} for {} shares", leg.describe(), tag, shares);
        out.push(portion(leg, tag, contracts, shares, evidence));
    }

    UnderlyingClassification {
        symbol: group.symbol.clone(),
        equity_shares: group.equity_quantity(),
        classifications: out,
        combos: detect_combos(group),
        warnings,
    }
}

/// Greedily pair open legs of opposite sign
///
/// With `same_type` set only call/call and put/put pairs are formed,
/// otherwise only call/put pairs.
fn pair_legs(
    states: &mut [LegState],
    out: &mut Vec<Classification>,
    has_long_equity: bool,
    same_type: bool,
) {
    for i in 0..states.len() {
        for j in (i + 1)..states.len() {
            if !states[i].is_open() {
                break;
            }
            if !states[j].is_open() || states[i].is_short() == states[j].is_short() {
                continue;
            }
            let (a, b) = (states[i].leg, states[j].leg);
            if (a.option_type == b.option_type) != same_type {
                continue;
            }

            let Some(pair) = pair_kind(a, b, has_long_equity) else {
                debug!(
                    "{} and {} differ only in multiplier, not paired",
                    a.describe(),
                    b.describe()
                );
                continue;
            };
            let tag = match pair {
                PairKind::Collar => StrategyTag::Collar,
                PairKind::Vertical
                | PairKind::Calendar
                | PairKind::Diagonal
                | PairKind::Synthetic
                | PairKind::RiskReversal => StrategyTag::Spread,
            };

            let matched = states[i].shares.min(states[j].shares);
            let (contracts_a, shares) = states[i].take(matched);
            let (contracts_b, _) = states[j].take(matched);
            debug!(
                "Paired {} with {} as {:?} for {} shares",
                a.describe(),
                b.describe(),
                pair,
                shares
            );

            out.push(portion(
                a,
                tag,
                contracts_a,
                shares,
                Evidence::Paired {
                    counterpart: b.id,
                    pair,
                    shares,
                },
            ));
            out.push(portion(
                b,
                tag,
                contracts_b,
                shares,
                Evidence::Paired {
                    counterpart: a.id,
                    pair,
                    shares,
                },
            ));
        }
    }
}

/// Shape of an opposite-sign pair; `None` when both legs share type,
/// strike and expiry, which is no spread
fn pair_kind(a: &OptionLeg, b: &OptionLeg, has_long_equity: bool) -> Option<PairKind> {
    let same_strike = a.strike == b.strike;
    let same_expiry = a.expiry == b.expiry;

    if a.option_type == b.option_type {
        return match (same_strike, same_expiry) {
            (false, true) => Some(PairKind::Vertical),
            (true, false) => Some(PairKind::Calendar),
            (false, false) => Some(PairKind::Diagonal),
            (true, true) => None,
        };
    }

    let (call, put) = if a.option_type == OptionType::Call {
        (a, b)
    } else {
        (b, a)
    };
    Some(if has_long_equity && call.is_short() && put.is_long() {
        PairKind::Collar
    } else if same_strike && same_expiry {
        PairKind::Synthetic
    } else {
        PairKind::RiskReversal
    })
}

fn portion(
    leg: &OptionLeg,
    tag: StrategyTag,
    contracts: Decimal,
    shares: Decimal,
    evidence: Evidence,
) -> Classification {
    Classification {
        leg_id: leg.id,
        contract: leg.contract_key(),
        tag,
        contracts,
        share_equivalent: shares,
        coverage_percent: if tag.is_hedged() {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        },
        evidence,
    }
}
