//! Rebalance planner
//!
//! Works on a private copy of the portfolio. For the first open issue it
//! builds candidate trades from three remedies (close the leg, buy
//! equity, open a hedge leg), orders them by share-equivalent size with
//! [`Remedy::tie_rank`] breaking ties, and accepts the first candidate
//! whose simulated outcome improves the issue without adding a
//! violation. Accepted trades are applied to the copy and the loop starts
//! over until nothing is left to fix or the step budget runs out.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use super::simulate::apply_trade;
use super::types::{
    CoverageTargets, Instrument, PlanIssue, Rationale, RebalancePlan, Remedy, TradeAction,
    TradeProposal, UnresolvedViolation,
};
use crate::analysis::{CoverageReport, SuitabilityProfile, SuitabilityViolation, ViolationKey};
use crate::common::traits::AffordabilityCheck;
use crate::common::types::OptionType;
use crate::config::PlannerSettings;
use crate::engine::{evaluate, Evaluation};
use crate::portfolio::{ContractKey, LegId, Portfolio};
use crate::strategy::{Classification, StrategyTag};

enum Resolution {
    Accepted {
        proposal: TradeProposal,
        portfolio: Portfolio,
        evaluation: Evaluation,
    },
    Exhausted {
        tried: usize,
    },
}

/// Produces a [`RebalancePlan`] for one portfolio
pub struct RebalancePlanner<'a> {
    settings: &'a PlannerSettings,
    affordability: &'a dyn AffordabilityCheck,
}

impl<'a> RebalancePlanner<'a> {
    pub fn new(settings: &'a PlannerSettings, affordability: &'a dyn AffordabilityCheck) -> Self {
        Self {
            settings,
            affordability,
        }
    }

    /// Plan trades that move `portfolio` towards suitability and its targets
    ///
    /// `initial` must be the evaluation of `portfolio` under `profile`.
    pub fn plan(
        &self,
        portfolio: &Portfolio,
        initial: &Evaluation,
        profile: &SuitabilityProfile,
        targets: &CoverageTargets,
    ) -> RebalancePlan {
        let mut working = portfolio.clone();
        let mut state = initial.clone();
        let mut proposals: Vec<TradeProposal> = Vec::new();
        let mut unresolved = Vec::new();
        let mut abandoned = BTreeSet::new();

        loop {
            let mut pending: Vec<PlanIssue> = self
                .issues(&state, targets)
                .into_iter()
                .filter(|issue| !abandoned.contains(&issue.key()))
                .collect();
            if pending.is_empty() {
                break;
            }
            if proposals.len() >= self.settings.max_plan_steps {
                warn!(
                    "Plan step budget of {} exhausted with {} issue(s) open",
                    self.settings.max_plan_steps,
                    pending.len()
                );
                unresolved.extend(pending.into_iter().map(|issue| UnresolvedViolation {
                    issue,
                    candidates_tried: 0,
                    reason: "plan step budget exhausted".to_string(),
                }));
                break;
            }

            let issue = pending.remove(0);
            match self.resolve(&working, &state, &issue, profile, &proposals) {
                Resolution::Accepted {
                    mut proposal,
                    portfolio,
                    evaluation,
                } => {
                    proposal.step = proposals.len() + 1;
                    info!("Step {}: {} ({})", proposal.step, proposal.describe(), issue);
                    proposals.push(proposal);
                    working = portfolio;
                    state = evaluation;
                }
                Resolution::Exhausted { tried } => {
                    warn!("Unresolved after {} candidate(s): {}", tried, issue);
                    abandoned.insert(issue.key());
                    unresolved.push(UnresolvedViolation {
                        issue,
                        candidates_tried: tried,
                        reason: if tried == 0 {
                            "no corrective action available".to_string()
                        } else {
                            "no candidate improved the issue without adding a violation"
                                .to_string()
                        },
                    });
                }
            }
        }

        RebalancePlan {
            proposals,
            unresolved,
        }
    }

    /// Open issues: suitability violations first, then coverage shortfalls
    fn issues(&self, state: &Evaluation, targets: &CoverageTargets) -> Vec<PlanIssue> {
        let mut issues: Vec<PlanIssue> = state
            .violations
            .iter()
            .cloned()
            .map(PlanIssue::Suitability)
            .collect();

        for report in state.coverage.reports.values() {
            let Some(target) = targets
                .get(&report.underlying)
                .copied()
                .or(self.settings.default_target_coverage)
            else {
                continue;
            };
            let target = target.clamp(Decimal::ZERO, Decimal::ONE);
            if report.ratio.falls_short_of(target) {
                issues.push(PlanIssue::CoverageShortfall {
                    underlying: report.underlying.clone(),
                    target,
                    actual: report.ratio,
                });
            }
        }

        issues
    }

    /// Size of an issue in share-equivalents; zero means resolved
    fn gap(&self, issue: &PlanIssue, state: &Evaluation) -> Decimal {
        match issue {
            PlanIssue::Suitability(SuitabilityViolation::NakedExposureExceeded { .. }) => state
                .classification
                .total_share_equivalent(StrategyTag::Naked),
            PlanIssue::Suitability(SuitabilityViolation::DisallowedStrategy {
                underlying,
                tag,
                ..
            }) => state
                .classification
                .get(underlying)
                .map(|u| u.share_equivalent(*tag))
                .unwrap_or_default(),
            PlanIssue::CoverageShortfall {
                underlying, target, ..
            } => state
                .coverage
                .get(underlying)
                .map(|report| shortfall_shares(report, *target))
                .unwrap_or_default(),
        }
    }

    fn resolve(
        &self,
        working: &Portfolio,
        state: &Evaluation,
        issue: &PlanIssue,
        profile: &SuitabilityProfile,
        committed: &[TradeProposal],
    ) -> Resolution {
        let mut candidates = self.candidates(working, state, issue, profile, committed);
        // stable: equal sizes keep generation order within a remedy
        candidates.sort_by(|a, b| {
            a.share_equivalent
                .cmp(&b.share_equivalent)
                .then(a.remedy.tie_rank().cmp(&b.remedy.tie_rank()))
        });

        let before_gap = self.gap(issue, state);
        let before: BTreeSet<ViolationKey> = state.violations.iter().map(|v| v.key()).collect();
        let mut tried = 0;

        for candidate in candidates
            .into_iter()
            .take(self.settings.max_candidates_per_violation)
        {
            tried += 1;
            let simulated = apply_trade(working, &candidate);
            let evaluation = evaluate(&simulated, profile);

            if let Some(added) = evaluation
                .violations
                .iter()
                .find(|v| !before.contains(&v.key()))
            {
                debug!("Rejected {}: would add {}", candidate.describe(), added);
                continue;
            }

            let after_gap = self.gap(issue, &evaluation);
            if after_gap >= before_gap {
                debug!(
                    "Rejected {}: gap {} does not improve on {}",
                    candidate.describe(),
                    after_gap,
                    before_gap
                );
                continue;
            }

            return Resolution::Accepted {
                proposal: candidate,
                portfolio: simulated,
                evaluation,
            };
        }

        Resolution::Exhausted { tried }
    }

    fn candidates(
        &self,
        working: &Portfolio,
        state: &Evaluation,
        issue: &PlanIssue,
        profile: &SuitabilityProfile,
        committed: &[TradeProposal],
    ) -> Vec<TradeProposal> {
        let rationale = issue.rationale();
        let mut out: Vec<TradeProposal> = Vec::new();

        match issue {
            PlanIssue::Suitability(SuitabilityViolation::NakedExposureExceeded {
                overage, ..
            }) => {
                for underlying in state.classification.iter() {
                    for portion in underlying.portions(StrategyTag::Naked) {
                        let need = portion.share_equivalent.min(*overage);
                        let equity = match portion.contract.option_type {
                            OptionType::Call => self.buy_equity(
                                working,
                                &underlying.symbol,
                                need,
                                profile,
                                committed,
                                &rationale,
                            ),
                            OptionType::Put => None,
                        };
                        let hedge = match equity {
                            Some(_) => None,
                            None => self.open_hedge(&portion.contract, need, committed, &rationale),
                        };
                        push_unique(&mut out, self.close_leg(working, &portion.contract, need, &rationale));
                        push_unique(&mut out, equity);
                        push_unique(&mut out, hedge);
                    }
                }
            }
            PlanIssue::Suitability(SuitabilityViolation::DisallowedStrategy {
                underlying,
                tag,
                ..
            }) => {
                let Some(classified) = state.classification.get(underlying) else {
                    return out;
                };
                for (contract, shares) in shares_by_leg(classified.portions(*tag)) {
                    let whole_leg = working
                        .find_contract(&contract)
                        .map(|leg| leg.share_equivalent())
                        .unwrap_or_default();
                    push_unique(&mut out, self.close_leg(working, &contract, shares, &rationale));
                    push_unique(&mut out, self.close_leg(working, &contract, whole_leg, &rationale));
                    if *tag == StrategyTag::ProtectiveExcess {
                        push_unique(
                            &mut out,
                            self.buy_equity(working, underlying, shares, profile, committed, &rationale),
                        );
                    }
                }
            }
            PlanIssue::CoverageShortfall {
                underlying, target, ..
            } => {
                let (Some(report), Some(classified)) = (
                    state.coverage.get(underlying),
                    state.classification.get(underlying),
                ) else {
                    return out;
                };

                // exposure to shed so that covered / exposure reaches the target
                let reduction = report
                    .covered_shares
                    .checked_div(*target)
                    .map(|needed| (report.short_exposure - needed).max(Decimal::ZERO))
                    .unwrap_or_default();
                for portion in classified.portions(StrategyTag::Naked) {
                    let need = portion.share_equivalent.min(reduction);
                    push_unique(&mut out, self.close_leg(working, &portion.contract, need, &rationale));
                }

                let uncovered_calls: Decimal = classified
                    .classifications
                    .iter()
                    .filter(|c| {
                        c.contract.option_type == OptionType::Call
                            && c.contracts.is_sign_negative()
                            && c.tag != StrategyTag::Covered
                    })
                    .map(|c| c.share_equivalent)
                    .sum();
                let shares = shortfall_shares(report, *target).min(uncovered_calls);
                push_unique(
                    &mut out,
                    self.buy_equity(working, underlying, shares, profile, committed, &rationale),
                );
            }
        }

        debug!("{} candidate(s) for {}", out.len(), issue);
        out
    }

    /// Remedy 1: reduce a leg by enough contracts to cover `shares`
    fn close_leg(
        &self,
        working: &Portfolio,
        contract: &ContractKey,
        shares: Decimal,
        rationale: &Rationale,
    ) -> Option<TradeProposal> {
        let leg = working.find_contract(contract)?;
        let contracts = self
            .contracts_for(shares, contract.multiplier)
            .min(leg.quantity.abs());
        if contracts <= Decimal::ZERO {
            return None;
        }
        Some(TradeProposal {
            step: 0,
            underlying: contract.symbol.clone(),
            instrument: Instrument::Option {
                contract: contract.clone(),
            },
            action: TradeAction::Close,
            quantity: contracts,
            share_equivalent: (contracts * contract.multiplier).normalize(),
            remedy: Remedy::CloseLeg,
            rationale: rationale.clone(),
        })
    }

    /// Remedy 2: buy enough whole shares to back `shares` of short calls
    ///
    /// Needs equity in the profile's product knowledge, a CIO rating that
    /// is not a sell, and the cash collaborator's approval.
    fn buy_equity(
        &self,
        working: &Portfolio,
        symbol: &str,
        shares: Decimal,
        profile: &SuitabilityProfile,
        committed: &[TradeProposal],
        rationale: &Rationale,
    ) -> Option<TradeProposal> {
        if !profile.allows_equity() {
            debug!("Profile does not allow buying {} shares", symbol);
            return None;
        }
        let group = working.group(symbol);
        if let Some(rating) = group.and_then(|g| g.cio_rating()) {
            if !rating.permits_purchase() {
                debug!("CIO rates {} {:?}, not buying", symbol, rating);
                return None;
            }
        }

        // a short stock position has to be bought back before shares can cover
        let short_shares = group
            .map(|g| (-g.equity_quantity()).max(Decimal::ZERO))
            .unwrap_or_default();
        let quantity = (shares.max(Decimal::ZERO).ceil() + short_shares).normalize();
        if shares <= Decimal::ZERO || quantity.is_zero() {
            return None;
        }

        let proposal = TradeProposal {
            step: 0,
            underlying: symbol.to_string(),
            instrument: Instrument::Equity,
            action: TradeAction::Buy,
            quantity,
            share_equivalent: quantity,
            remedy: Remedy::BuyEquity,
            rationale: rationale.clone(),
        };
        if !self.affordability.can_afford(&proposal, committed) {
            debug!("Cannot afford {}", proposal.describe());
            return None;
        }
        Some(proposal)
    }

    /// Remedy 3: open a long leg of the same type and expiry, struck
    /// further out-of-the-money, that pairs with the naked leg
    fn open_hedge(
        &self,
        naked: &ContractKey,
        shares: Decimal,
        committed: &[TradeProposal],
        rationale: &Rationale,
    ) -> Option<TradeProposal> {
        let offset = self.settings.hedge_strike_offset_pct / Decimal::ONE_HUNDRED;
        let factor = match naked.option_type {
            OptionType::Call => Decimal::ONE + offset,
            OptionType::Put => Decimal::ONE - offset,
        };
        let strike = naked.strike.checked_mul(factor)?.round_dp(2).normalize();
        if strike <= Decimal::ZERO {
            return None;
        }

        let contracts = self.contracts_for(shares, naked.multiplier);
        if contracts <= Decimal::ZERO {
            return None;
        }
        let contract = ContractKey {
            strike,
            ..naked.clone()
        };
        let proposal = TradeProposal {
            step: 0,
            underlying: naked.symbol.clone(),
            instrument: Instrument::Option { contract },
            action: TradeAction::Open,
            quantity: contracts,
            share_equivalent: (contracts * naked.multiplier).normalize(),
            remedy: Remedy::OpenHedge,
            rationale: rationale.clone(),
        };
        if !self.affordability.can_afford(&proposal, committed) {
            debug!("Cannot afford {}", proposal.describe());
            return None;
        }
        Some(proposal)
    }

    fn contracts_for(&self, shares: Decimal, multiplier: Decimal) -> Decimal {
        if shares <= Decimal::ZERO || multiplier <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let contracts = shares / multiplier;
        if self.settings.whole_contracts {
            contracts.ceil()
        } else {
            contracts.normalize()
        }
    }
}

/// Covered shares still missing to reach `target`
fn shortfall_shares(report: &CoverageReport, target: Decimal) -> Decimal {
    (target * report.short_exposure - report.covered_shares).max(Decimal::ZERO)
}

/// Share-equivalents per leg, in first-seen order
fn shares_by_leg<'c>(
    portions: impl Iterator<Item = &'c Classification>,
) -> Vec<(ContractKey, Decimal)> {
    let mut order: Vec<LegId> = Vec::new();
    let mut totals: BTreeMap<LegId, (ContractKey, Decimal)> = BTreeMap::new();
    for portion in portions {
        let entry = totals.entry(portion.leg_id).or_insert_with(|| {
            order.push(portion.leg_id);
            (portion.contract.clone(), Decimal::ZERO)
        });
        entry.1 += portion.share_equivalent;
    }
    order
        .into_iter()
        .filter_map(|id| totals.remove(&id))
        .collect()
}

fn push_unique(out: &mut Vec<TradeProposal>, candidate: Option<TradeProposal>) {
    if let Some(candidate) = candidate {
        let duplicate = out.iter().any(|p| {
            p.instrument == candidate.instrument
                && p.action == candidate.action
                && p.quantity == candidate.quantity
        });
        if !duplicate {
            out.push(candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RiskTier;
    use crate::common::types::InstrumentKind;
    use crate::planner::Unlimited;
    use crate::portfolio::{normalize, RawPosition};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 17).unwrap()
    }

    fn half_covered() -> Portfolio {
        normalize(&[
            RawPosition::equity("AAPL", dec!(50)),
            RawPosition::option("AAPL", OptionType::Call, dec!(200), expiry(), dec!(-1)),
        ])
        .unwrap()
    }

    fn run(
        portfolio: &Portfolio,
        profile: &SuitabilityProfile,
        settings: &PlannerSettings,
        targets: &CoverageTargets,
    ) -> RebalancePlan {
        let initial = evaluate(portfolio, profile);
        RebalancePlanner::new(settings, &Unlimited).plan(portfolio, &initial, profile, targets)
    }

    #[test]
    fn test_buys_shares_when_cheaper_than_closing() {
        let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
        let plan = run(
            &half_covered(),
            &profile,
            &PlannerSettings::default(),
            &CoverageTargets::new(),
        );

        assert!(plan.is_complete());
        assert_eq!(plan.proposals.len(), 1);
        let buy = &plan.proposals[0];
        assert_eq!(buy.step, 1);
        assert_eq!(buy.instrument, Instrument::Equity);
        assert_eq!(buy.action, TradeAction::Buy);
        assert_eq!(buy.quantity, dec!(50));
        assert_eq!(buy.rationale, Rationale::NakedExposureExceeded);
    }

    #[test]
    fn test_closes_whole_contract_without_equity_permission() {
        let profile = SuitabilityProfile::for_tier(RiskTier::Moderate)
            .with_product_knowledge([InstrumentKind::Option]);
        let plan = run(
            &half_covered(),
            &profile,
            &PlannerSettings::default(),
            &CoverageTargets::new(),
        );

        assert_eq!(plan.proposals.len(), 1);
        let close = &plan.proposals[0];
        assert_eq!(close.action, TradeAction::Close);
        assert_eq!(close.remedy, Remedy::CloseLeg);
        assert_eq!(close.quantity, dec!(1));
    }

    #[test]
    fn test_closes_fractional_contract_when_allowed() {
        let profile = SuitabilityProfile::for_tier(RiskTier::Moderate)
            .with_product_knowledge([InstrumentKind::Option]);
        let settings = PlannerSettings {
            whole_contracts: false,
            ..PlannerSettings::default()
        };
        let plan = run(&half_covered(), &profile, &settings, &CoverageTargets::new());
        assert_eq!(plan.proposals[0].action, TradeAction::Close);
        assert_eq!(plan.proposals[0].quantity, dec!(0.5));
    }

    #[test]
    fn test_equal_size_purchase_beats_fractional_close() {
        let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
        let settings = PlannerSettings {
            whole_contracts: false,
            ..PlannerSettings::default()
        };
        let plan = run(&half_covered(), &profile, &settings, &CoverageTargets::new());
        assert_eq!(plan.proposals.len(), 1);
        assert_eq!(plan.proposals[0].remedy, Remedy::BuyEquity);
        assert_eq!(plan.proposals[0].quantity, dec!(50));
    }

    #[test]
    fn test_sell_rated_equity_is_not_bought() {
        let portfolio = normalize(&[
            RawPosition::equity("AAPL", dec!(50)).with_cio_rating("Sell"),
            RawPosition::option("AAPL", OptionType::Call, dec!(200), expiry(), dec!(-1)),
        ])
        .unwrap();
        let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
        let plan = run(
            &portfolio,
            &profile,
            &PlannerSettings::default(),
            &CoverageTargets::new(),
        );
        assert!(plan
            .proposals
            .iter()
            .all(|p| p.instrument != Instrument::Equity));
        assert!(plan.is_complete());
    }

    #[test]
    fn test_naked_put_hedged_with_lower_strike_put() {
        let portfolio = normalize(&[RawPosition::option(
            "TSLA",
            OptionType::Put,
            dec!(200),
            expiry(),
            dec!(-1),
        )])
        .unwrap();
        let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
        let settings = PlannerSettings::default();
        let initial = evaluate(&portfolio, &profile);
        let planner = RebalancePlanner::new(&settings, &Unlimited);
        let issue = PlanIssue::Suitability(initial.violations[0].clone());
        let candidates = planner.candidates(&portfolio, &initial, &issue, &profile, &[]);

        let hedge = candidates
            .iter()
            .find(|c| c.remedy == Remedy::OpenHedge)
            .unwrap();
        match &hedge.instrument {
            Instrument::Option { contract } => {
                assert_eq!(contract.option_type, OptionType::Put);
                assert_eq!(contract.strike, dec!(190));
            }
            Instrument::Equity => panic!("expected an option hedge"),
        }
        assert!(candidates.iter().all(|c| c.remedy != Remedy::BuyEquity));
    }

    #[test]
    fn test_coverage_shortfall_buys_missing_shares() {
        let profile = SuitabilityProfile::for_tier(RiskTier::Aggressive);
        let targets: CoverageTargets = [("AAPL".to_string(), dec!(0.8))].into_iter().collect();
        let plan = run(&half_covered(), &profile, &PlannerSettings::default(), &targets);

        assert_eq!(plan.proposals.len(), 1);
        assert_eq!(plan.proposals[0].quantity, dec!(30));
        assert_eq!(
            plan.proposals[0].rationale,
            Rationale::CoverageShortfall { target: dec!(0.8) }
        );
    }

    #[test]
    fn test_unresolvable_issue_is_reported() {
        // spreads are disallowed and closing either leg would leave the
        // short call naked or tag the long call unclassified
        let portfolio = normalize(&[
            RawPosition::option("QQQ", OptionType::Call, dec!(400), expiry(), dec!(-1)),
            RawPosition::option("QQQ", OptionType::Call, dec!(420), expiry(), dec!(1)),
        ])
        .unwrap();
        let profile = SuitabilityProfile::for_tier(RiskTier::Conservative);
        let plan = run(
            &portfolio,
            &profile,
            &PlannerSettings::default(),
            &CoverageTargets::new(),
        );

        assert!(plan.proposals.is_empty());
        assert_eq!(plan.unresolved.len(), 1);
        assert!(plan.unresolved[0].candidates_tried > 0);
    }

    #[test]
    fn test_candidate_budget_is_respected() {
        let profile = SuitabilityProfile::for_tier(RiskTier::Conservative);
        let settings = PlannerSettings {
            max_candidates_per_violation: 1,
            ..PlannerSettings::default()
        };
        let portfolio = normalize(&[
            RawPosition::option("QQQ", OptionType::Call, dec!(400), expiry(), dec!(-1)),
            RawPosition::option("QQQ", OptionType::Call, dec!(420), expiry(), dec!(1)),
        ])
        .unwrap();
        let plan = run(&portfolio, &profile, &settings, &CoverageTargets::new());
        assert_eq!(plan.unresolved[0].candidates_tried, 1);
    }
}
