//! Integration tests for suitability evaluation and rebalance planning

mod common;

use common::{call, half_covered_call, mixed_book};
use hedge_screener::analysis::ViolationKey;
use hedge_screener::planner::{apply_trade, RebalancePlanner};
use hedge_screener::portfolio::normalize;
use hedge_screener::{
    analyze, evaluate, AffordabilityCheck, Analyzer, CashBudget, CoverageTargets, Instrument,
    InstrumentKind, PlannerSettings, RawPosition, Remedy, RiskTier, StrategyTag,
    SuitabilityProfile, SuitabilityViolation, TradeAction, TradeProposal,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use std::collections::BTreeSet;

mock! {
    pub Budget {}

    impl AffordabilityCheck for Budget {
        fn can_afford(&self, proposal: &TradeProposal, committed: &[TradeProposal]) -> bool;
    }
}

fn no_targets() -> CoverageTargets {
    CoverageTargets::new()
}

#[test]
fn test_conservative_profile_reports_every_violation() {
    let profile = SuitabilityProfile::for_tier(RiskTier::Conservative);
    let portfolio = normalize(&mixed_book()).unwrap();
    let evaluation = evaluate(&portfolio, &profile);

    let keys: Vec<ViolationKey> = evaluation.violations.iter().map(|v| v.key()).collect();
    assert_eq!(
        keys,
        vec![
            ViolationKey::NakedExposure,
            ViolationKey::Disallowed {
                underlying: "QQQ".to_string(),
                tag: StrategyTag::Spread,
            },
            ViolationKey::Disallowed {
                underlying: "TSLA".to_string(),
                tag: StrategyTag::Unclassified,
            },
        ]
    );
}

#[test]
fn test_aggressive_profile_accepts_naked_within_limit() {
    let profile = SuitabilityProfile::for_tier(RiskTier::Aggressive);
    let report = analyze(&mixed_book(), &profile, &no_targets()).unwrap();
    assert!(report.is_suitable());
    assert!(report.plan.is_empty());
}

#[test_log::test]
fn test_moderate_plan_fixes_naked_exposure() {
    let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
    let report = analyze(&mixed_book(), &profile, &no_targets()).unwrap();

    assert_eq!(
        report.violations,
        vec![SuitabilityViolation::NakedExposureExceeded {
            total: dec!(250),
            limit: dec!(0),
            overage: dec!(250),
        }]
    );

    let plan = &report.plan;
    assert!(plan.is_complete());
    assert_eq!(plan.proposals.len(), 2);

    assert_eq!(plan.proposals[0].step, 1);
    assert_eq!(plan.proposals[0].underlying, "AAPL");
    assert_eq!(plan.proposals[0].instrument, Instrument::Equity);
    assert_eq!(plan.proposals[0].quantity, dec!(50));

    assert_eq!(plan.proposals[1].step, 2);
    assert_eq!(plan.proposals[1].underlying, "QQQ");
    assert_eq!(plan.proposals[1].action, TradeAction::Close);
    assert_eq!(plan.proposals[1].quantity, dec!(2));
}

#[test]
fn test_accepted_proposals_never_add_violations() {
    for tier in [RiskTier::Conservative, RiskTier::Moderate, RiskTier::Aggressive] {
        let profile = SuitabilityProfile::for_tier(tier);
        let mut portfolio = normalize(&mixed_book()).unwrap();
        let initial = evaluate(&portfolio, &profile);
        let allowed: BTreeSet<ViolationKey> =
            initial.violations.iter().map(|v| v.key()).collect();

        let settings = PlannerSettings::default();
        let plan = RebalancePlanner::new(&settings, &hedge_screener::Unlimited).plan(
            &portfolio,
            &initial,
            &profile,
            &no_targets(),
        );

        for proposal in &plan.proposals {
            portfolio = apply_trade(&portfolio, proposal);
            let after = evaluate(&portfolio, &profile);
            for violation in &after.violations {
                assert!(
                    allowed.contains(&violation.key()),
                    "{:?}: step {} added {}",
                    tier,
                    proposal.step,
                    violation
                );
            }
        }
    }
}

#[test]
fn test_plan_is_deterministic() {
    let profile = SuitabilityProfile::for_tier(RiskTier::Conservative);
    let first = analyze(&mixed_book(), &profile, &no_targets()).unwrap();
    let second = analyze(&mixed_book(), &profile, &no_targets()).unwrap();
    assert_eq!(first.plan, second.plan);
    assert_eq!(first.fingerprint().unwrap(), second.fingerprint().unwrap());
}

#[test]
fn test_refused_purchase_falls_back_to_closing() {
    let mut budget = MockBudget::new();
    budget
        .expect_can_afford()
        .returning(|proposal, _| proposal.instrument != Instrument::Equity);

    let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
    let report = Analyzer::new(PlannerSettings::default())
        .with_affordability(Box::new(budget))
        .analyze(&half_covered_call(), &profile, &no_targets())
        .unwrap();

    let proposals = &report.plan.proposals;
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].remedy, Remedy::CloseLeg);
    assert_eq!(proposals[0].quantity, dec!(1));
}

#[test]
fn test_affordability_sees_committed_trades() {
    let mut budget = MockBudget::new();
    budget
        .expect_can_afford()
        .withf(|_, committed| committed.len() <= 1)
        .returning(|_, _| true);

    let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
    let report = Analyzer::new(PlannerSettings::default())
        .with_affordability(Box::new(budget))
        .analyze(&mixed_book(), &profile, &no_targets())
        .unwrap();
    assert_eq!(report.plan.proposals.len(), 2);
}

#[test]
fn test_cash_budget_limits_share_purchase() {
    // 50 shares at 180 cost 9000
    let tight = CashBudget::new(dec!(5000)).with_price("AAPL", dec!(180));
    let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
    let report = Analyzer::new(PlannerSettings::default())
        .with_affordability(Box::new(tight))
        .analyze(&half_covered_call(), &profile, &no_targets())
        .unwrap();
    assert_eq!(report.plan.proposals[0].action, TradeAction::Close);

    let ample = CashBudget::new(dec!(10000)).with_price("AAPL", dec!(180));
    let report = Analyzer::new(PlannerSettings::default())
        .with_affordability(Box::new(ample))
        .analyze(&half_covered_call(), &profile, &no_targets())
        .unwrap();
    assert_eq!(report.plan.proposals[0].action, TradeAction::Buy);
}

#[test]
fn test_fractional_close_without_equity_knowledge() {
    let profile = SuitabilityProfile::for_tier(RiskTier::Moderate)
        .with_product_knowledge([InstrumentKind::Option]);
    let settings = PlannerSettings {
        whole_contracts: false,
        ..PlannerSettings::default()
    };
    let records = vec![
        RawPosition::equity("AAPL", dec!(50)),
        call("AAPL", dec!(200), dec!(-1)),
    ];
    let report = Analyzer::new(settings)
        .analyze(&records, &profile, &no_targets())
        .unwrap();

    assert!(report.plan.is_complete());
    let proposal = &report.plan.proposals[0];
    assert_eq!(proposal.remedy, Remedy::CloseLeg);
    assert_eq!(proposal.quantity, dec!(0.5));
    assert_eq!(proposal.share_equivalent, dec!(50));
}

#[test]
fn test_fractional_contracts_still_prefer_buying_shares() {
    let settings = PlannerSettings {
        whole_contracts: false,
        ..PlannerSettings::default()
    };
    let profile = SuitabilityProfile::for_tier(RiskTier::Moderate);
    let report = Analyzer::new(settings)
        .analyze(&half_covered_call(), &profile, &no_targets())
        .unwrap();

    assert!(report.plan.is_complete());
    let proposals = &report.plan.proposals;
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].remedy, Remedy::BuyEquity);
    assert_eq!(proposals[0].instrument, Instrument::Equity);
    assert_eq!(proposals[0].quantity, dec!(50));
}

#[test]
fn test_lower_case_target_is_applied() {
    let profile = SuitabilityProfile::for_tier(RiskTier::Aggressive);
    let targets: CoverageTargets = [("aapl".to_string(), dec!(1))].into_iter().collect();
    let report = analyze(&half_covered_call(), &profile, &targets).unwrap();

    let proposals = &report.plan.proposals;
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].instrument, Instrument::Equity);
    assert_eq!(proposals[0].quantity, dec!(50));
}

#[test]
fn test_default_target_applies_to_every_underlying() {
    let settings = PlannerSettings {
        default_target_coverage: Some(dec!(1)),
        ..PlannerSettings::default()
    };
    let profile = SuitabilityProfile::for_tier(RiskTier::Aggressive);
    let report = Analyzer::new(settings)
        .analyze(&half_covered_call(), &profile, &no_targets())
        .unwrap();

    assert!(report.is_suitable());
    let proposals = &report.plan.proposals;
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].instrument, Instrument::Equity);
    assert_eq!(proposals[0].quantity, dec!(50));
}
