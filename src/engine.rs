//! Screening pipeline
//!
//! `normalize -> classify -> coverage -> suitability -> plan`. Everything
//! up to the plan is the pure [`evaluate`] step, which the planner reuses
//! for its what-if simulations.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{
    compute_coverage, evaluate_suitability, PortfolioCoverage, SuitabilityProfile,
    SuitabilityViolation,
};
use crate::common::digest;
use crate::common::errors::Result;
use crate::common::traits::BoxedAffordabilityCheck;
use crate::config::PlannerSettings;
use crate::planner::{CoverageTargets, RebalancePlan, RebalancePlanner, Unlimited};
use crate::portfolio::{canonical_symbol, normalize, Portfolio, RawPosition};
use crate::strategy::{classify_portfolio, ClassificationResults};

/// Classification, coverage and violations of one portfolio state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub classification: ClassificationResults,
    pub coverage: PortfolioCoverage,
    pub violations: Vec<SuitabilityViolation>,
}

/// Evaluate a canonical portfolio against a profile
pub fn evaluate(portfolio: &Portfolio, profile: &SuitabilityProfile) -> Evaluation {
    let classification = classify_portfolio(portfolio);
    let coverage = compute_coverage(&classification);
    let violations = evaluate_suitability(&classification, profile);
    debug!(
        "Evaluated {} underlying(s): {} violation(s)",
        classification.underlyings.len(),
        violations.len()
    );
    Evaluation {
        classification,
        coverage,
        violations,
    }
}

/// Full screening output for one portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<String>,
    pub classifications: ClassificationResults,
    pub coverage: PortfolioCoverage,
    pub violations: Vec<SuitabilityViolation>,
    pub plan: RebalancePlan,
}

impl AnalysisReport {
    /// SHA-256 hex digest of the report's JSON form
    pub fn fingerprint(&self) -> Result<String> {
        digest::fingerprint(self)
    }

    pub fn is_suitable(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Runs the pipeline with fixed planner settings and a cash collaborator
pub struct Analyzer {
    settings: PlannerSettings,
    affordability: BoxedAffordabilityCheck,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(PlannerSettings::default())
    }
}

impl Analyzer {
    pub fn new(settings: PlannerSettings) -> Self {
        Self {
            settings,
            affordability: Box::new(Unlimited),
        }
    }

    pub fn with_affordability(mut self, check: BoxedAffordabilityCheck) -> Self {
        self.affordability = check;
        self
    }

    /// Normalize raw records and screen them
    pub fn analyze(
        &self,
        records: &[RawPosition],
        profile: &SuitabilityProfile,
        targets: &CoverageTargets,
    ) -> Result<AnalysisReport> {
        let portfolio = normalize(records)?;
        Ok(self.analyze_portfolio(&portfolio, profile, targets))
    }

    /// Screen an already canonical portfolio
    pub fn analyze_portfolio(
        &self,
        portfolio: &Portfolio,
        profile: &SuitabilityProfile,
        targets: &CoverageTargets,
    ) -> AnalysisReport {
        let evaluation = evaluate(portfolio, profile);
        let targets = canonical_targets(targets, portfolio);
        let planner = RebalancePlanner::new(&self.settings, self.affordability.as_ref());
        let plan = planner.plan(portfolio, &evaluation, profile, &targets);

        info!(
            "Analysis complete: {} underlying(s), {} violation(s), {} proposal(s), {} unresolved",
            evaluation.classification.underlyings.len(),
            evaluation.violations.len(),
            plan.proposals.len(),
            plan.unresolved.len()
        );

        AnalysisReport {
            portfolio_id: None,
            classifications: evaluation.classification,
            coverage: evaluation.coverage,
            violations: evaluation.violations,
            plan,
        }
    }
}

/// Re-key targets by canonical symbol
///
/// Targets naming nothing held are logged.
fn canonical_targets(targets: &CoverageTargets, portfolio: &Portfolio) -> CoverageTargets {
    let mut out = CoverageTargets::new();
    for (symbol, target) in targets {
        let symbol = canonical_symbol(symbol);
        if portfolio.group(&symbol).is_none() {
            warn!("Coverage target for {} matches no holding", symbol);
        }
        if let Some(previous) = out.insert(symbol.clone(), *target) {
            if previous != *target {
                warn!(
                    "Conflicting coverage targets for {}: {} replaced by {}",
                    symbol, previous, target
                );
            }
        }
    }
    out
}

/// Screen raw records with default planner settings and no cash limit
pub fn analyze(
    records: &[RawPosition],
    profile: &SuitabilityProfile,
    targets: &CoverageTargets,
) -> Result<AnalysisReport> {
    Analyzer::default().analyze(records, profile, targets)
}

/// Classification only, without a profile
pub fn classify_only(records: &[RawPosition]) -> Result<ClassificationResults> {
    let portfolio = normalize(records)?;
    Ok(classify_portfolio(&portfolio))
}
