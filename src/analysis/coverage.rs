//! Hedge coverage per underlying

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::strategy::{ClassificationResults, Evidence, StrategyTag, UnderlyingClassification};

/// Covered share of short exposure
///
/// There is no numeric ratio without short exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum CoverageRatio {
    NotApplicable,
    Ratio(Decimal),
}

impl CoverageRatio {
    /// Ratio of `covered` to `exposure`, clamped to [0, 1]
    pub fn of(covered: Decimal, exposure: Decimal) -> Self {
        if exposure <= Decimal::ZERO {
            return CoverageRatio::NotApplicable;
        }
        let ratio = (covered / exposure).clamp(Decimal::ZERO, Decimal::ONE);
        CoverageRatio::Ratio(ratio.normalize())
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            CoverageRatio::NotApplicable => None,
            CoverageRatio::Ratio(r) => Some(*r),
        }
    }

    /// True when there is short exposure and its coverage is under `target`
    pub fn falls_short_of(&self, target: Decimal) -> bool {
        self.value().is_some_and(|r| r < target)
    }
}

impl std::fmt::Display for CoverageRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoverageRatio::NotApplicable => write!(f, "n/a"),
            CoverageRatio::Ratio(r) => write!(f, "{}", r),
        }
    }
}

/// Coverage of one underlying's short option exposure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub underlying: String,
    /// Share-equivalent of all short legs
    pub short_exposure: Decimal,
    /// Equity shares allocated to covered calls
    pub covered_shares: Decimal,
    /// Share-equivalent tagged naked
    pub naked_shares: Decimal,
    pub ratio: CoverageRatio,
}

/// Coverage across the portfolio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioCoverage {
    pub reports: BTreeMap<String, CoverageReport>,
    pub total_exposure: Decimal,
    pub total_covered: Decimal,
    /// Exposure-weighted average over underlyings with short exposure
    pub aggregate: Option<CoverageRatio>,
}

impl PortfolioCoverage {
    pub fn get(&self, underlying: &str) -> Option<&CoverageReport> {
        self.reports.get(underlying)
    }
}

/// Coverage report for one classified underlying
pub fn coverage_for(classified: &UnderlyingClassification) -> CoverageReport {
    let mut short_exposure = Decimal::ZERO;
    let mut covered_shares = Decimal::ZERO;

    for c in &classified.classifications {
        if c.contracts.is_sign_negative() {
            short_exposure += c.share_equivalent;
        }
        if let (StrategyTag::Covered, Evidence::Equity { shares }) = (c.tag, &c.evidence) {
            covered_shares += *shares;
        }
    }

    CoverageReport {
        underlying: classified.symbol.clone(),
        short_exposure,
        covered_shares,
        naked_shares: classified.share_equivalent(StrategyTag::Naked),
        ratio: CoverageRatio::of(covered_shares, short_exposure),
    }
}

/// Coverage for every underlying plus the exposure-weighted aggregate
pub fn compute_coverage(results: &ClassificationResults) -> PortfolioCoverage {
    let reports: BTreeMap<String, CoverageReport> = results
        .iter()
        .map(|u| (u.symbol.clone(), coverage_for(u)))
        .collect();

    let mut total_exposure = Decimal::ZERO;
    let mut weighted = Decimal::ZERO;
    let mut total_covered = Decimal::ZERO;
    for report in reports.values() {
        if let CoverageRatio::Ratio(r) = report.ratio {
            total_exposure += report.short_exposure;
            total_covered += report.covered_shares;
            weighted += r * report.short_exposure;
        }
    }

    let aggregate = if total_exposure > Decimal::ZERO {
        Some(CoverageRatio::of(weighted, total_exposure))
    } else {
        None
    };

    PortfolioCoverage {
        reports,
        total_exposure,
        total_covered,
        aggregate,
    }
}
