//! Suitability evaluation against an investor profile
//!
//! Findings are data: every breach is collected into the returned list and
//! nothing here fails.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::common::types::InstrumentKind;
use crate::strategy::{ClassificationResults, StrategyTag};

/// Investor risk appetite, ordered from most to least cautious
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Conservative,
    Moderate,
    Aggressive,
}

impl std::str::FromStr for RiskTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskTier::Conservative),
            "moderate" => Ok(RiskTier::Moderate),
            "aggressive" => Ok(RiskTier::Aggressive),
            other => Err(format!("unknown risk tier `{}`", other)),
        }
    }
}

fn default_product_knowledge() -> BTreeSet<InstrumentKind> {
    [InstrumentKind::Equity, InstrumentKind::Option]
        .into_iter()
        .collect()
}

/// Constraints an investor's portfolio must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuitabilityProfile {
    pub risk_tier: RiskTier,
    pub allowed_classifications: BTreeSet<StrategyTag>,
    /// Maximum naked share-equivalent exposure across the portfolio
    pub max_naked_exposure: Decimal,
    /// Instrument kinds the investor may hold; equity purchases need `equity`
    #[serde(default = "default_product_knowledge")]
    pub product_knowledge: BTreeSet<InstrumentKind>,
}

impl SuitabilityProfile {
    /// Default profile for a risk tier
    ///
    /// - conservative: covered, protective, collar; no naked exposure
    /// - moderate: adds spreads and unpaired long calls; no naked exposure
    /// - aggressive: everything, up to 500 naked share-equivalents
    pub fn for_tier(risk_tier: RiskTier) -> Self {
        use StrategyTag::*;
        let allowed: &[StrategyTag] = match risk_tier {
            RiskTier::Conservative => &[Covered, Protective, ProtectiveExcess, Collar],
            RiskTier::Moderate => &[
                Covered,
                Protective,
                ProtectiveExcess,
                Collar,
                Spread,
                Unclassified,
            ],
            RiskTier::Aggressive => &StrategyTag::ALL,
        };
        let max_naked = match risk_tier {
            RiskTier::Conservative | RiskTier::Moderate => dec!(0),
            RiskTier::Aggressive => dec!(500),
        };
        Self {
            risk_tier,
            allowed_classifications: allowed.iter().copied().collect(),
            max_naked_exposure: max_naked,
            product_knowledge: default_product_knowledge(),
        }
    }

    pub fn with_allowed(mut self, tags: impl IntoIterator<Item = StrategyTag>) -> Self {
        self.allowed_classifications = tags.into_iter().collect();
        self
    }

    pub fn with_max_naked_exposure(mut self, max: Decimal) -> Self {
        self.max_naked_exposure = max;
        self
    }

    pub fn with_product_knowledge(mut self, kinds: impl IntoIterator<Item = InstrumentKind>) -> Self {
        self.product_knowledge = kinds.into_iter().collect();
        self
    }

    pub fn allows(&self, tag: StrategyTag) -> bool {
        self.allowed_classifications.contains(&tag)
    }

    /// Whether the planner may buy shares for this investor
    pub fn allows_equity(&self) -> bool {
        self.product_knowledge.contains(&InstrumentKind::Equity)
    }

    /// Naked exposure limit; zero when naked positions are not allowed at all
    pub fn naked_limit(&self) -> Decimal {
        if self.allows(StrategyTag::Naked) {
            self.max_naked_exposure.max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }
}

/// A suitability breach found in a portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuitabilityViolation {
    /// Total naked exposure above the profile limit
    NakedExposureExceeded {
        total: Decimal,
        limit: Decimal,
        overage: Decimal,
    },
    /// A tag outside the profile's allowed set is present
    DisallowedStrategy {
        underlying: String,
        tag: StrategyTag,
        share_equivalent: Decimal,
    },
}

/// Identity of a violation, independent of its size
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViolationKey {
    NakedExposure,
    Disallowed { underlying: String, tag: StrategyTag },
}

impl SuitabilityViolation {
    pub fn key(&self) -> ViolationKey {
        match self {
            SuitabilityViolation::NakedExposureExceeded { .. } => ViolationKey::NakedExposure,
            SuitabilityViolation::DisallowedStrategy {
                underlying, tag, ..
            } => ViolationKey::Disallowed {
                underlying: underlying.clone(),
                tag: *tag,
            },
        }
    }
}

impl std::fmt::Display for SuitabilityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuitabilityViolation::NakedExposureExceeded {
                total,
                limit,
                overage,
            } => write!(
                f,
                "naked exposure {} exceeds limit {} by {}",
                total, limit, overage
            ),
            SuitabilityViolation::DisallowedStrategy {
                underlying,
                tag,
                share_equivalent,
            } => write!(
                f,
                "{} holds {} share-equivalents tagged {} which the profile does not allow",
                underlying, share_equivalent, tag
            ),
        }
    }
}

/// Check classification results against a profile
///
/// The naked limit breach comes first, followed by disallowed tags in
/// underlying then tag order. Naked portions are only ever reported
/// through the exposure limit.
pub fn evaluate_suitability(
    results: &ClassificationResults,
    profile: &SuitabilityProfile,
) -> Vec<SuitabilityViolation> {
    let mut violations = Vec::new();

    let total = results.total_share_equivalent(StrategyTag::Naked);
    let limit = profile.naked_limit();
    if total > limit {
        violations.push(SuitabilityViolation::NakedExposureExceeded {
            total,
            limit,
            overage: total - limit,
        });
    }

    for underlying in results.iter() {
        for tag in underlying.tags() {
            let reportable = match tag {
                StrategyTag::Naked => false,
                StrategyTag::Covered
                | StrategyTag::Protective
                | StrategyTag::ProtectiveExcess
                | StrategyTag::Spread
                | StrategyTag::Collar
                | StrategyTag::Unclassified => !profile.allows(tag),
            };
            if reportable {
                violations.push(SuitabilityViolation::DisallowedStrategy {
                    underlying: underlying.symbol.clone(),
                    tag,
                    share_equivalent: underlying.share_equivalent(tag),
                });
            }
        }
    }

    debug!(
        "Suitability check for {:?} profile found {} violation(s)",
        profile.risk_tier,
        violations.len()
    );
    violations
}
