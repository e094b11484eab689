use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::portfolio::{ContractKey, LegId};

/// Strategy archetype assigned to a leg portion
///
/// The set is closed: every consumer matches exhaustively so adding a
/// tag forces each stage to decide how to treat it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    Covered,
    Protective,
    ProtectiveExcess,
    Spread,
    Collar,
    Naked,
    Unclassified,
}

impl StrategyTag {
    pub const ALL: [StrategyTag; 7] = [
        StrategyTag::Covered,
        StrategyTag::Protective,
        StrategyTag::ProtectiveExcess,
        StrategyTag::Spread,
        StrategyTag::Collar,
        StrategyTag::Naked,
        StrategyTag::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::Covered => "covered",
            StrategyTag::Protective => "protective",
            StrategyTag::ProtectiveExcess => "protective-excess",
            StrategyTag::Spread => "spread",
            StrategyTag::Collar => "collar",
            StrategyTag::Naked => "naked",
            StrategyTag::Unclassified => "unclassified",
        }
    }

    /// Whether the portion is offset by equity or another leg
    pub fn is_hedged(&self) -> bool {
        match self {
            StrategyTag::Covered
            | StrategyTag::Protective
            | StrategyTag::Spread
            | StrategyTag::Collar => true,
            StrategyTag::ProtectiveExcess | StrategyTag::Naked | StrategyTag::Unclassified => {
                false
            }
        }
    }
}

impl std::fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StrategyTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        StrategyTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == wanted)
            .ok_or_else(|| format!("unknown strategy tag `{}`", s.trim()))
    }
}

/// Shape of a matched pair of opposing legs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairKind {
    /// Same type and expiry, different strikes
    Vertical,
    /// Same type and strike, different expiries
    Calendar,
    /// Same type, strike and expiry both differ
    Diagonal,
    /// Call against put at the same strike and expiry
    Synthetic,
    /// Call against put at different terms
    RiskReversal,
    /// Short call against long put on top of long equity
    Collar,
}

/// Why a leg portion received its tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Long equity shares allocated to this portion
    Equity { shares: Decimal },
    /// Opposing leg this portion was paired with
    Paired {
        counterpart: LegId,
        pair: PairKind,
        shares: Decimal,
    },
    /// Short quantity with nothing offsetting it
    Unhedged,
    /// Long quantity with nothing to protect or pair with
    Unmatched,
}

/// Tag attached to one portion of an option leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub leg_id: LegId,
    pub contract: ContractKey,
    pub tag: StrategyTag,
    /// Signed contracts in this portion, same sign as the leg
    pub contracts: Decimal,
    /// Absolute share-equivalent size of this portion
    pub share_equivalent: Decimal,
    /// Share of the portion backed by equity or a paired leg, 0 to 100
    pub coverage_percent: Decimal,
    pub evidence: Evidence,
}

/// Named multi-leg structure recognised in an underlying
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboKind {
    LongStraddle,
    ShortStraddle,
    LongStrangle,
    ShortStrangle,
    CallVerticalSpread,
    PutVerticalSpread,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCombo {
    pub kind: ComboKind,
    pub underlying: String,
    pub expiry: chrono::NaiveDate,
    pub legs: Vec<LegId>,
    /// Contracts common to every leg of the combo
    pub contracts: Decimal,
}

/// Classification output for one underlying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingClassification {
    pub symbol: String,
    /// Signed equity shares held when classification ran
    pub equity_shares: Decimal,
    pub classifications: Vec<Classification>,
    #[serde(default)]
    pub combos: Vec<OptionCombo>,
    /// Data-integrity findings, e.g. legs no rule could tag
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl UnderlyingClassification {
    pub fn tags(&self) -> BTreeSet<StrategyTag> {
        self.classifications.iter().map(|c| c.tag).collect()
    }

    pub fn share_equivalent(&self, tag: StrategyTag) -> Decimal {
        self.classifications
            .iter()
            .filter(|c| c.tag == tag)
            .map(|c| c.share_equivalent)
            .sum()
    }

    /// Contracts carrying `tag`, absolute
    pub fn contracts(&self, tag: StrategyTag) -> Decimal {
        self.classifications
            .iter()
            .filter(|c| c.tag == tag)
            .map(|c| c.contracts.abs())
            .sum()
    }

    /// Absolute contracts classified per leg
    pub fn contracts_by_leg(&self) -> BTreeMap<LegId, Decimal> {
        let mut totals = BTreeMap::new();
        for c in &self.classifications {
            *totals.entry(c.leg_id).or_insert(Decimal::ZERO) += c.contracts.abs();
        }
        totals
    }

    /// Portions of the given tag, in classification order
    pub fn portions(&self, tag: StrategyTag) -> impl Iterator<Item = &Classification> {
        self.classifications.iter().filter(move |c| c.tag == tag)
    }
}

/// Classification output for a whole portfolio
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResults {
    pub underlyings: BTreeMap<String, UnderlyingClassification>,
}

impl ClassificationResults {
    pub fn get(&self, symbol: &str) -> Option<&UnderlyingClassification> {
        self.underlyings.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnderlyingClassification> {
        self.underlyings.values()
    }

    pub fn total_share_equivalent(&self, tag: StrategyTag) -> Decimal {
        self.iter().map(|u| u.share_equivalent(tag)).sum()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trips_through_str() {
        for tag in StrategyTag::ALL {
            assert_eq!(tag.as_str().parse::<StrategyTag>(), Ok(tag));
        }
        assert_eq!("protective_excess".parse(), Ok(StrategyTag::ProtectiveExcess));
        assert!("straddle".parse::<StrategyTag>().is_err());
    }

    #[test]
    fn test_tag_serializes_kebab_case() {
        let json = serde_json::to_string(&StrategyTag::ProtectiveExcess).unwrap();
        assert_eq!(json, "\"protective-excess\"");
    }

    #[test]
    fn test_naked_is_not_hedged() {
        assert!(!StrategyTag::Naked.is_hedged());
        assert!(StrategyTag::Collar.is_hedged());
    }
}
