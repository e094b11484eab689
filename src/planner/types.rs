use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::{CoverageRatio, SuitabilityViolation, ViolationKey};
use crate::portfolio::ContractKey;
use crate::strategy::StrategyTag;

/// Target coverage ratio per underlying
pub type CoverageTargets = BTreeMap<String, Decimal>;

/// What a proposal trades
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    Equity,
    Option { contract: ContractKey },
}

/// Trade direction
///
/// `Open` and `Close` apply to option legs: `Open` buys a new long
/// position, `Close` moves an existing leg towards zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
    Open,
    Close,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
            TradeAction::Open => write!(f, "open"),
            TradeAction::Close => write!(f, "close"),
        }
    }
}

/// Corrective action family, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remedy {
    /// Close or reduce the offending leg
    CloseLeg = 1,
    /// Buy equity so short calls become covered
    BuyEquity = 2,
    /// Open a long option that pairs with the offending leg
    OpenHedge = 3,
}

impl Remedy {
    /// Order among candidates of equal share-equivalent size
    ///
    /// An equity purchase goes ahead of closing the same amount, so a
    /// half-covered call is topped up rather than cut back.
    pub fn tie_rank(&self) -> u8 {
        match self {
            Remedy::BuyEquity => 0,
            Remedy::CloseLeg => 1,
            Remedy::OpenHedge => 2,
        }
    }
}

/// Constraint a proposal addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rationale {
    NakedExposureExceeded,
    DisallowedStrategy { tag: StrategyTag },
    CoverageShortfall { target: Decimal },
}

/// A single proposed adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeProposal {
    /// Position in the plan, starting at 1
    pub step: usize,
    pub underlying: String,
    pub instrument: Instrument,
    pub action: TradeAction,
    /// Shares for equity, contracts for options; always positive
    pub quantity: Decimal,
    /// Absolute size of the trade in underlying shares
    pub share_equivalent: Decimal,
    pub remedy: Remedy,
    pub rationale: Rationale,
}

impl TradeProposal {
    pub fn describe(&self) -> String {
        match &self.instrument {
            Instrument::Equity => format!("{} {} {} shares", self.action, self.quantity, self.underlying),
            Instrument::Option { contract } => format!(
                "{} {} {} {} {} {}",
                self.action,
                self.quantity,
                contract.symbol,
                contract.expiry,
                contract.strike,
                contract.option_type
            ),
        }
    }
}

/// Something the planner tries to fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum PlanIssue {
    Suitability(SuitabilityViolation),
    CoverageShortfall {
        underlying: String,
        target: Decimal,
        actual: CoverageRatio,
    },
}

/// Identity of an issue, independent of its size
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IssueKey {
    Suitability(ViolationKey),
    CoverageShortfall(String),
}

impl PlanIssue {
    pub fn key(&self) -> IssueKey {
        match self {
            PlanIssue::Suitability(v) => IssueKey::Suitability(v.key()),
            PlanIssue::CoverageShortfall { underlying, .. } => {
                IssueKey::CoverageShortfall(underlying.clone())
            }
        }
    }

    pub fn rationale(&self) -> Rationale {
        match self {
            PlanIssue::Suitability(SuitabilityViolation::NakedExposureExceeded { .. }) => {
                Rationale::NakedExposureExceeded
            }
            PlanIssue::Suitability(SuitabilityViolation::DisallowedStrategy { tag, .. }) => {
                Rationale::DisallowedStrategy { tag: *tag }
            }
            PlanIssue::CoverageShortfall { target, .. } => {
                Rationale::CoverageShortfall { target: *target }
            }
        }
    }
}

impl std::fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanIssue::Suitability(v) => write!(f, "{}", v),
            PlanIssue::CoverageShortfall {
                underlying,
                target,
                actual,
            } => write!(
                f,
                "{} coverage {} is below target {}",
                underlying, actual, target
            ),
        }
    }
}

/// An issue the planner could not fix within its search budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedViolation {
    pub issue: PlanIssue,
    pub candidates_tried: usize,
    pub reason: String,
}

/// Ordered trade proposals plus whatever could not be fixed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePlan {
    pub proposals: Vec<TradeProposal>,
    pub unresolved: Vec<UnresolvedViolation>,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty() && self.unresolved.is_empty()
    }

    /// True when every issue found was addressed
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}
