//! Planner module - corrective trades for suitability and coverage
//!
//! # Components
//!
//! - [`RebalancePlanner`]: bounded search over candidate trades
//! - [`apply_trade`]: what-if application of a proposal to a portfolio
//! - [`Unlimited`] / [`CashBudget`]: affordability collaborators

pub mod affordability;
pub mod rebalance;
pub mod simulate;
pub mod types;

pub use affordability::{CashBudget, Unlimited};
pub use rebalance::RebalancePlanner;
pub use simulate::apply_trade;
pub use types::{
    CoverageTargets, Instrument, IssueKey, PlanIssue, Rationale, RebalancePlan, Remedy,
    TradeAction, TradeProposal, UnresolvedViolation,
};
