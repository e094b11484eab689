//! hedge_screener Library
//!
//! Classifies option legs against equity holdings and each other,
//! measures how much short exposure is covered, checks the result against
//! an investor suitability profile and plans trades that fix violations.

pub mod analysis;
pub mod common;
pub mod config;
pub mod engine;
pub mod planner;
pub mod portfolio;
pub mod service;
pub mod strategy;

// Re-export commonly used types
pub use common::errors::{Result, ScreenerError};
pub use common::traits::{AffordabilityCheck, BoxedAffordabilityCheck, PositionSource, ProfileSource};
pub use common::types::{CioRating, InstrumentKind, OptionType, PositionSide};
pub use config::{load_config, load_from_env, AppConfig, AppSettings, PlannerSettings};

// Pipeline
pub use engine::{analyze, classify_only, evaluate, AnalysisReport, Analyzer, Evaluation};
pub use service::{PortfolioOutcome, ScreeningService};

// Domain types
pub use analysis::{
    CoverageRatio, CoverageReport, PortfolioCoverage, RiskTier, SuitabilityProfile,
    SuitabilityViolation,
};
pub use planner::{
    CashBudget, CoverageTargets, Instrument, RebalancePlan, Remedy, TradeAction, TradeProposal,
    Unlimited, UnresolvedViolation,
};
pub use portfolio::{JsonFileSource, Portfolio, PortfolioDocument, RawPosition};
pub use strategy::{ClassificationResults, StrategyTag, UnderlyingClassification};
