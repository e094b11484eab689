//! Analysis module - coverage and suitability over classified positions

pub mod coverage;
pub mod suitability;

pub use coverage::{compute_coverage, coverage_for, CoverageRatio, CoverageReport, PortfolioCoverage};
pub use suitability::{
    evaluate_suitability, RiskTier, SuitabilityProfile, SuitabilityViolation, ViolationKey,
};
