//! Strategy module - classification of option legs
//!
//! # Components
//!
//! - [`classify_portfolio`]: tags every leg portion with a [`StrategyTag`]
//! - [`detect_combos`]: names straddles, strangles and vertical spreads
//! - [`ClassificationResults`]: per-underlying output consumed by the
//!   coverage, suitability and planning stages

mod classifier;
mod combos;
mod types;

pub use classifier::{classify_group, classify_portfolio};
pub use combos::detect_combos;
pub use types::{
    Classification, ClassificationResults, ComboKind, Evidence, OptionCombo, PairKind,
    StrategyTag, UnderlyingClassification,
};
