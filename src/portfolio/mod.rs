//! Portfolio module - raw records, portfolio documents and their canonical form

pub mod document;
pub mod model;
pub mod normalizer;
pub mod raw;

pub use document::{JsonFileSource, PortfolioDocument};
pub use model::{ContractKey, EquityLot, LegId, OptionLeg, Portfolio, UnderlyingGroup};
pub use normalizer::{canonical_symbol, normalize, DEFAULT_MULTIPLIER, MAX_SHARE_EQUIVALENT};
pub use raw::RawPosition;
