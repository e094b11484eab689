//! Unified types used across the screener

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Option contract type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            other => Err(format!("unknown option type `{}`", other)),
        }
    }
}

/// Instrument kind of a raw position record
///
/// Only equities and options take part in classification. The remaining
/// kinds are recognised so that mixed portfolios normalize cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Equity,
    Option,
    Bond,
    Fund,
    FxSpot,
    FxForward,
    FxSwap,
    TimeDeposit,
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InstrumentKind::Equity => "equity",
            InstrumentKind::Option => "option",
            InstrumentKind::Bond => "bond",
            InstrumentKind::Fund => "fund",
            InstrumentKind::FxSpot => "fx_spot",
            InstrumentKind::FxForward => "fx_forward",
            InstrumentKind::FxSwap => "fx_swap",
            InstrumentKind::TimeDeposit => "time_deposit",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for InstrumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "equity" | "stock" => Ok(InstrumentKind::Equity),
            "option" => Ok(InstrumentKind::Option),
            "bond" => Ok(InstrumentKind::Bond),
            "fund" => Ok(InstrumentKind::Fund),
            "fxspot" => Ok(InstrumentKind::FxSpot),
            "fxforward" => Ok(InstrumentKind::FxForward),
            "fxswap" => Ok(InstrumentKind::FxSwap),
            "timedeposit" => Ok(InstrumentKind::TimeDeposit),
            _ => Err(format!("unknown instrument kind `{}`", s.trim())),
        }
    }
}

/// Chief Investment Office recommendation attached to an equity holding
///
/// Ordered from least to most conservative so that `max` picks the
/// most cautious of several ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CioRating {
    Buy,
    Hold,
    Sell,
}

impl CioRating {
    /// The planner never adds to a holding the CIO rates as a sell
    pub fn permits_purchase(&self) -> bool {
        !matches!(self, CioRating::Sell)
    }
}

impl FromStr for CioRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(CioRating::Buy),
            "hold" => Ok(CioRating::Hold),
            "sell" => Ok(CioRating::Sell),
            other => Err(format!("unknown CIO rating `{}`", other)),
        }
    }
}

/// Direction of a position when the quantity is given unsigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl FromStr for PositionSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            other => Err(format!("unknown position side `{}`", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_kind_accepts_original_spellings() {
        assert_eq!("Equity".parse::<InstrumentKind>(), Ok(InstrumentKind::Equity));
        assert_eq!("FXForward".parse::<InstrumentKind>(), Ok(InstrumentKind::FxForward));
        assert_eq!("time_deposit".parse::<InstrumentKind>(), Ok(InstrumentKind::TimeDeposit));
        assert!("Crypto".parse::<InstrumentKind>().is_err());
    }

    #[test]
    fn test_cio_rating_order_is_conservative_last() {
        assert!(CioRating::Sell > CioRating::Hold);
        assert!(CioRating::Hold > CioRating::Buy);
        assert!(!CioRating::Sell.permits_purchase());
        assert!(CioRating::Hold.permits_purchase());
    }

    #[test]
    fn test_option_type_parse_and_display() {
        assert_eq!(" Call ".parse::<OptionType>(), Ok(OptionType::Call));
        assert_eq!("P".parse::<OptionType>(), Ok(OptionType::Put));
        assert_eq!(OptionType::Put.to_string(), "put");
    }
}
