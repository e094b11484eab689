//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::NaiveDate;
use hedge_screener::{OptionType, PortfolioDocument, RawPosition, RiskTier};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn june() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 19).unwrap()
}

pub fn september() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 9, 18).unwrap()
}

pub fn call(symbol: &str, strike: Decimal, contracts: Decimal) -> RawPosition {
    RawPosition::option(symbol, OptionType::Call, strike, june(), contracts)
}

pub fn put(symbol: &str, strike: Decimal, contracts: Decimal) -> RawPosition {
    RawPosition::option(symbol, OptionType::Put, strike, june(), contracts)
}

/// Long 50 AAPL, short 1 AAPL call: half covered
pub fn half_covered_call() -> Vec<RawPosition> {
    vec![
        RawPosition::equity("AAPL", dec!(50)).with_record_id("eq-1"),
        call("AAPL", dec!(200), dec!(-1)).with_record_id("opt-1"),
    ]
}

/// A mixed book across several underlyings
pub fn mixed_book() -> Vec<RawPosition> {
    vec![
        RawPosition::equity("AAPL", dec!(150)),
        call("AAPL", dec!(200), dec!(-2)),
        put("AAPL", dec!(170), dec!(1)),
        RawPosition::equity("MSFT", dec!(300)),
        put("MSFT", dec!(380), dec!(4)),
        call("QQQ", dec!(400), dec!(-1)),
        call("QQQ", dec!(420), dec!(1)),
        RawPosition::option("QQQ", OptionType::Put, dec!(380), september(), dec!(-2)),
        call("TSLA", dec!(250), dec!(3)),
        RawPosition {
            symbol: Some("US10Y".to_string()),
            instrument_kind: Some("Bond".to_string()),
            quantity: Some(serde_json::json!(10)),
            ..Default::default()
        },
    ]
}

pub fn document(id: &str, tier: RiskTier, positions: Vec<RawPosition>) -> PortfolioDocument {
    PortfolioDocument::new(id, tier).with_positions(positions)
}

/// Sample service payloads for file-based tests
pub mod payloads {
    pub const BATCH: &str = r#"[
        {
            "portfolio_id": "PF_OK",
            "portfolio_currency": "USD",
            "investment_horizon_years": 5,
            "risk_profile": "Moderate",
            "product_knowledge": ["Equity", "Option"],
            "positions": [
                {"type": "Equity", "symbol": "AAPL", "quantity": 50, "isin": "US0378331005"},
                {"type": "Option", "symbol": "AAPL", "option_type": "Call", "strike": 200.0,
                 "expiry": "2026-06-19", "position": "Short", "contracts": 1}
            ]
        },
        {
            "portfolio_id": "PF_BAD",
            "risk_profile": "Moderate",
            "positions": [
                {"id": "broken", "type": "Option", "symbol": "AAPL", "option_type": "Call",
                 "expiry": "2026-06-19", "contracts": -1}
            ]
        },
        {
            "portfolio_id": "PF_CLEAN",
            "risk_profile": "Conservative",
            "positions": [
                {"type": "Equity", "symbol": "MSFT", "quantity": 200},
                {"type": "Option", "symbol": "MSFT", "option_type": "Put", "strike": 380,
                 "expiry": "2026-06-19", "contracts": 2}
            ]
        }
    ]"#;
}
