//! Raw position records as delivered by a position source

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::types::{InstrumentKind, OptionType, PositionSide};

/// A single position record before normalization
///
/// Every field is optional so that a record with a missing field still
/// deserializes and can be rejected with a proper `MalformedPosition`
/// error naming the record. Field aliases accept the screener service
/// payload (`type`, `contracts`, `position`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    /// Caller supplied identifier used in error messages
    #[serde(default, alias = "id")]
    pub record_id: Option<String>,
    /// Instrument identifier, used in error messages when no record id is given
    #[serde(default)]
    pub isin: Option<String>,
    /// Underlying ticker symbol
    #[serde(default)]
    pub symbol: Option<String>,
    /// `equity`, `option`, or one of the unscreened instrument kinds
    #[serde(default, alias = "type")]
    pub instrument_kind: Option<String>,
    /// Shares or contracts; signed unless `position` is given
    #[serde(default, alias = "contracts")]
    pub quantity: Option<Value>,
    /// `long` or `short` for unsigned quantities
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub option_type: Option<String>,
    #[serde(default)]
    pub strike: Option<Value>,
    /// Expiry date in `YYYY-MM-DD` form
    #[serde(default)]
    pub expiry: Option<String>,
    /// Shares per contract, defaults to 100
    #[serde(default)]
    pub multiplier: Option<Value>,
    #[serde(default)]
    pub acquisition_id: Option<String>,
    #[serde(default)]
    pub cio_rating: Option<String>,
}

impl RawPosition {
    /// Create a signed equity record
    pub fn equity(symbol: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            symbol: Some(symbol.into()),
            instrument_kind: Some(InstrumentKind::Equity.to_string()),
            quantity: Some(Value::String(quantity.to_string())),
            ..Default::default()
        }
    }

    /// Create a signed option record (positive = long contracts)
    pub fn option(
        symbol: impl Into<String>,
        option_type: OptionType,
        strike: Decimal,
        expiry: NaiveDate,
        quantity: Decimal,
    ) -> Self {
        Self {
            symbol: Some(symbol.into()),
            instrument_kind: Some(InstrumentKind::Option.to_string()),
            quantity: Some(Value::String(quantity.to_string())),
            option_type: Some(option_type.to_string()),
            strike: Some(Value::String(strike.to_string())),
            expiry: Some(expiry.format("%Y-%m-%d").to_string()),
            ..Default::default()
        }
    }

    pub fn with_record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }

    pub fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = Some(Value::String(multiplier.to_string()));
        self
    }

    pub fn with_side(mut self, side: PositionSide) -> Self {
        self.position = Some(
            match side {
                PositionSide::Long => "long",
                PositionSide::Short => "short",
            }
            .to_string(),
        );
        self
    }

    pub fn with_cio_rating(mut self, rating: impl Into<String>) -> Self {
        self.cio_rating = Some(rating.into());
        self
    }

    pub fn with_acquisition_id(mut self, id: impl Into<String>) -> Self {
        self.acquisition_id = Some(id.into());
        self
    }

    /// Identity used when reporting a malformed record
    pub fn identity(&self, index: usize) -> String {
        self.record_id
            .as_deref()
            .or(self.isin.as_deref())
            .map(|id| format!("`{}`", id))
            .unwrap_or_else(|| format!("#{}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_service_payload() {
        let json = r#"{
            "type": "Option",
            "symbol": "AAPL",
            "option_type": "Call",
            "strike": 170.0,
            "expiry": "2026-12-31",
            "position": "Short",
            "contracts": 5,
            "price_at_purchase": 2.0,
            "market_value": 1250.0,
            "isin": "US0378331005",
            "instrument_currency": "USD"
        }"#;

        let raw: RawPosition = serde_json::from_str(json).unwrap();
        assert_eq!(raw.instrument_kind.as_deref(), Some("Option"));
        assert_eq!(raw.position.as_deref(), Some("Short"));
        assert_eq!(raw.quantity, Some(serde_json::json!(5)));
        assert_eq!(raw.identity(0), "`US0378331005`");
    }

    #[test]
    fn test_identity_falls_back_to_index() {
        let raw = RawPosition::equity("MSFT", dec!(10));
        assert_eq!(raw.identity(7), "#7");
        assert_eq!(raw.with_record_id("lot-1").identity(7), "`lot-1`");
    }
}
