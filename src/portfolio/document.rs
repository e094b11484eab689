//! Portfolio documents and the JSON file source

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::raw::RawPosition;
use crate::analysis::{RiskTier, SuitabilityProfile};
use crate::common::errors::{Result, ScreenerError};
use crate::common::traits::{BoxedAffordabilityCheck, PositionSource, ProfileSource};
use crate::common::types::InstrumentKind;
use crate::planner::{CashBudget, CoverageTargets, Unlimited};

/// One portfolio as submitted for screening
///
/// Fields other than the ones below (currency, horizon, market values)
/// are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDocument {
    pub portfolio_id: String,
    /// `Conservative`, `Moderate` or `Aggressive`
    pub risk_profile: String,
    /// Instrument kinds the client is familiar with; tier default when absent
    #[serde(default)]
    pub product_knowledge: Option<Vec<String>>,
    pub positions: Vec<RawPosition>,
    /// Target coverage ratio per underlying
    #[serde(default)]
    pub targets: CoverageTargets,
    /// Cash the planner may spend on equity; unlimited when absent
    #[serde(default)]
    pub available_cash: Option<Decimal>,
    /// Equity prices used with `available_cash`
    #[serde(default)]
    pub prices: BTreeMap<String, Decimal>,
    /// Explicit profile replacing the tier defaults
    #[serde(default)]
    pub profile: Option<SuitabilityProfile>,
}

impl PortfolioDocument {
    pub fn new(portfolio_id: impl Into<String>, risk_profile: RiskTier) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            risk_profile: format!("{:?}", risk_profile),
            product_knowledge: None,
            positions: Vec::new(),
            targets: CoverageTargets::new(),
            available_cash: None,
            prices: BTreeMap::new(),
            profile: None,
        }
    }

    pub fn with_positions(mut self, positions: Vec<RawPosition>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_target(mut self, symbol: impl Into<String>, target: Decimal) -> Self {
        self.targets.insert(symbol.into(), target);
        self
    }

    pub fn with_cash(mut self, available_cash: Decimal) -> Self {
        self.available_cash = Some(available_cash);
        self
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }

    /// Suitability profile for this document
    ///
    /// An explicit `profile` wins; otherwise the risk tier defaults apply,
    /// narrowed to `product_knowledge` when one is given.
    pub fn resolve_profile(&self) -> Result<SuitabilityProfile> {
        if let Some(profile) = &self.profile {
            return Ok(profile.clone());
        }

        let tier: RiskTier = self.risk_profile.parse().map_err(|e| {
            ScreenerError::Configuration(format!("portfolio {}: {}", self.portfolio_id, e))
        })?;
        let mut profile = SuitabilityProfile::for_tier(tier);

        if let Some(known) = &self.product_knowledge {
            let kinds = known
                .iter()
                .map(|kind| kind.parse::<InstrumentKind>())
                .collect::<std::result::Result<BTreeSet<_>, _>>()
                .map_err(|e| {
                    ScreenerError::Configuration(format!("portfolio {}: {}", self.portfolio_id, e))
                })?;
            profile = profile.with_product_knowledge(kinds);
        }

        Ok(profile)
    }

    /// Cash collaborator for this document
    pub fn affordability(&self) -> BoxedAffordabilityCheck {
        match self.available_cash {
            Some(cash) => Box::new(
                self.prices
                    .iter()
                    .fold(CashBudget::new(cash), |budget, (symbol, price)| {
                        budget.with_price(symbol, *price)
                    }),
            ),
            None => Box::new(Unlimited),
        }
    }
}

/// Input files hold either one document or a list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Many(Vec<PortfolioDocument>),
    One(Box<PortfolioDocument>),
}

/// Reads portfolio documents from a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse documents from JSON text
    pub fn parse(content: &str) -> Result<Vec<PortfolioDocument>> {
        let documents = match serde_json::from_str::<DocumentFile>(content) {
            Ok(DocumentFile::Many(documents)) => documents,
            Ok(DocumentFile::One(document)) => vec![*document],
            // the untagged error hides the cause, so report the single-document one
            Err(_) => vec![serde_json::from_str::<PortfolioDocument>(content)?],
        };
        Ok(documents)
    }
}

#[async_trait]
impl PositionSource for JsonFileSource {
    async fn load_portfolios(&self) -> Result<Vec<PortfolioDocument>> {
        debug!("Reading portfolios from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await?;
        let documents = Self::parse(&content)?;
        info!(
            "Loaded {} portfolio(s) from {}",
            documents.len(),
            self.path.display()
        );
        Ok(documents)
    }

    fn source_name(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[async_trait]
impl ProfileSource for JsonFileSource {
    async fn profile_for(&self, document: &PortfolioDocument) -> Result<SuitabilityProfile> {
        document.resolve_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::AffordabilityCheck;
    use crate::strategy::StrategyTag;
    use rust_decimal_macros::dec;

    const SERVICE_PAYLOAD: &str = r#"{
        "portfolio_id": "PF_001",
        "portfolio_currency": "USD",
        "risk_profile": "Moderate",
        "product_knowledge": ["Option"],
        "positions": [
            {"type": "Equity", "symbol": "AAPL", "quantity": 1000, "cio_rating": "Hold"},
            {"type": "Option", "symbol": "AAPL", "option_type": "Call", "strike": 170.0,
             "expiry": "2026-12-31", "position": "Short", "contracts": 5}
        ]
    }"#;

    #[test]
    fn test_parses_single_service_document() {
        let documents = JsonFileSource::parse(SERVICE_PAYLOAD).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].portfolio_id, "PF_001");
        assert_eq!(documents[0].positions.len(), 2);
        assert!(documents[0].targets.is_empty());
    }

    #[test]
    fn test_parses_document_list() {
        let content = format!("[{}, {}]", SERVICE_PAYLOAD, SERVICE_PAYLOAD);
        assert_eq!(JsonFileSource::parse(&content).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_document_reports_json_error() {
        let err = JsonFileSource::parse(r#"{"portfolio_id": "X"}"#).unwrap_err();
        assert!(matches!(err, ScreenerError::JsonParse(_)));
    }

    #[test]
    fn test_profile_from_tier_and_product_knowledge() {
        let document = &JsonFileSource::parse(SERVICE_PAYLOAD).unwrap()[0];
        let profile = document.resolve_profile().unwrap();
        assert_eq!(profile.risk_tier, RiskTier::Moderate);
        assert!(profile.allows(StrategyTag::Spread));
        assert!(!profile.allows_equity());
    }

    #[test]
    fn test_unknown_tier_is_configuration_error() {
        let mut document = PortfolioDocument::new("PF", RiskTier::Moderate);
        document.risk_profile = "Reckless".to_string();
        assert!(matches!(
            document.resolve_profile(),
            Err(ScreenerError::Configuration(_))
        ));
    }

    #[test]
    fn test_explicit_profile_wins() {
        let mut document = PortfolioDocument::new("PF", RiskTier::Conservative);
        document.profile = Some(
            SuitabilityProfile::for_tier(RiskTier::Aggressive).with_max_naked_exposure(dec!(10)),
        );
        let profile = document.resolve_profile().unwrap();
        assert_eq!(profile.max_naked_exposure, dec!(10));
    }

    #[test]
    fn test_cash_budget_only_with_available_cash() {
        use crate::planner::{Instrument, Rationale, Remedy, TradeAction, TradeProposal};

        let buy = TradeProposal {
            step: 0,
            underlying: "AAPL".to_string(),
            instrument: Instrument::Equity,
            action: TradeAction::Buy,
            quantity: dec!(10),
            share_equivalent: dec!(10),
            remedy: Remedy::BuyEquity,
            rationale: Rationale::NakedExposureExceeded,
        };
        let unlimited = PortfolioDocument::new("PF", RiskTier::Moderate);
        assert!(unlimited.affordability().can_afford(&buy, &[]));

        let budget = PortfolioDocument::new("PF", RiskTier::Moderate)
            .with_cash(dec!(1000))
            .with_price("AAPL", dec!(170));
        assert!(!budget.affordability().can_afford(&buy, &[]));

        let lower_case = PortfolioDocument::new("PF", RiskTier::Moderate)
            .with_cash(dec!(2000))
            .with_price("aapl", dec!(170));
        assert!(lower_case.affordability().can_afford(&buy, &[]));
    }
}
