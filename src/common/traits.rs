//! Trait definitions for collaborators of the screening core
//!
//! The core never performs I/O. Sources resolve everything up front and
//! the affordability check is a pure query.

use async_trait::async_trait;

use super::errors::Result;
use crate::analysis::SuitabilityProfile;
use crate::planner::TradeProposal;
use crate::portfolio::PortfolioDocument;

/// Supplies portfolios to screen
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Load every portfolio this source knows about
    async fn load_portfolios(&self) -> Result<Vec<PortfolioDocument>>;

    /// Human-readable name for logging
    fn source_name(&self) -> String;
}

/// Resolves the suitability profile for a portfolio
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile_for(&self, document: &PortfolioDocument) -> Result<SuitabilityProfile>;
}

/// Cash constraint consulted before the planner proposes a purchase
///
/// `committed` holds the proposals already accepted earlier in the same
/// plan so an implementation can avoid spending the same cash twice.
pub trait AffordabilityCheck: Send + Sync {
    fn can_afford(&self, proposal: &TradeProposal, committed: &[TradeProposal]) -> bool;
}

/// Boxed affordability check for dynamic dispatch
pub type BoxedAffordabilityCheck = Box<dyn AffordabilityCheck>;
