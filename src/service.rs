//! Batch screening service
//!
//! Each portfolio is analysed on the blocking pool; a semaphore caps how
//! many run at once. A failing portfolio yields an error outcome and the
//! rest of the batch carries on.

use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::common::errors::{Result, ScreenerError};
use crate::common::traits::{PositionSource, ProfileSource};
use crate::config::{AppConfig, PlannerSettings};
use crate::engine::{AnalysisReport, Analyzer};
use crate::portfolio::PortfolioDocument;

/// Result of screening one portfolio in a batch
#[derive(Debug)]
pub struct PortfolioOutcome {
    pub portfolio_id: String,
    pub result: Result<AnalysisReport>,
}

impl PortfolioOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Screens batches of portfolio documents in parallel
pub struct ScreeningService {
    settings: PlannerSettings,
    profiles: Arc<dyn ProfileSource>,
    semaphore: Arc<Semaphore>,
}

impl ScreeningService {
    pub fn new(config: &AppConfig, profiles: Arc<dyn ProfileSource>) -> Self {
        Self {
            settings: config.planner.clone(),
            profiles,
            semaphore: Arc::new(Semaphore::new(config.settings.max_parallel_portfolios.max(1))),
        }
    }

    /// Load every portfolio from `source` and screen them
    pub async fn run(&self, source: &dyn PositionSource) -> Result<Vec<PortfolioOutcome>> {
        info!("Screening portfolios from {}", source.source_name());
        let documents = source.load_portfolios().await?;
        Ok(self.screen(documents).await)
    }

    /// Screen documents; outcomes come back in input order
    pub async fn screen(&self, documents: Vec<PortfolioDocument>) -> Vec<PortfolioOutcome> {
        let ids: Vec<String> = documents.iter().map(|d| d.portfolio_id.clone()).collect();

        let handles: Vec<_> = documents
            .into_iter()
            .map(|document| {
                let semaphore = Arc::clone(&self.semaphore);
                let profiles = Arc::clone(&self.profiles);
                let settings = self.settings.clone();
                tokio::spawn(screen_one(semaphore, profiles, settings, document))
            })
            .collect();

        let outcomes: Vec<PortfolioOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, portfolio_id)| {
                let result = joined.map_err(ScreenerError::from).and_then(|r| r);
                if let Err(e) = &result {
                    error!("Portfolio {} failed: {}", portfolio_id, e);
                }
                PortfolioOutcome {
                    portfolio_id,
                    result,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            "Screened {} portfolio(s), {} failed",
            outcomes.len(),
            failed
        );
        outcomes
    }
}

async fn screen_one(
    semaphore: Arc<Semaphore>,
    profiles: Arc<dyn ProfileSource>,
    settings: PlannerSettings,
    document: PortfolioDocument,
) -> Result<AnalysisReport> {
    let profile = profiles.profile_for(&document).await?;
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(|e| ScreenerError::Internal(format!("semaphore closed: {}", e)))?;

    tokio::task::spawn_blocking(move || -> Result<AnalysisReport> {
        let analyzer = Analyzer::new(settings).with_affordability(document.affordability());
        let mut report = analyzer.analyze(&document.positions, &profile, &document.targets)?;
        report.portfolio_id = Some(document.portfolio_id);
        Ok(report)
    })
    .await?
}
