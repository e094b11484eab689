//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rebalance planner tuning
    #[serde(default)]
    pub planner: PlannerSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Rebalance planner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSettings {
    /// Candidate trades simulated per issue before it is reported unresolved
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_violation: usize,
    /// Upper bound on accepted proposals in one plan
    #[serde(default = "default_max_plan_steps")]
    pub max_plan_steps: usize,
    /// Round option quantities up to whole contracts
    #[serde(default = "default_whole_contracts")]
    pub whole_contracts: bool,
    /// How far out-of-the-money a hedge leg is struck, in percent of the naked leg's strike
    #[serde(default = "default_hedge_strike_offset_pct")]
    pub hedge_strike_offset_pct: Decimal,
    /// Target coverage for underlyings without an explicit target
    #[serde(default)]
    pub default_target_coverage: Option<Decimal>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_candidates_per_violation: default_max_candidates(),
            max_plan_steps: default_max_plan_steps(),
            whole_contracts: default_whole_contracts(),
            hedge_strike_offset_pct: default_hedge_strike_offset_pct(),
            default_target_coverage: None,
        }
    }
}

fn default_max_candidates() -> usize {
    8
}

fn default_max_plan_steps() -> usize {
    32
}

fn default_whole_contracts() -> bool {
    true
}

fn default_hedge_strike_offset_pct() -> Decimal {
    dec!(5)
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
    /// Portfolios analysed concurrently in a batch
    #[serde(default = "default_max_parallel")]
    pub max_parallel_portfolios: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            max_parallel_portfolios: default_max_parallel(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_parallel() -> usize {
    4
}

impl AppConfig {
    /// Reject settings the planner cannot work with
    pub fn validate(&self) -> crate::common::errors::Result<()> {
        use crate::common::errors::ScreenerError;

        if self.planner.max_candidates_per_violation == 0 {
            return Err(ScreenerError::Configuration(
                "planner.max_candidates_per_violation must be at least 1".to_string(),
            ));
        }
        if self.planner.hedge_strike_offset_pct < Decimal::ZERO
            || self.planner.hedge_strike_offset_pct >= dec!(100)
        {
            return Err(ScreenerError::Configuration(format!(
                "planner.hedge_strike_offset_pct must be in [0, 100), got {}",
                self.planner.hedge_strike_offset_pct
            )));
        }
        if let Some(target) = self.planner.default_target_coverage {
            if target < Decimal::ZERO || target > Decimal::ONE {
                return Err(ScreenerError::Configuration(format!(
                    "planner.default_target_coverage must be in [0, 1], got {}",
                    target
                )));
            }
        }
        if self.settings.max_parallel_portfolios == 0 {
            return Err(ScreenerError::Configuration(
                "settings.max_parallel_portfolios must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
