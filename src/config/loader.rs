//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

use super::types::AppConfig;
use crate::common::errors::{Result, ScreenerError};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP_, `__` between sections,
///    e.g. `APP_PLANNER__WHOLE_CONTRACTS=false`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    build(config_path, environment())
}

/// `APP_` prefix, `__` between nested keys
fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn build(config_path: Option<&str>, environment: Environment) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            debug!("Reading configuration from {}", path);
            builder = builder.add_source(File::with_name(path).required(false));
        } else {
            debug!("Configuration file {} not found, using defaults", path);
        }
    }

    let config: AppConfig = builder
        .add_source(environment)
        .build()
        .map_err(|e| ScreenerError::Configuration(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ScreenerError::Configuration(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("definitely/not/here.toml")).unwrap();
        assert_eq!(config.planner.max_plan_steps, 32);
        assert_eq!(config.settings.max_parallel_portfolios, 4);
    }

    #[test]
    fn test_reads_toml_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[planner]\nmax_candidates_per_violation = 3\nwhole_contracts = false\n\n[settings]\nlog_level = \"debug\""
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();

        assert_eq!(config.planner.max_candidates_per_violation, 3);
        assert!(!config.planner.whole_contracts);
        assert_eq!(config.settings.log_level, "debug");
    }

    #[test]
    fn test_environment_overrides_file() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[planner]\nmax_plan_steps = 10").unwrap();

        let vars: config::Map<String, String> = [
            ("APP_PLANNER__MAX_PLAN_STEPS", "5"),
            ("APP_PLANNER__WHOLE_CONTRACTS", "false"),
            ("APP_SETTINGS__MAX_PARALLEL_PORTFOLIOS", "2"),
            ("OTHER_PLANNER__MAX_PLAN_STEPS", "7"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = build(file.path().to_str(), environment().source(Some(vars))).unwrap();
        assert_eq!(config.planner.max_plan_steps, 5);
        assert!(!config.planner.whole_contracts);
        assert_eq!(config.settings.max_parallel_portfolios, 2);
    }
}
