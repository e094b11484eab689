//! hedge_screener - Main Entry Point
//!
//! Reads portfolio documents from a JSON file, screens them and prints the
//! reports as JSON on stdout. Logs go to stderr.

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hedge_screener::{
    classify_only, load_config, AppConfig, JsonFileSource, PositionSource, ScreeningService,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Portfolio document, or a JSON array of documents
    #[arg(short, long)]
    input: PathBuf,

    /// Only classify positions, skip suitability and planning
    #[arg(long)]
    classify_only: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn init_logging(args: &Args, config: &AppConfig) -> Result<()> {
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs || config.settings.json_logs {
        builder.json().try_init().map_err(|e| anyhow!(e))
    } else {
        builder.try_init().map_err(|e| anyhow!(e))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    let config = load_config(Some(&args.config))?;
    init_logging(&args, &config)?;

    info!("Starting hedge_screener");
    info!("Configuration file: {}", args.config);

    let source = JsonFileSource::new(&args.input);
    let mut failed = 0usize;

    let entries: Vec<Value> = if args.classify_only {
        source
            .load_portfolios()
            .await?
            .into_iter()
            .map(|document| match classify_only(&document.positions) {
                Ok(results) => json!({
                    "portfolio_id": document.portfolio_id,
                    "status": "ok",
                    "classifications": results,
                }),
                Err(e) => {
                    failed += 1;
                    json!({
                        "portfolio_id": document.portfolio_id,
                        "status": "error",
                        "error": e.to_string(),
                    })
                }
            })
            .collect()
    } else {
        let service = ScreeningService::new(&config, Arc::new(source.clone()));
        let mut entries = Vec::new();
        for outcome in service.run(&source).await? {
            entries.push(match outcome.result {
                Ok(report) => json!({
                    "portfolio_id": outcome.portfolio_id,
                    "status": "ok",
                    "fingerprint": report.fingerprint()?,
                    "suitable": report.is_suitable(),
                    "plan_complete": report.plan.is_complete(),
                    "report": report,
                }),
                Err(e) => {
                    failed += 1;
                    json!({
                        "portfolio_id": outcome.portfolio_id,
                        "status": "error",
                        "error": e.to_string(),
                    })
                }
            });
        }
        entries
    };

    let output = if args.pretty {
        serde_json::to_string_pretty(&entries)?
    } else {
        serde_json::to_string(&entries)?
    };
    println!("{}", output);

    if failed > 0 {
        bail!("{} portfolio(s) could not be screened", failed);
    }
    info!("Done");
    Ok(())
}
