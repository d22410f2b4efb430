use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use riskdial::commands::{backtest, export_prices};
use riskdial::config::parse_symbol_list;
use riskdial::context::AppContext;
use std::path::PathBuf;

const DEFAULT_PRICE_SNAPSHOT_FILE: &str = "data/prices.bin";

#[derive(Parser)]
#[command(name = "riskdial")]
#[command(about = "Backtests passive, hedged and regime-switching portfolios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all three strategies and print their metrics and the trade log
    Backtest {
        /// Read prices from a snapshot instead of downloading them
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Comma separated candidate symbols for Attack mode
        #[arg(long)]
        candidates: Option<String>,
        /// Benchmark drawdown (%) that switches to Defense
        #[arg(long = "risk-off", allow_negative_numbers = true)]
        risk_off: Option<f64>,
        /// Benchmark run-up (%) that switches to Attack
        #[arg(long = "risk-on", allow_negative_numbers = true)]
        risk_on: Option<f64>,
        /// Initial capital used for the final value
        #[arg(long)]
        capital: Option<f64>,
        /// First date of the backtest (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date of the backtest, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Write results.csv, trade_log.csv and metrics.json into this directory
        #[arg(long = "output-dir", value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Download prices for the configured universe into a snapshot file
    ExportPrices {
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
        /// First date to download (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last date to download, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut app_context = AppContext::from_env()?;
    info!("Starting riskdial. Not financial advice. Past performance does not predict future results.");

    match cli.command {
        Commands::Backtest {
            data_file,
            candidates,
            risk_off,
            risk_on,
            capital,
            start,
            end,
            output_dir,
        } => {
            let settings = app_context.settings_mut();
            if let Some(raw) = candidates {
                settings.candidates = parse_symbol_list(&raw);
            }
            if let Some(value) = risk_off {
                settings.risk_off_threshold_pct = value;
            }
            if let Some(value) = risk_on {
                settings.risk_on_threshold_pct = value;
            }
            if let Some(value) = capital {
                settings.initial_capital = value;
            }
            if let Some(date) = start {
                settings.start_date = date;
            }
            if let Some(date) = end {
                settings.end_date = date;
            }
            settings.validate()?;

            backtest::run(&app_context, data_file.as_deref(), output_dir.as_deref()).await?;
        }
        Commands::ExportPrices { output, start, end } => {
            let settings = app_context.settings_mut();
            if let Some(date) = start {
                settings.start_date = date;
            }
            if let Some(date) = end {
                settings.end_date = date;
            }
            settings.validate()?;

            let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_PRICE_SNAPSHOT_FILE));
            export_prices::run(&app_context, &output_path).await?;
        }
    }

    Ok(())
}
