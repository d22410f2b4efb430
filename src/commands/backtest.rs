use crate::context::AppContext;
use crate::engine::Engine;
use crate::models::BacktestOutput;
use crate::report::{format_summary, format_trade_log, summarize, write_reports};
use anyhow::{anyhow, Result};
use log::info;
use std::path::Path;

pub const NO_RESULTS_MESSAGE: &str =
    "Could not fetch data or run backtest. Please check tickers and date range.";

pub async fn run(
    app: &AppContext,
    data_file: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<BacktestOutput> {
    let request = app.backtest_request();
    info!(
        "Received backtest command: capital {:.2}, risk-off {}%, risk-on {}%, {} candidate(s)",
        request.initial_capital,
        request.risk_off_threshold_pct,
        request.risk_on_threshold_pct,
        request.candidates.len()
    );

    let provider = app.price_provider(data_file)?;
    let output = Engine::run(&*provider, &request).await;
    if output.is_empty() {
        return Err(anyhow!(NO_RESULTS_MESSAGE));
    }

    let reports = summarize(&output.results, request.initial_capital);
    println!("Strategy Performance Metrics");
    println!("{}", format_summary(&reports));
    println!("Dynamic Strategy Trade Log");
    print!("{}", format_trade_log(&output.trade_log));

    if let Some(dir) = output_dir {
        let written = write_reports(dir, &output, &reports, request.initial_capital)?;
        for path in written {
            info!("Wrote {}", path.display());
        }
    }

    Ok(output)
}
