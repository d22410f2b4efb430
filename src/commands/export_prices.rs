use crate::context::AppContext;
use crate::data_context::MarketData;
use crate::yahoo::YahooPriceProvider;
use anyhow::{anyhow, Result};
use log::{info, warn};
use std::path::Path;

/// Downloads every configured symbol and stores the raw observations as a
/// snapshot for offline backtests.
pub async fn run(app: &AppContext, output_path: &Path) -> Result<MarketData> {
    let settings = app.settings();
    info!(
        "Generating price snapshot at {} ({} - {})",
        output_path.display(),
        settings.start_date,
        settings.end_date
    );

    let symbols = app.backtest_request().symbols();
    let provider = YahooPriceProvider::new(settings.yahoo_base_url.clone())?;
    let series = provider
        .fetch_observations(&symbols, settings.start_date, settings.end_date)
        .await;
    let market_data = MarketData::new(settings.start_date, settings.end_date, series)?;
    if !market_data.has_data() {
        return Err(anyhow!(
            "No price data downloaded for any of {} symbol(s)",
            symbols.len()
        ));
    }

    let missing: Vec<&String> = symbols
        .iter()
        .filter(|symbol| !market_data.series().contains_key(symbol.as_str()))
        .collect();
    if !missing.is_empty() {
        warn!(
            "Snapshot is missing {} symbol(s): {}",
            missing.len(),
            missing
                .iter()
                .map(|symbol| symbol.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    market_data.save_to_file(output_path)?;
    info!(
        "Price snapshot with {} symbol(s) written to {}",
        market_data.symbols().len(),
        output_path.display()
    );

    Ok(market_data)
}
