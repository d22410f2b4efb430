use crate::config::RunSettings;
use crate::data_context::SnapshotPriceProvider;
use crate::engine::BacktestRequest;
use crate::provider::PriceProvider;
use crate::yahoo::YahooPriceProvider;
use anyhow::{anyhow, Result};
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Settings shared by every command plus the choice of price source.
#[derive(Clone)]
pub struct AppContext {
    settings: RunSettings,
}

impl AppContext {
    pub fn new(settings: RunSettings) -> Self {
        Self { settings }
    }

    /// Loads `.env` when present and reads settings from the environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let settings: HashMap<String, String> = std::env::vars().collect();
        Ok(Self::new(RunSettings::from_settings_map(&settings)?))
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RunSettings {
        &mut self.settings
    }

    /// A snapshot-backed provider when `data_file` is given, otherwise Yahoo.
    pub fn price_provider(
        &self,
        data_file: Option<&Path>,
    ) -> Result<Box<dyn PriceProvider + Send + Sync>> {
        match data_file {
            Some(path) => {
                if !path.exists() {
                    return Err(anyhow!(
                        "Price snapshot not found at {}. Generate it with `export-prices` first.",
                        path.display()
                    ));
                }
                info!("Using price snapshot from {}", path.display());
                Ok(Box::new(SnapshotPriceProvider::from_file(path)?))
            }
            None => {
                info!("Using Yahoo Finance at {}", self.settings.yahoo_base_url);
                Ok(Box::new(YahooPriceProvider::new(
                    self.settings.yahoo_base_url.clone(),
                )?))
            }
        }
    }

    pub fn backtest_request(&self) -> BacktestRequest {
        let settings = &self.settings;
        BacktestRequest {
            initial_capital: settings.initial_capital,
            start_date: settings.start_date,
            end_date: settings.end_date,
            candidates: settings.candidates.clone(),
            risk_off_threshold_pct: settings.risk_off_threshold_pct,
            risk_on_threshold_pct: settings.risk_on_threshold_pct,
            universe: settings.universe.clone(),
        }
    }
}
