use crate::models::InstrumentUniverse;
use crate::yahoo::DEFAULT_YAHOO_BASE_URL;
use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;
pub const DEFAULT_START_DATE: &str = "2018-01-01";
pub const DEFAULT_BENCHMARK_SYMBOL: &str = "^NSEI";
pub const DEFAULT_NEUTRAL_SYMBOL: &str = "NIFTYBEES.NS";
pub const DEFAULT_DEFENSIVE_SYMBOL: &str = "GOLDBEES.NS";
pub const DEFAULT_CANDIDATE_SYMBOLS: [&str; 10] = [
    "RELIANCE.NS",
    "TCS.NS",
    "HDFCBANK.NS",
    "ICICIBANK.NS",
    "INFY.NS",
    "HINDUNILVR.NS",
    "ITC.NS",
    "BHARTIARTL.NS",
    "LT.NS",
    "BAJFINANCE.NS",
];
pub const DEFAULT_RISK_OFF_THRESHOLD_PCT: f64 = 8.0;
pub const DEFAULT_RISK_ON_THRESHOLD_PCT: f64 = 5.0;

/// Everything needed to start a backtest from the command line. Defaults
/// live here, not in the engine, which only accepts explicit parameters.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub universe: InstrumentUniverse,
    pub candidates: Vec<String>,
    pub risk_off_threshold_pct: f64,
    pub risk_on_threshold_pct: f64,
    pub yahoo_base_url: String,
}

impl RunSettings {
    /// Reads settings from a key/value map such as the process environment.
    /// Absent keys fall back to defaults; present but malformed ones are errors.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let initial_capital = optional_setting_f64(
            settings,
            "BACKTEST_INITIAL_CAPITAL",
            DEFAULT_INITIAL_CAPITAL,
        )?;

        let default_start = parse_date("BACKTEST_START_DATE", DEFAULT_START_DATE)?;
        let start_date = optional_setting_date(settings, "BACKTEST_START_DATE", default_start)?;
        let end_date =
            optional_setting_date(settings, "BACKTEST_END_DATE", Local::now().date_naive())?;

        let universe = InstrumentUniverse::new(
            optional_setting_symbol(settings, "BENCHMARK_SYMBOL", DEFAULT_BENCHMARK_SYMBOL)?,
            optional_setting_symbol(settings, "NEUTRAL_SYMBOL", DEFAULT_NEUTRAL_SYMBOL)?,
            optional_setting_symbol(settings, "DEFENSIVE_SYMBOL", DEFAULT_DEFENSIVE_SYMBOL)?,
        );

        let candidates = match setting(settings, "CANDIDATE_SYMBOLS") {
            Some(raw) => {
                let parsed = parse_symbol_list(raw);
                if parsed.is_empty() {
                    return Err(anyhow!(
                        "Setting CANDIDATE_SYMBOLS must list at least one symbol (value: {})",
                        raw
                    ));
                }
                parsed
            }
            None => DEFAULT_CANDIDATE_SYMBOLS
                .iter()
                .map(|symbol| symbol.to_string())
                .collect(),
        };

        let risk_off_threshold_pct = optional_setting_f64(
            settings,
            "RISK_OFF_THRESHOLD_PCT",
            DEFAULT_RISK_OFF_THRESHOLD_PCT,
        )?;
        let risk_on_threshold_pct = optional_setting_f64(
            settings,
            "RISK_ON_THRESHOLD_PCT",
            DEFAULT_RISK_ON_THRESHOLD_PCT,
        )?;
        let yahoo_base_url = setting(settings, "YAHOO_BASE_URL")
            .unwrap_or(DEFAULT_YAHOO_BASE_URL)
            .to_string();

        let run_settings = Self {
            initial_capital,
            start_date,
            end_date,
            universe,
            candidates,
            risk_off_threshold_pct,
            risk_on_threshold_pct,
            yahoo_base_url,
        };
        run_settings.validate()?;
        Ok(run_settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(anyhow!(
                "Initial capital must be a positive number (value: {})",
                self.initial_capital
            ));
        }
        if self.start_date > self.end_date {
            return Err(anyhow!(
                "Start date {} must not be after end date {}",
                self.start_date,
                self.end_date
            ));
        }
        Ok(())
    }
}

/// Splits a comma or whitespace separated list, normalizing each symbol and
/// dropping duplicates while keeping the first occurrence.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for part in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if let Some(symbol) = normalize_symbol(part) {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
    }
    symbols
}

/// Normalizes a symbol by trimming whitespace and uppercasing.
pub fn normalize_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        anyhow!(
            "Setting {} must be a date in YYYY-MM-DD format (value: {})",
            key,
            raw
        )
    })
}

fn setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn optional_setting_f64(settings: &HashMap<String, String>, key: &str, default: f64) -> Result<f64> {
    let Some(raw) = setting(settings, key) else {
        return Ok(default);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    Ok(value)
}

fn optional_setting_date(
    settings: &HashMap<String, String>,
    key: &str,
    default: NaiveDate,
) -> Result<NaiveDate> {
    match setting(settings, key) {
        Some(raw) => parse_date(key, raw),
        None => Ok(default),
    }
}

fn optional_setting_symbol(
    settings: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<String> {
    match setting(settings, key) {
        Some(raw) => normalize_symbol(raw)
            .ok_or_else(|| anyhow!("Setting {} must be a symbol (value: {})", key, raw)),
        None => Ok(default.to_string()),
    }
}
