use crate::backtester::StrategySimulator;
use crate::models::*;
use crate::provider::PriceProvider;
use crate::signals::{momentum_ranking, SignalGenerator, ATTACK_POSITIONS};
use chrono::NaiveDate;
use log::{info, warn};
use thiserror::Error;

/// Reasons a run stops before simulating. They never escape [`Engine::run`],
/// which logs them and returns an empty output instead.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    #[error("no price data for required instrument {0}")]
    MissingInstrument(String),
    #[error("only {found} candidate(s) with price data, at least {required} needed")]
    TooFewCandidates { found: usize, required: usize },
    #[error("only {0} session(s) where every instrument has a price, at least 2 needed")]
    InsufficientHistory(usize),
}

/// Parameters of one backtest. Every value is explicit; defaults belong to
/// the caller.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub initial_capital: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub candidates: Vec<String>,
    pub risk_off_threshold_pct: f64,
    pub risk_on_threshold_pct: f64,
    pub universe: InstrumentUniverse,
}

impl BacktestRequest {
    /// Every symbol the run needs, instruments first, without duplicates.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::with_capacity(self.candidates.len() + 3);
        let requested = self
            .universe
            .required_symbols()
            .into_iter()
            .map(str::to_string)
            .chain(self.candidates.iter().cloned());
        for symbol in requested {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        symbols
    }
}

/// A price table that passed validation, with the candidates that survived.
#[derive(Debug, Clone)]
pub struct ValidatedPrices {
    pub prices: PriceTable,
    pub candidates: Vec<String>,
}

pub struct Engine;

impl Engine {
    /// Fetches prices, validates them and runs all three strategies.
    /// Any validation failure is logged and yields [`BacktestOutput::empty`].
    pub async fn run<P>(provider: &P, request: &BacktestRequest) -> BacktestOutput
    where
        P: PriceProvider + Sync + ?Sized,
    {
        if request.start_date > request.end_date {
            let err = ValidationError::InvalidDateRange {
                start: request.start_date,
                end: request.end_date,
            };
            warn!("Backtest aborted: {}", err);
            return BacktestOutput::empty();
        }

        let symbols = request.symbols();
        info!(
            "Starting backtest for {} symbols ({} - {}), benchmark {}",
            symbols.len(),
            request.start_date,
            request.end_date,
            request.universe.benchmark
        );

        let prices = provider
            .fetch_closes(&symbols, request.start_date, request.end_date)
            .await;

        match Self::run_on_prices(&prices, request) {
            Ok(output) => output,
            Err(err) => {
                warn!("Backtest aborted: {}", err);
                BacktestOutput::empty()
            }
        }
    }

    /// Runs the pipeline on an already fetched table.
    pub fn run_on_prices(
        prices: &PriceTable,
        request: &BacktestRequest,
    ) -> Result<BacktestOutput, ValidationError> {
        let validated = Self::validate(prices, request)?;
        let prices = &validated.prices;

        let returns = ReturnTable::from_prices(prices);
        let generator = SignalGenerator::new(
            request.universe.benchmark.clone(),
            request.risk_off_threshold_pct,
            request.risk_on_threshold_pct,
        );
        let signals = generator.regime_signals(prices);
        let ranking = momentum_ranking(prices, &validated.candidates);

        let simulation =
            StrategySimulator::new(&request.universe).simulate(&returns, &signals, &ranking);
        let base_date = prices.dates()[0];
        let results = simulation.results_table(base_date);

        info!(
            "Simulated {} sessions ({} - {}); dynamic strategy changed mode {} times",
            returns.len(),
            base_date,
            results.dates.last().copied().unwrap_or(base_date),
            simulation.trade_log.len()
        );

        Ok(BacktestOutput {
            results,
            trade_log: simulation.trade_log,
        })
    }

    /// Checks instrument coverage and trims the table to the sessions on
    /// which every instrument in use has a price.
    pub fn validate(
        prices: &PriceTable,
        request: &BacktestRequest,
    ) -> Result<ValidatedPrices, ValidationError> {
        for symbol in request.universe.required_symbols() {
            if !prices.contains(symbol) {
                return Err(ValidationError::MissingInstrument(symbol.to_string()));
            }
        }

        let mut candidates: Vec<String> = Vec::new();
        for symbol in &request.candidates {
            if candidates.contains(symbol) {
                continue;
            }
            if prices.contains(symbol) {
                candidates.push(symbol.clone());
            } else {
                warn!("Dropping candidate {}: no price data", symbol);
            }
        }
        if candidates.len() < ATTACK_POSITIONS {
            return Err(ValidationError::TooFewCandidates {
                found: candidates.len(),
                required: ATTACK_POSITIONS,
            });
        }
        info!(
            "Using {} of {} candidates: {}",
            candidates.len(),
            request.candidates.len(),
            candidates.join(", ")
        );

        let mut in_use: Vec<String> = Vec::with_capacity(candidates.len() + 3);
        for symbol in request
            .universe
            .required_symbols()
            .into_iter()
            .map(str::to_string)
            .chain(candidates.iter().cloned())
        {
            if !in_use.contains(&symbol) {
                in_use.push(symbol);
            }
        }
        let start_index = prices
            .first_complete_index(&in_use)
            .ok_or(ValidationError::InsufficientHistory(0))?;
        if start_index > 0 {
            info!(
                "Skipping {} leading session(s) before every instrument has a price",
                start_index
            );
        }

        let trimmed = prices.slice(&in_use, start_index);
        if trimmed.len() < 2 {
            return Err(ValidationError::InsufficientHistory(trimmed.len()));
        }

        Ok(ValidatedPrices {
            prices: trimmed,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticPriceProvider;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + Duration::days(offset)
    }

    fn request(candidates: &[&str]) -> BacktestRequest {
        BacktestRequest {
            initial_capital: 10_000.0,
            start_date: day(0),
            end_date: day(400),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
            risk_off_threshold_pct: 8.0,
            risk_on_threshold_pct: 5.0,
            universe: InstrumentUniverse::new("IDX", "CORE", "SAFE"),
        }
    }

    fn table(rows: usize, late: &[(&str, usize)]) -> PriceTable {
        let dates = (0..rows as i64).map(day).collect();
        let mut columns = Vec::new();
        for symbol in ["IDX", "CORE", "SAFE", "AAA", "BBB", "CCC"] {
            let first = late
                .iter()
                .find(|(name, _)| *name == symbol)
                .map(|(_, first)| *first)
                .unwrap_or(0);
            let values: Vec<Option<f64>> = (0..rows)
                .map(|idx| (idx >= first).then(|| 100.0 + idx as f64))
                .collect();
            columns.push((symbol.to_string(), values));
        }
        PriceTable::from_columns(dates, columns)
    }

    #[test]
    fn request_symbols_are_unique_and_ordered() {
        let req = request(&["AAA", "CORE", "BBB", "AAA"]);
        assert_eq!(req.symbols(), vec!["IDX", "CORE", "SAFE", "AAA", "BBB"]);
    }

    #[test]
    fn missing_required_instrument_is_rejected() {
        let prices = table(10, &[]);
        let mut req = request(&["AAA", "BBB"]);
        req.universe.defensive = "GONE".to_string();
        assert_eq!(
            Engine::validate(&prices, &req).unwrap_err(),
            ValidationError::MissingInstrument("GONE".to_string())
        );
    }

    #[test]
    fn candidates_are_filtered_and_deduplicated() {
        let prices = table(10, &[]);
        let validated =
            Engine::validate(&prices, &request(&["BBB", "ZZZ", "BBB", "AAA"])).unwrap();
        assert_eq!(validated.candidates, vec!["BBB", "AAA"]);

        let err = Engine::validate(&prices, &request(&["AAA", "ZZZ", "AAA"])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooFewCandidates {
                found: 1,
                required: 2
            }
        );
    }

    #[test]
    fn leading_sessions_without_full_coverage_are_trimmed() {
        let prices = table(10, &[("BBB", 3), ("SAFE", 2)]);
        let validated = Engine::validate(&prices, &request(&["AAA", "BBB"])).unwrap();
        assert_eq!(validated.prices.len(), 7);
        assert_eq!(validated.prices.dates()[0], day(3));
        assert!(!validated.prices.contains("CCC"));

        let short = table(10, &[("BBB", 9)]);
        assert_eq!(
            Engine::validate(&short, &request(&["AAA", "BBB"])).unwrap_err(),
            ValidationError::InsufficientHistory(1)
        );
    }

    #[test]
    fn results_start_at_one_on_the_first_priced_session() {
        let prices = table(30, &[]);
        let output = Engine::run_on_prices(&prices, &request(&["AAA", "BBB"])).unwrap();
        assert_eq!(output.results.len(), 30);
        assert_eq!(output.results.dates[0], day(0));
        for kind in StrategyKind::ALL {
            assert_eq!(output.results.series(kind)[0], 1.0);
        }
    }

    #[tokio::test]
    async fn inverted_range_yields_empty_output() {
        let provider = StaticPriceProvider::default();
        let mut req = request(&["AAA", "BBB"]);
        req.start_date = day(10);
        req.end_date = day(5);
        assert!(Engine::run(&provider, &req).await.is_empty());
    }

    #[tokio::test]
    async fn provider_without_benchmark_yields_empty_output() {
        let closes: Vec<f64> = (0..40).map(|idx| 50.0 + idx as f64).collect();
        let provider = StaticPriceProvider::default()
            .with_series("CORE", day(0), &closes)
            .with_series("SAFE", day(0), &closes)
            .with_series("AAA", day(0), &closes)
            .with_series("BBB", day(0), &closes);
        let output = Engine::run(&provider, &request(&["AAA", "BBB"])).await;
        assert!(output.is_empty());
        assert!(output.trade_log.is_empty());
    }
}
