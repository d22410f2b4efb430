use crate::models::{PriceObservation, PriceTable};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Source of daily adjusted closes for the engine.
///
/// Implementations never fail the whole request: a symbol that cannot be
/// loaded is logged and left out of the returned table, and the engine's
/// validation decides whether the run can continue without it.
#[async_trait]
pub trait PriceProvider {
    async fn fetch_closes(&self, symbols: &[String], start: NaiveDate, end: NaiveDate)
        -> PriceTable;
}

/// Serves prices from memory. Useful for tests and for callers that already
/// hold their data.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceProvider {
    observations: HashMap<String, Vec<PriceObservation>>,
}

impl StaticPriceProvider {
    pub fn new(observations: HashMap<String, Vec<PriceObservation>>) -> Self {
        Self { observations }
    }

    /// Adds one series on consecutive calendar days starting at `first_date`.
    pub fn with_series(mut self, symbol: &str, first_date: NaiveDate, closes: &[f64]) -> Self {
        let series = closes
            .iter()
            .enumerate()
            .map(|(offset, close)| PriceObservation {
                date: first_date + chrono::Duration::days(offset as i64),
                close: *close,
            })
            .collect();
        self.observations.insert(symbol.to_string(), series);
        self
    }

    pub fn observations(&self) -> &HashMap<String, Vec<PriceObservation>> {
        &self.observations
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    async fn fetch_closes(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> PriceTable {
        select_observations(&self.observations, symbols, start, end)
    }
}

/// Builds a table from the requested symbols' observations inside the
/// inclusive date range.
pub fn select_observations(
    observations: &HashMap<String, Vec<PriceObservation>>,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> PriceTable {
    let selected: HashMap<String, Vec<PriceObservation>> = symbols
        .iter()
        .filter_map(|symbol| {
            observations.get(symbol).map(|series| {
                let in_range = series
                    .iter()
                    .filter(|observation| observation.date >= start && observation.date <= end)
                    .cloned()
                    .collect();
                (symbol.clone(), in_range)
            })
        })
        .collect();
    PriceTable::from_observations(&selected)
}
