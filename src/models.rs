use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// A single daily close observation as delivered by a price source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
}

/// Fixed instruments every backtest needs besides the candidate list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstrumentUniverse {
    pub benchmark: String,
    pub neutral: String,
    pub defensive: String,
}

impl InstrumentUniverse {
    pub fn new(
        benchmark: impl Into<String>,
        neutral: impl Into<String>,
        defensive: impl Into<String>,
    ) -> Self {
        Self {
            benchmark: benchmark.into(),
            neutral: neutral.into(),
            defensive: defensive.into(),
        }
    }

    pub fn required_symbols(&self) -> [&str; 3] {
        [
            self.benchmark.as_str(),
            self.neutral.as_str(),
            self.defensive.as_str(),
        ]
    }
}

/// Aligned daily close-price matrix, one column per instrument.
///
/// Dates are ascending and unique. Interior gaps are forward-filled at
/// construction time, leading gaps stay missing, and columns without a single
/// observation are dropped. The table is never mutated after it is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl PriceTable {
    /// Builds a table from raw per-symbol observations. The date index is the
    /// union of every observed date. Non-finite or non-positive closes count as
    /// missing.
    pub fn from_observations(observations: &HashMap<String, Vec<PriceObservation>>) -> Self {
        let mut date_set = BTreeSet::new();
        for series in observations.values() {
            for observation in series {
                if is_valid_close(observation.close) {
                    date_set.insert(observation.date);
                }
            }
        }
        let dates: Vec<NaiveDate> = date_set.into_iter().collect();
        let date_index: HashMap<NaiveDate, usize> = dates
            .iter()
            .enumerate()
            .map(|(idx, date)| (*date, idx))
            .collect();

        let mut symbol_names: Vec<&String> = observations.keys().collect();
        symbol_names.sort();

        let mut symbols = Vec::new();
        let mut columns = HashMap::new();
        for symbol in symbol_names {
            let mut column: Vec<Option<f64>> = vec![None; dates.len()];
            for observation in &observations[symbol] {
                if !is_valid_close(observation.close) {
                    continue;
                }
                if let Some(&idx) = date_index.get(&observation.date) {
                    column[idx] = Some(observation.close);
                }
            }
            if column.iter().all(Option::is_none) {
                continue;
            }
            forward_fill(&mut column);
            symbols.push(symbol.clone());
            columns.insert(symbol.clone(), column);
        }

        Self {
            dates,
            symbols,
            columns,
        }
    }

    /// Builds a table from already aligned columns. Columns whose length does
    /// not match `dates` or that hold no value are dropped.
    pub fn from_columns(dates: Vec<NaiveDate>, raw_columns: Vec<(String, Vec<Option<f64>>)>) -> Self {
        let mut symbols = Vec::new();
        let mut columns = HashMap::new();
        for (symbol, mut column) in raw_columns {
            if column.len() != dates.len() || columns.contains_key(&symbol) {
                continue;
            }
            for value in column.iter_mut() {
                if (*value).map(|close| !is_valid_close(close)).unwrap_or(false) {
                    *value = None;
                }
            }
            if column.iter().all(Option::is_none) {
                continue;
            }
            forward_fill(&mut column);
            symbols.push(symbol.clone());
            columns.insert(symbol, column);
        }

        Self {
            dates,
            symbols,
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.columns.contains_key(symbol)
    }

    pub fn column(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.columns.get(symbol).map(|column| column.as_slice())
    }

    pub fn close(&self, symbol: &str, index: usize) -> Option<f64> {
        self.columns
            .get(symbol)
            .and_then(|column| column.get(index).copied().flatten())
    }

    /// Index of the first date on which every listed symbol has a value.
    /// Returns `None` when a symbol is absent from the table.
    pub fn first_complete_index(&self, symbols: &[String]) -> Option<usize> {
        let mut start = 0usize;
        for symbol in symbols {
            let column = self.columns.get(symbol)?;
            let first = column.iter().position(Option::is_some)?;
            start = start.max(first);
        }
        Some(start)
    }

    /// Returns a new table restricted to `symbols`, starting at `start_index`.
    pub fn slice(&self, symbols: &[String], start_index: usize) -> Self {
        let start = start_index.min(self.dates.len());
        let raw_columns = symbols
            .iter()
            .filter_map(|symbol| {
                self.columns
                    .get(symbol)
                    .map(|column| (symbol.clone(), column[start..].to_vec()))
            })
            .collect();
        Self::from_columns(self.dates[start..].to_vec(), raw_columns)
    }
}

fn is_valid_close(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn forward_fill(column: &mut [Option<f64>]) {
    let mut last = None;
    for value in column.iter_mut() {
        if let Some(close) = *value {
            last = Some(close);
        } else {
            *value = last;
        }
    }
}

/// Day-over-day percentage change of a [`PriceTable`]. Row `i` corresponds to
/// price row `i + 1` and only uses prices from rows `i` and `i + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnTable {
    dates: Vec<NaiveDate>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl ReturnTable {
    pub fn from_prices(prices: &PriceTable) -> Self {
        let dates = prices.dates().iter().skip(1).copied().collect();
        let columns = prices
            .symbols()
            .iter()
            .map(|symbol| {
                let column = prices.column(symbol).unwrap_or(&[]);
                let returns = column
                    .windows(2)
                    .map(|window| match (window[0], window[1]) {
                        (Some(previous), Some(current)) => Some(current / previous - 1.0),
                        _ => None,
                    })
                    .collect();
                (symbol.clone(), returns)
            })
            .collect();
        Self { dates, columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Return of `symbol` on row `index`; undefined cells count as flat.
    pub fn value(&self, symbol: &str, index: usize) -> f64 {
        self.columns
            .get(symbol)
            .and_then(|column| column.get(index).copied().flatten())
            .unwrap_or(0.0)
    }
}

/// Risk-off / risk-on flags aligned to the return-table dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegimeSignal {
    pub risk_off: Vec<bool>,
    pub risk_on: Vec<bool>,
}

impl RegimeSignal {
    pub fn len(&self) -> usize {
        self.risk_off.len()
    }

    pub fn is_empty(&self) -> bool {
        self.risk_off.is_empty()
    }

    pub fn risk_off_at(&self, index: usize) -> bool {
        self.risk_off.get(index).copied().unwrap_or(false)
    }

    pub fn risk_on_at(&self, index: usize) -> bool {
        self.risk_on.get(index).copied().unwrap_or(false)
    }
}

/// Top momentum candidates per return-table date, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MomentumRanking {
    pub ranked: Vec<Vec<String>>,
}

impl MomentumRanking {
    pub fn top_at(&self, index: usize) -> &[String] {
        self.ranked
            .get(index)
            .map(|symbols| symbols.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mode {
    Neutral,
    Defense,
    Attack,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Neutral => "Neutral",
            Mode::Defense => "Defense",
            Mode::Attack => "Attack",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeAction {
    #[serde(rename = "ENTER")]
    Enter,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Enter => "ENTER",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub mode: Mode,
    pub action: TradeAction,
    pub assets: Vec<String>,
}

impl TradeLogEntry {
    pub fn assets_label(&self) -> String {
        self.assets.join(", ")
    }
}

/// The three allocation rules compared by a backtest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Passive,
    Hedge,
    Dynamic,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Passive,
        StrategyKind::Hedge,
        StrategyKind::Dynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Passive => "passive",
            StrategyKind::Hedge => "hedge",
            StrategyKind::Dynamic => "dynamic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Passive => "Buy and Hold",
            StrategyKind::Hedge => "Safe Hedge",
            StrategyKind::Dynamic => "Dynamic Risk Dial",
        }
    }
}

/// Per-strategy cumulative growth of one unit of capital, indexed by date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultsTable {
    pub dates: Vec<NaiveDate>,
    pub passive: Vec<f64>,
    pub hedge: Vec<f64>,
    pub dynamic: Vec<f64>,
}

impl ResultsTable {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn series(&self, kind: StrategyKind) -> &[f64] {
        match kind {
            StrategyKind::Passive => &self.passive,
            StrategyKind::Hedge => &self.hedge,
            StrategyKind::Dynamic => &self.dynamic,
        }
    }
}

/// Everything a backtest hands to its caller. Both parts are empty when the
/// run was aborted during validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BacktestOutput {
    pub results: ResultsTable,
    pub trade_log: Vec<TradeLogEntry>,
}

impl BacktestOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.trade_log.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_return_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpe_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_drawdown_percent: Option<f64>,
}

impl PerformanceMetrics {
    pub fn is_empty(&self) -> bool {
        self.final_value.is_none()
            && self.total_return_percent.is_none()
            && self.sharpe_ratio.is_none()
            && self.max_drawdown_percent.is_none()
    }
}
