use crate::indicators::{
    calculate_pct_change, calculate_rolling_max, calculate_rolling_min, shift_forward,
};
use crate::models::{MomentumRanking, PriceTable, RegimeSignal};
use log::debug;
use std::cmp::Ordering;

/// Sessions in the trailing window used for drawdown and run-up.
pub const ROLLING_WINDOW_SESSIONS: usize = 20;
/// Sessions in the trailing momentum lookback.
pub const MOMENTUM_LOOKBACK_SESSIONS: usize = 60;
/// Number of candidates held in Attack mode.
pub const ATTACK_POSITIONS: usize = 2;

/// Derives regime flags from the benchmark column of a price table.
///
/// Thresholds are percentages (8 means 8%) and are not range
/// checked: zero or negative values simply make a signal fire always or never.
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    benchmark: String,
    risk_off_threshold_pct: f64,
    risk_on_threshold_pct: f64,
}

impl SignalGenerator {
    pub fn new(
        benchmark: impl Into<String>,
        risk_off_threshold_pct: f64,
        risk_on_threshold_pct: f64,
    ) -> Self {
        Self {
            benchmark: benchmark.into(),
            risk_off_threshold_pct,
            risk_on_threshold_pct,
        }
    }

    /// Raw, unshifted flags indexed like the price table. The value at `t`
    /// uses prices through `t` only.
    pub fn raw_signals(&self, prices: &PriceTable) -> (Vec<bool>, Vec<bool>) {
        let Some(closes) = prices.column(&self.benchmark) else {
            return (vec![false; prices.len()], vec![false; prices.len()]);
        };

        let rolling_max = calculate_rolling_max(closes, ROLLING_WINDOW_SESSIONS);
        let rolling_min = calculate_rolling_min(closes, ROLLING_WINDOW_SESSIONS);
        let risk_off_ratio = self.risk_off_threshold_pct / 100.0;
        let risk_on_ratio = self.risk_on_threshold_pct / 100.0;

        let mut risk_off = Vec::with_capacity(closes.len());
        let mut risk_on = Vec::with_capacity(closes.len());
        for idx in 0..closes.len() {
            let drawdown = match (closes[idx], rolling_max[idx]) {
                (Some(close), Some(max)) => Some(close / max - 1.0),
                _ => None,
            };
            let upward_move = match (closes[idx], rolling_min[idx]) {
                (Some(close), Some(min)) => Some(close / min - 1.0),
                _ => None,
            };

            let off = drawdown.map(|dd| dd < -risk_off_ratio).unwrap_or(false);
            // The drawdown guard keeps the two flags mutually exclusive.
            let on = match (upward_move, drawdown) {
                (Some(up), Some(dd)) => up > risk_on_ratio && dd > -risk_off_ratio,
                _ => false,
            };
            risk_off.push(off);
            risk_on.push(on);
        }

        (risk_off, risk_on)
    }

    /// Tradable flags aligned to the return-table dates (price rows 1..).
    /// Each flag is shifted one session so day `t` only sees data through `t-1`.
    pub fn regime_signals(&self, prices: &PriceTable) -> RegimeSignal {
        let (raw_off, raw_on) = self.raw_signals(prices);
        let risk_off: Vec<bool> = shift_forward(&raw_off, false).into_iter().skip(1).collect();
        let risk_on: Vec<bool> = shift_forward(&raw_on, false).into_iter().skip(1).collect();

        debug!(
            "Regime signals for {}: {} risk-off days, {} risk-on days over {} sessions",
            self.benchmark,
            risk_off.iter().filter(|flag| **flag).count(),
            risk_on.iter().filter(|flag| **flag).count(),
            risk_off.len()
        );

        RegimeSignal { risk_off, risk_on }
    }
}

/// Ranks candidates by trailing momentum known at the open of each return
/// date: `price(t-1) / price(t-1-60) - 1`. Candidates without a defined
/// momentum rank after every defined one; ties keep candidate order.
pub fn momentum_ranking(prices: &PriceTable, candidates: &[String]) -> MomentumRanking {
    let momentum_by_candidate: Vec<(&String, Vec<Option<f64>>)> = candidates
        .iter()
        .map(|symbol| {
            let closes = prices.column(symbol).unwrap_or(&[]);
            let momentum = calculate_pct_change(closes, MOMENTUM_LOOKBACK_SESSIONS);
            (symbol, shift_forward(&momentum, None))
        })
        .collect();

    let return_rows = prices.len().saturating_sub(1);
    let mut ranked = Vec::with_capacity(return_rows);
    for row in 0..return_rows {
        let price_index = row + 1;
        let mut scored: Vec<(&String, Option<f64>)> = momentum_by_candidate
            .iter()
            .map(|(symbol, momentum)| (*symbol, momentum.get(price_index).copied().flatten()))
            .collect();
        scored.sort_by(|a, b| compare_momentum(a.1, b.1));
        ranked.push(
            scored
                .into_iter()
                .take(ATTACK_POSITIONS)
                .map(|(symbol, _)| symbol.clone())
                .collect(),
        );
    }

    MomentumRanking { ranked }
}

fn compare_momentum(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn dates(count: usize) -> Vec<NaiveDate> {
        let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        (0..count).map(|i| base + Duration::days(i as i64)).collect()
    }

    fn table(columns: Vec<(&str, Vec<f64>)>) -> PriceTable {
        let count = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        PriceTable::from_columns(
            dates(count),
            columns
                .into_iter()
                .map(|(symbol, values)| {
                    (symbol.to_string(), values.into_iter().map(Some).collect())
                })
                .collect(),
        )
    }

    fn zigzag(count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| match i % 7 {
                0 => 100.0,
                1 => 112.0,
                2 => 95.0,
                3 => 120.0,
                4 => 88.0,
                5 => 104.0,
                _ => 130.0,
            })
            .collect()
    }

    #[test]
    fn fifteen_percent_drop_fires_risk_off_the_next_day() {
        let mut benchmark = vec![100.0; 25];
        benchmark.extend([85.0, 85.0, 85.0]);
        let prices = table(vec![("IDX", benchmark)]);
        let generator = SignalGenerator::new("IDX", 8.0, 5.0);

        let (raw_off, _) = generator.raw_signals(&prices);
        assert!(raw_off[25]);
        assert!(!raw_off[24]);

        let signals = generator.regime_signals(&prices);
        assert_eq!(signals.len(), prices.len() - 1);
        // Return row r corresponds to price row r + 1.
        assert!(!signals.risk_off_at(24));
        assert!(signals.risk_off_at(25));
        assert!(!signals.risk_on_at(25));
    }

    #[test]
    fn flags_are_never_both_true() {
        let prices = table(vec![("IDX", zigzag(120))]);
        for (off, on) in [(8.0, 5.0), (0.0, 0.0), (-5.0, -5.0), (30.0, 1.0)] {
            let signals = SignalGenerator::new("IDX", off, on).regime_signals(&prices);
            for idx in 0..signals.len() {
                assert!(
                    !(signals.risk_off_at(idx) && signals.risk_on_at(idx)),
                    "both flags set at {} with thresholds {}/{}",
                    idx,
                    off,
                    on
                );
            }
        }
    }

    #[test]
    fn fewer_than_twenty_sessions_never_signal() {
        let prices = table(vec![("IDX", zigzag(40))]);
        let signals = SignalGenerator::new("IDX", -100.0, -100.0).regime_signals(&prices);
        // Return row r sees raw flags through price row r, which needs 20 sessions.
        for idx in 0..19 {
            assert!(!signals.risk_off_at(idx));
            assert!(!signals.risk_on_at(idx));
        }
        assert!(signals.risk_off_at(19));
    }

    fn scaled_from(values: &[f64], from: usize, factor: f64) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| if idx >= from { value * factor } else { *value })
            .collect()
    }

    #[test]
    fn prices_from_the_trade_date_on_do_not_change_its_signal() {
        let base = zigzag(90);
        let generator = SignalGenerator::new("IDX", 8.0, 5.0);
        let original = generator.regime_signals(&table(vec![("IDX", base.clone())]));

        for from in [20, 25, 40, 61, 75] {
            let shocked = generator.regime_signals(&table(vec![(
                "IDX",
                scaled_from(&base, from, 0.5),
            )]));
            // Return row r trades on price row r + 1, so rows below `from`
            // cover every trade dated on or before price row `from`.
            assert_eq!(original.risk_off[..from], shocked.risk_off[..from]);
            assert_eq!(original.risk_on[..from], shocked.risk_on[..from]);
            assert_ne!(original, shocked, "shock at {} had no effect", from);
        }
    }

    #[test]
    fn momentum_ranking_ignores_prices_from_the_trade_date_on() {
        let count = 100;
        let a: Vec<f64> = (0..count).map(|i| 100.0 + i as f64 * 2.0).collect();
        let b: Vec<f64> = (0..count).map(|i| 100.0 + i as f64 * 0.5).collect();
        let c: Vec<f64> = (0..count).map(|i| 100.0 - i as f64 * 0.5).collect();
        let candidates = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let original = momentum_ranking(
            &table(vec![("A", a.clone()), ("B", b.clone()), ("C", c.clone())]),
            &candidates,
        );

        for from in [61, 62, 70, 90] {
            let shocked = momentum_ranking(
                &table(vec![
                    ("A", scaled_from(&a, from, 0.3)),
                    ("B", b.clone()),
                    ("C", scaled_from(&c, from, 3.7)),
                ]),
                &candidates,
            );
            // top_at(from - 1) is the selection traded on price row `from`.
            for row in 0..from {
                assert_eq!(original.top_at(row), shocked.top_at(row), "row {}", row);
            }
            assert_eq!(shocked.top_at(from), &["C".to_string(), "B".to_string()]);
            assert_ne!(original.top_at(from), shocked.top_at(from));
        }
    }

    #[test]
    fn momentum_picks_top_two_with_one_day_lag() {
        let count = 70;
        let a: Vec<f64> = (0..count).map(|i| 100.0 + i as f64 * 2.0).collect();
        let b: Vec<f64> = (0..count).map(|i| 100.0 + i as f64 * 0.5).collect();
        let c: Vec<f64> = (0..count).map(|i| 100.0 - i as f64 * 0.5).collect();
        let prices = table(vec![("A", a), ("B", b), ("C", c)]);
        let candidates = vec!["C".to_string(), "B".to_string(), "A".to_string()];

        let ranking = momentum_ranking(&prices, &candidates);
        assert_eq!(ranking.ranked.len(), count - 1);
        // Price row 61 is the first whose previous row has 60 sessions of history.
        assert_eq!(ranking.top_at(60), &["A".to_string(), "B".to_string()]);
        // Before that nothing is defined and candidate order decides.
        assert_eq!(ranking.top_at(58), &["C".to_string(), "B".to_string()]);
    }
}
