use crate::models::*;
use crate::strategy::{create_strategy, DayContext, Strategy};
use chrono::NaiveDate;
use log::debug;

/// Daily returns of each strategy, aligned to the return-table dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyReturns {
    pub passive: Vec<f64>,
    pub hedge: Vec<f64>,
    pub dynamic: Vec<f64>,
}

impl StrategyReturns {
    pub fn series(&self, kind: StrategyKind) -> &[f64] {
        match kind {
            StrategyKind::Passive => &self.passive,
            StrategyKind::Hedge => &self.hedge,
            StrategyKind::Dynamic => &self.dynamic,
        }
    }

    fn series_mut(&mut self, kind: StrategyKind) -> &mut Vec<f64> {
        match kind {
            StrategyKind::Passive => &mut self.passive,
            StrategyKind::Hedge => &mut self.hedge,
            StrategyKind::Dynamic => &mut self.dynamic,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationOutput {
    pub dates: Vec<NaiveDate>,
    pub daily_returns: StrategyReturns,
    pub trade_log: Vec<TradeLogEntry>,
}

impl SimulationOutput {
    /// Cumulative growth table. `base_date` is the priced session before the
    /// first return date and anchors every series at 1.0.
    pub fn results_table(&self, base_date: NaiveDate) -> ResultsTable {
        let mut dates = Vec::with_capacity(self.dates.len() + 1);
        dates.push(base_date);
        dates.extend_from_slice(&self.dates);

        ResultsTable {
            dates,
            passive: cumulative_returns(&self.daily_returns.passive),
            hedge: cumulative_returns(&self.daily_returns.hedge),
            dynamic: cumulative_returns(&self.daily_returns.dynamic),
        }
    }
}

/// Running product of `1 + r`, starting from exactly 1.0.
pub fn cumulative_returns(daily_returns: &[f64]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(daily_returns.len() + 1);
    let mut value = 1.0;
    cumulative.push(value);
    for daily_return in daily_returns {
        value *= 1.0 + daily_return;
        cumulative.push(value);
    }
    cumulative
}

/// Runs the passive, hedge and dynamic strategies over the same return table
/// and records every regime change of the dynamic one.
pub struct StrategySimulator {
    strategies: Vec<Box<dyn Strategy + Send + Sync>>,
}

impl StrategySimulator {
    pub fn new(universe: &InstrumentUniverse) -> Self {
        let strategies = StrategyKind::ALL
            .iter()
            .map(|kind| create_strategy(*kind, universe))
            .collect();
        Self { strategies }
    }

    pub fn simulate(
        &self,
        returns: &ReturnTable,
        signals: &RegimeSignal,
        ranking: &MomentumRanking,
    ) -> SimulationOutput {
        let mut daily_returns = StrategyReturns::default();
        let mut trade_log = Vec::new();
        let mut current_mode = Mode::Neutral;

        for (index, date) in returns.dates().iter().enumerate() {
            let day = DayContext {
                index,
                returns,
                signals,
                ranking,
            };

            for strategy in &self.strategies {
                let allocation = strategy.allocate(&day);
                daily_returns
                    .series_mut(strategy.kind())
                    .push(allocation.daily_return);

                if strategy.kind() != StrategyKind::Dynamic {
                    continue;
                }
                let Some(mode) = allocation.mode else {
                    continue;
                };
                if mode == current_mode {
                    continue;
                }

                debug!(
                    "{}: {} -> {} ({})",
                    date,
                    current_mode,
                    mode,
                    allocation.assets.join(", ")
                );
                trade_log.push(TradeLogEntry {
                    date: *date,
                    mode,
                    action: TradeAction::Enter,
                    assets: allocation.assets,
                });
                current_mode = mode;
            }
        }

        SimulationOutput {
            dates: returns.dates().to_vec(),
            daily_returns,
            trade_log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn universe() -> InstrumentUniverse {
        InstrumentUniverse::new("IDX", "NEU", "DEF")
    }

    fn dates(count: usize) -> Vec<NaiveDate> {
        let base = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        (0..count).map(|i| base + Duration::days(i as i64)).collect()
    }

    /// Price rows chosen so each instrument has a distinct constant daily return.
    fn returns_fixture(rows: usize) -> ReturnTable {
        let growth = |rate: f64| -> Vec<Option<f64>> {
            (0..rows).map(|i| Some(100.0 * (1.0 + rate).powi(i as i32))).collect()
        };
        let prices = PriceTable::from_columns(
            dates(rows),
            vec![
                ("IDX".to_string(), growth(0.01)),
                ("NEU".to_string(), growth(0.002)),
                ("DEF".to_string(), growth(-0.003)),
                ("A".to_string(), growth(0.02)),
                ("B".to_string(), growth(0.04)),
            ],
        );
        ReturnTable::from_prices(&prices)
    }

    fn ranking(rows: usize) -> MomentumRanking {
        MomentumRanking {
            ranked: vec![vec!["B".to_string(), "A".to_string()]; rows],
        }
    }

    #[test]
    fn strategies_follow_their_allocation_rules() {
        let returns = returns_fixture(6);
        let signals = RegimeSignal {
            risk_off: vec![false, true, false, false, true],
            risk_on: vec![false, false, true, true, false],
        };
        let output = StrategySimulator::new(&universe()).simulate(&returns, &signals, &ranking(5));

        for value in &output.daily_returns.passive {
            assert!((value - 0.01).abs() < 1e-12);
        }
        let hedge = &output.daily_returns.hedge;
        assert!((hedge[0] - 0.002).abs() < 1e-12);
        assert!((hedge[1] + 0.003).abs() < 1e-12);
        assert!((hedge[2] - 0.002).abs() < 1e-12);

        let dynamic = &output.daily_returns.dynamic;
        assert!((dynamic[0] - 0.002).abs() < 1e-12);
        assert!((dynamic[1] + 0.003).abs() < 1e-12);
        assert!((dynamic[2] - 0.03).abs() < 1e-12);
        assert!((dynamic[4] + 0.003).abs() < 1e-12);
    }

    #[test]
    fn only_regime_aware_strategies_report_a_mode() {
        let returns = returns_fixture(3);
        let signals = RegimeSignal {
            risk_off: vec![true, false],
            risk_on: vec![false, true],
        };
        let ranking = ranking(2);
        let day = DayContext {
            index: 0,
            returns: &returns,
            signals: &signals,
            ranking: &ranking,
        };

        let modes: Vec<Option<Mode>> = StrategyKind::ALL
            .iter()
            .map(|kind| create_strategy(*kind, &universe()).allocate(&day).mode)
            .collect();
        assert_eq!(modes, vec![None, Some(Mode::Defense), Some(Mode::Defense)]);

        let passive = create_strategy(StrategyKind::Passive, &universe()).allocate(&day);
        assert_eq!(passive.assets, vec!["IDX".to_string()]);
    }

    #[test]
    fn trade_log_records_only_mode_changes() {
        let returns = returns_fixture(7);
        let signals = RegimeSignal {
            risk_off: vec![false, true, true, false, false, false],
            risk_on: vec![false, false, false, true, true, false],
        };
        let output = StrategySimulator::new(&universe()).simulate(&returns, &signals, &ranking(6));
        let log = &output.trade_log;

        let modes: Vec<Mode> = log.iter().map(|entry| entry.mode).collect();
        assert_eq!(modes, vec![Mode::Defense, Mode::Attack, Mode::Neutral]);
        assert_eq!(log[0].date, returns.dates()[1]);
        assert_eq!(log[0].assets, vec!["DEF".to_string()]);
        assert_eq!(log[1].assets_label(), "B, A");
        assert_eq!(log[2].assets, vec!["NEU".to_string()]);
        assert!(log.iter().all(|entry| entry.action == TradeAction::Enter));
        for pair in log.windows(2) {
            assert_ne!(pair[0].mode, pair[1].mode);
        }
    }

    #[test]
    fn first_day_outside_neutral_is_logged() {
        let returns = returns_fixture(3);
        let signals = RegimeSignal {
            risk_off: vec![true, true],
            risk_on: vec![false, false],
        };
        let output = StrategySimulator::new(&universe()).simulate(&returns, &signals, &ranking(2));
        assert_eq!(output.trade_log.len(), 1);
        assert_eq!(output.trade_log[0].date, returns.dates()[0]);
        assert_eq!(output.trade_log[0].mode, Mode::Defense);

        let quiet = RegimeSignal {
            risk_off: vec![false, false],
            risk_on: vec![false, false],
        };
        let output = StrategySimulator::new(&universe()).simulate(&returns, &quiet, &ranking(2));
        assert!(output.trade_log.is_empty());
    }

    #[test]
    fn cumulative_series_start_at_one_and_compound() {
        let daily = [0.1, -0.05, 0.02];
        let cumulative = cumulative_returns(&daily);
        assert_eq!(cumulative[0], 1.0);
        for (idx, daily_return) in daily.iter().enumerate() {
            assert_eq!(cumulative[idx + 1], cumulative[idx] * (1.0 + daily_return));
        }
    }

    #[test]
    fn simulation_is_deterministic() {
        let returns = returns_fixture(8);
        let signals = RegimeSignal {
            risk_off: vec![false, true, false, false, true, false, false],
            risk_on: vec![true, false, false, true, false, false, true],
        };
        let simulator = StrategySimulator::new(&universe());
        let first = simulator.simulate(&returns, &signals, &ranking(7));
        let second = simulator.simulate(&returns, &signals, &ranking(7));
        assert_eq!(first, second);

        let base = dates(1)[0];
        let first_table = first.results_table(base);
        let second_table = second.results_table(base);
        for kind in StrategyKind::ALL {
            let a: Vec<u64> = first_table.series(kind).iter().map(|v| v.to_bits()).collect();
            let b: Vec<u64> = second_table.series(kind).iter().map(|v| v.to_bits()).collect();
            assert_eq!(a, b);
        }
        assert_eq!(first_table.dates.len(), returns.len() + 1);
    }
}
