use crate::models::*;

/// Everything a strategy may look at when allocating for one return date.
/// Signals and rankings are already lagged, so nothing here reveals prices
/// after the previous close.
pub struct DayContext<'a> {
    pub index: usize,
    pub returns: &'a ReturnTable,
    pub signals: &'a RegimeSignal,
    pub ranking: &'a MomentumRanking,
}

impl DayContext<'_> {
    pub fn asset_return(&self, symbol: &str) -> f64 {
        self.returns.value(symbol, self.index)
    }

    pub fn risk_off(&self) -> bool {
        self.signals.risk_off_at(self.index)
    }

    pub fn risk_on(&self) -> bool {
        self.signals.risk_on_at(self.index)
    }

    pub fn top_candidates(&self) -> &[String] {
        self.ranking.top_at(self.index)
    }
}

/// The position a strategy holds for one day and the return it earns.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// `None` for allocations that ignore the regime.
    pub mode: Option<Mode>,
    pub assets: Vec<String>,
    pub daily_return: f64,
}

pub trait Strategy {
    fn kind(&self) -> StrategyKind;
    fn allocate(&self, day: &DayContext<'_>) -> Allocation;
}

#[path = "strategies/passive.rs"]
pub mod passive;

pub use passive::PassiveStrategy;

#[path = "strategies/binary_hedge.rs"]
pub mod binary_hedge;

pub use binary_hedge::BinaryHedgeStrategy;

#[path = "strategies/dynamic.rs"]
pub mod dynamic;

pub use dynamic::DynamicStrategy;

pub fn create_strategy(
    kind: StrategyKind,
    universe: &InstrumentUniverse,
) -> Box<dyn Strategy + Send + Sync> {
    match kind {
        StrategyKind::Passive => Box::new(PassiveStrategy::new(universe)),
        StrategyKind::Hedge => Box::new(BinaryHedgeStrategy::new(universe)),
        StrategyKind::Dynamic => Box::new(DynamicStrategy::new(universe)),
    }
}
