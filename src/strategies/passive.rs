use crate::models::*;
use crate::strategy::{Allocation, DayContext};

pub struct PassiveStrategy {
    benchmark: String,
}

impl PassiveStrategy {
    pub fn new(universe: &InstrumentUniverse) -> Self {
        Self {
            benchmark: universe.benchmark.clone(),
        }
    }
}

impl super::Strategy for PassiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Passive
    }

    fn allocate(&self, day: &DayContext<'_>) -> Allocation {
        // Always fully in the benchmark, whatever the signals say.
        Allocation {
            mode: None,
            assets: vec![self.benchmark.clone()],
            daily_return: day.asset_return(&self.benchmark),
        }
    }
}
