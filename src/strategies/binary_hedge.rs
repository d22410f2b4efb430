use crate::models::*;
use crate::strategy::{Allocation, DayContext};

/// Holds the defensive instrument on risk-off days and the neutral one
/// otherwise. Risk-on is ignored.
pub struct BinaryHedgeStrategy {
    neutral: String,
    defensive: String,
}

impl BinaryHedgeStrategy {
    pub fn new(universe: &InstrumentUniverse) -> Self {
        Self {
            neutral: universe.neutral.clone(),
            defensive: universe.defensive.clone(),
        }
    }
}

impl super::Strategy for BinaryHedgeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hedge
    }

    fn allocate(&self, day: &DayContext<'_>) -> Allocation {
        if day.risk_off() {
            return Allocation {
                mode: Some(Mode::Defense),
                assets: vec![self.defensive.clone()],
                daily_return: day.asset_return(&self.defensive),
            };
        }

        Allocation {
            mode: Some(Mode::Neutral),
            assets: vec![self.neutral.clone()],
            daily_return: day.asset_return(&self.neutral),
        }
    }
}
