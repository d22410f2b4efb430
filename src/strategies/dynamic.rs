use crate::models::*;
use crate::strategy::{Allocation, DayContext};

/// Three-regime allocation: top momentum candidates when risk-on, the
/// defensive instrument when risk-off, the neutral instrument otherwise.
pub struct DynamicStrategy {
    neutral: String,
    defensive: String,
}

impl DynamicStrategy {
    pub fn new(universe: &InstrumentUniverse) -> Self {
        Self {
            neutral: universe.neutral.clone(),
            defensive: universe.defensive.clone(),
        }
    }

    pub fn resolve_mode(day: &DayContext<'_>) -> Mode {
        // Risk-on is checked first; the flags cannot both be set.
        if day.risk_on() {
            Mode::Attack
        } else if day.risk_off() {
            Mode::Defense
        } else {
            Mode::Neutral
        }
    }
}

impl super::Strategy for DynamicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dynamic
    }

    fn allocate(&self, day: &DayContext<'_>) -> Allocation {
        match Self::resolve_mode(day) {
            Mode::Attack => {
                let assets = day.top_candidates().to_vec();
                let daily_return = if assets.is_empty() {
                    0.0
                } else {
                    assets
                        .iter()
                        .map(|symbol| day.asset_return(symbol))
                        .sum::<f64>()
                        / assets.len() as f64
                };
                Allocation {
                    mode: Some(Mode::Attack),
                    assets,
                    daily_return,
                }
            }
            Mode::Defense => Allocation {
                mode: Some(Mode::Defense),
                assets: vec![self.defensive.clone()],
                daily_return: day.asset_return(&self.defensive),
            },
            Mode::Neutral => Allocation {
                mode: Some(Mode::Neutral),
                assets: vec![self.neutral.clone()],
                daily_return: day.asset_return(&self.neutral),
            },
        }
    }
}
