use crate::models::*;
use statrs::statistics::Statistics;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Reduces a cumulative growth series (1.0 = starting capital) into summary
    /// metrics. An empty series yields no metrics at all; a series whose daily
    /// returns have no variance only reports the total return.
    pub fn calculate_performance(cumulative: &[f64], initial_capital: f64) -> PerformanceMetrics {
        let Some(&last_value) = cumulative.last() else {
            return PerformanceMetrics::default();
        };

        let total_return_percent = (last_value - 1.0) * 100.0;
        let daily_returns = Self::daily_returns(cumulative);

        let Some(sharpe_ratio) = Self::calculate_sharpe_ratio(&daily_returns) else {
            return PerformanceMetrics {
                total_return_percent: Some(total_return_percent),
                ..PerformanceMetrics::default()
            };
        };

        PerformanceMetrics {
            final_value: Some(initial_capital * last_value),
            total_return_percent: Some(total_return_percent),
            sharpe_ratio: Some(sharpe_ratio),
            max_drawdown_percent: Some(Self::calculate_max_drawdown_percent(cumulative)),
        }
    }

    /// Period-over-period percent change; the undefined first entry is dropped.
    pub fn daily_returns(cumulative: &[f64]) -> Vec<f64> {
        cumulative
            .windows(2)
            .map(|window| window[1] / window[0] - 1.0)
            .collect()
    }

    /// Annualized mean/std ratio without a risk-free rate. `None` when the
    /// standard deviation is zero or undefined (fewer than two returns).
    pub fn calculate_sharpe_ratio(daily_returns: &[f64]) -> Option<f64> {
        if daily_returns.len() < 2 {
            return None;
        }

        let mean_return = daily_returns.mean();
        let std_dev = daily_returns.std_dev();
        if !std_dev.is_finite() || std_dev <= f64::EPSILON {
            return None;
        }

        Some(mean_return / std_dev * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Deepest peak-to-trough decline, as a non-positive percentage.
    pub fn calculate_max_drawdown_percent(cumulative: &[f64]) -> f64 {
        let Some(&first) = cumulative.first() else {
            return 0.0;
        };

        let mut peak_value = first;
        let mut max_drawdown = 0.0_f64;
        for &value in cumulative {
            if value > peak_value {
                peak_value = value;
            }
            if peak_value > 0.0 {
                max_drawdown = max_drawdown.min((value - peak_value) / peak_value);
            }
        }

        max_drawdown * 100.0
    }
}
