use crate::models::*;
use crate::performance::PerformanceCalculator;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE_NAME: &str = "results.csv";
pub const TRADE_LOG_FILE_NAME: &str = "trade_log.csv";
pub const METRICS_FILE_NAME: &str = "metrics.json";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StrategyReport {
    pub strategy: StrategyKind,
    pub label: String,
    pub metrics: PerformanceMetrics,
}

/// Metrics for every strategy in display order.
pub fn summarize(results: &ResultsTable, initial_capital: f64) -> Vec<StrategyReport> {
    StrategyKind::ALL
        .iter()
        .map(|kind| StrategyReport {
            strategy: *kind,
            label: kind.label().to_string(),
            metrics: PerformanceCalculator::calculate_performance(
                results.series(*kind),
                initial_capital,
            ),
        })
        .collect()
}

pub fn format_summary(reports: &[StrategyReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "{}", report.label);
        let metrics = &report.metrics;
        if let Some(value) = metrics.final_value {
            let _ = writeln!(out, "  Final Value:       {}", format_thousands(value));
        }
        if let Some(value) = metrics.total_return_percent {
            let _ = writeln!(out, "  Total Return (%):  {:.2}", value);
        }
        if let Some(value) = metrics.sharpe_ratio {
            let _ = writeln!(out, "  Sharpe Ratio:      {:.2}", value);
        }
        if let Some(value) = metrics.max_drawdown_percent {
            let _ = writeln!(out, "  Max Drawdown (%):  {:.2}", value);
        }
        if metrics.is_empty() {
            let _ = writeln!(out, "  (no data)");
        }
    }
    out
}

pub fn format_trade_log(entries: &[TradeLogEntry]) -> String {
    if entries.is_empty() {
        return "No regime changes.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<12}{:<10}{:<8}Assets", "Date", "Mode", "Action");
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<12}{:<10}{:<8}{}",
            entry.date.format("%Y-%m-%d").to_string(),
            entry.mode.as_str(),
            entry.action.as_str(),
            entry.assets_label()
        );
    }
    out
}

/// Formats a number with two decimals and comma thousands separators.
pub fn format_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

/// Growth multiples per strategy followed by the same series in currency,
/// scaled by `initial_capital`.
pub fn results_csv(results: &ResultsTable, initial_capital: f64) -> String {
    let mut out = String::from("date");
    for kind in StrategyKind::ALL {
        let _ = write!(out, ",{}", kind.as_str());
    }
    for kind in StrategyKind::ALL {
        let _ = write!(out, ",{}_value", kind.as_str());
    }
    out.push('\n');

    for (idx, date) in results.dates.iter().enumerate() {
        let _ = write!(out, "{}", date.format("%Y-%m-%d"));
        let row: Vec<f64> = StrategyKind::ALL
            .iter()
            .map(|kind| results.series(*kind).get(idx).copied().unwrap_or(f64::NAN))
            .collect();
        for value in &row {
            let _ = write!(out, ",{}", value);
        }
        for value in &row {
            let _ = write!(out, ",{:.2}", value * initial_capital);
        }
        out.push('\n');
    }
    out
}

pub fn trade_log_csv(entries: &[TradeLogEntry]) -> String {
    let mut out = String::from("date,mode,action,assets\n");
    for entry in entries {
        let _ = writeln!(
            out,
            "{},{},{},\"{}\"",
            entry.date.format("%Y-%m-%d"),
            entry.mode.as_str(),
            entry.action.as_str(),
            entry.assets_label()
        );
    }
    out
}

/// Writes results, trade log and metrics into `dir`, creating it if needed.
/// Returns the written paths.
pub fn write_reports(
    dir: &Path,
    output: &BacktestOutput,
    reports: &[StrategyReport],
    initial_capital: f64,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let results_path = dir.join(RESULTS_FILE_NAME);
    fs::write(&results_path, results_csv(&output.results, initial_capital))
        .with_context(|| format!("Failed to write {}", results_path.display()))?;

    let trade_log_path = dir.join(TRADE_LOG_FILE_NAME);
    fs::write(&trade_log_path, trade_log_csv(&output.trade_log))
        .with_context(|| format!("Failed to write {}", trade_log_path.display()))?;

    let metrics_path = dir.join(METRICS_FILE_NAME);
    let metrics_json =
        serde_json::to_string_pretty(reports).context("Failed to serialize metrics")?;
    fs::write(&metrics_path, metrics_json)
        .with_context(|| format!("Failed to write {}", metrics_path.display()))?;

    Ok(vec![results_path, trade_log_path, metrics_path])
}
