pub mod backtester;
pub mod config;
pub mod context;
pub mod data_context;
pub mod engine;
pub mod indicators;
pub mod models;
pub mod performance;
pub mod provider;
pub mod report;
pub mod signals;
pub mod strategy;
pub mod yahoo;

pub mod commands {
    pub mod backtest;
    pub mod export_prices;
}
