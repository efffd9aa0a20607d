//! RSI Optimizer
//!
//! A leveraged RSI strategy backtester for Binance USDT-M futures, featuring
//! a grid parameter sweep, funding and fee accounting, and performance
//! reporting.

pub mod backtest;
pub mod config;
pub mod data;
pub mod exchange;
pub mod indicators;
pub mod metrics;
pub mod optimize;
pub mod params;
pub mod report;
pub mod types;

pub use config::Config;
pub use types::*;
