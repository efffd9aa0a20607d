//! Configuration management
//!
//! Loading and validation of the JSON configuration file that drives the
//! sweep, single backtests and data downloads. Every section and field has
//! a default so partial files work.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::INTERVALS;
use crate::params::{ParamRange, ParamSpace};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub trading: TradingConfig,
    pub sweep: SweepConfig,
    pub backtest: BacktestConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !INTERVALS.contains(&self.trading.interval.as_str()) {
            bail!("Unknown interval: {}", self.trading.interval);
        }
        if self.trading.initial_fund <= 0.0 {
            bail!("initial_fund must be positive");
        }
        if self.trading.order_fraction <= 0.0 || self.trading.order_fraction > 1.0 {
            bail!("order_fraction must be in (0, 1]");
        }
        if self.exchange.fee_rate < 0.0 {
            bail!("fee_rate must not be negative");
        }
        if self.exchange.funding_period_hours == 0 {
            bail!("funding_period_hours must be positive");
        }
        if self.exchange.page_limit == 0 || self.exchange.page_limit > 1500 {
            bail!("page_limit must be between 1 and 1500");
        }
        if let Some(limit) = self.backtest.max_drawdown {
            if limit <= 0.0 || limit > 1.0 {
                bail!("max_drawdown limit must be in (0, 1]");
            }
        }
        if self.sweep.sample_cap == Some(0) {
            bail!("sample_cap must be at least 1 when set");
        }

        for (name, range) in [
            ("entry_period", &self.sweep.entry_period),
            ("exit_period", &self.sweep.exit_period),
            ("entry_level", &self.sweep.entry_level),
            ("exit_level", &self.sweep.exit_level),
            ("leverage", &self.sweep.leverage),
        ] {
            if range.step == 0 {
                bail!("{} step must be at least 1", name);
            }
            if range.min > range.max {
                bail!(
                    "{} range is empty: min {} > max {}",
                    name,
                    range.min,
                    range.max
                );
            }
        }
        if self.sweep.entry_period.min < 1 {
            bail!("entry_period must be at least 1");
        }
        if self.sweep.exit_period.min < 1 {
            bail!("exit_period must be at least 1");
        }
        if self.sweep.leverage.min < 1 {
            bail!("leverage must be at least 1");
        }

        self.backtest.start_timestamp_ms()?;

        Ok(())
    }
}

/// Exchange fee and data parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub fee_rate: f64,
    pub funding_rate: f64,
    pub funding_period_hours: u32,
    /// Candles per kline request, capped by the API at 1500
    pub page_limit: u32,
    /// Fixed quantity step override; fetched from the exchange when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity_step: Option<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            fee_rate: 0.0005,     // taker 0.05%
            funding_rate: 0.0001, // 0.01% per funding period
            funding_period_hours: 8,
            page_limit: 1500,
            quantity_step: None,
        }
    }
}

/// Instrument and fund parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub symbol: String,
    pub interval: String,
    pub initial_fund: f64,
    /// Fraction of the free fund committed per entry, before leverage
    pub order_fraction: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            initial_fund: 1000.0,
            order_fraction: 0.2,
        }
    }
}

/// Parameter ranges swept by the optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub entry_period: ParamRange,
    pub exit_period: ParamRange,
    pub entry_level: ParamRange,
    pub exit_level: ParamRange,
    pub leverage: ParamRange,
    /// Upper bound on candidates; the space is sampled down when it
    /// enumerates to more than this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_cap: Option<usize>,
    /// Seed for reproducible sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            entry_period: ParamRange::new(10, 20, 2),
            exit_period: ParamRange::new(5, 15, 2),
            entry_level: ParamRange::new(50, 70, 5),
            exit_level: ParamRange::new(30, 50, 5),
            leverage: ParamRange::new(1, 5, 1),
            sample_cap: None,
            seed: None,
        }
    }
}

impl SweepConfig {
    /// Assemble the parameter space from the configured ranges
    pub fn space(&self) -> ParamSpace {
        ParamSpace {
            leverage: self.leverage,
            entry_period: self.entry_period,
            exit_period: self.exit_period,
            entry_level: self.entry_level,
            exit_level: self.exit_level,
        }
    }
}

/// History window and run controls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// History start date, YYYY-MM-DD (UTC midnight)
    pub start_time: String,
    /// Keep paging until the current wall clock instead of one page
    pub fetch_to_now: bool,
    /// Runs whose drawdown exceeds this fraction are invalidated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_drawdown: Option<f64>,
    pub data_dir: String,
    pub results_dir: String,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start_time: "2023-01-01".to_string(),
            fetch_to_now: true,
            max_drawdown: None,
            data_dir: "data".to_string(),
            results_dir: "results".to_string(),
        }
    }
}

impl BacktestConfig {
    /// Parse the configured start date into Unix milliseconds at midnight UTC
    pub fn start_timestamp_ms(&self) -> Result<i64> {
        let date = NaiveDate::parse_from_str(&self.start_time, "%Y-%m-%d")
            .context(format!("Invalid start_time: {}", self.start_time))?;
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Invalid midnight timestamp")?;
        Ok(datetime.and_utc().timestamp_millis())
    }
}
