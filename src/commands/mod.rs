//! CLI command implementations

use anyhow::{bail, Result};
use tracing::{info, warn};

use rsi_optimizer::data;
use rsi_optimizer::exchange::{step_decimals, BinanceFuturesClient};
use rsi_optimizer::types::Candle;
use rsi_optimizer::Config;

pub mod backtest;
pub mod download;
pub mod sweep;

/// Validate the candle history, logging warnings and failing on errors
fn check_history(candles: &[Candle]) -> Result<()> {
    let validation = data::validate_candles(candles);

    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.is_valid() {
        bail!(
            "Candle history failed validation with {} error(s), first: {}",
            validation.errors.len(),
            validation.errors[0]
        );
    }

    Ok(())
}

/// Quantity step decimals from the config override or the exchange
fn resolve_quantity_decimals(config: &Config, client: &BinanceFuturesClient) -> Result<u32> {
    let step = match &config.exchange.quantity_step {
        Some(step) => step.clone(),
        None => client.fetch_quantity_step(&config.trading.symbol)?,
    };

    let decimals = step_decimals(&step)?;
    info!("Quantity step {} ({} decimal places)", step, decimals);
    Ok(decimals)
}
