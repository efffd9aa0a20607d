//! Download command implementation

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use rsi_optimizer::data;
use rsi_optimizer::exchange::BinanceFuturesClient;
use rsi_optimizer::Config;

pub fn run(config_path: String) -> Result<()> {
    info!("Starting candle download");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let client = BinanceFuturesClient::new();
    let start_time = config.backtest.start_timestamp_ms()?;
    let candles = data::fetch_history(
        &client,
        &config.trading.symbol,
        &config.trading.interval,
        start_time,
        config.exchange.page_limit,
        config.backtest.fetch_to_now,
    )?;

    // The raw capture is saved even when validation flags problems, so a
    // partial or messy download can still be inspected on disk.
    let validation = data::validate_candles(&candles);
    for warning in &validation.warnings {
        warn!("Validation warning: {}", warning);
    }
    for error in &validation.errors {
        warn!("Validation error: {}", error);
    }

    let path = data::csv_path(
        Path::new(&config.backtest.data_dir),
        &config.trading.symbol,
        &config.trading.interval,
    );
    data::save_csv(&candles, &path)?;

    info!("Download completed successfully");
    Ok(())
}
