//! Candle history assembly, persistence and validation
//!
//! Fetches paged kline history through the exchange client, persists it as
//! CSV under the data directory and checks it for defects before a sweep.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::exchange::BinanceFuturesClient;
use crate::types::Candle;

const PAGE_DELAY_MS: u64 = 500;

/// Valid kline intervals for Binance futures
pub const INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Fetch candle history starting at `start_time`, page by page
///
/// With `fetch_to_now` the cursor advances past each page's last close time
/// until a short page or the current wall clock; otherwise a single page is
/// returned. The result is sorted by open time with duplicates dropped.
pub fn fetch_history(
    client: &BinanceFuturesClient,
    symbol: &str,
    interval: &str,
    start_time: i64,
    page_limit: u32,
    fetch_to_now: bool,
) -> Result<Vec<Candle>> {
    info!(
        "Fetching {} {} history from timestamp {}",
        symbol, interval, start_time
    );

    let mut all_candles: Vec<Candle> = Vec::new();
    let mut cursor = start_time;

    loop {
        let page = client.fetch_klines(symbol, interval, cursor, page_limit)?;

        if page.is_empty() {
            break;
        }

        let page_len = page.len();
        let newest_close = page.last().map(|c| c.close_time).unwrap_or(cursor);
        info!("  Fetched {} candles up to {}", page_len, newest_close);

        all_candles.extend(page);

        if !fetch_to_now {
            break;
        }

        // A short page means the available history is exhausted
        if page_len < page_limit as usize || newest_close >= Utc::now().timestamp_millis() {
            break;
        }

        cursor = newest_close + 1;

        // Rate limiting
        sleep(Duration::from_millis(PAGE_DELAY_MS));
    }

    if all_candles.is_empty() {
        bail!("No candles returned for {} {}", symbol, interval);
    }

    all_candles.sort_by_key(|c| c.open_time);
    all_candles.dedup_by_key(|c| c.open_time);

    info!("Total candles fetched: {}", all_candles.len());
    Ok(all_candles)
}

/// Data file path for a symbol and interval, e.g. `data/BTCUSDT_1h.csv`
pub fn csv_path(data_dir: &Path, symbol: &str, interval: &str) -> PathBuf {
    data_dir.join(format!("{}_{}.csv", symbol, interval))
}

/// Save candles to a CSV file, creating parent directories as needed
pub fn save_csv(candles: &[Candle], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    let mut writer =
        csv::Writer::from_path(path).context(format!("Failed to create {}", path.display()))?;

    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;

    info!("Saved {} candles to {}", candles.len(), path.display());
    Ok(())
}

/// Load candles from a CSV file written by [`save_csv`]
pub fn load_csv(path: &Path) -> Result<Vec<Candle>> {
    let mut reader =
        csv::Reader::from_path(path).context(format!("Failed to open {}", path.display()))?;

    let mut candles = Vec::new();
    for (row, result) in reader.deserialize().enumerate() {
        let candle: Candle = result.context(format!("Failed to parse row {}", row + 1))?;
        candles.push(candle);
    }

    Ok(candles)
}

/// Load the configured history from the local CSV if present, otherwise
/// fetch it from the exchange and persist it
///
/// Either way the returned history is sorted by open time with duplicates
/// dropped.
pub fn load_or_fetch(config: &Config, client: &BinanceFuturesClient) -> Result<Vec<Candle>> {
    let path = csv_path(
        Path::new(&config.backtest.data_dir),
        &config.trading.symbol,
        &config.trading.interval,
    );

    if path.exists() {
        let mut candles = load_csv(&path)?;
        // Hand-edited files can be out of order or carry duplicate rows;
        // the engine consumes ascending open times
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);
        info!("Loaded {} candles from {}", candles.len(), path.display());
        return Ok(candles);
    }

    let start_time = config.backtest.start_timestamp_ms()?;
    let candles = fetch_history(
        client,
        &config.trading.symbol,
        &config.trading.interval,
        start_time,
        config.exchange.page_limit,
        config.backtest.fetch_to_now,
    )?;
    save_csv(&candles, &path)?;

    Ok(candles)
}

/// Validate candle data for consistency
pub fn validate_candles(candles: &[Candle]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if candles.is_empty() {
        errors.push("No candles provided".to_string());
        return ValidationResult { errors, warnings };
    }

    for (i, candle) in candles.iter().enumerate() {
        if let Err(err) = candle.validate() {
            errors.push(format!("Candle {}: {}", i, err));
        }
        if i > 0 {
            if candle.open_time == candles[i - 1].open_time {
                warnings.push(format!("Candle {}: duplicate open time", i));
            } else if candle.open_time < candles[i - 1].open_time {
                warnings.push(format!("Candle {}: not chronological", i));
            }
        }
    }

    ValidationResult { errors, warnings }
}

/// Result of data validation
#[derive(Debug)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
