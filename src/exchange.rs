//! Binance USDⓈ-M futures market data client
//!
//! Read-only HTTP client for the public futures REST API. Only the two
//! endpoints the backtester needs are covered: klines for candle history and
//! exchangeInfo for the order quantity step.

use std::thread::sleep;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::types::Candle;

const FAPI_BASE_URL: &str = "https://fapi.binance.com";
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;

/// Kline row as served by /fapi/v1/klines: a 12-element array where prices
/// and volumes arrive as strings
type RawKline = (
    i64,    // open time
    String, // open
    String, // high
    String, // low
    String, // close
    String, // volume
    i64,    // close time
    String, // quote volume
    i64,    // trade count
    String, // taker buy base volume
    String, // taker buy quote volume
    String, // unused
);

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolFilter {
    filter_type: String,
    step_size: Option<String>,
}

/// HTTP client for the Binance futures public REST API
#[derive(Debug, Clone)]
pub struct BinanceFuturesClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl BinanceFuturesClient {
    pub fn new() -> Self {
        Self::with_base_url(FAPI_BASE_URL.to_string())
    }

    /// Client against a non-default base URL, e.g. the testnet
    pub fn with_base_url(base_url: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        BinanceFuturesClient { client, base_url }
    }

    /// Fetch one page of klines from `start_time` onwards, oldest first
    pub fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&startTime={}&limit={}",
            self.base_url, symbol, interval, start_time, limit
        );

        let raw: Vec<RawKline> = self.get_with_retry(&url)?;

        raw.iter()
            .map(|k| {
                Ok(Candle {
                    open_time: k.0,
                    open: k.1.parse().context("Failed to parse open price")?,
                    high: k.2.parse().context("Failed to parse high price")?,
                    low: k.3.parse().context("Failed to parse low price")?,
                    close: k.4.parse().context("Failed to parse close price")?,
                    volume: k.5.parse().context("Failed to parse volume")?,
                    close_time: k.6,
                })
            })
            .collect()
    }

    /// Look up the LOT_SIZE quantity step for a symbol from exchangeInfo
    pub fn fetch_quantity_step(&self, symbol: &str) -> Result<String> {
        let url = format!("{}/fapi/v1/exchangeInfo?symbol={}", self.base_url, symbol);
        let info: ExchangeInfo = self.get_with_retry(&url)?;

        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .context(format!("Symbol {} not found in exchange info", symbol))?;

        entry
            .filters
            .into_iter()
            .find(|f| f.filter_type == "LOT_SIZE")
            .and_then(|f| f.step_size)
            .context(format!("No LOT_SIZE step size published for {}", symbol))
    }

    fn get_with_retry<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_get(url) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < MAX_RETRIES => {
                    warn!(
                        "Request failed (attempt {}/{}): {:#}",
                        attempt, MAX_RETRIES, err
                    );
                    sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn try_get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .context("Failed to send request")?;

        if !response.status().is_success() {
            bail!("API returned status: {}", response.status());
        }

        response.json().context("Failed to parse response")
    }
}

impl Default for BinanceFuturesClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of decimal places implied by an exchange step size string;
/// "0.00100000" allows 3, "1" allows 0
pub fn step_decimals(step: &str) -> Result<u32> {
    let parsed: Decimal = step
        .parse()
        .context(format!("Invalid quantity step: {}", step))?;

    if parsed <= Decimal::ZERO {
        bail!("Quantity step must be positive, got {}", step);
    }

    Ok(parsed.normalize().scale())
}
