//! Core data types shared across the backtesting system

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("close time ({close_time}) must be after open time ({open_time})")]
    NonPositiveDuration { open_time: i64, close_time: i64 },
}

/// OHLCV candlestick with open/close timestamps in Unix milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl Candle {
    /// Create a new candle with validation
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        // Check for non-positive prices
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        // Check high >= low
        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        // Check volume >= 0
        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        // Check open is within [low, high] range
        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        // Check close is within [low, high] range
        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        // Check the candle spans a positive duration
        if self.close_time <= self.open_time {
            return Err(CandleValidationError::NonPositiveDuration {
                open_time: self.open_time,
                close_time: self.close_time,
            });
        }

        Ok(())
    }

    /// Check if the candle is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// One closed trade as recorded by the engine ledger
///
/// Excursions are fractions of the entry price: max adverse excursion is the
/// worst draw below entry while the position was open (non-positive), max
/// favorable excursion the best rise above it (non-negative). The leveraged
/// variants scale both by the position leverage, matching the margin at risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub open_price: f64,
    pub close_price: f64,
    pub open_time: i64,
    pub close_time: i64,
    pub realized_pnl: f64,
    /// Realized PnL relative to the margin the trade committed
    pub pnl_pct: f64,
    pub hold_hours: f64,
    pub max_adverse_excursion: f64,
    pub max_favorable_excursion: f64,
    pub mae_leveraged: f64,
    pub mfe_leveraged: f64,
    /// Free fund right after margin and PnL returned
    pub fund_after: f64,
}

/// Aggregate outcome of one completed simulation run
///
/// `trades` is populated only when the run was executed with the ledger
/// enabled; sweep runs leave it empty to stay memory-light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub params: crate::params::ParamSet,
    pub final_fund: f64,
    /// (final - initial) / initial, as a fraction
    pub total_return: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Fraction of trades closed with positive PnL (0 when no trades)
    pub win_rate: f64,
    /// Largest observed peak-to-trough equity decline, as a fraction
    pub max_drawdown: f64,
    pub avg_hold_hours: f64,
    pub trades: Vec<TradeRecord>,
}

/// Why a simulation run was thrown out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A bar's low touched or crossed the liquidation price
    Liquidated,
    /// The configured max-drawdown limit was exceeded
    MaxDrawdownExceeded,
}

impl std::fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationReason::Liquidated => write!(f, "liquidated"),
            InvalidationReason::MaxDrawdownExceeded => write!(f, "max drawdown exceeded"),
        }
    }
}

/// Terminal state of one simulation run
///
/// An invalidated run produces no result at all; the optimizer skips it
/// rather than ranking it.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(BacktestResult),
    Invalidated(InvalidationReason),
}
