//! Relative Strength Index with a per-period series cache
//!
//! The RSI here uses Wilder smoothing: the first average gain/loss pair is a
//! plain mean over the first `period` price changes, every later pair is
//! `(avg * (period - 1) + current) / period`. Series are computed once per
//! lookback period before a sweep and then shared read-only across every
//! simulation run.

use std::collections::{BTreeSet, HashMap};

use crate::types::Candle;

/// Calculate RSI (Wilder smoothing) over a close-price series
///
/// The returned vector has one slot per input value. The first `period`
/// slots are `None`; the value at index `period` is seeded from the plain
/// mean of the first `period` changes. Fewer than `period + 1` inputs (in
/// particular fewer than 2) produce an all-`None` series.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; values.len()];

    if period == 0 || values.len() < period + 1 {
        return result;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = changes[..period]
        .iter()
        .filter(|&&c| c > 0.0)
        .sum::<f64>()
        / period as f64;
    let mut avg_loss = changes[..period]
        .iter()
        .filter(|&&c| c < 0.0)
        .map(|&c| -c)
        .sum::<f64>()
        / period as f64;

    result[period] = Some(rsi_value(avg_gain, avg_loss));

    // changes[i] spans closes i..i+1, so it lands on candle index i + 1
    for (i, &change) in changes.iter().enumerate().skip(period) {
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };

        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;

        result[i + 1] = Some(rsi_value(avg_gain, avg_loss));
    }

    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    // A window with no gains at all reads as 0; the 100 branch is reserved
    // for gains against zero losses. Keeps a dead-flat series from ever
    // firing an entry signal.
    if avg_gain == 0.0 {
        0.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// Precomputed RSI series, one per lookback period
///
/// Built once from the candle history and the set of periods a sweep will
/// touch; afterwards it is only ever borrowed, so every run reads the same
/// series without recomputation.
#[derive(Debug)]
pub struct RsiCache {
    series: HashMap<usize, Vec<Option<f64>>>,
}

impl RsiCache {
    /// Compute one series per distinct period over the candle closes
    pub fn new(candles: &[Candle], periods: impl IntoIterator<Item = usize>) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let distinct: BTreeSet<usize> = periods.into_iter().collect();

        let series = distinct
            .into_iter()
            .map(|period| (period, rsi(&closes, period)))
            .collect();

        RsiCache { series }
    }

    /// Borrow the series for `period`
    ///
    /// Panics if `period` was not part of the set the cache was built with;
    /// callers construct the cache from the same ranges they sweep.
    pub fn series(&self, period: usize) -> &[Option<f64>] {
        self.series
            .get(&period)
            .unwrap_or_else(|| panic!("RSI period {period} was not precomputed"))
    }

    /// Number of distinct periods held
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
