//! Performance statistics layered on top of a finished simulation run
//!
//! The engine itself only tracks the fund, the win tally and the drawdown
//! path. Everything else reported to the user is derived here from the trade
//! ledger together with the candle history that produced it.

use serde::{Deserialize, Serialize};

use crate::backtest::EngineSettings;
use crate::types::{BacktestResult, Candle};

const MS_PER_DAY: f64 = 86_400_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Risk and quality statistics for a completed run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Gross profit over gross loss; infinite when nothing was lost
    pub profit_factor: f64,
    /// Mean worst open-position excursion, as a fraction of entry price
    pub avg_mae: f64,
    /// Mean best open-position excursion, as a fraction of entry price
    pub avg_mfe: f64,
    pub avg_mae_leveraged: f64,
    pub avg_mfe_leveraged: f64,
    /// Fraction of the backtest wallclock spent holding a position
    pub exposure: f64,
    pub backtest_days: f64,
    /// Total return compounded to a 365-day horizon
    pub annualized_return: f64,
    pub calmar_ratio: f64,
    /// Per-trade returns annualized by observed trade frequency
    pub sharpe_ratio: f64,
    /// Like Sharpe but penalizing only downside deviation
    pub sortino_ratio: f64,
    pub trades_per_year: f64,
    /// Fee-adjusted return of holding the whole fund unleveraged instead
    pub buy_hold_return: f64,
}

/// Compute the full statistics set for one completed run
pub fn calculate(
    result: &BacktestResult,
    candles: &[Candle],
    settings: &EngineSettings,
) -> PerformanceMetrics {
    let trades = &result.trades;

    let wallclock_ms = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (last.close_time - first.open_time).max(0),
        _ => 0,
    };
    let backtest_days = wallclock_ms as f64 / MS_PER_DAY;

    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl > 0.0)
        .map(|t| t.realized_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl <= 0.0)
        .map(|t| t.realized_pnl.abs())
        .sum();

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let trade_count = trades.len() as f64;
    let (avg_mae, avg_mfe, avg_mae_leveraged, avg_mfe_leveraged) = if trades.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (
            trades.iter().map(|t| t.max_adverse_excursion).sum::<f64>() / trade_count,
            trades.iter().map(|t| t.max_favorable_excursion).sum::<f64>() / trade_count,
            trades.iter().map(|t| t.mae_leveraged).sum::<f64>() / trade_count,
            trades.iter().map(|t| t.mfe_leveraged).sum::<f64>() / trade_count,
        )
    };

    let held_hours: f64 = trades.iter().map(|t| t.hold_hours).sum();
    let wallclock_hours = wallclock_ms as f64 / MS_PER_HOUR;
    let exposure = if wallclock_hours > 0.0 {
        held_hours / wallclock_hours
    } else {
        0.0
    };

    let annualized_return = if backtest_days > 0.0 {
        let growth = 1.0 + result.total_return;
        if growth <= 0.0 {
            // A non-positive growth factor reads as a full loss on any horizon
            -1.0
        } else {
            growth.powf(DAYS_PER_YEAR / backtest_days) - 1.0
        }
    } else {
        0.0
    };

    let calmar_ratio = if result.max_drawdown > 0.0 {
        annualized_return / result.max_drawdown
    } else if annualized_return > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let trades_per_year = if backtest_days > 0.0 {
        trade_count / backtest_days * DAYS_PER_YEAR
    } else {
        0.0
    };

    let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();
    let (sharpe_ratio, sortino_ratio) = if returns.len() < 2 || trades_per_year <= 0.0 {
        (0.0, 0.0)
    } else {
        // Annualized by observed trade frequency: the mean scales with the
        // frequency, the deviation with its square root
        let mean = returns.iter().sum::<f64>() / trade_count;
        let std = population_std(&returns);
        let sharpe = if std > 0.0 {
            (mean * trades_per_year) / (std * trades_per_year.sqrt())
        } else {
            0.0
        };

        let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        let sortino = if downside.is_empty() {
            if mean > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            let downside_std = population_std(&downside);
            if downside_std > 0.0 {
                (mean * trades_per_year) / (downside_std * trades_per_year.sqrt())
            } else {
                0.0
            }
        };
        (sharpe, sortino)
    };

    let buy_hold_return = buy_and_hold(candles, settings);

    PerformanceMetrics {
        profit_factor,
        avg_mae,
        avg_mfe,
        avg_mae_leveraged,
        avg_mfe_leveraged,
        exposure,
        backtest_days,
        annualized_return,
        calmar_ratio,
        sharpe_ratio,
        sortino_ratio,
        trades_per_year,
        buy_hold_return,
    }
}

/// Return of putting the whole fund into the asset at the first open and
/// selling at the last close, unleveraged, with taker fees on both legs
fn buy_and_hold(candles: &[Candle], settings: &EngineSettings) -> f64 {
    if candles.len() < 2 {
        return 0.0;
    }
    let first = &candles[0];
    let last = &candles[candles.len() - 1];

    let quantity = settings.initial_fund / first.open;
    let open_fee = quantity * first.open * settings.fee_rate;
    let close_fee = quantity * last.close * settings.fee_rate;
    let pnl = (last.close - first.open) * quantity - open_fee - close_fee;
    pnl / settings.initial_fund
}

/// Population standard deviation
fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamSet;
    use crate::types::TradeRecord;
    use approx::assert_relative_eq;

    const HOUR_MS: i64 = 3_600_000;

    fn candle(open_time: i64, open: f64, close: f64) -> Candle {
        Candle::new(
            open_time,
            open,
            open.max(close) * 1.01,
            open.min(close) * 0.99,
            close,
            10.0,
            open_time + HOUR_MS,
        )
        .unwrap()
    }

    /// Hourly candles where the first opens at `first_open` and everything
    /// afterwards sits at `last_close`
    fn hourly_history(hours: usize, first_open: f64, last_close: f64) -> Vec<Candle> {
        (0..hours)
            .map(|i| {
                let open_time = i as i64 * HOUR_MS;
                let open = if i == 0 { first_open } else { last_close };
                candle(open_time, open, last_close)
            })
            .collect()
    }

    fn trade(pnl: f64, pnl_pct: f64, hold_hours: f64) -> TradeRecord {
        TradeRecord {
            open_price: 100.0,
            close_price: 100.0 + pnl / 10.0,
            open_time: 0,
            close_time: (hold_hours * 3_600_000.0) as i64,
            realized_pnl: pnl,
            pnl_pct,
            hold_hours,
            max_adverse_excursion: -0.01,
            max_favorable_excursion: 0.02,
            mae_leveraged: -0.02,
            mfe_leveraged: 0.04,
            fund_after: 1000.0,
        }
    }

    fn result_with(trades: Vec<TradeRecord>, total_return: f64, max_drawdown: f64) -> BacktestResult {
        let wins = trades.iter().filter(|t| t.realized_pnl > 0.0).count() as u32;
        let total = trades.len() as u32;
        BacktestResult {
            params: ParamSet {
                entry_period: 14,
                exit_period: 7,
                entry_level: 60,
                exit_level: 40,
                leverage: 2,
            },
            final_fund: 1000.0 * (1.0 + total_return),
            total_return,
            total_trades: total,
            winning_trades: wins,
            losing_trades: total - wins,
            win_rate: if total > 0 {
                wins as f64 / total as f64
            } else {
                0.0
            },
            max_drawdown,
            avg_hold_hours: 0.0,
            trades,
        }
    }

    fn settings() -> EngineSettings {
        EngineSettings {
            initial_fund: 1000.0,
            order_fraction: 0.2,
            fee_rate: 0.0005,
            funding_rate: 0.0001,
            funding_period_ms: 8 * HOUR_MS,
            quantity_decimals: 3,
            max_drawdown: None,
        }
    }

    #[test]
    fn test_profit_factor_mixed_trades() {
        let trades = vec![
            trade(10.0, 0.05, 1.0),
            trade(-5.0, -0.025, 1.0),
            trade(20.0, 0.10, 1.0),
            trade(-3.0, -0.015, 1.0),
        ];
        let result = result_with(trades, 0.022, 0.01);
        let history = hourly_history(24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert_relative_eq!(metrics.profit_factor, 30.0 / 8.0);
    }

    #[test]
    fn test_profit_factor_without_losses_is_infinite() {
        let trades = vec![trade(10.0, 0.05, 1.0), trade(4.0, 0.02, 1.0)];
        let result = result_with(trades, 0.014, 0.0);
        let history = hourly_history(24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert!(metrics.profit_factor.is_infinite());
    }

    #[test]
    fn test_profit_factor_break_even_trades_read_zero() {
        // Break-even trades count as losses but add nothing to gross loss
        let trades = vec![trade(0.0, 0.0, 1.0), trade(0.0, 0.0, 1.0)];
        let result = result_with(trades, 0.0, 0.0);
        let history = hourly_history(24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert_eq!(metrics.profit_factor, 0.0);
    }

    #[test]
    fn test_average_excursions() {
        let mut first = trade(10.0, 0.05, 1.0);
        first.max_adverse_excursion = -0.02;
        first.max_favorable_excursion = 0.06;
        first.mae_leveraged = -0.04;
        first.mfe_leveraged = 0.12;
        let mut second = trade(-5.0, -0.02, 1.0);
        second.max_adverse_excursion = -0.04;
        second.max_favorable_excursion = 0.02;
        second.mae_leveraged = -0.08;
        second.mfe_leveraged = 0.04;

        let result = result_with(vec![first, second], 0.005, 0.01);
        let history = hourly_history(24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert_relative_eq!(metrics.avg_mae, -0.03);
        assert_relative_eq!(metrics.avg_mfe, 0.04);
        assert_relative_eq!(metrics.avg_mae_leveraged, -0.06);
        assert_relative_eq!(metrics.avg_mfe_leveraged, 0.08);
    }

    #[test]
    fn test_exposure_is_held_fraction_of_wallclock() {
        let trades = vec![trade(1.0, 0.005, 1.5), trade(1.0, 0.005, 1.0)];
        let result = result_with(trades, 0.002, 0.0);
        let history = hourly_history(10, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        // 2.5 hours held across a 10 hour window
        assert_relative_eq!(metrics.exposure, 0.25);
        assert_relative_eq!(metrics.backtest_days, 10.0 / 24.0);
    }

    #[test]
    fn test_annualized_return_compounds_to_a_year() {
        let result = result_with(Vec::new(), 0.10, 0.05);
        let history = hourly_history(73 * 24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        // 73 days is a fifth of a year, so (1.1)^5 - 1
        assert_relative_eq!(metrics.backtest_days, 73.0);
        assert_relative_eq!(
            metrics.annualized_return,
            1.1_f64.powi(5) - 1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_annualized_return_floors_at_total_loss() {
        let result = result_with(Vec::new(), -1.0, 0.9);
        let history = hourly_history(24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert_eq!(metrics.annualized_return, -1.0);
    }

    #[test]
    fn test_calmar_against_drawdown() {
        let result = result_with(Vec::new(), 0.10, 0.20);
        // A full year, so the annualized figure equals the total return
        let history = hourly_history(365 * 24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert_relative_eq!(metrics.calmar_ratio, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_calmar_infinite_without_drawdown() {
        let result = result_with(Vec::new(), 0.10, 0.0);
        let history = hourly_history(365 * 24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert!(metrics.calmar_ratio.is_infinite());
    }

    #[test]
    fn test_sharpe_and_sortino_annualize_by_trade_frequency() {
        let trades = vec![
            trade(100.0, 0.10, 2.0),
            trade(-50.0, -0.05, 2.0),
            trade(80.0, 0.08, 2.0),
            trade(-10.0, -0.01, 2.0),
        ];
        let result = result_with(trades, 0.12, 0.06);
        let history = hourly_history(365 * 24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());

        // Four trades across exactly one year
        assert_relative_eq!(metrics.trades_per_year, 4.0, epsilon = 1e-12);
        // Returns mean 0.03, population variance 0.00385
        let expected_sharpe = (0.03 * 4.0) / (0.00385_f64.sqrt() * 2.0);
        assert_relative_eq!(metrics.sharpe_ratio, expected_sharpe, epsilon = 1e-12);
        // Downside {-0.05, -0.01}: population std 0.02
        assert_relative_eq!(
            metrics.sortino_ratio,
            (0.03 * 4.0) / (0.02 * 2.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_sortino_infinite_without_downside() {
        let trades = vec![trade(10.0, 0.05, 1.0), trade(8.0, 0.04, 1.0)];
        let result = result_with(trades, 0.018, 0.0);
        let history = hourly_history(365 * 24, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert!(metrics.sortino_ratio.is_infinite());
        assert!(metrics.sharpe_ratio > 0.0);
    }

    #[test]
    fn test_buy_and_hold_pays_fees_on_both_legs() {
        let result = result_with(Vec::new(), 0.0, 0.0);
        let history = hourly_history(24, 100.0, 110.0);
        let metrics = calculate(&result, &history, &settings());
        // 10 units: 100 gross, 0.5 open fee, 0.55 close fee
        assert_relative_eq!(metrics.buy_hold_return, 0.09895, epsilon = 1e-12);
    }

    #[test]
    fn test_no_trades_reports_quiet_metrics() {
        let result = result_with(Vec::new(), 0.0, 0.0);
        let history = hourly_history(48, 100.0, 100.0);
        let metrics = calculate(&result, &history, &settings());
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.avg_mae, 0.0);
        assert_eq!(metrics.avg_mfe, 0.0);
        assert_eq!(metrics.exposure, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.sortino_ratio, 0.0);
        assert_eq!(metrics.trades_per_year, 0.0);
        assert_eq!(metrics.annualized_return, 0.0);
        assert_eq!(metrics.calmar_ratio, 0.0);
        assert_relative_eq!(metrics.backtest_days, 2.0);
    }

    #[test]
    fn test_empty_history_zeroes_time_stats() {
        let result = result_with(Vec::new(), 0.05, 0.0);
        let metrics = calculate(&result, &[], &settings());
        assert_eq!(metrics.backtest_days, 0.0);
        assert_eq!(metrics.annualized_return, 0.0);
        assert_eq!(metrics.buy_hold_return, 0.0);
        assert_eq!(metrics.exposure, 0.0);
    }
}
