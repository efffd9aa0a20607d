//! Simulation engine for the leveraged long-only RSI strategy
//!
//! One run walks the candle history once with an exclusively-owned state
//! record and produces either a completed result or an invalidated outcome.
//! Signals are always read from the previous candle's RSI values and execute
//! at the current candle's open; the final candle force-closes at its close.
//! A bar low touching the liquidation price, or a breach of the configured
//! max-drawdown limit, throws the whole run out.

use crate::config::Config;
use crate::indicators::RsiCache;
use crate::params::ParamSet;
use crate::types::{BacktestResult, Candle, InvalidationReason, RunOutcome, TradeRecord};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Simulation inputs that stay fixed across a whole sweep
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub initial_fund: f64,
    /// Fraction of the free fund committed per entry, before leverage
    pub order_fraction: f64,
    /// Taker fee charged on both the open and the close notional
    pub fee_rate: f64,
    /// Funding rate charged per whole funding period held
    pub funding_rate: f64,
    pub funding_period_ms: i64,
    /// Decimal places the exchange allows for order quantity
    pub quantity_decimals: u32,
    /// Runs whose max drawdown exceeds this fraction are invalidated
    pub max_drawdown: Option<f64>,
}

impl EngineSettings {
    /// Assemble settings from the loaded config and the exchange step size
    pub fn from_config(config: &Config, quantity_decimals: u32) -> Self {
        EngineSettings {
            initial_fund: config.trading.initial_fund,
            order_fraction: config.trading.order_fraction,
            fee_rate: config.exchange.fee_rate,
            funding_rate: config.exchange.funding_rate,
            funding_period_ms: config.exchange.funding_period_hours as i64 * 3_600_000,
            quantity_decimals,
            max_drawdown: config.backtest.max_drawdown,
        }
    }
}

/// Open long position
#[derive(Debug, Clone)]
pub struct Position {
    pub entry_price: f64,
    pub quantity: f64,
    pub margin: f64,
    pub entry_time: i64,
    pub liquidation_price: f64,
    pub running_high: f64,
    pub running_low: f64,
}

/// Mutable per-run state; every run owns exactly one
#[derive(Debug)]
struct SimState {
    fund: f64,
    position: Option<Position>,
    peak_equity: f64,
    max_drawdown: f64,
    wins: u32,
    losses: u32,
    hold_ms: i64,
    record: bool,
    trades: Vec<TradeRecord>,
}

impl SimState {
    fn new(initial_fund: f64, record: bool) -> Self {
        SimState {
            fund: initial_fund,
            position: None,
            peak_equity: initial_fund,
            max_drawdown: 0.0,
            wins: 0,
            losses: 0,
            hold_ms: 0,
            record,
            trades: Vec::new(),
        }
    }

    /// Mark-to-market equity: free fund plus committed margin plus
    /// unrealized PnL of the open position, valued at `mark`
    fn equity(&self, mark: f64) -> f64 {
        match &self.position {
            Some(pos) => self.fund + pos.margin + (mark - pos.entry_price) * pos.quantity,
            None => self.fund,
        }
    }

    fn into_result(self, params: ParamSet, initial_fund: f64) -> BacktestResult {
        let total = self.wins + self.losses;
        BacktestResult {
            params,
            final_fund: self.fund,
            total_return: (self.fund - initial_fund) / initial_fund,
            total_trades: total,
            winning_trades: self.wins,
            losing_trades: self.losses,
            win_rate: if total > 0 {
                self.wins as f64 / total as f64
            } else {
                0.0
            },
            max_drawdown: self.max_drawdown,
            avg_hold_hours: if total > 0 {
                self.hold_ms as f64 / total as f64 / MS_PER_HOUR
            } else {
                0.0
            },
            trades: self.trades,
        }
    }
}

/// Deterministic backtest engine
///
/// Borrows the candle history, the RSI cache and the settings read-only, so
/// one engine serves every run of a sweep.
pub struct BacktestEngine<'a> {
    candles: &'a [Candle],
    rsi: &'a RsiCache,
    settings: EngineSettings,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(candles: &'a [Candle], rsi: &'a RsiCache, settings: EngineSettings) -> Self {
        BacktestEngine {
            candles,
            rsi,
            settings,
        }
    }

    /// Simulate one parameter set over the full history
    ///
    /// Per candle, in order: with a position open, first the liquidation
    /// check against the bar low (a bar carrying both a breach and an exit
    /// signal still invalidates), then the previous-bar exit signal closing
    /// at the bar open, then the forced close when the bar is the last.
    /// While flat, the previous-bar entry signal opens at the bar open;
    /// the final candle never opens a position. After every candle the
    /// mark-to-market drawdown updates, and exceeding the configured limit
    /// invalidates the run. With `record_trades` the ledger fills;
    /// otherwise only the aggregates are kept.
    pub fn run(&self, params: ParamSet, record_trades: bool) -> RunOutcome {
        let entry_rsi = self.rsi.series(params.entry_period as usize);
        let exit_rsi = self.rsi.series(params.exit_period as usize);
        let entry_level = params.entry_level as f64;
        let exit_level = params.exit_level as f64;
        let leverage = params.leverage as f64;

        let mut state = SimState::new(self.settings.initial_fund, record_trades);
        let last = self.candles.len().saturating_sub(1);

        for (i, candle) in self.candles.iter().enumerate() {
            if let Some(mut pos) = state.position.take() {
                if candle.low <= pos.liquidation_price {
                    return RunOutcome::Invalidated(InvalidationReason::Liquidated);
                }

                let exit_signal = i >= 1 && exit_rsi[i - 1].is_some_and(|v| v < exit_level);
                if exit_signal {
                    // Executed at the open; the rest of the bar is not held
                    self.close_position(&mut state, pos, candle.open, candle.open_time, leverage);
                } else {
                    pos.running_high = pos.running_high.max(candle.high);
                    pos.running_low = pos.running_low.min(candle.low);
                    if i == last {
                        self.close_position(
                            &mut state,
                            pos,
                            candle.close,
                            candle.close_time,
                            leverage,
                        );
                    } else {
                        state.position = Some(pos);
                    }
                }
            } else if i < last && i >= 1 && entry_rsi[i - 1].is_some_and(|v| v > entry_level) {
                self.open_position(&mut state, candle, leverage);
            }

            let equity = state.equity(candle.close);
            if equity > state.peak_equity {
                state.peak_equity = equity;
            }
            let drawdown = if state.peak_equity > 0.0 {
                (state.peak_equity - equity) / state.peak_equity
            } else {
                0.0
            };
            if drawdown > state.max_drawdown {
                state.max_drawdown = drawdown;
            }
            if let Some(limit) = self.settings.max_drawdown {
                if state.max_drawdown > limit {
                    return RunOutcome::Invalidated(InvalidationReason::MaxDrawdownExceeded);
                }
            }
        }

        RunOutcome::Completed(state.into_result(params, self.settings.initial_fund))
    }

    fn open_position(&self, state: &mut SimState, candle: &Candle, leverage: f64) {
        let price = candle.open;
        let raw_quantity = state.fund * self.settings.order_fraction * leverage / price;
        let quantity = round_to_decimals(raw_quantity, self.settings.quantity_decimals);
        if quantity <= 0.0 {
            return;
        }

        let margin = quantity * price / leverage;
        let open_fee = quantity * price * self.settings.fee_rate;
        state.fund -= margin + open_fee;

        state.position = Some(Position {
            entry_price: price,
            quantity,
            margin,
            entry_time: candle.open_time,
            liquidation_price: price * (1.0 - 1.0 / leverage),
            // The entry bar is held from the open on, so its extremes count
            running_high: price.max(candle.high),
            running_low: price.min(candle.low),
        });
    }

    fn close_position(
        &self,
        state: &mut SimState,
        pos: Position,
        price: f64,
        timestamp: i64,
        leverage: f64,
    ) {
        let close_fee = pos.quantity * price * self.settings.fee_rate;
        let periods = whole_funding_periods(pos.entry_time, timestamp, self.settings.funding_period_ms);
        let funding_fee = pos.quantity * price * self.settings.funding_rate * periods as f64;
        let realized_pnl = (price - pos.entry_price) * pos.quantity - close_fee - funding_fee;

        state.fund += pos.margin + realized_pnl;
        if realized_pnl > 0.0 {
            state.wins += 1;
        } else {
            state.losses += 1;
        }
        let held = timestamp - pos.entry_time;
        state.hold_ms += held;

        if state.record {
            let max_adverse_excursion = (pos.running_low - pos.entry_price) / pos.entry_price;
            let max_favorable_excursion = (pos.running_high - pos.entry_price) / pos.entry_price;
            state.trades.push(TradeRecord {
                open_price: pos.entry_price,
                close_price: price,
                open_time: pos.entry_time,
                close_time: timestamp,
                realized_pnl,
                pnl_pct: realized_pnl / pos.margin,
                hold_hours: held as f64 / MS_PER_HOUR,
                max_adverse_excursion,
                max_favorable_excursion,
                mae_leveraged: max_adverse_excursion * leverage,
                mfe_leveraged: max_favorable_excursion * leverage,
                fund_after: state.fund,
            });
        }
    }
}

/// Round half away from zero to a fixed number of decimal places
///
/// Quantity precision follows the exchange step size: a step of `0.001`
/// means three decimal places, and sizing rounds rather than floors.
fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Whole funding periods elapsed between open and close; partial periods
/// never charge
fn whole_funding_periods(open_time: i64, close_time: i64, period_ms: i64) -> i64 {
    if period_ms <= 0 {
        return 0;
    }
    (close_time - open_time) / period_ms
}
