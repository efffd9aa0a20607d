//! Backtest command implementation

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use rsi_optimizer::backtest::{BacktestEngine, EngineSettings};
use rsi_optimizer::exchange::BinanceFuturesClient;
use rsi_optimizer::indicators::RsiCache;
use rsi_optimizer::params::ParamSet;
use rsi_optimizer::types::RunOutcome;
use rsi_optimizer::{data, metrics, report, Config};

pub fn run(config_path: String, params: ParamSet) -> Result<()> {
    info!("Starting backtest with {}", params);

    if params.entry_period == 0 || params.exit_period == 0 {
        bail!("RSI periods must be at least 1");
    }
    if params.leverage == 0 {
        bail!("Leverage must be at least 1");
    }

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let client = BinanceFuturesClient::new();
    let candles = data::load_or_fetch(&config, &client)?;
    super::check_history(&candles)?;

    let quantity_decimals = super::resolve_quantity_decimals(&config, &client)?;
    let settings = EngineSettings::from_config(&config, quantity_decimals);

    let rsi = RsiCache::new(
        &candles,
        [params.entry_period as usize, params.exit_period as usize],
    );
    let engine = BacktestEngine::new(&candles, &rsi, settings.clone());

    info!("Running backtest over {} candles", candles.len());
    match engine.run(params, true) {
        RunOutcome::Completed(result) => {
            let stats = metrics::calculate(&result, &candles, &settings);
            report::print_report(&result, &stats, settings.initial_fund);
            report::save_artifacts(
                Path::new(&config.backtest.results_dir),
                &config.trading.symbol,
                &config.trading.interval,
                &result,
                &stats,
                settings.initial_fund,
            )?;
            info!("Backtest completed successfully");
        }
        RunOutcome::Invalidated(reason) => {
            println!("\n{}", "=".repeat(60));
            println!("RUN INVALIDATED: {}", reason);
            println!("{}", "=".repeat(60));
            info!("Backtest invalidated: {}", reason);
        }
    }

    Ok(())
}
