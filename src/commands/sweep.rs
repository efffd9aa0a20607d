//! Sweep command implementation with progress tracking

use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use rsi_optimizer::backtest::{BacktestEngine, EngineSettings};
use rsi_optimizer::exchange::BinanceFuturesClient;
use rsi_optimizer::indicators::RsiCache;
use rsi_optimizer::optimize::Optimizer;
use rsi_optimizer::{data, metrics, report, Config};

pub fn run(config_path: String) -> Result<()> {
    info!("Starting parameter sweep");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let client = BinanceFuturesClient::new();
    let candles = data::load_or_fetch(&config, &client)?;
    super::check_history(&candles)?;

    let quantity_decimals = super::resolve_quantity_decimals(&config, &client)?;
    let settings = EngineSettings::from_config(&config, quantity_decimals);

    let space = config.sweep.space();
    let total = space.total_combinations();

    let mut rng = match config.sweep.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let candidates = space.candidates(config.sweep.sample_cap, &mut rng);

    info!(
        "Sweeping {} of {} grid points over {} candles",
        candidates.len(),
        total,
        candles.len()
    );

    let rsi = RsiCache::new(&candles, space.periods());
    let engine = BacktestEngine::new(&candles, &rsi, settings.clone());
    let optimizer = Optimizer::new(engine);

    // Print summary
    println!("\n{}", "=".repeat(60));
    println!("SWEEP SUMMARY");
    println!("{}", "=".repeat(60));
    println!(
        "  Symbol:        {} {}",
        config.trading.symbol, config.trading.interval
    );
    println!("  Candles:       {}", candles.len());
    println!("  Grid points:   {}", total);
    println!("  Candidates:    {}", candidates.len());
    println!("{}\n", "=".repeat(60));

    // Create single progress bar (tqdm style)
    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec:.2}] ✓ {msg}",
            )
            .unwrap()
            .progress_chars("█░ "),
    );

    let best = optimizer.search_with_progress(&candidates, &pb);
    pb.finish();
    println!();

    let result = match best {
        Some(result) => result,
        None => {
            println!("No parameter set produced a valid completed run.");
            return Ok(());
        }
    };

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

    info!("Sweep completed successfully");
    Ok(())
}
