//! Leveraged RSI strategy backtester - main entry point
//!
//! This binary provides three subcommands:
//! - sweep: Search the configured parameter grid for the best total return
//! - backtest: Run a single backtest with explicit parameters
//! - download: Download historical candles from Binance futures

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rsi_optimizer::params::ParamSet;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "rsi-optimizer")]
#[command(about = "Leveraged RSI strategy backtester and parameter optimizer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.json")]
    config: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep the configured parameter grid for the best total return
    Sweep,

    /// Run a single backtest with explicit parameters
    Backtest {
        /// RSI lookback for the entry signal
        #[arg(long, default_value = "14")]
        entry_period: u32,

        /// RSI lookback for the exit signal
        #[arg(long, default_value = "7")]
        exit_period: u32,

        /// Enter long when entry RSI crosses above this level
        #[arg(long, default_value = "60")]
        entry_level: u32,

        /// Exit when exit RSI drops below this level
        #[arg(long, default_value = "40")]
        exit_level: u32,

        /// Position leverage
        #[arg(long, default_value = "1")]
        leverage: u32,
    },

    /// Download historical candles and save them to CSV
    Download,
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );

    let level = if verbose { "debug" } else { "info" };
    // Keep noisy HTTP internals at warn regardless of the requested level.
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Console stays clean for the progress bar; everything goes to the file.
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true)
            .with_file(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer().with_ansi(true);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true)
            .with_file(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging to logs/{}", log_filename);
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Sweep => ("sweep", true),
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Download => ("download", false),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Sweep => commands::sweep::run(cli.config),
        Commands::Backtest {
            entry_period,
            exit_period,
            entry_level,
            exit_level,
            leverage,
        } => commands::backtest::run(
            cli.config,
            ParamSet {
                entry_period,
                exit_period,
                entry_level,
                exit_level,
                leverage,
            },
        ),
        Commands::Download => commands::download::run(cli.config),
    }
}
