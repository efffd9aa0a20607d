//! Result presentation and persistence
//!
//! Console report for a finished run plus persisted artifacts under the
//! results directory: a plain-text report, the trade ledger as CSV and a
//! JSON summary for downstream tooling.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::metrics::PerformanceMetrics;
use crate::params::ParamSet;
use crate::types::{BacktestResult, TradeRecord};

/// Render the full result report as plain text
pub fn render_report(
    result: &BacktestResult,
    metrics: &PerformanceMetrics,
    initial_fund: f64,
) -> String {
    let heavy = "=".repeat(60);
    let light = "-".repeat(60);
    let mut lines = Vec::new();

    lines.push(heavy.clone());
    lines.push("BACKTEST RESULTS".to_string());
    lines.push(heavy.clone());
    lines.push(format!(
        "Entry RSI:          period {}, above {}",
        result.params.entry_period, result.params.entry_level
    ));
    lines.push(format!(
        "Exit RSI:           period {}, below {}",
        result.params.exit_period, result.params.exit_level
    ));
    lines.push(format!("Leverage:           {}x", result.params.leverage));
    lines.push(light.clone());
    lines.push(format!("Initial Fund:       {:.2}", initial_fund));
    lines.push(format!("Final Fund:         {:.2}", result.final_fund));
    lines.push(format!(
        "Total Return:       {:.2}%",
        result.total_return * 100.0
    ));
    lines.push(format!(
        "Annualized Return:  {:.2}%",
        metrics.annualized_return * 100.0
    ));
    lines.push(format!(
        "Buy & Hold Return:  {:.2}%",
        metrics.buy_hold_return * 100.0
    ));
    lines.push(light.clone());
    lines.push(format!("Total Trades:       {}", result.total_trades));
    lines.push(format!("Winning Trades:     {}", result.winning_trades));
    lines.push(format!("Losing Trades:      {}", result.losing_trades));
    lines.push(format!("Win Rate:           {:.2}%", result.win_rate * 100.0));
    lines.push(format!("Profit Factor:      {:.2}", metrics.profit_factor));
    lines.push(format!("Avg Hold Hours:     {:.1}", result.avg_hold_hours));
    lines.push(format!("Exposure:           {:.2}%", metrics.exposure * 100.0));
    lines.push(format!(
        "Trades Per Year:    {:.1}",
        metrics.trades_per_year
    ));
    lines.push(light);
    lines.push(format!(
        "Max Drawdown:       {:.2}%",
        result.max_drawdown * 100.0
    ));
    lines.push(format!("Sharpe Ratio:       {:.2}", metrics.sharpe_ratio));
    lines.push(format!("Sortino Ratio:      {:.2}", metrics.sortino_ratio));
    lines.push(format!("Calmar Ratio:       {:.2}", metrics.calmar_ratio));
    lines.push(format!(
        "Avg MAE:            {:.2}% ({:.2}% leveraged)",
        metrics.avg_mae * 100.0,
        metrics.avg_mae_leveraged * 100.0
    ));
    lines.push(format!(
        "Avg MFE:            {:.2}% ({:.2}% leveraged)",
        metrics.avg_mfe * 100.0,
        metrics.avg_mfe_leveraged * 100.0
    ));
    lines.push(heavy);
    lines.push(String::new());

    lines.join("\n")
}

/// Print the result report to the console
pub fn print_report(result: &BacktestResult, metrics: &PerformanceMetrics, initial_fund: f64) {
    println!("\n{}", render_report(result, metrics, initial_fund));
}

/// Write a trade ledger as CSV
pub fn save_ledger(trades: &[TradeRecord], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).context(format!("Failed to create {}", path.display()))?;

    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;

    info!("Saved {} trades to {}", trades.len(), path.display());
    Ok(())
}

/// JSON summary of a finished run
#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    symbol: &'a str,
    interval: &'a str,
    params: &'a ParamSet,
    final_fund: f64,
    total_return: f64,
    total_trades: u32,
    win_rate: f64,
    max_drawdown: f64,
    metrics: &'a PerformanceMetrics,
}

/// Persist the report, ledger and JSON summary under the results directory
///
/// Filenames carry a UTC timestamp so repeated runs never clobber each
/// other. Returns the paths written.
pub fn save_artifacts(
    results_dir: &Path,
    symbol: &str,
    interval: &str,
    result: &BacktestResult,
    metrics: &PerformanceMetrics,
    initial_fund: f64,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(results_dir).context("Failed to create results directory")?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let base = format!("{}_{}_{}", symbol, interval, stamp);

    let report_path = results_dir.join(format!("{}_report.txt", base));
    fs::write(&report_path, render_report(result, metrics, initial_fund))
        .context(format!("Failed to write {}", report_path.display()))?;

    let ledger_path = results_dir.join(format!("{}_ledger.csv", base));
    save_ledger(&result.trades, &ledger_path)?;

    let summary = RunSummary {
        symbol,
        interval,
        params: &result.params,
        final_fund: result.final_fund,
        total_return: result.total_return,
        total_trades: result.total_trades,
        win_rate: result.win_rate,
        max_drawdown: result.max_drawdown,
        metrics,
    };
    let summary_path = results_dir.join(format!("{}_summary.json", base));
    let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
    fs::write(&summary_path, json)
        .context(format!("Failed to write {}", summary_path.display()))?;

    info!("Results written under {}", results_dir.display());
    Ok(vec![report_path, ledger_path, summary_path])
}
