//! Sequential parameter sweep
//!
//! Every candidate runs through the engine with the ledger disabled and only
//! the running best survives, so sweeping a large space stays memory-light.
//! The winner is re-run once with the ledger enabled before it is returned.

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::backtest::BacktestEngine;
use crate::params::ParamSet;
use crate::types::{BacktestResult, RunOutcome};

/// Drives the engine over a candidate set and keeps the best total return
///
/// Comparison is strictly greater-than, so among equal returns the first
/// candidate seen wins; invalidated runs never rank. `None` means no
/// candidate completed at all.
pub struct Optimizer<'a> {
    engine: BacktestEngine<'a>,
}

impl<'a> Optimizer<'a> {
    pub fn new(engine: BacktestEngine<'a>) -> Self {
        Optimizer { engine }
    }

    pub fn engine(&self) -> &BacktestEngine<'a> {
        &self.engine
    }

    /// Sweep the candidates and return the ledgered winner
    pub fn search(&self, candidates: &[ParamSet]) -> Option<BacktestResult> {
        info!("Sweeping {} parameter combinations", candidates.len());

        let mut best: Option<BacktestResult> = None;
        let mut completed = 0usize;
        let mut invalidated = 0usize;

        for &params in candidates {
            match self.engine.run(params, false) {
                RunOutcome::Completed(result) => {
                    completed += 1;
                    let improved = best
                        .as_ref()
                        .map_or(true, |b| result.total_return > b.total_return);
                    if improved {
                        best = Some(result);
                    }
                }
                RunOutcome::Invalidated(_) => invalidated += 1,
            }
        }

        self.finish(best, completed, invalidated)
    }

    /// Same sweep, ticking a progress bar and showing the valid-run count
    pub fn search_with_progress(
        &self,
        candidates: &[ParamSet],
        progress_bar: &ProgressBar,
    ) -> Option<BacktestResult> {
        info!("Sweeping {} parameter combinations", candidates.len());

        let mut best: Option<BacktestResult> = None;
        let mut completed = 0usize;
        let mut invalidated = 0usize;

        for &params in candidates {
            match self.engine.run(params, false) {
                RunOutcome::Completed(result) => {
                    completed += 1;
                    let improved = best
                        .as_ref()
                        .map_or(true, |b| result.total_return > b.total_return);
                    if improved {
                        best = Some(result);
                    }
                }
                RunOutcome::Invalidated(_) => invalidated += 1,
            }
            progress_bar.inc(1);
            progress_bar.set_message(format!("{completed} valid"));
        }

        self.finish(best, completed, invalidated)
    }

    /// Log the sweep summary and re-run the winner with the ledger enabled
    fn finish(
        &self,
        best: Option<BacktestResult>,
        completed: usize,
        invalidated: usize,
    ) -> Option<BacktestResult> {
        let best = match best {
            Some(best) => best,
            None => {
                info!(
                    completed,
                    invalidated, "Sweep finished without a single valid result"
                );
                return None;
            }
        };

        info!(
            completed,
            invalidated,
            best_return = format!("{:+.2}%", best.total_return * 100.0),
            "Sweep finished, re-running winner with trade ledger"
        );
        debug!(params = %best.params, "Winning combination");

        match self.engine.run(best.params, true) {
            RunOutcome::Completed(full) => Some(full),
            RunOutcome::Invalidated(reason) => {
                // The engine is deterministic, so this branch is unreachable
                // unless the inputs changed between the sweep and the re-run.
                warn!(%reason, "Winner invalidated on re-run");
                None
            }
        }
    }
}
