//! Parameter space for the strategy sweep
//!
//! Five integer dimensions (leverage, the two RSI lookback periods and the
//! two RSI threshold levels) form an inclusive grid. The grid is enumerated
//! exhaustively in a fixed nesting order, or sampled uniformly without
//! replacement when a candidate cap is configured.

use std::collections::BTreeSet;

use itertools::iproduct;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive integer range walked in `step` increments
///
/// `{min: 1, max: 3, step: 1}` yields `[1, 2, 3]`; the last value is the
/// largest `min + k * step` that does not exceed `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl ParamRange {
    pub fn new(min: u32, max: u32, step: u32) -> Self {
        ParamRange { min, max, step }
    }

    /// All values of the progression, in ascending order
    pub fn values(&self) -> Vec<u32> {
        if self.step == 0 {
            return Vec::new();
        }
        (self.min..=self.max).step_by(self.step as usize).collect()
    }

    /// Number of values the progression produces
    pub fn len(&self) -> usize {
        if self.step == 0 || self.min > self.max {
            return 0;
        }
        ((self.max - self.min) / self.step) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One point of the search space
///
/// `entry_period` is the long lookback driving entries, `exit_period` the
/// short lookback driving exits. Identity is value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamSet {
    pub entry_period: u32,
    pub exit_period: u32,
    pub entry_level: u32,
    pub exit_level: u32,
    pub leverage: u32,
}

impl std::fmt::Display for ParamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entry {}@{} / exit {}@{} / {}x",
            self.entry_period, self.entry_level, self.exit_period, self.exit_level, self.leverage
        )
    }
}

/// The full five-dimensional grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpace {
    pub leverage: ParamRange,
    pub entry_period: ParamRange,
    pub exit_period: ParamRange,
    pub entry_level: ParamRange,
    pub exit_level: ParamRange,
}

impl ParamSpace {
    /// Total number of grid points
    pub fn total_combinations(&self) -> usize {
        self.leverage.len()
            * self.entry_period.len()
            * self.exit_period.len()
            * self.entry_level.len()
            * self.exit_level.len()
    }

    /// Full cartesian product in fixed nesting order
    ///
    /// Leverage is the outermost dimension, then entry period, exit period
    /// and entry level; exit level varies fastest.
    pub fn enumerate(&self) -> Vec<ParamSet> {
        iproduct!(
            self.leverage.values(),
            self.entry_period.values(),
            self.exit_period.values(),
            self.entry_level.values(),
            self.exit_level.values()
        )
        .map(
            |(leverage, entry_period, exit_period, entry_level, exit_level)| ParamSet {
                entry_period,
                exit_period,
                entry_level,
                exit_level,
                leverage,
            },
        )
        .collect()
    }

    /// Candidate set for one sweep
    ///
    /// Without a cap (or with a cap covering the whole grid) this is the
    /// full enumeration. With a smaller cap the full enumeration is
    /// Fisher-Yates shuffled with the provided random source and truncated,
    /// giving a uniform subset without replacement. A seeded source makes
    /// the subset reproducible.
    pub fn candidates(&self, cap: Option<usize>, rng: &mut impl Rng) -> Vec<ParamSet> {
        let mut all = self.enumerate();
        match cap {
            Some(cap) if cap < all.len() => {
                all.shuffle(rng);
                all.truncate(cap);
                all
            }
            _ => all,
        }
    }

    /// Distinct union of both lookback-period ranges
    ///
    /// This is the set the indicator cache is built from.
    pub fn periods(&self) -> BTreeSet<usize> {
        self.entry_period
            .values()
            .into_iter()
            .chain(self.exit_period.values())
            .map(|p| p as usize)
            .collect()
    }
}
