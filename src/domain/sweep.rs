//! Parallel parameter sweeps over category weights and entry thresholds.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::backtest::{run_backtest, BacktestParams};
use crate::domain::error::UnumError;
use crate::domain::metrics::Metrics;
use crate::domain::regime::CategoryWeights;
use crate::domain::series::TimeSeries;

/// Values to try for each swept parameter. An empty list keeps the base
/// parameter's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepGrid {
    /// `None` entries mean regime-derived weights.
    pub weights: Vec<Option<CategoryWeights>>,
    pub long_thresholds: Vec<f64>,
    pub short_thresholds: Vec<f64>,
}

impl SweepGrid {
    /// Expands the grid against `base`, skipping combinations whose long
    /// threshold does not exceed the short one.
    pub fn combinations(&self, base: &BacktestParams) -> Vec<BacktestParams> {
        let weights = if self.weights.is_empty() {
            vec![base.weights]
        } else {
            self.weights.clone()
        };
        let longs = if self.long_thresholds.is_empty() {
            vec![base.long_threshold]
        } else {
            self.long_thresholds.clone()
        };
        let shorts = if self.short_thresholds.is_empty() {
            vec![base.short_threshold]
        } else {
            self.short_thresholds.clone()
        };

        let mut combos = Vec::with_capacity(weights.len() * longs.len() * shorts.len());
        for w in &weights {
            for &long in &longs {
                for &short in &shorts {
                    if long <= short {
                        continue;
                    }
                    combos.push(BacktestParams {
                        weights: *w,
                        long_threshold: long,
                        short_threshold: short,
                        ..base.clone()
                    });
                }
            }
        }
        combos
    }
}

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SweepResult {
    /// Weights actually used, after regime lookup.
    pub weights: CategoryWeights,
    pub custom_weights: bool,
    pub long_threshold: f64,
    pub short_threshold: f64,
    pub metrics: Metrics,
}

/// Runs one backtest per grid point in parallel and ranks the results by
/// total return, best first. Any invalid combination fails the sweep.
pub fn run_sweep(
    series: &TimeSeries,
    reference: Option<&TimeSeries>,
    base: &BacktestParams,
    grid: &SweepGrid,
) -> Result<Vec<SweepResult>, UnumError> {
    let combos = grid.combinations(base);
    debug!(combinations = combos.len(), "starting sweep");

    let mut results = combos
        .par_iter()
        .map(|params| {
            let run = run_backtest(series, reference, params)?;
            Ok(SweepResult {
                weights: run.scored.weights,
                custom_weights: params.weights.is_some(),
                long_threshold: params.long_threshold,
                short_threshold: params.short_threshold,
                metrics: run.metrics,
            })
        })
        .collect::<Result<Vec<_>, UnumError>>()?;

    results.sort_by(|a, b| {
        b.metrics
            .total_return_pct
            .total_cmp(&a.metrics.total_return_pct)
    });
    Ok(results)
}
