//! Performance metrics derived from a finished simulation.

use super::position::PositionState;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Metrics {
    pub total_return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub win_rate_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub final_balance: f64,
    pub total_trades: usize,
}

/// Inputs of [`Metrics::compute`], all aligned one entry per bar.
#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    pub initial_balance: f64,
    pub equity_curve: &'a [f64],
    pub positions: &'a [PositionState],
    pub market_returns: &'a [f64],
    pub total_trades: usize,
    pub bars_per_year: f64,
}

impl Metrics {
    pub fn compute(input: MetricsInput<'_>) -> Self {
        let initial = input.initial_balance;
        let final_balance = input.equity_curve.last().copied().unwrap_or(initial);

        let total_return_pct = if initial > 0.0 {
            (final_balance / initial - 1.0) * 100.0
        } else {
            0.0
        };

        let buy_hold_return_pct = (input
            .market_returns
            .iter()
            .skip(1)
            .filter(|r| r.is_finite())
            .fold(1.0, |acc, r| acc * (1.0 + r))
            - 1.0)
            * 100.0;

        let returns = bar_returns(input.equity_curve);

        Metrics {
            total_return_pct,
            buy_hold_return_pct,
            win_rate_pct: compute_win_rate(&returns, input.positions),
            max_drawdown_pct: compute_max_drawdown(input.equity_curve) * 100.0,
            sharpe_ratio: compute_sharpe(&returns, input.bars_per_year),
            final_balance,
            total_trades: input.total_trades,
        }
    }

    /// Copy rounded to two decimals for presentation.
    pub fn rounded(&self) -> Self {
        let r2 = |v: f64| (v * 100.0).round() / 100.0;
        Metrics {
            total_return_pct: r2(self.total_return_pct),
            buy_hold_return_pct: r2(self.buy_hold_return_pct),
            win_rate_pct: r2(self.win_rate_pct),
            max_drawdown_pct: r2(self.max_drawdown_pct),
            sharpe_ratio: r2(self.sharpe_ratio),
            final_balance: r2(self.final_balance),
            total_trades: self.total_trades,
        }
    }
}

/// Per-bar percentage change of the equity curve; the first bar is 0.
pub fn bar_returns(equity_curve: &[f64]) -> Vec<f64> {
    if equity_curve.is_empty() {
        return Vec::new();
    }
    std::iter::once(0.0)
        .chain(equity_curve.windows(2).map(|w| {
            if w[0] > 0.0 {
                w[1] / w[0] - 1.0
            } else {
                0.0
            }
        }))
        .collect()
}

fn compute_win_rate(returns: &[f64], positions: &[PositionState]) -> f64 {
    let active: Vec<f64> = returns
        .iter()
        .zip(positions)
        .filter(|(_, p)| p.is_open())
        .map(|(r, _)| *r)
        .collect();
    if active.is_empty() {
        return 0.0;
    }
    let wins = active.iter().filter(|&&r| r > 0.0).count();
    wins as f64 / active.len() as f64 * 100.0
}

/// Most negative fractional decline from the running peak (<= 0).
fn compute_max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &equity in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            max_dd = max_dd.min((equity - peak) / peak);
        }
    }
    max_dd
}

fn compute_sharpe(returns: &[f64], bars_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev > 0.0 {
        mean / stddev * bars_per_year.sqrt()
    } else {
        0.0
    }
}
