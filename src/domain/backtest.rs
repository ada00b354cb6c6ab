//! Backtest parameters, the position state machine and the run pipeline.
//!
//! One run scores the series, walks it bar by bar through a single-position
//! state machine and reduces the resulting equity curve to [`Metrics`].

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::error::UnumError;
use crate::domain::metrics::{bar_returns, Metrics, MetricsInput};
use crate::domain::position::{ClosedTrade, ExitReason, ExitRules, OpenPosition, PositionState, Side};
use crate::domain::regime::CategoryWeights;
use crate::domain::series::{TimeSeries, Timeframe};
use crate::domain::session::{EntryGate, Session};
use crate::domain::signal::{compute_scores, ScoredSeries};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestParams {
    pub long_threshold: f64,
    pub short_threshold: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
    pub skip_weekends: bool,
    /// `None` allows every session.
    pub allowed_sessions: Option<Vec<Session>>,
    pub initial_balance: f64,
    pub fee_rate: f64,
    /// Overrides the regime-derived category weights.
    pub weights: Option<CategoryWeights>,
    pub bars_per_year: f64,
}

impl Default for BacktestParams {
    fn default() -> Self {
        BacktestParams {
            long_threshold: 0.6,
            short_threshold: -0.6,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            trailing_stop_pct: 0.015,
            skip_weekends: true,
            allowed_sessions: None,
            initial_balance: 10_000.0,
            fee_rate: 0.001,
            weights: None,
            bars_per_year: Timeframe::H4.bars_per_year(),
        }
    }
}

impl BacktestParams {
    pub fn validate(&self) -> Result<(), UnumError> {
        for (name, value) in [
            ("long_threshold", self.long_threshold),
            ("short_threshold", self.short_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(UnumError::invalid_parameter(
                    name,
                    format!("must be within [-1, 1], got {value}"),
                ));
            }
        }
        if self.long_threshold <= self.short_threshold {
            return Err(UnumError::invalid_parameter(
                "long_threshold",
                "must be greater than short_threshold",
            ));
        }
        // A stop at or beyond 100% would put the long stop level at or below zero.
        for (name, value) in [
            ("stop_loss_pct", self.stop_loss_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(UnumError::invalid_parameter(
                    name,
                    format!("must be a fraction in (0, 1), got {value}"),
                ));
            }
        }
        if !(self.take_profit_pct.is_finite() && self.take_profit_pct > 0.0) {
            return Err(UnumError::invalid_parameter(
                "take_profit_pct",
                format!("must be positive, got {}", self.take_profit_pct),
            ));
        }
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(UnumError::invalid_parameter(
                "initial_balance",
                "must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(UnumError::invalid_parameter(
                "fee_rate",
                format!("must be within [0, 1), got {}", self.fee_rate),
            ));
        }
        if !(self.bars_per_year.is_finite() && self.bars_per_year > 0.0) {
            return Err(UnumError::invalid_parameter(
                "bars_per_year",
                "must be positive",
            ));
        }
        if let Some(weights) = &self.weights {
            weights.validate()?;
        }
        Ok(())
    }

    pub fn exit_rules(&self) -> ExitRules {
        ExitRules {
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            trailing_stop_pct: self.trailing_stop_pct,
        }
    }

    pub fn entry_gate(&self) -> EntryGate {
        EntryGate {
            skip_weekends: self.skip_weekends,
            allowed_sessions: self.allowed_sessions.clone(),
        }
    }
}

/// Single-position state machine with fee accounting.
#[derive(Debug, Clone)]
pub struct PositionSimulator {
    rules: ExitRules,
    gate: EntryGate,
    long_threshold: f64,
    short_threshold: f64,
    fee_rate: f64,
    balance: f64,
    position: Option<OpenPosition>,
    total_trades: usize,
    trades: Vec<ClosedTrade>,
    equity_curve: Vec<f64>,
    positions: Vec<PositionState>,
}

/// Everything the simulator produced for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub equity_curve: Vec<f64>,
    pub positions: Vec<PositionState>,
    pub trades: Vec<ClosedTrade>,
    /// Entries and exits are counted separately.
    pub total_trades: usize,
    pub final_balance: f64,
}

impl PositionSimulator {
    pub fn new(params: &BacktestParams) -> Self {
        Self {
            rules: params.exit_rules(),
            gate: params.entry_gate(),
            long_threshold: params.long_threshold,
            short_threshold: params.short_threshold,
            fee_rate: params.fee_rate,
            balance: params.initial_balance,
            position: None,
            total_trades: 0,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            positions: Vec::new(),
        }
    }

    pub fn state(&self) -> PositionState {
        self.position
            .as_ref()
            .map_or(PositionState::Flat, |p| p.side.into())
    }

    /// Cash balance, net of every fee paid so far.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn total_trades(&self) -> usize {
        self.total_trades
    }

    /// Mark-to-market equity at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => pos.mark_to_market(self.balance, price),
            None => self.balance,
        }
    }

    /// Opens a position at `price`, charging the entry fee. No-op when a
    /// position is already open.
    pub fn open(&mut self, side: Side, price: f64, time: DateTime<Utc>) {
        if self.position.is_some() {
            return;
        }
        let capital = self.balance;
        self.balance *= 1.0 - self.fee_rate;
        self.position = Some(OpenPosition::new(side, price, time, capital));
        self.total_trades += 1;
        debug!(?side, price, %time, balance = self.balance, "entered position");
    }

    /// Closes the open position at `price`, charging the exit fee.
    pub fn close(
        &mut self,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let pos = self.position.take()?;
        self.balance = pos.mark_to_market(self.balance, price) * (1.0 - self.fee_rate);
        self.total_trades += 1;

        let trade = ClosedTrade {
            side: pos.side,
            entry_time: pos.entry_time,
            exit_time: time,
            entry_price: pos.entry_price,
            exit_price: price,
            exit_reason: reason,
            pnl: self.balance - pos.capital_at_entry,
        };
        debug!(
            side = ?trade.side,
            reason = %reason,
            exit_price = price,
            pnl = trade.pnl,
            "exited position"
        );
        self.trades.push(trade.clone());
        Some(trade)
    }

    /// Records end-of-bar equity and state.
    pub fn observe(&mut self, candle: &Candle) {
        self.equity_curve.push(self.equity(candle.close));
        self.positions.push(self.state());
    }

    /// Processes one bar: exits first, then a possible entry, then records
    /// end-of-bar equity.
    pub fn step(&mut self, candle: &Candle, score: f64) {
        let price = candle.close;

        let exit = match self.position.as_mut() {
            Some(pos) => {
                pos.update_extreme(price);
                pos.check_exit(price, &self.rules)
            }
            None => None,
        };
        if let Some(exit) = exit {
            self.close(exit.fill_price, candle.timestamp, exit.reason);
        }

        if self.position.is_none() && self.gate.allows(candle) {
            if score > self.long_threshold {
                self.open(Side::Long, price, candle.timestamp);
            } else if score < self.short_threshold {
                self.open(Side::Short, price, candle.timestamp);
            }
        }

        self.observe(candle);
    }

    pub fn finish(self) -> SimulationOutcome {
        let final_balance = self.equity_curve.last().copied().unwrap_or(self.balance);
        SimulationOutcome {
            equity_curve: self.equity_curve,
            positions: self.positions,
            trades: self.trades,
            total_trades: self.total_trades,
            final_balance,
        }
    }
}

/// Walks `series` with one score per bar. The first bar is only observed.
pub fn simulate(
    series: &TimeSeries,
    scores: &[f64],
    params: &BacktestParams,
) -> Result<SimulationOutcome, UnumError> {
    if scores.len() != series.len() {
        return Err(UnumError::InvalidSeries {
            reason: format!(
                "{} scores for {} bars",
                scores.len(),
                series.len()
            ),
        });
    }

    let mut sim = PositionSimulator::new(params);
    for (i, (candle, &score)) in series.candles().iter().zip(scores).enumerate() {
        if i == 0 {
            sim.observe(candle);
        } else {
            sim.step(candle, score);
        }
    }
    Ok(sim.finish())
}

/// Full output of one backtest.
#[derive(Debug, Clone)]
pub struct BacktestRun<'a> {
    pub series: &'a TimeSeries,
    pub params: BacktestParams,
    pub scored: ScoredSeries,
    pub positions: Vec<PositionState>,
    pub equity_curve: Vec<f64>,
    pub strategy_returns: Vec<f64>,
    pub market_returns: Vec<f64>,
    pub trades: Vec<ClosedTrade>,
    pub metrics: Metrics,
}

/// Percentage change of close; the first bar is 0.
pub fn market_returns(series: &TimeSeries) -> Vec<f64> {
    let closes = series.closes();
    if closes.is_empty() {
        return Vec::new();
    }
    std::iter::once(0.0)
        .chain(closes.windows(2).map(|w| w[1] / w[0] - 1.0))
        .collect()
}

/// Scores `series`, simulates it and derives metrics.
pub fn run_backtest<'a>(
    series: &'a TimeSeries,
    reference: Option<&TimeSeries>,
    params: &BacktestParams,
) -> Result<BacktestRun<'a>, UnumError> {
    params.validate()?;

    let scored = compute_scores(series, params.weights, reference);
    let outcome = simulate(series, &scored.scores, params)?;
    let market = market_returns(series);

    let metrics = Metrics::compute(MetricsInput {
        initial_balance: params.initial_balance,
        equity_curve: &outcome.equity_curve,
        positions: &outcome.positions,
        market_returns: &market,
        total_trades: outcome.total_trades,
        bars_per_year: params.bars_per_year,
    });

    debug!(
        symbol = %series.symbol,
        regime = %scored.regime,
        trades = outcome.total_trades,
        final_balance = metrics.final_balance,
        "backtest finished"
    );

    Ok(BacktestRun {
        series,
        params: params.clone(),
        strategy_returns: bar_returns(&outcome.equity_curve),
        scored,
        positions: outcome.positions,
        equity_curve: outcome.equity_curve,
        market_returns: market,
        trades: outcome.trades,
        metrics,
    })
}
