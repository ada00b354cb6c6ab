//! Position tracking and exit triggers.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum PositionState {
    Flat,
    Long,
    Short,
}

impl PositionState {
    /// +1 long, -1 short, 0 flat.
    pub fn as_signal(&self) -> i8 {
        match self {
            PositionState::Flat => 0,
            PositionState::Long => 1,
            PositionState::Short => -1,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, PositionState::Flat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Side {
    Long,
    Short,
}

impl From<Side> for PositionState {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => PositionState::Long,
            Side::Short => PositionState::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    /// Closed explicitly by the caller.
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Fractional exit distances, e.g. `0.02` for 2%.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitRules {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
}

/// A triggered exit: why, and the level it fills at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    pub reason: ExitReason,
    pub fill_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Running peak for longs, running trough for shorts.
    pub extreme_price: f64,
    /// Balance before the entry fee was charged.
    pub capital_at_entry: f64,
}

impl OpenPosition {
    pub fn new(side: Side, entry_price: f64, entry_time: DateTime<Utc>, capital: f64) -> Self {
        Self {
            side,
            entry_price,
            entry_time,
            extreme_price: entry_price,
            capital_at_entry: capital,
        }
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == Side::Short
    }

    /// Equity of `balance` (net of the entry fee) marked at `price`.
    pub fn mark_to_market(&self, balance: f64, price: f64) -> f64 {
        let ratio = price / self.entry_price;
        match self.side {
            Side::Long => balance * ratio,
            Side::Short => balance * (2.0 - ratio),
        }
    }

    pub fn update_extreme(&mut self, price: f64) {
        self.extreme_price = match self.side {
            Side::Long => self.extreme_price.max(price),
            Side::Short => self.extreme_price.min(price),
        };
    }

    pub fn stop_loss_level(&self, rules: &ExitRules) -> f64 {
        match self.side {
            Side::Long => self.entry_price * (1.0 - rules.stop_loss_pct),
            Side::Short => self.entry_price * (1.0 + rules.stop_loss_pct),
        }
    }

    pub fn take_profit_level(&self, rules: &ExitRules) -> f64 {
        match self.side {
            Side::Long => self.entry_price * (1.0 + rules.take_profit_pct),
            Side::Short => self.entry_price * (1.0 - rules.take_profit_pct),
        }
    }

    pub fn trailing_stop_level(&self, rules: &ExitRules) -> f64 {
        match self.side {
            Side::Long => self.extreme_price * (1.0 - rules.trailing_stop_pct),
            Side::Short => self.extreme_price * (1.0 + rules.trailing_stop_pct),
        }
    }

    /// Checks the exit triggers at `price`. The running extreme must already
    /// include `price`.
    ///
    /// Stops take precedence over the target. When both stops trigger, the
    /// one nearer the favourable side fills, since price crossed it first.
    pub fn check_exit(&self, price: f64, rules: &ExitRules) -> Option<ExitSignal> {
        let stop = self.stop_loss_level(rules);
        let trail = self.trailing_stop_level(rules);
        let target = self.take_profit_level(rules);

        let (stop_hit, trail_hit, target_hit) = match self.side {
            Side::Long => (price <= stop, price <= trail, price >= target),
            Side::Short => (price >= stop, price >= trail, price <= target),
        };

        let stop_first = match self.side {
            Side::Long => stop >= trail,
            Side::Short => stop <= trail,
        };

        match (stop_hit, trail_hit) {
            (true, true) if stop_first => Some(ExitSignal {
                reason: ExitReason::StopLoss,
                fill_price: stop,
            }),
            (_, true) => Some(ExitSignal {
                reason: ExitReason::TrailingStop,
                fill_price: trail,
            }),
            (true, false) => Some(ExitSignal {
                reason: ExitReason::StopLoss,
                fill_price: stop,
            }),
            (false, false) if target_hit => Some(ExitSignal {
                reason: ExitReason::TakeProfit,
                fill_price: target,
            }),
            _ => None,
        }
    }
}

/// One completed entry-to-exit cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Balance change over the trade, both fees included.
    pub pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::monday;
    use approx::assert_relative_eq;

    fn rules() -> ExitRules {
        ExitRules {
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            trailing_stop_pct: 0.015,
        }
    }

    fn long_at(price: f64) -> OpenPosition {
        OpenPosition::new(Side::Long, price, monday(), 10_000.0)
    }

    fn short_at(price: f64) -> OpenPosition {
        OpenPosition::new(Side::Short, price, monday(), 10_000.0)
    }

    #[test]
    fn state_signals() {
        assert_eq!(PositionState::Long.as_signal(), 1);
        assert_eq!(PositionState::Short.as_signal(), -1);
        assert_eq!(PositionState::Flat.as_signal(), 0);
        assert!(!PositionState::Flat.is_open());
        assert_eq!(PositionState::from(Side::Short), PositionState::Short);
    }

    #[test]
    fn mark_to_market_is_symmetric() {
        let long = long_at(100.0);
        let short = short_at(100.0);
        assert_relative_eq!(long.mark_to_market(1000.0, 110.0), 1100.0);
        assert_relative_eq!(short.mark_to_market(1000.0, 110.0), 900.0);
        assert_relative_eq!(short.mark_to_market(1000.0, 90.0), 1100.0);
        assert_relative_eq!(long.mark_to_market(1000.0, 100.0), 1000.0);
    }

    #[test]
    fn extreme_tracks_peak_and_trough() {
        let mut long = long_at(100.0);
        long.update_extreme(105.0);
        long.update_extreme(103.0);
        assert_relative_eq!(long.extreme_price, 105.0);

        let mut short = short_at(100.0);
        short.update_extreme(95.0);
        short.update_extreme(97.0);
        assert_relative_eq!(short.extreme_price, 95.0);
    }

    #[test]
    fn long_stop_loss_fills_at_level() {
        let pos = long_at(100.0);
        let exit = pos.check_exit(97.0, &rules()).unwrap();
        // Trailing level (98.5) sits above the stop (98.0) and is crossed first.
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_relative_eq!(exit.fill_price, 98.5);
    }

    #[test]
    fn long_stop_loss_when_it_is_nearer() {
        let wide_trail = ExitRules {
            trailing_stop_pct: 0.05,
            ..rules()
        };
        let pos = long_at(100.0);
        let exit = pos.check_exit(97.9, &wide_trail).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_relative_eq!(exit.fill_price, 98.0);
    }

    #[test]
    fn short_stop_loss_when_it_is_nearer() {
        let wide_trail = ExitRules {
            trailing_stop_pct: 0.05,
            ..rules()
        };
        let mut pos = short_at(100.0);
        pos.update_extreme(105.5);
        let exit = pos.check_exit(105.5, &wide_trail).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_relative_eq!(exit.fill_price, 102.0);
    }

    #[test]
    fn long_take_profit() {
        let mut pos = long_at(100.0);
        pos.update_extreme(104.5);
        let exit = pos.check_exit(104.5, &rules()).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_relative_eq!(exit.fill_price, 104.0);
    }

    #[test]
    fn long_trailing_stop_after_rally() {
        let mut pos = long_at(100.0);
        pos.update_extreme(103.0);
        assert!(pos.check_exit(102.0, &rules()).is_none());
        let exit = pos.check_exit(101.0, &rules()).unwrap();
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_relative_eq!(exit.fill_price, 103.0 * 0.985);
    }

    #[test]
    fn no_exit_inside_band() {
        let pos = long_at(100.0);
        assert!(pos.check_exit(99.0, &rules()).is_none());
        assert!(pos.check_exit(100.0, &rules()).is_none());
    }

    #[test]
    fn short_mirrors_long() {
        let mut pos = short_at(100.0);
        let exit = pos.check_exit(103.0, &rules()).unwrap();
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_relative_eq!(exit.fill_price, 101.5);

        pos.update_extreme(95.5);
        let exit = pos.check_exit(95.5, &rules()).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_relative_eq!(exit.fill_price, 96.0);
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::TrailingStop.to_string(), "trailing_stop");
        assert_eq!(ExitReason::Manual.to_string(), "manual");
    }
}
