//! Candle representation: one OHLCV bar plus its precomputed indicators.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Fibonacci retracement levels over the indicator lookback window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibLevels {
    pub fib_0: f64,
    pub fib_236: f64,
    pub fib_382: f64,
    pub fib_500: f64,
    pub fib_618: f64,
    pub fib_786: f64,
    pub fib_100: f64,
}

impl FibLevels {
    /// All seven levels, lowest retracement first.
    pub fn all(&self) -> [f64; 7] {
        [
            self.fib_0,
            self.fib_236,
            self.fib_382,
            self.fib_500,
            self.fib_618,
            self.fib_786,
            self.fib_100,
        ]
    }

    /// Highest level strictly below `price`.
    pub fn support_below(&self, price: f64) -> Option<f64> {
        self.all()
            .into_iter()
            .filter(|l| l.is_finite() && *l < price)
            .fold(None, |acc: Option<f64>, l| Some(acc.map_or(l, |a| a.max(l))))
    }

    /// Lowest level strictly above `price`.
    pub fn resistance_above(&self, price: f64) -> Option<f64> {
        self.all()
            .into_iter()
            .filter(|l| l.is_finite() && *l > price)
            .fold(None, |acc: Option<f64>, l| Some(acc.map_or(l, |a| a.min(l))))
    }
}

/// Indicator columns supplied by the upstream indicator collaborator.
///
/// Warm-up cells are `NaN`. Comparisons against `NaN` are false, which the
/// factor rules rely on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Indicators {
    pub ma_fast: f64,
    pub ma_mid: f64,
    pub rsi: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub macd_hist: f64,
    pub obv: f64,
    pub atr: f64,
    pub atr_ma: f64,
    pub aroon_up: f64,
    pub aroon_down: f64,
    pub cci: f64,
    pub trend_strength: f64,
    pub volume_ma: f64,
    pub fib: FibLevels,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub indicators: Indicators,
}

impl Candle {
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.timestamp.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
