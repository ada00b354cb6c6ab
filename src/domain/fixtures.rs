//! Builders shared by the domain unit tests.

use crate::domain::candle::{Candle, FibLevels, Indicators};
use crate::domain::series::{TimeSeries, Timeframe};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn fib_around(close: f64) -> FibLevels {
    let low = close * 0.9;
    let diff = close * 0.2;
    FibLevels {
        fib_0: low,
        fib_236: low + diff * 0.236,
        fib_382: low + diff * 0.382,
        fib_500: low + diff * 0.5,
        fib_618: low + diff * 0.618,
        fib_786: low + diff * 0.786,
        fib_100: low + diff,
    }
}

/// Indicators that vote neither way on most factors.
pub fn neutral_indicators(close: f64) -> Indicators {
    Indicators {
        ma_fast: close,
        ma_mid: close,
        rsi: 50.0,
        stoch_k: 50.0,
        stoch_d: 50.0,
        macd_hist: 0.0,
        obv: 0.0,
        atr: 1.0,
        atr_ma: 1.0,
        aroon_up: 50.0,
        aroon_down: 50.0,
        cci: 0.0,
        trend_strength: 30.0,
        volume_ma: 1.0,
        fib: fib_around(close),
    }
}

pub fn candle_at(timestamp: DateTime<Utc>, close: f64) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
        indicators: neutral_indicators(close),
    }
}

/// Monday 2024-01-08 00:00 UTC.
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
}

/// Hourly series starting at [`monday`], one bar per close.
pub fn hourly_series(closes: &[f64]) -> TimeSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle_at(monday() + Duration::hours(i as i64), c))
        .collect();
    TimeSeries::new("TEST", Timeframe::H1, candles).unwrap()
}
