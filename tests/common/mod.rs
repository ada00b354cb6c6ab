#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use unum::adapters::csv_adapter::REQUIRED_COLUMNS;
pub use unum::domain::candle::{Candle, FibLevels, Indicators};
use unum::domain::error::UnumError;
use unum::domain::series::{TimeSeries, Timeframe};
use unum::ports::series_port::SeriesPort;

pub struct MockSeriesPort {
    pub data: HashMap<(String, Timeframe), TimeSeries>,
    pub errors: HashMap<String, String>,
}

impl MockSeriesPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: TimeSeries) -> Self {
        self.data
            .insert((series.symbol.clone(), series.timeframe), series);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl SeriesPort for MockSeriesPort {
    fn fetch_series(&self, symbol: &str, timeframe: Timeframe) -> Result<TimeSeries, UnumError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(UnumError::DataLoad {
                reason: reason.clone(),
            });
        }
        self.data
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .ok_or_else(|| UnumError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            })
    }

    fn list_series(&self, symbol: &str) -> Result<Vec<Timeframe>, UnumError> {
        let mut tfs: Vec<Timeframe> = self
            .data
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, tf)| *tf)
            .collect();
        tfs.sort_by_key(|tf| tf.hours());
        Ok(tfs)
    }
}

/// Monday 2024-01-08 00:00 UTC.
pub fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap()
}

/// Saturday 2024-01-06 00:00 UTC.
pub fn saturday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap()
}

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

/// A bar whose indicators vote neither way on most factors.
pub fn make_candle(timestamp: DateTime<Utc>, close: f64) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
        indicators: Indicators {
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
        },
    }
}

/// Every factor votes long, trend and volume filters pass.
pub fn bullish(mut candle: Candle) -> Candle {
    let close = candle.close;
    candle.volume = 2.0;
    let ind = &mut candle.indicators;
    ind.ma_fast = close * 0.99;
    ind.ma_mid = close * 0.98;
    ind.macd_hist = 1.0;
    ind.aroon_up = 90.0;
    ind.aroon_down = 10.0;
    ind.obv = 1_000.0;
    ind.rsi = 65.0;
    ind.stoch_k = 80.0;
    ind.stoch_d = 70.0;
    ind.cci = 120.0;
    ind.trend_strength = 35.0;
    ind.volume_ma = 1.0;
    ind.fib = fib_around(close * 0.95);
    candle
}

pub fn series_from(
    symbol: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    closes: &[f64],
) -> TimeSeries {
    let step = Duration::hours(timeframe.hours() as i64);
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_candle(start + step * i as i32, c))
        .collect();
    TimeSeries::new(symbol, timeframe, candles).unwrap()
}

/// Hourly series starting on [`monday`].
pub fn hourly(closes: &[f64]) -> TimeSeries {
    series_from("TEST", Timeframe::H1, monday(), closes)
}

fn cell(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

/// Writes `series` as `{dir}/{symbol}_{timeframe}.csv` in the input format.
pub fn write_series_csv(dir: &Path, series: &TimeSeries) {
    let mut out = REQUIRED_COLUMNS.join(",");
    out.push('\n');
    for c in series.candles() {
        let ind = &c.indicators;
        let mut cells = vec![c.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        cells.extend(
            [
                c.open,
                c.high,
                c.low,
                c.close,
                c.volume,
                ind.ma_fast,
                ind.ma_mid,
                ind.rsi,
                ind.stoch_k,
                ind.stoch_d,
                ind.macd_hist,
                ind.obv,
                ind.atr,
                ind.atr_ma,
                ind.aroon_up,
                ind.aroon_down,
                ind.cci,
                ind.trend_strength,
                ind.volume_ma,
            ]
            .into_iter()
            .chain(ind.fib.all())
            .map(cell),
        );
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    let path = dir.join(format!("{}_{}.csv", series.symbol, series.timeframe));
    fs::write(path, out).unwrap();
}
