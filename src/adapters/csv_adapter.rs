//! CSV file series adapter.
//!
//! One file per symbol and timeframe, `{symbol}_{timeframe}.csv`, carrying
//! OHLCV columns plus the precomputed indicator columns. Columns are located
//! by header name; extra columns are ignored.

use crate::domain::candle::{Candle, FibLevels, Indicators};
use crate::domain::error::UnumError;
use crate::domain::series::{TimeSeries, Timeframe};
use crate::ports::series_port::SeriesPort;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub const REQUIRED_COLUMNS: [&str; 27] = [
    "timestamp", "open", "high", "low", "close", "volume",
    "EMA_20", "EMA_50", "RSI", "Stoch_K", "Stoch_D", "MACD_Hist", "OBV",
    "ATR", "ATR_MA", "Aroon_Up", "Aroon_Down", "CCI", "ADX", "Volume_MA",
    "Fib_0", "Fib_236", "Fib_382", "Fib_500", "Fib_618", "Fib_786", "Fib_100",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }
}

/// Header positions of the required columns.
struct Columns(HashMap<&'static str, usize>);

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, UnumError> {
        let mut index = HashMap::with_capacity(REQUIRED_COLUMNS.len());
        for name in REQUIRED_COLUMNS {
            let pos = headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| UnumError::MissingField {
                    field: name.to_string(),
                })?;
            index.insert(name, pos);
        }
        Ok(Self(index))
    }

    fn raw<'r>(&self, record: &'r csv::StringRecord, name: &'static str) -> &'r str {
        self.0
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .unwrap_or("")
    }

    /// Indicator cell. Empty cells are warm-up values and read as `NaN`.
    fn number(&self, record: &csv::StringRecord, name: &'static str, row: usize) -> Result<f64, UnumError> {
        let raw = self.raw(record, name);
        if raw.is_empty() {
            return Ok(f64::NAN);
        }
        raw.parse().map_err(|e| UnumError::DataLoad {
            reason: format!("row {row}: invalid {name} value '{raw}': {e}"),
        })
    }

    /// Price or volume cell; must be present and finite.
    fn bar_value(&self, record: &csv::StringRecord, name: &'static str, row: usize) -> Result<f64, UnumError> {
        let value = self.number(record, name, row)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(UnumError::DataLoad {
                reason: format!("row {row}: {name} is empty or not finite"),
            })
        }
    }
}

fn parse_timestamp(raw: &str, row: usize) -> Result<DateTime<Utc>, UnumError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| UnumError::DataLoad {
            reason: format!("row {row}: invalid timestamp '{raw}': {e}"),
        })
}

fn parse_candle(cols: &Columns, record: &csv::StringRecord, row: usize) -> Result<Candle, UnumError> {
    let n = |name| cols.number(record, name, row);
    let bar = |name| cols.bar_value(record, name, row);
    Ok(Candle {
        timestamp: parse_timestamp(cols.raw(record, "timestamp"), row)?,
        open: bar("open")?,
        high: bar("high")?,
        low: bar("low")?,
        close: bar("close")?,
        volume: bar("volume")?,
        indicators: Indicators {
            ma_fast: n("EMA_20")?,
            ma_mid: n("EMA_50")?,
            rsi: n("RSI")?,
            stoch_k: n("Stoch_K")?,
            stoch_d: n("Stoch_D")?,
            macd_hist: n("MACD_Hist")?,
            obv: n("OBV")?,
            atr: n("ATR")?,
            atr_ma: n("ATR_MA")?,
            aroon_up: n("Aroon_Up")?,
            aroon_down: n("Aroon_Down")?,
            cci: n("CCI")?,
            trend_strength: n("ADX")?,
            volume_ma: n("Volume_MA")?,
            fib: FibLevels {
                fib_0: n("Fib_0")?,
                fib_236: n("Fib_236")?,
                fib_382: n("Fib_382")?,
                fib_500: n("Fib_500")?,
                fib_618: n("Fib_618")?,
                fib_786: n("Fib_786")?,
                fib_100: n("Fib_100")?,
            },
        },
    })
}

impl SeriesPort for CsvAdapter {
    fn fetch_series(&self, symbol: &str, timeframe: Timeframe) -> Result<TimeSeries, UnumError> {
        let path = self.csv_path(symbol, timeframe);
        if !path.exists() {
            return Err(UnumError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| UnumError::DataLoad {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| UnumError::DataLoad {
            reason: format!("CSV header error: {}", e),
        })?;
        let cols = Columns::from_headers(headers)?;

        let mut candles = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| UnumError::DataLoad {
                reason: format!("CSV parse error: {}", e),
            })?;
            candles.push(parse_candle(&cols, &record, i + 1)?);
        }

        candles.sort_by_key(|c| c.timestamp);
        debug!(symbol, %timeframe, bars = candles.len(), path = %path.display(), "loaded series");
        TimeSeries::new(symbol, timeframe, candles)
    }

    fn list_series(&self, symbol: &str) -> Result<Vec<Timeframe>, UnumError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| UnumError::DataLoad {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let prefix = format!("{}_", symbol);
        let mut timeframes = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| UnumError::DataLoad {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            let tf = name_str
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".csv"))
                .and_then(|tf| tf.parse::<Timeframe>().ok());
            if let Some(tf) = tf {
                timeframes.push(tf);
            }
        }

        timeframes.sort_by_key(|tf| tf.hours());
        Ok(timeframes)
    }
}
