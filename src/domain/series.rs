//! Time series container and bar timeframe.

use crate::domain::candle::Candle;
use crate::domain::error::UnumError;
use std::fmt;
use std::str::FromStr;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Native bar period of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
}

impl Timeframe {
    pub fn hours(&self) -> u32 {
        match self {
            Timeframe::H1 => 1,
            Timeframe::H2 => 2,
            Timeframe::H4 => 4,
        }
    }

    /// Sharpe annualization factor: 252 trading days times bars per day.
    pub fn bars_per_year(&self) -> f64 {
        TRADING_DAYS_PER_YEAR * (24 / self.hours()) as f64
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.hours())
    }
}

impl FromStr for Timeframe {
    type Err = UnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1h" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "4h" => Ok(Timeframe::H4),
            other => Err(UnumError::invalid_parameter(
                "timeframe",
                format!("unsupported timeframe '{other}' (expected 1h, 2h or 4h)"),
            )),
        }
    }
}

/// Ordered candles with strictly increasing timestamps.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl TimeSeries {
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<Self, UnumError> {
        if let Some(i) = candles
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(UnumError::InvalidSeries {
                reason: format!(
                    "timestamps must be strictly increasing: {} follows {} at row {}",
                    candles[i + 1].timestamp,
                    candles[i].timestamp,
                    i + 1
                ),
            });
        }
        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::candle_at;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn parses_supported_timeframes() {
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert_eq!(" 2H ".parse::<Timeframe>().unwrap(), Timeframe::H2);
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert!("1d".parse::<Timeframe>().is_err());
    }

    #[test]
    fn four_hour_annualization() {
        assert!((Timeframe::H4.bars_per_year() - 1512.0).abs() < f64::EPSILON);
        assert!((Timeframe::H1.bars_per_year() - 6048.0).abs() < f64::EPSILON);
        assert_eq!(Timeframe::H2.to_string(), "2h");
    }

    #[test]
    fn accepts_increasing_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = (0..3)
            .map(|i| candle_at(start + Duration::hours(4 * i), 100.0))
            .collect();
        let series = TimeSeries::new("BTCUSDT", Timeframe::H4, candles).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![100.0, 100.0, 100.0]);
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = vec![candle_at(ts, 100.0), candle_at(ts, 101.0)];
        let err = TimeSeries::new("BTCUSDT", Timeframe::H4, candles).unwrap_err();
        assert!(matches!(err, UnumError::InvalidSeries { .. }));
    }

    #[test]
    fn empty_series_is_allowed() {
        let series = TimeSeries::new("BTCUSDT", Timeframe::H4, vec![]).unwrap();
        assert!(series.is_empty());
        assert!(series.last().is_none());
    }
}
