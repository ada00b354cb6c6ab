//! Indicator-enriched series access port trait.

use crate::domain::error::UnumError;
use crate::domain::series::{TimeSeries, Timeframe};

pub trait SeriesPort {
    /// Loads the full series for `symbol` at `timeframe`, oldest bar first.
    fn fetch_series(&self, symbol: &str, timeframe: Timeframe) -> Result<TimeSeries, UnumError>;

    /// Timeframes available for `symbol`, shortest first.
    fn list_series(&self, symbol: &str) -> Result<Vec<Timeframe>, UnumError>;
}
