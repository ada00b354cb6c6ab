//! Report generation port trait.

use crate::domain::backtest::BacktestRun;
use crate::domain::error::UnumError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, run: &BacktestRun<'_>, output_path: &str) -> Result<(), UnumError>;
}
