//! Augmented-series CSV report implementing ReportPort.
//!
//! Writes every input column followed by the factor signals, the composite
//! score and the simulation columns, one row per bar. Non-finite values are
//! written as empty cells so the file can be read back by the CSV adapter.

use crate::adapters::csv_adapter::REQUIRED_COLUMNS;
use crate::domain::backtest::BacktestRun;
use crate::domain::candle::Candle;
use crate::domain::error::UnumError;
use crate::ports::report_port::ReportPort;
use tracing::info;

const SIGNAL_COLUMNS: [&str; 9] = [
    "signal_ma",
    "signal_macd",
    "signal_aroon",
    "signal_fib",
    "signal_obv",
    "signal_atr",
    "signal_rsi",
    "signal_stoch",
    "signal_cci",
];

const RUN_COLUMNS: [&str; 8] = [
    "unum_score",
    "regime",
    "position",
    "equity_curve",
    "strategy_returns",
    "market_returns",
    "cum_strategy_returns",
    "cum_market_returns",
];

pub struct CsvReportAdapter;

fn cell(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

fn input_cells(c: &Candle) -> Vec<String> {
    let ind = &c.indicators;
    let mut cells = vec![c.timestamp.to_rfc3339()];
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
    cells
}

/// Running compounded return; the first bar is 0.
fn cumulative(returns: &[f64]) -> Vec<f64> {
    let mut growth = 1.0;
    returns
        .iter()
        .map(|r| {
            if r.is_finite() {
                growth *= 1.0 + r;
            }
            growth - 1.0
        })
        .collect()
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, run: &BacktestRun<'_>, output_path: &str) -> Result<(), UnumError> {
        let map_csv = |e: csv::Error| UnumError::DataLoad {
            reason: format!("failed to write report {}: {}", output_path, e),
        };
        let mut wtr = csv::Writer::from_path(output_path).map_err(map_csv)?;

        let header = REQUIRED_COLUMNS
            .iter()
            .chain(&SIGNAL_COLUMNS)
            .chain(&RUN_COLUMNS);
        wtr.write_record(header).map_err(map_csv)?;

        let cum_strategy = cumulative(&run.strategy_returns);
        let cum_market = cumulative(&run.market_returns);
        let regime = run.scored.regime.to_string();

        for (i, candle) in run.series.candles().iter().enumerate() {
            let mut row = input_cells(candle);
            if let Some(s) = run.scored.signals.get(i) {
                row.extend(
                    [s.ma, s.macd, s.aroon, s.fib, s.obv, s.atr, s.rsi, s.stoch, s.cci]
                        .into_iter()
                        .map(cell),
                );
            }
            let at = |v: &[f64]| v.get(i).copied().map(cell).unwrap_or_default();
            row.push(at(&run.scored.scores[..]));
            row.push(regime.clone());
            row.push(
                run.positions
                    .get(i)
                    .map(|p| p.as_signal().to_string())
                    .unwrap_or_default(),
            );
            row.push(at(&run.equity_curve[..]));
            row.push(at(&run.strategy_returns[..]));
            row.push(at(&run.market_returns[..]));
            row.push(at(&cum_strategy[..]));
            row.push(at(&cum_market[..]));
            wtr.write_record(&row).map_err(map_csv)?;
        }

        wtr.flush()?;
        info!(path = output_path, rows = run.series.len(), "wrote report");
        Ok(())
    }
}
