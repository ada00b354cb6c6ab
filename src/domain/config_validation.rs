//! Configuration loading and validation.
//!
//! Reads every section the CLI needs through [`ConfigPort`] and rejects bad
//! values before any data is loaded.

use std::path::PathBuf;

use crate::domain::backtest::BacktestParams;
use crate::domain::error::UnumError;
use crate::domain::regime::CategoryWeights;
use crate::domain::series::Timeframe;
use crate::domain::session::parse_sessions;
use crate::domain::sweep::SweepGrid;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub reference_timeframe: Option<Timeframe>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryConfig {
    pub enabled: bool,
    pub model: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub data: DataConfig,
    pub params: BacktestParams,
    pub sweep: SweepGrid,
    pub advisory: AdvisoryConfig,
    pub report_output: Option<String>,
    bars_per_year_configured: bool,
}

impl RunConfig {
    pub fn set_symbol(&mut self, symbol: &str) {
        self.data.symbol = symbol.to_string();
    }

    /// Switches the traded timeframe. Annualization follows unless
    /// `bars_per_year` was set explicitly.
    pub fn set_timeframe(&mut self, timeframe: Timeframe) {
        self.data.timeframe = timeframe;
        if !self.bars_per_year_configured {
            self.params.bars_per_year = timeframe.bars_per_year();
        }
    }
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, UnumError> {
    let data = load_data_config(config)?;
    let bars_per_year_configured = non_empty(config, "backtest", "bars_per_year").is_some();
    let params = load_backtest_params(config, data.timeframe)?;
    let sweep = load_sweep_grid(config)?;
    let advisory = AdvisoryConfig {
        enabled: flag(config, "advisory", "enabled", false)?,
        model: non_empty(config, "advisory", "model").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        api_key_env: non_empty(config, "advisory", "api_key_env")
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
    };
    Ok(RunConfig {
        data,
        params,
        sweep,
        advisory,
        report_output: non_empty(config, "report", "output"),
        bars_per_year_configured,
    })
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), UnumError> {
    load_run_config(config).map(|_| ())
}

fn load_data_config(config: &dyn ConfigPort) -> Result<DataConfig, UnumError> {
    let dir = non_empty(config, "data", "dir").ok_or_else(|| UnumError::ConfigMissing {
        section: "data".to_string(),
        key: "dir".to_string(),
    })?;
    let timeframe = match non_empty(config, "data", "timeframe") {
        Some(s) => parse_timeframe(&s, "timeframe")?,
        None => Timeframe::H4,
    };
    let reference_timeframe = non_empty(config, "data", "reference_timeframe")
        .map(|s| parse_timeframe(&s, "reference_timeframe"))
        .transpose()?;
    Ok(DataConfig {
        dir: PathBuf::from(dir),
        symbol: non_empty(config, "data", "symbol").unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
        timeframe,
        reference_timeframe,
    })
}

fn parse_timeframe(value: &str, key: &str) -> Result<Timeframe, UnumError> {
    value.parse().map_err(|_| UnumError::ConfigInvalid {
        section: "data".to_string(),
        key: key.to_string(),
        reason: format!("unsupported timeframe '{value}' (expected 1h, 2h or 4h)"),
    })
}

pub fn load_backtest_params(
    config: &dyn ConfigPort,
    timeframe: Timeframe,
) -> Result<BacktestParams, UnumError> {
    let defaults = BacktestParams::default();
    let allowed_sessions = match non_empty(config, "backtest", "allowed_sessions") {
        Some(s) => parse_sessions(&s).map_err(|e| as_config_error("backtest", e))?,
        None => None,
    };

    let params = BacktestParams {
        long_threshold: number(config, "backtest", "long_threshold", defaults.long_threshold)?,
        short_threshold: number(config, "backtest", "short_threshold", defaults.short_threshold)?,
        stop_loss_pct: number(config, "backtest", "stop_loss_pct", defaults.stop_loss_pct)?,
        take_profit_pct: number(config, "backtest", "take_profit_pct", defaults.take_profit_pct)?,
        trailing_stop_pct: number(
            config,
            "backtest",
            "trailing_stop_pct",
            defaults.trailing_stop_pct,
        )?,
        skip_weekends: flag(config, "backtest", "skip_weekends", defaults.skip_weekends)?,
        allowed_sessions,
        initial_balance: number(config, "backtest", "initial_balance", defaults.initial_balance)?,
        fee_rate: number(config, "backtest", "fee_rate", defaults.fee_rate)?,
        weights: load_weights(config)?,
        bars_per_year: number(config, "backtest", "bars_per_year", timeframe.bars_per_year())?,
    };

    params.validate().map_err(|e| {
        let section = match &e {
            UnumError::InvalidParameter { name, .. } if is_weight_key(name) => "weights",
            _ => "backtest",
        };
        as_config_error(section, e)
    })?;
    Ok(params)
}

fn load_weights(config: &dyn ConfigPort) -> Result<Option<CategoryWeights>, UnumError> {
    let keys = ["trend", "volume_levels", "momentum"];
    let present = keys
        .iter()
        .filter(|k| non_empty(config, "weights", k).is_some())
        .count();
    match present {
        0 => Ok(None),
        3 => Ok(Some(CategoryWeights {
            trend: number(config, "weights", "trend", 0.0)?,
            volume_levels: number(config, "weights", "volume_levels", 0.0)?,
            momentum: number(config, "weights", "momentum", 0.0)?,
        })),
        _ => {
            let missing = keys
                .iter()
                .find(|k| non_empty(config, "weights", k).is_none())
                .copied()
                .unwrap_or("trend");
            Err(UnumError::ConfigMissing {
                section: "weights".to_string(),
                key: missing.to_string(),
            })
        }
    }
}

fn load_sweep_grid(config: &dyn ConfigPort) -> Result<SweepGrid, UnumError> {
    let weights = match non_empty(config, "sweep", "weights") {
        Some(s) => s
            .split('|')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| CategoryWeights::parse_triple(t).map(Some))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| as_config_error("sweep", e))?,
        None => Vec::new(),
    };
    Ok(SweepGrid {
        weights,
        long_thresholds: number_list(config, "sweep", "long_thresholds")?,
        short_thresholds: number_list(config, "sweep", "short_thresholds")?,
    })
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reads a float, failing on a present but unparsable value.
fn number(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, UnumError> {
    config
        .get_float(section, key)
        .map(|v| v.unwrap_or(default))
        .map_err(|s| invalid(section, key, format!("'{s}' is not a number")))
}

fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, UnumError> {
    config
        .get_bool(section, key)
        .map(|v| v.unwrap_or(default))
        .map_err(|s| invalid(section, key, format!("'{s}' is not a boolean")))
}

fn invalid(section: &str, key: &str, reason: String) -> UnumError {
    UnumError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn number_list(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Vec<f64>, UnumError> {
    let Some(s) = non_empty(config, section, key) else {
        return Ok(Vec::new());
    };
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| invalid(section, key, format!("'{p}' is not a number")))
        })
        .collect()
}

fn is_weight_key(name: &str) -> bool {
    name == "weights" || name.starts_with("weights.")
}

fn as_config_error(section: &str, err: UnumError) -> UnumError {
    match err {
        UnumError::InvalidParameter { name, reason } => UnumError::ConfigInvalid {
            section: section.to_string(),
            key: name,
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::session::Session;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = make_config("[data]\ndir = /tmp/data\n");
        let run = load_run_config(&config).unwrap();
        assert_eq!(run.data.symbol, "BTCUSDT");
        assert_eq!(run.data.timeframe, Timeframe::H4);
        assert_eq!(run.data.reference_timeframe, None);
        assert_eq!(run.params, BacktestParams::default());
        assert!(!run.advisory.enabled);
        assert_eq!(run.advisory.api_key_env, "GEMINI_API_KEY");
        assert_eq!(run.sweep, SweepGrid::default());
        assert_eq!(run.report_output, None);
    }

    #[test]
    fn full_config_is_read() {
        let config = make_config(
            r#"
[data]
dir = ./data
symbol = ETHUSDT
timeframe = 1h
reference_timeframe = 4h

[backtest]
long_threshold = 0.5
short_threshold = -0.4
stop_loss_pct = 0.03
take_profit_pct = 0.06
trailing_stop_pct = 0.02
skip_weekends = false
allowed_sessions = asian, american
initial_balance = 5000
fee_rate = 0.0005

[weights]
trend = 0.6
volume_levels = 0.2
momentum = 0.2

[sweep]
weights = 0.5/0.35/0.15 | 0.2/0.4/0.4
long_thresholds = 0.4, 0.6
short_thresholds = -0.4, -0.6

[advisory]
enabled = true
model = gemini-pro

[report]
output = out.csv
"#,
        );
        let run = load_run_config(&config).unwrap();
        assert_eq!(run.data.symbol, "ETHUSDT");
        assert_eq!(run.data.timeframe, Timeframe::H1);
        assert_eq!(run.data.reference_timeframe, Some(Timeframe::H4));
        assert_eq!(run.params.long_threshold, 0.5);
        assert!(!run.params.skip_weekends);
        assert_eq!(
            run.params.allowed_sessions,
            Some(vec![Session::Asian, Session::American])
        );
        assert_eq!(run.params.bars_per_year, Timeframe::H1.bars_per_year());
        assert_eq!(run.params.weights.unwrap().trend, 0.6);
        assert_eq!(run.sweep.weights.len(), 2);
        assert_eq!(run.sweep.long_thresholds, vec![0.4, 0.6]);
        assert!(run.advisory.enabled);
        assert_eq!(run.advisory.model, "gemini-pro");
        assert_eq!(run.report_output.as_deref(), Some("out.csv"));
    }

    #[test]
    fn missing_data_dir_fails() {
        let err = load_run_config(&make_config("[data]\nsymbol = BTCUSDT\n")).unwrap_err();
        assert!(matches!(err, UnumError::ConfigMissing { key, .. } if key == "dir"));
    }

    #[test]
    fn unknown_timeframe_fails() {
        let err = load_run_config(&make_config("[data]\ndir = d\ntimeframe = 15m\n")).unwrap_err();
        assert!(matches!(err, UnumError::ConfigInvalid { key, .. } if key == "timeframe"));
    }

    #[test]
    fn non_numeric_value_fails() {
        let err = load_run_config(&make_config("[data]\ndir = d\n[backtest]\nfee_rate = cheap\n"))
            .unwrap_err();
        assert!(matches!(err, UnumError::ConfigInvalid { key, .. } if key == "fee_rate"));
    }

    #[test]
    fn non_boolean_flag_fails() {
        let err = load_run_config(&make_config(
            "[data]\ndir = d\n[backtest]\nskip_weekends = sometimes\n",
        ))
        .unwrap_err();
        assert!(matches!(err, UnumError::ConfigInvalid { key, .. } if key == "skip_weekends"));
    }

    #[test]
    fn crossed_thresholds_fail() {
        let err = load_run_config(&make_config(
            "[data]\ndir = d\n[backtest]\nlong_threshold = -0.2\nshort_threshold = 0.2\n",
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            UnumError::ConfigInvalid { section, key, .. }
                if section == "backtest" && key == "long_threshold"
        ));
    }

    #[test]
    fn unknown_session_fails() {
        let err = load_run_config(&make_config(
            "[data]\ndir = d\n[backtest]\nallowed_sessions = asian, lunar\n",
        ))
        .unwrap_err();
        assert!(matches!(err, UnumError::ConfigInvalid { key, .. } if key == "allowed_sessions"));
    }

    #[test]
    fn partial_weights_fail() {
        let err = load_run_config(&make_config("[data]\ndir = d\n[weights]\ntrend = 1.0\n"))
            .unwrap_err();
        assert!(matches!(
            err,
            UnumError::ConfigMissing { section, key } if section == "weights" && key == "volume_levels"
        ));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let err = load_run_config(&make_config(
            "[data]\ndir = d\n[weights]\ntrend = 0.5\nvolume_levels = 0.5\nmomentum = 0.5\n",
        ))
        .unwrap_err();
        assert!(matches!(err, UnumError::ConfigInvalid { section, .. } if section == "weights"));
    }

    #[test]
    fn bad_sweep_triple_fails() {
        let err = load_run_config(&make_config("[data]\ndir = d\n[sweep]\nweights = 0.5/0.5\n"))
            .unwrap_err();
        assert!(matches!(err, UnumError::ConfigInvalid { section, .. } if section == "sweep"));
    }

    #[test]
    fn timeframe_override_moves_annualization() {
        let mut run = load_run_config(&make_config("[data]\ndir = d\n")).unwrap();
        run.set_timeframe(Timeframe::H1);
        assert_eq!(run.params.bars_per_year, Timeframe::H1.bars_per_year());

        let mut run =
            load_run_config(&make_config("[data]\ndir = d\n[backtest]\nbars_per_year = 365\n"))
                .unwrap();
        run.set_timeframe(Timeframe::H1);
        assert_eq!(run.params.bars_per_year, 365.0);
    }

    #[test]
    fn validate_config_passes_for_valid_file() {
        assert!(validate_config(&make_config("[data]\ndir = d\n")).is_ok());
    }
}
