//! Multi-factor signal aggregation into the composite "unum" score.
//!
//! Scoring runs in five stages over the whole series:
//! 1. nine per-bar factor signals, each a pure function of that bar
//! 2. fixed sub-weights combine factors into three category scores
//! 3. regime (or caller) weights combine categories into a raw score
//! 4. multiplicative noise filters (trend strength, volume, volatility, persistence)
//! 5. reference-series confirmation of the final bar

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::regime::{CategoryWeights, Regime};
use crate::domain::series::TimeSeries;

const OBV_MA_PERIOD: usize = 20;
const REFERENCE_MA_PERIOD: usize = 50;
const FIB_TOLERANCE_PCT: f64 = 0.005;

const DAMPENER_MIN: f64 = 0.3;
const DAMPENER_MAX: f64 = 1.0;

const TREND_FILTER_THRESHOLD: f64 = 22.0;
const WEAK_TREND_FACTOR: f64 = 0.2;
const VOLUME_CONFIRM_RATIO: f64 = 1.2;
const UNCONFIRMED_VOLUME_FACTOR: f64 = 0.5;
const SIGN_FLIP_FACTOR: f64 = 0.5;

/// Sub-weights inside each category.
const TREND_SUB: [f64; 3] = [0.4, 0.3, 0.3];
const VOLUME_LEVELS_SUB: [f64; 3] = [0.5, 0.3, 0.2];
const MOMENTUM_SUB: [f64; 3] = [0.4, 0.3, 0.3];

/// Per-bar factor signals.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FactorSignals {
    pub ma: f64,
    pub macd: f64,
    pub aroon: f64,
    pub fib: f64,
    pub obv: f64,
    /// Volatility dampener in [0.3, 1.0], not a directional vote.
    pub atr: f64,
    pub rsi: f64,
    pub stoch: f64,
    pub cci: f64,
}

impl FactorSignals {
    pub fn trend_score(&self) -> f64 {
        self.ma * TREND_SUB[0] + self.macd * TREND_SUB[1] + self.aroon * TREND_SUB[2]
    }

    pub fn volume_levels_score(&self) -> f64 {
        self.fib * VOLUME_LEVELS_SUB[0]
            + self.obv * VOLUME_LEVELS_SUB[1]
            + self.atr * VOLUME_LEVELS_SUB[2]
    }

    pub fn momentum_score(&self) -> f64 {
        self.rsi * MOMENTUM_SUB[0] + self.stoch * MOMENTUM_SUB[1] + self.cci * MOMENTUM_SUB[2]
    }

    pub fn weighted(&self, weights: &CategoryWeights) -> f64 {
        self.trend_score() * weights.trend
            + self.volume_levels_score() * weights.volume_levels
            + self.momentum_score() * weights.momentum
    }
}

/// Output of one scoring call.
#[derive(Debug, Clone)]
pub struct ScoredSeries {
    pub signals: Vec<FactorSignals>,
    /// Category-weighted score before the noise filters.
    pub raw_scores: Vec<f64>,
    /// Final composite score, one per bar.
    pub scores: Vec<f64>,
    pub regime: Regime,
    pub weights: CategoryWeights,
    /// Trend direction of the reference series at its last bar, if known.
    pub reference_direction: Option<i8>,
}

impl ScoredSeries {
    pub fn last_score(&self) -> Option<f64> {
        self.scores.last().copied()
    }
}

fn vote(condition: bool) -> f64 {
    if condition { 1.0 } else { -1.0 }
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

pub fn ma_alignment_signal(candle: &Candle) -> f64 {
    let ind = &candle.indicators;
    if candle.close > ind.ma_fast && ind.ma_fast > ind.ma_mid {
        1.0
    } else if candle.close < ind.ma_fast && ind.ma_fast < ind.ma_mid {
        -1.0
    } else {
        0.0
    }
}

/// Bounce/rejection at the 38.2%, 50% and 61.8% retracements.
///
/// Levels are scanned in that order and the first touched level decides.
/// A touch means the bar's low (bounce) or high (rejection) lies within
/// 0.5% of close of the level.
pub fn fib_bounce_signal(candle: &Candle) -> f64 {
    let fib = &candle.indicators.fib;
    let tolerance = candle.close * FIB_TOLERANCE_PCT;

    for level in [fib.fib_382, fib.fib_500, fib.fib_618] {
        if (candle.low - level).abs() <= tolerance && candle.close > level {
            return 1.0;
        }
        if (candle.high - level).abs() <= tolerance && candle.close < level {
            return -1.0;
        }
    }

    if candle.close > fib.fib_500 { 0.5 } else { -0.5 }
}

/// clamp(ATR / ATR_MA, 0.3, 1.0); 1.0 when the ratio is undefined.
pub fn volatility_dampener(candle: &Candle) -> f64 {
    let ratio = candle.indicators.atr / candle.indicators.atr_ma;
    if ratio.is_finite() {
        ratio.clamp(DAMPENER_MIN, DAMPENER_MAX)
    } else {
        DAMPENER_MAX
    }
}

/// Trailing simple moving average. Warm-up slots and windows containing a
/// non-finite value are `NaN`.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return vec![f64::NAN; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return f64::NAN;
            }
            let slice = &values[i + 1 - window..=i];
            if slice.iter().any(|v| !v.is_finite()) {
                f64::NAN
            } else {
                slice.iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}

/// Computes the nine factor signals for every bar.
pub fn factor_signals(series: &TimeSeries) -> Vec<FactorSignals> {
    let candles = series.candles();
    let obv: Vec<f64> = candles.iter().map(|c| c.indicators.obv).collect();
    let obv_ma = rolling_mean(&obv, OBV_MA_PERIOD);

    candles
        .iter()
        .zip(obv_ma)
        .map(|(c, obv_avg)| {
            let ind = &c.indicators;
            FactorSignals {
                ma: ma_alignment_signal(c),
                macd: vote(ind.macd_hist > 0.0),
                aroon: vote(ind.aroon_up > ind.aroon_down),
                fib: fib_bounce_signal(c),
                obv: vote(ind.obv > obv_avg),
                atr: volatility_dampener(c),
                rsi: vote(ind.rsi > 50.0),
                stoch: vote(ind.stoch_k > ind.stoch_d),
                cci: vote(ind.cci > 0.0),
            }
        })
        .collect()
}

fn noise_filter(candle: &Candle, dampener: f64) -> f64 {
    let ind = &candle.indicators;
    let trend = if ind.trend_strength > TREND_FILTER_THRESHOLD {
        1.0
    } else {
        WEAK_TREND_FACTOR
    };
    let volume = if candle.volume > VOLUME_CONFIRM_RATIO * ind.volume_ma {
        1.0
    } else {
        UNCONFIRMED_VOLUME_FACTOR
    };
    trend * volume * dampener
}

/// Trend direction of `reference` at its last bar: sign of close minus its
/// 50-bar average. `None` while fewer than 50 bars are available.
pub fn reference_trend_direction(reference: &TimeSeries) -> Option<i8> {
    let closes = reference.closes();
    if closes.len() < REFERENCE_MA_PERIOD {
        return None;
    }
    let tail = &closes[closes.len() - REFERENCE_MA_PERIOD..];
    let average = tail.iter().sum::<f64>() / REFERENCE_MA_PERIOD as f64;
    let last = *closes.last()?;
    if !(last.is_finite() && average.is_finite()) {
        return None;
    }
    Some(sign(last - average))
}

/// Scores every bar of `series`.
///
/// `weights` overrides the regime-derived category weights. When a
/// `reference` series is given and its trend disagrees with the sign of the
/// final score, only the final bar is halved.
pub fn compute_scores(
    series: &TimeSeries,
    weights: Option<CategoryWeights>,
    reference: Option<&TimeSeries>,
) -> ScoredSeries {
    let regime = Regime::classify(series.last().map(|c| c.indicators.trend_strength));
    let weights = weights.unwrap_or_else(|| regime.weights());

    let signals = factor_signals(series);
    let raw_scores: Vec<f64> = signals.iter().map(|s| s.weighted(&weights)).collect();

    let filtered: Vec<f64> = series
        .candles()
        .iter()
        .zip(&signals)
        .zip(&raw_scores)
        .map(|((c, s), raw)| raw * noise_filter(c, s.atr))
        .collect();

    let mut scores: Vec<f64> = filtered
        .iter()
        .enumerate()
        .map(|(i, &score)| {
            let persistent = i == 0 || sign(score) == sign(filtered[i - 1]);
            if persistent {
                score
            } else {
                score * SIGN_FLIP_FACTOR
            }
        })
        .collect();

    let reference_direction = reference.and_then(reference_trend_direction);
    if let (Some(direction), Some(last)) = (reference_direction, scores.last_mut()) {
        if direction != 0 && direction != sign(*last) {
            debug!(
                direction,
                score = *last,
                "reference trend disagrees, halving final score"
            );
            *last *= 0.5;
        }
    }

    debug!(
        symbol = %series.symbol,
        bars = series.len(),
        regime = %regime,
        weights = %weights,
        "scored series"
    );

    ScoredSeries {
        signals,
        raw_scores,
        scores,
        regime,
        weights,
        reference_direction,
    }
}

/// Summary of the most recent scored bar.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LatestSignal {
    pub timestamp: DateTime<Utc>,
    pub unum_score: f64,
    pub regime: Regime,
    pub close: f64,
    pub rsi: f64,
    pub macd_hist: f64,
    pub obv_trend: &'static str,
}

pub fn latest_signal(series: &TimeSeries, scored: &ScoredSeries) -> Option<LatestSignal> {
    let candle = series.last()?;
    let signals = scored.signals.last()?;
    Some(LatestSignal {
        timestamp: candle.timestamp,
        unum_score: scored.last_score()?,
        regime: scored.regime,
        close: candle.close,
        rsi: candle.indicators.rsi,
        macd_hist: candle.indicators.macd_hist,
        obv_trend: if signals.obv > 0.0 { "Bullish" } else { "Bearish" },
    })
}
