//! Second-opinion review of the latest signal by an external model.
//!
//! The verdict is advisory only: it never changes scores or trades, and any
//! failure degrades to an `ERROR` verdict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::error::UnumError;
use crate::domain::regime::Regime;
use crate::domain::series::{TimeSeries, Timeframe};
use crate::domain::signal::ScoredSeries;
use crate::ports::advisory_port::AdvisoryPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Confirm,
    Reject,
    Neutral,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryVerdict {
    pub decision: Decision,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl AdvisoryVerdict {
    pub fn error(reason: impl Into<String>) -> Self {
        AdvisoryVerdict {
            decision: Decision::Error,
            confidence: 0.0,
            reason: reason.into(),
            risk_level: None,
        }
    }
}

/// Snapshot of the last scored bar handed to the advisor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalContext {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub unum_score: f64,
    pub regime: Regime,
    pub rsi: f64,
    pub macd_hist: f64,
    pub adx: f64,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

impl TechnicalContext {
    /// `None` for an empty series.
    pub fn from_scored(series: &TimeSeries, scored: &ScoredSeries) -> Option<Self> {
        let candle = series.last()?;
        let ind = &candle.indicators;
        Some(TechnicalContext {
            symbol: series.symbol.clone(),
            timeframe: series.timeframe,
            timestamp: candle.timestamp,
            close: candle.close,
            unum_score: scored.last_score()?,
            regime: scored.regime,
            rsi: ind.rsi,
            macd_hist: ind.macd_hist,
            adx: ind.trend_strength,
            support: ind.fib.support_below(candle.close),
            resistance: ind.fib.resistance_above(candle.close),
        })
    }
}

pub fn build_prompt(ctx: &TechnicalContext) -> Result<String, UnumError> {
    let context = serde_json::to_string_pretty(ctx)?;
    Ok(format!(
        "You are a senior crypto trading analyst. Review the technical market data \
         for {symbol} and validate the potential trade signal.\n\n\
         Context:\n{context}\n\n\
         Task:\n\
         1. Analyze the indicators (RSI, MACD, ADX, support/resistance).\n\
         2. Decide whether the technicals support the signal.\n\
         3. Identify major risks or contradictions such as divergence or a weak trend.\n\n\
         Respond with JSON only:\n\
         {{\"decision\": \"CONFIRM\" | \"REJECT\" | \"NEUTRAL\", \
         \"confidence\": 0.0-1.0, \
         \"reason\": \"one sentence\", \
         \"risk_level\": \"LOW\" | \"MEDIUM\" | \"HIGH\"}}",
        symbol = ctx.symbol,
    ))
}

/// Parses a model reply, tolerating Markdown code fences around the JSON.
pub fn parse_verdict(text: &str) -> Result<AdvisoryVerdict, UnumError> {
    let body = text.replace("```json", "").replace("```", "");
    let mut verdict: AdvisoryVerdict = serde_json::from_str(body.trim())?;
    verdict.confidence = if verdict.confidence.is_finite() {
        verdict.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    if verdict.decision == Decision::Error {
        verdict.risk_level = None;
    }
    Ok(verdict)
}

/// Asks `advisor` for a verdict. Failures become an `ERROR` verdict.
pub fn consult(advisor: &dyn AdvisoryPort, ctx: &TechnicalContext) -> AdvisoryVerdict {
    match advisor.analyze(ctx) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(symbol = %ctx.symbol, error = %e, "advisory failed");
            AdvisoryVerdict::error(e.to_string())
        }
    }
}
