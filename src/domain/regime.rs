//! Market regime classification and category weighting.

use crate::domain::error::UnumError;
use std::fmt;

const TRENDING_ABOVE: f64 = 25.0;
const RANGING_BELOW: f64 = 20.0;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Relative weight of each signal category in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategoryWeights {
    pub trend: f64,
    pub volume_levels: f64,
    pub momentum: f64,
}

impl CategoryWeights {
    pub const TRENDING: CategoryWeights = CategoryWeights {
        trend: 0.50,
        volume_levels: 0.35,
        momentum: 0.15,
    };
    pub const RANGING: CategoryWeights = CategoryWeights {
        trend: 0.20,
        volume_levels: 0.40,
        momentum: 0.40,
    };
    pub const UNCERTAIN: CategoryWeights = CategoryWeights {
        trend: 0.33,
        volume_levels: 0.33,
        momentum: 0.34,
    };

    /// Caller-supplied weights. Each must be non-negative and together sum to 1.
    pub fn new(trend: f64, volume_levels: f64, momentum: f64) -> Result<Self, UnumError> {
        let weights = CategoryWeights {
            trend,
            volume_levels,
            momentum,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn sum(&self) -> f64 {
        self.trend + self.volume_levels + self.momentum
    }

    pub fn validate(&self) -> Result<(), UnumError> {
        for (name, w) in [
            ("weights.trend", self.trend),
            ("weights.volume_levels", self.volume_levels),
            ("weights.momentum", self.momentum),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(UnumError::invalid_parameter(
                    name,
                    "weight must be a non-negative number",
                ));
            }
        }
        if (self.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(UnumError::invalid_parameter(
                "weights",
                format!("category weights must sum to 1.0, got {:.6}", self.sum()),
            ));
        }
        Ok(())
    }

    /// Parses a `trend/volume_levels/momentum` triple such as `0.5/0.35/0.15`.
    pub fn parse_triple(s: &str) -> Result<Self, UnumError> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(UnumError::invalid_parameter(
                "weights",
                format!("expected trend/volume_levels/momentum, got '{s}'"),
            ));
        }
        let mut values = [0.0; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| {
                UnumError::invalid_parameter("weights", format!("'{part}' is not a number"))
            })?;
        }
        CategoryWeights::new(values[0], values[1], values[2])
    }
}

impl fmt::Display for CategoryWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.trend, self.volume_levels, self.momentum
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Regime {
    Trending,
    Ranging,
    Uncertain,
}

impl Regime {
    /// Classifies the latest trend-strength reading. Missing or `NaN`
    /// readings resolve to `Uncertain`.
    pub fn classify(trend_strength: Option<f64>) -> Regime {
        match trend_strength {
            Some(v) if v > TRENDING_ABOVE => Regime::Trending,
            Some(v) if v < RANGING_BELOW => Regime::Ranging,
            _ => Regime::Uncertain,
        }
    }

    pub fn weights(&self) -> CategoryWeights {
        match self {
            Regime::Trending => CategoryWeights::TRENDING,
            Regime::Ranging => CategoryWeights::RANGING,
            Regime::Uncertain => CategoryWeights::UNCERTAIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trending => "Trending",
            Regime::Ranging => "Ranging",
            Regime::Uncertain => "Uncertain",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn strong_trend_is_trending() {
        assert_eq!(Regime::classify(Some(25.01)), Regime::Trending);
        assert_eq!(Regime::classify(Some(60.0)), Regime::Trending);
    }

    #[test]
    fn weak_trend_is_ranging() {
        assert_eq!(Regime::classify(Some(19.99)), Regime::Ranging);
        assert_eq!(Regime::classify(Some(0.0)), Regime::Ranging);
    }

    #[test]
    fn boundaries_are_uncertain() {
        assert_eq!(Regime::classify(Some(25.0)), Regime::Uncertain);
        assert_eq!(Regime::classify(Some(20.0)), Regime::Uncertain);
        assert_eq!(Regime::classify(Some(22.5)), Regime::Uncertain);
    }

    #[test]
    fn missing_strength_fails_closed() {
        assert_eq!(Regime::classify(None), Regime::Uncertain);
        assert_eq!(Regime::classify(Some(f64::NAN)), Regime::Uncertain);
    }

    #[test]
    fn every_regime_weight_vector_sums_to_one() {
        for regime in [Regime::Trending, Regime::Ranging, Regime::Uncertain] {
            assert_relative_eq!(regime.weights().sum(), 1.0, epsilon = 1e-12);
            assert!(regime.weights().validate().is_ok());
        }
    }

    #[test]
    fn custom_weights_must_sum_to_one() {
        assert!(CategoryWeights::new(0.5, 0.5, 0.0).is_ok());
        let err = CategoryWeights::new(0.5, 0.5, 0.5).unwrap_err();
        assert!(matches!(err, UnumError::InvalidParameter { .. }));
    }

    #[test]
    fn custom_weights_reject_negative() {
        assert!(CategoryWeights::new(1.2, -0.2, 0.0).is_err());
    }

    #[test]
    fn parse_triple_roundtrips_display() {
        let w = CategoryWeights::parse_triple("0.5 / 0.35 / 0.15").unwrap();
        assert_eq!(w, CategoryWeights::TRENDING);
        assert_eq!(w.to_string(), "0.5/0.35/0.15");
    }

    #[test]
    fn parse_triple_rejects_garbage() {
        assert!(CategoryWeights::parse_triple("0.5/0.5").is_err());
        assert!(CategoryWeights::parse_triple("a/b/c").is_err());
    }
}
