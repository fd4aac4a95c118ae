use crate::config::RegimeConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Market liquidity regime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    #[default]
    Normal,
    LiquidityStressed,
}

impl Regime {
    pub fn is_stressed(&self) -> bool {
        matches!(self, Regime::LiquidityStressed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeInputs {
    pub atr: f64,
    pub current_price: f64,
    /// LCI concentration ratio (0..=1)
    pub concentration: f64,
    pub momentum_score: f64,
}

#[derive(Debug, Error)]
enum RegimeError {
    #[error("non-positive price: {0}")]
    NonPositivePrice(f64),

    #[error("non-finite input: {0}")]
    NonFinite(&'static str),
}

fn try_classify(inputs: &RegimeInputs, config: &RegimeConfig) -> Result<Regime, RegimeError> {
    let RegimeInputs {
        atr,
        current_price,
        concentration,
        momentum_score,
    } = *inputs;

    if !current_price.is_finite() {
        return Err(RegimeError::NonFinite("current_price"));
    }
    if current_price <= 0.0 {
        return Err(RegimeError::NonPositivePrice(current_price));
    }
    for (name, value) in [
        ("atr", atr),
        ("concentration", concentration),
        ("momentum_score", momentum_score),
    ] {
        if !value.is_finite() {
            return Err(RegimeError::NonFinite(name));
        }
    }

    let vol_ratio = atr / current_price;
    let stressed = (concentration > config.stress_concentration
        && vol_ratio > config.stress_vol_ratio)
        || concentration > config.extreme_concentration
        || (momentum_score < config.weak_momentum_score
            && concentration > config.weak_momentum_concentration);

    Ok(if stressed {
        Regime::LiquidityStressed
    } else {
        Regime::Normal
    })
}

/// Classify the regime, falling back to [`Regime::Normal`] on malformed input.
pub fn classify(inputs: &RegimeInputs, config: &RegimeConfig) -> Regime {
    try_classify(inputs, config).unwrap_or_else(|error| {
        warn!(%error, ?inputs, "regime classification failed, defaulting to NORMAL");
        Regime::Normal
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(atr: f64, concentration: f64, momentum_score: f64) -> RegimeInputs {
        RegimeInputs {
            atr,
            current_price: 100.0,
            concentration,
            momentum_score,
        }
    }

    #[test]
    fn test_classify() {
        struct TestCase {
            input: RegimeInputs,
            expected: Regime,
        }

        let tests = vec![
            TestCase {
                // TC0: extreme concentration, negligible volatility
                input: inputs(0.0, 0.09, 50.0),
                expected: Regime::LiquidityStressed,
            },
            TestCase {
                // TC1: extreme concentration, high volatility
                input: inputs(10.0, 0.09, 80.0),
                expected: Regime::LiquidityStressed,
            },
            TestCase {
                // TC2: low concentration, strong momentum
                input: inputs(5.0, 0.03, 70.0),
                expected: Regime::Normal,
            },
            TestCase {
                // TC3: moderate concentration with volatility above 1%
                input: inputs(2.0, 0.07, 60.0),
                expected: Regime::LiquidityStressed,
            },
            TestCase {
                // TC4: moderate concentration, calm volatility
                input: inputs(0.5, 0.07, 60.0),
                expected: Regime::Normal,
            },
            TestCase {
                // TC5: weak momentum with mild concentration
                input: inputs(0.5, 0.05, 40.0),
                expected: Regime::LiquidityStressed,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = classify(&test.input, &RegimeConfig::default());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_malformed_input_fails_open() {
        let config = RegimeConfig::default();
        assert_eq!(classify(&inputs(f64::NAN, 0.09, 50.0), &config), Regime::Normal);

        let zero_price = RegimeInputs {
            current_price: 0.0,
            ..inputs(1.0, 0.09, 50.0)
        };
        assert_eq!(classify(&zero_price, &config), Regime::Normal);
        assert!(try_classify(&zero_price, &config).is_err());
    }
}
