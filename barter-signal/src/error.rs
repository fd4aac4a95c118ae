use thiserror::Error;

/// All errors generated in `barter-signal`.
///
/// Only conditions that leave no usable liquidity or price picture are errors; missing
/// optional data degrades to neutral readings instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("current price could not be determined from input, order books or candles")]
    PriceUnavailable,

    #[error("primary 4h ATR unavailable: {available} candles, {required} required")]
    PrimaryVolatilityUnavailable { available: usize, required: usize },

    #[error("no liquidity clusters left after filtering")]
    ClustersEmpty,

    #[error("invalid signal configuration: {0}")]
    InvalidConfig(String),
}

impl SignalError {
    /// Determine if an error aborts the current tick (as opposed to a setup error).
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_fatal_for_tick(&self) -> bool {
        match self {
            SignalError::InvalidConfig(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_error_is_fatal_for_tick() {
        struct TestCase {
            input: SignalError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: price unavailable aborts the tick
                input: SignalError::PriceUnavailable,
                expected: true,
            },
            TestCase {
                // TC1: missing primary ATR aborts the tick
                input: SignalError::PrimaryVolatilityUnavailable {
                    available: 3,
                    required: 15,
                },
                expected: true,
            },
            TestCase {
                // TC2: empty cluster set aborts the tick
                input: SignalError::ClustersEmpty,
                expected: true,
            },
            TestCase {
                // TC3: configuration errors are raised before any tick
                input: SignalError::InvalidConfig("coverage".to_string()),
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_fatal_for_tick();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_signal_error_display() {
        let error = SignalError::PrimaryVolatilityUnavailable {
            available: 3,
            required: 15,
        };
        assert_eq!(
            error.to_string(),
            "primary 4h ATR unavailable: 3 candles, 15 required"
        );
    }
}
