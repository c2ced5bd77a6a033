use web_time::Duration;

use crate::error::ConfigurationError;

/// Converts a millisecond count into a delay, rejecting negatives.
pub fn delay_from_millis(ms: i64) -> Result<Duration, ConfigurationError> {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| ConfigurationError::NegativeDelay(ms))
}

/// How long a burst has to stay quiet before it is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "i64", into = "i64")
)]
pub struct DebounceSpec {
    pub delay: Duration,
}

impl Default for DebounceSpec {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
        }
    }
}

impl DebounceSpec {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(ms: i64) -> Result<Self, ConfigurationError> {
        delay_from_millis(ms).map(Self::new)
    }

    /// Commits on the next pass of the timer queue.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn fast() -> Self {
        Self {
            delay: Duration::from_millis(150),
        }
    }

    pub fn slow() -> Self {
        Self {
            delay: Duration::from_millis(600),
        }
    }

    pub fn delay_ms(&self) -> i64 {
        i64::try_from(self.delay.as_millis()).unwrap_or(i64::MAX)
    }
}

impl TryFrom<i64> for DebounceSpec {
    type Error = ConfigurationError;

    fn try_from(ms: i64) -> Result<Self, Self::Error> {
        Self::from_millis(ms)
    }
}

impl From<DebounceSpec> for i64 {
    fn from(spec: DebounceSpec) -> Self {
        spec.delay_ms()
    }
}
