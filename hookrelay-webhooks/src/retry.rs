//! Retry policy for webhook delivery

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    #[serde(deserialize_with = "hookrelay_config::de::lenient")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "millis")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (also caps `Retry-After` hints)
    #[serde(with = "millis")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff
    #[serde(deserialize_with = "hookrelay_config::de::lenient")]
    pub backoff_multiplier: f64,

    /// Whether to add up to 25% random jitter to delays
    #[serde(deserialize_with = "hookrelay_config::de::lenient")]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Constant delay between a fixed number of attempts
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Exponential backoff with default delays
    pub fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            delay_secs * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            delay_secs
        };

        Duration::try_from_secs_f64(final_delay).unwrap_or(self.max_delay)
    }

    /// Delay after a failed attempt, preferring a server-provided hint
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for_attempt(attempt),
        }
    }

    /// Whether another attempt may follow attempt number `attempt`
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// How a response status affects delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 429, honours `Retry-After`
    RateLimited,
    /// 5xx
    Transient,
    /// any other status; surfaced immediately
    Rejected,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            429 => Self::RateLimited,
            500..=599 => Self::Transient,
            _ => Self::Rejected,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }
}

pub(crate) mod millis {
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        hookrelay_config::de::lenient::<_, u64>(deserializer).map(Duration::from_millis)
    }
}
