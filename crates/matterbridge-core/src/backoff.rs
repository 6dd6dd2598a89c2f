use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for exponential reconnect backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Randomize each delay within `[nominal / 2, nominal]`.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_min_ms() -> u64 {
    1_000
}

fn default_max_ms() -> u64 {
    300_000
}

fn default_jitter() -> bool {
    true
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffPolicy {
    /// A policy that never sleeps. Used by tests to drive reconnect loops quickly.
    pub fn immediate() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
            jitter: false,
        }
    }

    /// Nominal delay before retry number `attempt + 1`, without jitter.
    pub fn nominal_delay_ms(&self, attempt: u32) -> u64 {
        let delay = self.min_ms.saturating_mul(2u64.saturating_pow(attempt));
        delay.min(self.max_ms)
    }
}

/// Reconnect delay state: grows exponentially on consecutive failures and
/// drops back to the minimum after a success.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay to wait before the next retry. Each call counts one more failure.
    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.policy.nominal_delay_ms(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        let ms = if self.policy.jitter && nominal > 1 {
            rand::thread_rng().gen_range(nominal / 2..=nominal)
        } else {
            nominal
        };
        Duration::from_millis(ms)
    }

    /// Forget previous failures after a successful attempt.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of consecutive failures recorded since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact() -> BackoffPolicy {
        BackoffPolicy {
            jitter: false,
            ..BackoffPolicy::default()
        }
    }

    #[test]
    fn test_sequence_doubles_and_caps() {
        let mut backoff = Backoff::new(exact());
        let secs: Vec<u64> = (0..12).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300, 300]);
        assert_eq!(backoff.attempts(), 12);
    }

    #[test]
    fn test_nth_delay_matches_formula() {
        let policy = exact();
        let mut backoff = Backoff::new(policy);
        for n in 1..=20u32 {
            let expected = (1_000u64 * 2u64.pow(n - 1)).min(300_000);
            assert_eq!(backoff.next_delay(), Duration::from_millis(expected), "retry {n}");
        }
    }

    #[test]
    fn test_reset_after_success() {
        let mut backoff = Backoff::new(exact());
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = Backoff::default();
        for n in 0..15u32 {
            let nominal = BackoffPolicy::default().nominal_delay_ms(n);
            let delay = backoff.next_delay().as_millis() as u64;
            assert!(delay <= nominal, "retry {n}: {delay} > {nominal}");
            assert!(delay >= nominal / 2, "retry {n}: {delay} < {}", nominal / 2);
        }
    }

    #[test]
    fn test_no_overflow_after_many_failures() {
        let mut backoff = Backoff::new(exact());
        for _ in 0..200 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(300));
    }

    #[test]
    fn test_immediate_policy() {
        let mut backoff = Backoff::new(BackoffPolicy::immediate());
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.attempts(), 2);
    }
}
