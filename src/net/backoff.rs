use std::time::Duration;

use rand::Rng;

/// Reconnect pacing for the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Exponential backoff with jitter.
///
/// Each attempt doubles the base delay up to the policy cap; the returned
/// delay is drawn uniformly from the upper half of the base so simultaneous
/// clients do not reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Restores first-attempt pacing after a successful open.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay();
        self.attempt = self.attempt.saturating_add(1);

        let base_ms = base.as_millis().max(1) as u64;
        let jittered_ms = rand::thread_rng().gen_range(base_ms / 2..=base_ms);
        Duration::from_millis(jittered_ms)
    }

    fn base_delay(&self) -> Duration {
        let exponent = self.attempt.min(16);
        let scaled = self
            .policy
            .initial_delay
            .saturating_mul(1u32 << exponent.min(31));
        scaled.min(self.policy.max_delay)
    }
}
