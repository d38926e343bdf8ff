use rand::Rng;
use std::time::Duration;

const MIN_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, PartialEq)]
pub struct RetrySettings {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl RetrySettings {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let max = if max < initial { initial } else { max };
        Self {
            initial,
            max,
            multiplier: multiplier.clamp(1.1, 10.0),
        }
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(5), 2.0)
    }
}

/// Exponential backoff state for reconnect loops.
pub struct RetryBackoff {
    policy: RetrySettings,
    current: Duration,
}

impl RetryBackoff {
    pub fn new(policy: RetrySettings) -> Self {
        let current = policy.initial;
        Self { policy, current }
    }

    pub fn on_success(&mut self) {
        self.current = self.policy.initial;
    }

    /// Delay to wait before the next attempt; grows the following one.
    pub fn on_failure(&mut self) -> Duration {
        let delay = self.current.max(MIN_DELAY);
        let next = (delay.as_millis() as f64 * self.policy.multiplier).round();
        let capped = next.min(self.policy.max.as_millis() as f64);
        self.current = Duration::from_millis(capped as u64).min(self.policy.max);
        jitter_between(delay.mul_f64(0.5), delay)
    }
}

pub fn jitter_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let mut rng = rand::thread_rng();
    let min_secs = min.as_secs_f64();
    let span = max.as_secs_f64() - min_secs;
    let sample = rng.gen::<f64>() * span + min_secs;
    Duration::from_secs_f64(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_until_capped() {
        let mut backoff = RetryBackoff::new(RetrySettings::new(
            Duration::from_millis(100),
            Duration::from_millis(400),
            2.0,
        ));
        let first = backoff.on_failure();
        assert!(first <= Duration::from_millis(100));
        backoff.on_failure();
        backoff.on_failure();
        let capped = backoff.on_failure();
        assert!(capped <= Duration::from_millis(400));
        assert!(capped >= Duration::from_millis(200));
    }

    #[test]
    fn success_resets_backoff() {
        let mut backoff = RetryBackoff::new(RetrySettings::default());
        backoff.on_failure();
        backoff.on_failure();
        backoff.on_success();
        assert!(backoff.on_failure() <= Duration::from_millis(200));
    }

    #[test]
    fn settings_clamp_inverted_bounds() {
        let settings = RetrySettings::new(Duration::from_secs(2), Duration::from_secs(1), 50.0);
        assert_eq!(settings.max(), Duration::from_secs(2));
        assert_eq!(settings.multiplier(), 10.0);
    }
}
