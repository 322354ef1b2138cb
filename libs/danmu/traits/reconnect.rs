use std::time::Duration;

/// Backoff policy between failed sessions
///
/// Strategies are stateless; the supervisor's [`RetryState`] counts
/// consecutive failures and asks the strategy what to do next.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before retrying after `attempt + 1` consecutive failures
    ///
    /// `None` stops the supervisor.
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Whether `failures` consecutive failed sessions still allow another try
    fn should_reconnect(&self, failures: usize) -> bool;
}

fn within(max_attempts: Option<usize>, failures: usize) -> bool {
    max_attempts.map_or(true, |max| failures < max)
}

/// Doubling delay: `initial_delay * 2^attempt`, capped at `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// `max_attempts` counts failed sessions before giving up; `None` never gives up
    pub fn new(
        initial_delay: Duration,
        max_delay: Duration,
        max_attempts: Option<usize>,
    ) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    /// 3s base, 60s cap, 5 attempts
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(60), Some(5))
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 2u64.checked_pow(attempt as u32).unwrap_or(u64::MAX);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let delay = Duration::from_millis(delay.min(self.max_delay.as_millis() as u64));
        Some(delay)
    }

    fn should_reconnect(&self, failures: usize) -> bool {
        within(self.max_attempts, failures)
    }
}

/// Same delay after every failure
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        self.should_reconnect(attempt).then_some(self.delay)
    }

    fn should_reconnect(&self, failures: usize) -> bool {
        within(self.max_attempts, failures)
    }
}

/// One session only; its failure ends the client
#[derive(Debug, Clone, Copy)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _failures: usize) -> bool {
        false
    }
}

/// Consecutive-failure bookkeeping owned by the supervisor
pub struct RetryState {
    failures: usize,
    strategy: Box<dyn ReconnectionStrategy>,
}

impl RetryState {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            failures: 0,
            strategy,
        }
    }

    /// Consecutive failed sessions so far
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Record a failed session and get the delay before the next one
    ///
    /// The n-th consecutive failure waits `next_delay(n - 1)`.
    /// `None` means no attempts are left.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.failures += 1;
        if !self.strategy.should_reconnect(self.failures) {
            return None;
        }
        self.strategy.next_delay(self.failures - 1)
    }

    /// Forget earlier failures (a session reached Active)
    pub fn reset(&mut self) {
        self.failures = 0;
    }
}
