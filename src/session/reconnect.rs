use crate::config::SessionConfig;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Furthest a reconnect deadline may lie in the future
const MAX_DEADLINE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Reconnect delay strategy for the alarm stream
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay after the first failure, and every failure when backoff is off
    pub base_delay: Duration,
    /// Upper bound when backoff is on
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl ReconnectPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            base_delay: config.reconnect_delay(),
            max_delay: config.max_reconnect_delay(),
            exponential_backoff: config.exponential_backoff,
        }
    }

    /// Fixed delay, no backoff
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
            exponential_backoff: false,
        }
    }

    /// Delay before reconnect attempt `attempt`, counted from 0 since the
    /// last established connection
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return self.base_delay;
        }

        let factor = 2u32.saturating_pow(attempt.min(31));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(30))
    }
}

/// Outcome of waiting on the reconnect timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The delay elapsed, or nothing was scheduled
    Fired,
    /// Shutdown was requested while waiting
    Cancelled,
}

/// The single pending reconnect deadline of a session.
///
/// Scheduling replaces whatever was pending, so at most one reconnect is ever
/// outstanding.
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: Duration) {
        if self.deadline.is_some() {
            debug!("Replacing pending reconnect timer");
        }
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or_else(|| {
            warn!("Reconnect delay {:?} out of range, clamping", delay);
            now + MAX_DEADLINE
        });
        self.deadline = Some(deadline);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the pending deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Wait for the pending deadline or for shutdown, whichever comes first.
    /// The timer is disarmed either way.
    pub async fn wait(&mut self, shutdown: &CancellationToken) -> TimerOutcome {
        let Some(deadline) = self.deadline else {
            return TimerOutcome::Fired;
        };

        let outcome = tokio::select! {
            _ = sleep_until(deadline) => TimerOutcome::Fired,
            _ = shutdown.cancelled() => {
                info!("Reconnect cancelled by shutdown");
                TimerOutcome::Cancelled
            }
        };

        self.deadline = None;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::default();

        assert_eq!(policy.delay_for(0), Duration::from_secs(30));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(300),
            exponential_backoff: true,
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(30));
        assert_eq!(policy.delay_for(1), Duration::from_secs(60));
        assert_eq!(policy.delay_for(3), Duration::from_secs(240));
        assert_eq!(policy.delay_for(4), Duration::from_secs(300));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let mut timer = ReconnectTimer::new();
        let shutdown = CancellationToken::new();
        let started = Instant::now();

        timer.schedule(Duration::from_secs(30));
        assert!(timer.is_pending());

        assert_eq!(timer.wait(&shutdown).await, TimerOutcome::Fired);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_pending_deadline() {
        let mut timer = ReconnectTimer::new();
        let shutdown = CancellationToken::new();
        let started = Instant::now();

        timer.schedule(Duration::from_secs(30));
        timer.schedule(Duration::from_secs(5));

        assert_eq!(timer.wait(&shutdown).await, TimerOutcome::Fired);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5));
        assert!(waited < Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_wait() {
        let mut timer = ReconnectTimer::new();
        let shutdown = CancellationToken::new();
        timer.schedule(Duration::from_secs(3600));

        let canceller = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert_eq!(timer.wait(&shutdown).await, TimerOutcome::Cancelled);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_delay_is_clamped() {
        let mut timer = ReconnectTimer::new();
        let shutdown = CancellationToken::new();
        let policy = ReconnectPolicy {
            base_delay: Duration::from_secs(u64::MAX),
            max_delay: Duration::from_secs(u64::MAX),
            exponential_backoff: true,
        };

        timer.schedule(policy.delay_for(0));
        assert!(timer.is_pending());
        assert!(timer.remaining().unwrap() <= MAX_DEADLINE);

        shutdown.cancel();
        assert_eq!(timer.wait(&shutdown).await, TimerOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_unscheduled_timer_fires_immediately() {
        let mut timer = ReconnectTimer::new();
        timer.cancel();

        assert_eq!(timer.remaining(), None);
        assert_eq!(
            timer.wait(&CancellationToken::new()).await,
            TimerOutcome::Fired
        );
    }
}
