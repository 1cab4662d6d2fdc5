//! Bounded polling with a fixed interval.

use std::time::Duration;

use crate::error::RetryExhausted;

/// Attempt budget plus the pause between attempts.
///
/// The budget is shared by callers that poll in phases: they keep one attempt
/// counter, check [`RetryPolicy::exhausted`] before every retry, and pause for
/// whatever interval the phase calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Whether `attempts` retries have used up the budget.
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }

    /// Sleep for one interval.
    pub async fn pause(&self) {
        tokio::time::sleep(self.interval).await;
    }

    /// Poll `ready` until it returns `true`, pausing one interval between
    /// attempts. Returns the number of retries consumed.
    ///
    /// # Errors
    ///
    /// Returns [`RetryExhausted`] when the budget runs out first.
    pub async fn wait_until<F>(&self, mut ready: F) -> Result<u32, RetryExhausted>
    where
        F: FnMut() -> bool,
    {
        let mut attempts = 0;
        loop {
            if ready() {
                return Ok(attempts);
            }
            attempts += 1;
            if self.exhausted(attempts) {
                return Err(RetryExhausted { attempts });
            }
            self.pause().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn immediate_readiness_consumes_no_retries() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let used = policy.wait_until(|| true).await.unwrap();
        assert_eq!(used, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn readiness_on_a_later_check_reports_retries_used() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let mut checks = 0;
        let used = policy
            .wait_until(|| {
                checks += 1;
                checks >= 3
            })
            .await
            .unwrap();
        assert_eq!(used, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_runs_out_for_a_condition_that_never_holds() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        let err = policy.wait_until(|| false).await.unwrap_err();
        assert_eq!(err.attempts, 5);
    }

    #[test]
    fn exhausted_is_strictly_past_the_budget() {
        let policy = RetryPolicy::new(50, Duration::from_millis(100));
        assert!(!policy.exhausted(50));
        assert!(policy.exhausted(51));
    }
}
