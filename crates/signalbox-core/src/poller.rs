//! Readiness polling and pixel initialization for the social script.
//!
//! The social vendor's library boots asynchronously, so pixel registration
//! cannot happen at injection time. The poller waits for the handle to
//! report ready, registers every configured social pixel exactly once, and
//! only then lets the caller fire the landing event. One attempt budget is
//! shared across the whole wait: readiness checks and completeness rechecks
//! draw from the same counter, so a page that never becomes ready gives up
//! on schedule instead of polling forever.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::ScriptError;
use crate::pixel::{self, PixelConfig};
use crate::retry::RetryPolicy;
use crate::script::{ScriptHost, ScriptKind};

const MAX_ATTEMPTS: u32 = 50;
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const INITIAL_DELAY: Duration = Duration::from_millis(500);
const RECHECK_DELAY: Duration = Duration::from_millis(200);
const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Polls the social handle to readiness and registers pixels with it.
#[derive(Debug, Clone, Copy)]
pub struct InitPoller {
    policy: RetryPolicy,
    initial_delay: Duration,
    recheck_delay: Duration,
    settle_delay: Duration,
}

impl Default for InitPoller {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::new(MAX_ATTEMPTS, POLL_INTERVAL),
            initial_delay: INITIAL_DELAY,
            recheck_delay: RECHECK_DELAY,
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl InitPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring every social pixel in `pixels` into the initialized set.
    ///
    /// Pixels already present in `initialized` are skipped, so calling this
    /// again after a route change re-registers nothing. A pixel whose `init`
    /// call fails is retried on the next recheck pass. After the last pixel
    /// registers, one settle pause is taken before returning so the library
    /// finishes its own bookkeeping; the caller may fire immediately after.
    ///
    /// Returns the number of retries consumed.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::NeverReady`] when the attempt budget runs out
    /// before the handle reports ready or before every pixel registers.
    pub async fn initialize_all(
        &self,
        host: &dyn ScriptHost,
        pixels: &[PixelConfig],
        initialized: &mut HashSet<String>,
    ) -> Result<u32, ScriptError> {
        if pixel::social(pixels).next().is_none() {
            return Ok(0);
        }

        if !handle_ready(host) {
            tokio::time::sleep(self.initial_delay).await;
        }

        let mut attempts: u32 = 0;
        loop {
            if self.policy.exhausted(attempts) {
                return Err(ScriptError::NeverReady {
                    kind: ScriptKind::Social,
                    attempts,
                });
            }

            let Some(client) = host.script().filter(|client| client.loaded()) else {
                attempts += 1;
                tokio::time::sleep(self.policy.interval).await;
                continue;
            };

            for pixel in pixel::social(pixels) {
                if initialized.contains(&pixel.external_id) {
                    continue;
                }
                match client.init(&pixel.external_id) {
                    Ok(()) => {
                        initialized.insert(pixel.external_id.clone());
                        tracing::debug!(pixel = %pixel.external_id, "social pixel initialized");
                    }
                    Err(err) => {
                        tracing::warn!(pixel = %pixel.external_id, error = %err, "social pixel init failed");
                    }
                }
            }

            let all_initialized =
                pixel::social(pixels).all(|pixel| initialized.contains(&pixel.external_id));
            if all_initialized {
                tokio::time::sleep(self.settle_delay).await;
                return Ok(attempts);
            }

            attempts += 1;
            tokio::time::sleep(self.recheck_delay).await;
        }
    }
}

fn handle_ready(host: &dyn ScriptHost) -> bool {
    host.script().is_some_and(|client| client.loaded())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::testing::{FakeHost, pixel_set};

    #[tokio::test(start_paused = true)]
    async fn ready_handle_initializes_every_social_pixel() {
        let host = FakeHost::new();
        host.install_social_script(0);
        let mut initialized = HashSet::new();
        let started = Instant::now();

        let retries = InitPoller::new()
            .initialize_all(&host, &pixel_set(), &mut initialized)
            .await
            .unwrap();

        assert_eq!(retries, 0);
        assert!(initialized.contains("111"));
        assert!(initialized.contains("222"));
        assert_eq!(initialized.len(), 2);
        // Only the settle pause elapsed.
        assert_eq!(started.elapsed(), SETTLE_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_script_is_awaited_on_the_poll_interval() {
        let host = FakeHost::new();
        host.install_social_script(3);
        let mut initialized = HashSet::new();
        let started = Instant::now();

        let retries = InitPoller::new()
            .initialize_all(&host, &pixel_set(), &mut initialized)
            .await
            .unwrap();

        // One readiness check before the initial delay, two on the interval.
        assert_eq!(retries, 2);
        assert_eq!(
            started.elapsed(),
            INITIAL_DELAY + 2 * POLL_INTERVAL + SETTLE_DELAY
        );
        assert_eq!(initialized.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_handle_exhausts_the_budget() {
        let host = FakeHost::new();
        let mut initialized = HashSet::new();

        let err = InitPoller::new()
            .initialize_all(&host, &pixel_set(), &mut initialized)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ScriptError::NeverReady {
                kind: ScriptKind::Social,
                attempts: 51,
            }
        ));
        assert!(initialized.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failing_pixel_is_retried_without_blocking_the_others() {
        let host = FakeHost::new();
        host.install_social_script(0);
        host.fail_init("222");
        let mut initialized = HashSet::new();

        let err = InitPoller::new()
            .initialize_all(&host, &pixel_set(), &mut initialized)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::NeverReady { .. }));
        assert!(initialized.contains("111"));
        assert!(!initialized.contains("222"));
        assert_eq!(host.init_count("111"), 1);
        assert_eq!(host.init_count("222"), 51);
    }

    #[tokio::test(start_paused = true)]
    async fn second_pass_reinitializes_nothing() {
        let host = FakeHost::new();
        host.install_social_script(0);
        let poller = InitPoller::new();
        let mut initialized = HashSet::new();

        poller
            .initialize_all(&host, &pixel_set(), &mut initialized)
            .await
            .unwrap();
        let first_pass_calls = host.calls().len();

        let retries = poller
            .initialize_all(&host, &pixel_set(), &mut initialized)
            .await
            .unwrap();

        assert_eq!(retries, 0);
        assert_eq!(host.calls().len(), first_pass_calls);
    }

    #[tokio::test(start_paused = true)]
    async fn no_social_pixels_returns_immediately() {
        let host = FakeHost::new();
        let mut initialized = HashSet::new();
        let tags_only = pixel_set().split_off(2);
        let started = Instant::now();

        let retries = InitPoller::new()
            .initialize_all(&host, &tags_only, &mut initialized)
            .await
            .unwrap();

        assert_eq!(retries, 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(host.calls().is_empty());
    }
}
