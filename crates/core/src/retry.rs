//! Resilient call wrapper for external reads.
//!
//! Every network call in the pipeline (chain read, explorer lookup) runs
//! under [`with_retries`]: a bounded loop with a fixed per-call-site delay.
//! The delay is deliberately fixed rather than exponential; call sites pick
//! one of the named policies below. After the cap the last error is surfaced
//! as [`PipelineError::RetriesExhausted`].

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::PipelineError;

/// Total attempt cap: one initial call plus twenty retries.
pub const MAX_ATTEMPTS: u32 = 21;

/// Retry policy for one call site. Ephemeral; attempt state lives only for
/// the duration of a single [`with_retries`] call, so nested retried calls
/// each own their own budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Standard policy: 500 ms between attempts.
    pub const fn standard() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::from_millis(500),
        }
    }

    /// Slow policy for rate-limited archive oracles: 5000 ms between
    /// attempts.
    pub const fn slow_oracle() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::from_millis(5000),
        }
    }

    /// Override the attempt cap.
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the fixed delay.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run `op` until it succeeds or the attempt cap is reached.
///
/// Each failure is logged with the call-site label before the retry sleep.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    label: &'static str,
    mut op: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                warn!(
                    label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Call failed, retrying"
                );

                if attempt >= policy.max_attempts {
                    return Err(PipelineError::RetriesExhausted {
                        label,
                        attempts: attempt,
                        source: error,
                    });
                }

                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant_policy() -> RetryPolicy {
        RetryPolicy::standard().with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn always_failing_op_attempts_exactly_the_cap() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retries(instant_policy(), "always-fails", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("boom")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
        match result {
            Err(PipelineError::RetriesExhausted { attempts, label, .. }) => {
                assert_eq!(attempts, MAX_ATTEMPTS);
                assert_eq!(label, "always-fails");
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_without_extra_attempts() {
        let calls = AtomicU32::new(0);

        let result = with_retries(instant_policy(), "immediate", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42u64) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = with_retries(instant_policy(), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow!("transient"))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn nested_wrappers_keep_independent_budgets() {
        let outer_calls = AtomicU32::new(0);
        let inner_calls = AtomicU32::new(0);
        let policy = RetryPolicy::standard()
            .with_delay(Duration::ZERO)
            .with_max_attempts(3);

        let result = with_retries(policy, "outer", || {
            outer_calls.fetch_add(1, Ordering::SeqCst);
            let inner_calls = &inner_calls;
            async move {
                with_retries(policy, "inner", || {
                    inner_calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(anyhow!("inner boom")) }
                })
                .await?;
                Ok(())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(outer_calls.load(Ordering::SeqCst), 3);
        // Inner budget restarts per outer attempt.
        assert_eq!(inner_calls.load(Ordering::SeqCst), 9);
    }
}
