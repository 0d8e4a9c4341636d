//! Rate-limited, bounded-retry wrapper around registry calls.
//!
//! Every call first waits for the cooldown ticker (when configured), then
//! runs. Transient failures ([`CallError::is_transient`]) are retried after
//! `attempt * backoff_unit`, up to `max_retries` attempts in total. Every
//! wait and the call itself race the caller's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use devreg_core::RetryConfig;

use crate::error::CallError;

/// Retry bounds for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. `0` is treated as `1`.
    pub max_retries: u32,
    pub backoff_unit: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_unit: config.backoff_unit(),
        }
    }
}

pub struct Transport {
    policy: RetryPolicy,
    cooldown: Option<Duration>,
    // Created on first use so the transport can be built outside a runtime.
    ticker: Mutex<Option<Interval>>,
}

impl Transport {
    pub fn new(policy: RetryPolicy, cooldown: Option<Duration>) -> Self {
        Self {
            policy,
            cooldown,
            ticker: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(RetryPolicy::from(config), config.cooldown())
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `call` under the cooldown gate and retry policy.
    ///
    /// Returns the first success, the first non-transient error, or the last
    /// transient error once `max_retries` attempts are used up.
    pub async fn call<T, F, Fut>(&self, cancel: &CancellationToken, mut call: F) -> Result<T, CallError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        let max_retries = self.policy.max_retries.max(1);
        let mut attempt: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(CallError::Cancelled);
            }
            self.wait_for_cooldown(cancel).await?;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CallError::Cancelled),
                result = call() => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_retries => {
                    let delay = self.policy.backoff_unit * attempt;
                    tracing::warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient registry error, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(CallError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::warn!(attempt, error = %err, "registry call retries exhausted");
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn wait_for_cooldown(&self, cancel: &CancellationToken) -> Result<(), CallError> {
        let Some(period) = self.cooldown else {
            return Ok(());
        };
        let mut ticker = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CallError::Cancelled),
            guard = self.ticker.lock() => guard,
        };
        let ticker = ticker.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CallError::Cancelled),
            _ = ticker.tick() => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::*;

    const UNIT: Duration = Duration::from_secs(1);

    fn transport(max_retries: u32) -> Transport {
        Transport::new(
            RetryPolicy {
                max_retries,
                backoff_unit: UNIT,
            },
            None,
        )
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn succeeds_on_third_attempt_after_linear_backoff() {
        let transport = transport(10);
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = Instant::now();

        let result = transport
            .call(&CancellationToken::new(), move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(CallError::Unavailable(format!("attempt {n}")))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= UNIT * 3, "backoff was {:?}", started.elapsed());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn always_transient_stops_after_max_retries() {
        let transport = transport(4);
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = transport
            .call(&CancellationToken::new(), move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err(CallError::ResourceExhausted(format!("attempt {n}")))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result,
            Err(CallError::ResourceExhausted("attempt 4".to_string()))
        );
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn non_transient_error_is_not_retried() {
        let transport = transport(10);
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = transport
            .call(&CancellationToken::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CallError::NotFound("device".to_string()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(CallError::NotFound(_))));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancelled_token_skips_the_call() {
        let transport = transport(10);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let counter = &calls;

        let result: Result<(), _> = transport
            .call(&cancel, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancellation_interrupts_backoff() {
        let transport = transport(10);
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let result: Result<(), _> = transport
            .call(&cancel, || {
                let calls = calls.clone();
                let cancel = cancel.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    cancel.cancel();
                    Err(CallError::Unavailable("down".to_string()))
                }
            })
            .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cooldown_spaces_consecutive_calls() {
        let transport = Transport::new(
            RetryPolicy {
                max_retries: 1,
                backoff_unit: UNIT,
            },
            Some(Duration::from_millis(500)),
        );
        let cancel = CancellationToken::new();
        let started = Instant::now();

        for _ in 0..3 {
            transport
                .call(&cancel, || async { Ok::<_, CallError>(()) })
                .await
                .expect("call");
        }

        assert!(
            started.elapsed() >= Duration::from_millis(1000),
            "three calls need two cooldown periods, took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn policy_from_config() {
        let config = RetryConfig {
            max_retries: 3,
            backoff_ms: 250,
            cooldown_ms: 0,
        };
        let transport = Transport::from_config(&config);
        assert_eq!(transport.policy().max_retries, 3);
        assert_eq!(transport.policy().backoff_unit, Duration::from_millis(250));
    }
}
