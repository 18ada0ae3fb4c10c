//! Poll-and-retry primitives with injectable time
//!
//! The watcher has two suspension points: waiting for the log file to appear
//! and waiting for more lines. Both go through [`PollRetry`], which sleeps via
//! a [`Sleeper`] so tests can run without wall-clock delays. Alert cooldowns
//! read the time from a [`Clock`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::AppError;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspends the current task
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-interval retry loop.
///
/// Unbounded by default; [`PollRetry::with_max_attempts`] caps the number of
/// probes, after which [`PollRetry::until`] fails with
/// [`AppError::RetryExhausted`].
#[derive(Clone)]
pub struct PollRetry {
    interval: Duration,
    max_attempts: Option<u32>,
    sleeper: Arc<dyn Sleeper>,
}

impl PollRetry {
    pub fn new(interval: Duration) -> Self {
        Self::with_sleeper(interval, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(interval: Duration, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            interval,
            max_attempts: None,
            sleeper,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep for one interval
    pub async fn wait(&self) {
        self.sleeper.sleep(self.interval).await;
    }

    /// Run `probe` until it yields a value, sleeping one interval between
    /// attempts. Errors from `probe` are returned immediately.
    pub async fn until<T, F, Fut>(&self, mut probe: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, AppError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            if let Some(value) = probe(attempt).await? {
                return Ok(value);
            }

            if let Some(max) = self.max_attempts {
                if attempt >= max {
                    return Err(AppError::RetryExhausted(format!(
                        "gave up after {} attempts",
                        attempt
                    )));
                }
            }

            self.wait().await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records requested sleeps and returns immediately
    #[derive(Default)]
    pub struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().expect("sleeper lock").clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().expect("sleeper lock").push(duration);
            tokio::task::yield_now().await;
        }
    }
}
