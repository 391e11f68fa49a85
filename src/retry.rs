//! Retry and poll primitives
//!
//! [`RetryPolicy`] wraps `tokio-retry` with a doubling delay schedule
//! (`base * 2^attempt`) and a hard cap on retries. [`poll_until`] repeats a
//! check on a fixed interval until it yields a value, backing off briefly on
//! read errors. Both stop at every suspension point when the supplied
//! [`Cancellation`] fires or the optional deadline passes.

use std::{fmt::Display, future::Future, time::Duration};

use thiserror::Error;
use tokio::{
    sync::watch,
    time::{sleep, sleep_until, Instant},
};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::metrics::metrics;

/// Exponential backoff with a bounded number of retries.
///
/// `max_retries = 3` means at most four attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before each retry, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        (0..self.max_retries).map(move |attempt| base.saturating_mul(1u32 << attempt.min(31)))
    }

    /// Sum of all delays, the longest this policy can sleep before giving up.
    pub fn total_backoff(&self) -> Duration {
        self.delays().fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }

    /// Runs `operation` until it succeeds or retries are exhausted.
    ///
    /// The last error is returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation_name, operation, |_: &E| true).await
    }

    /// Like [`run`](Self::run) but stops early when `retryable` returns false.
    pub async fn run_if<T, E, F, Fut, C>(
        &self,
        operation_name: &str,
        mut operation: F,
        mut retryable: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0u32;

        let action = || {
            attempt += 1;
            if attempt > 1 {
                metrics().retry_attempts.inc();
                debug!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    "Retrying operation"
                );
            }
            operation()
        };

        let condition = |err: &E| {
            let retry = retryable(err);
            if retry {
                warn!(operation = operation_name, error = %err, "Attempt failed");
            } else {
                warn!(operation = operation_name, error = %err, "Permanent error, not retrying");
            }
            retry
        };

        RetryIf::spawn(self.delays(), action, condition).await
    }
}

/// Fires once when the paired [`CancelHandle`] is triggered.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Creates a linked cancel handle and token.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> Cancellation {
        Cancellation {
            rx: self.tx.subscribe(),
        }
    }
}

impl Cancellation {
    /// A token that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when cancellation is requested. Pends forever if the handle is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub error_backoff: Duration,
    /// `None` waits until cancelled
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            error_backoff: Duration::from_millis(200),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("condition not met within {waited:?} ({attempts} checks)")]
    TimedOut { waited: Duration, attempts: u32 },

    #[error("poll cancelled after {attempts} checks")]
    Cancelled { attempts: u32 },
}

/// Repeats `check` until it returns `Ok(Some(value))`.
///
/// `Ok(None)` waits `interval` before the next check; `Err` is logged and
/// waits `error_backoff`. Cancellation and the deadline are honoured both
/// while a check is in flight and while sleeping.
pub async fn poll_until<T, E, F, Fut>(
    label: &str,
    settings: &PollSettings,
    cancel: &Cancellation,
    mut check: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let started = Instant::now();
    let deadline = settings.timeout.map(|t| started + t);
    let mut attempts = 0u32;

    let deadline_reached = || async move {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    };

    loop {
        attempts += 1;
        metrics().poll_iterations.inc();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled { attempts }),
            _ = deadline_reached() => {
                return Err(PollError::TimedOut { waited: started.elapsed(), attempts })
            }
            outcome = check() => outcome,
        };

        let wait = match outcome {
            Ok(Some(value)) => {
                metrics()
                    .poll_wait_seconds
                    .observe(started.elapsed().as_secs_f64());
                debug!(poll = label, attempts, "Poll condition met");
                return Ok(value);
            }
            Ok(None) => settings.interval,
            Err(e) => {
                warn!(poll = label, attempts, error = %e, "Poll check failed, backing off");
                settings.error_backoff
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled { attempts }),
            _ = deadline_reached() => {
                return Err(PollError::TimedOut { waited: started.elapsed(), attempts })
            }
            _ = sleep(wait) => {}
        }
    }
}
