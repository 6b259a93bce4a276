//! Bounded polling for eventually-consistent cluster state.
//!
//! A [`Poller`] runs a check immediately, then once per interval, until the
//! check reports [`Readiness::Ready`], returns an error, or the deadline
//! passes. Errors from the check are definitive and end the wait at once;
//! only [`Readiness::Pending`] is retried.
//!
//! # Example
//!
//! ```ignore
//! let pod = Poller::new()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_description("pod web-0 ready")
//!     .poll(|| async { probe_pod(&api, "web-0").await })
//!     .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{Error, Result};

/// Default time between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default deadline for a wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<T = ()> {
    /// Condition holds; the poll returns this value.
    Ready(T),
    /// Not yet; carries a description of the observed state for timeout errors.
    Pending(String),
}

impl<T> Readiness<T> {
    /// Shorthand for a pending outcome.
    pub fn pending(state: impl Into<String>) -> Self {
        Readiness::Pending(state.into())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }

    /// Transform the ready value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Readiness<U> {
        match self {
            Readiness::Ready(v) => Readiness::Ready(f(v)),
            Readiness::Pending(s) => Readiness::Pending(s),
        }
    }
}

/// Bounded poller with a fixed interval and a wall-clock deadline.
#[derive(Clone, Debug)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
    description: String,
    cancel: Option<CancellationToken>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            description: "condition".to_string(),
            cancel: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// What is being waited for, used in timeout and cancellation errors.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// End the wait early with [`Error::Cancelled`] when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `check` until it is ready, fails, or the deadline passes.
    pub async fn poll<T, F, Fut>(&self, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Readiness<T>>>,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut last_state = String::from("no observation");
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.attempt(deadline, check()).await? {
                Some(Readiness::Ready(value)) => {
                    trace!(
                        what = %self.description,
                        attempt,
                        elapsed_ms = start.elapsed().as_millis(),
                        "Condition met"
                    );
                    return Ok(value);
                }
                Some(Readiness::Pending(state)) => {
                    trace!(what = %self.description, attempt, state = %state, "Not ready yet");
                    last_state = state;
                }
                // Check outlived the deadline
                None => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    what: self.description.clone(),
                    after: self.timeout,
                    last_state,
                });
            }

            let pause = self.interval.min(deadline - now);
            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            return Err(Error::Cancelled { what: self.description.clone() });
                        }
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                None => tokio::time::sleep(pause).await,
            }
        }
    }

    /// Run one check bounded by the deadline and the cancellation token.
    ///
    /// Returns `Ok(None)` when the deadline passed before the check finished.
    async fn attempt<T, Fut>(&self, deadline: Instant, fut: Fut) -> Result<Option<Readiness<T>>>
    where
        Fut: Future<Output = Result<Readiness<T>>>,
    {
        let bounded = tokio::time::timeout_at(deadline, fut);
        let outcome = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(Error::Cancelled { what: self.description.clone() });
                    }
                    outcome = bounded => outcome,
                }
            }
            None => bounded.await,
        };

        match outcome {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }
}
