//! Cold retry provider: a fetch that runs only when asked to, retried with
//! exponential backoff while the connection is up.

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::provider::{ConnectionStatus, ProviderError, ProviderFailure};
use crate::tracker::{EventChannel, Subscription};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryBackoffConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// `None` retries transient failures forever
    pub max_retries: Option<u32>,
    pub jitter: bool,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(100),
            max_retries: None,
            jitter: true,
        }
    }
}

impl RetryBackoffConfig {
    /// Delay before retry number `attempt` (zero based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        let base = self
            .initial_interval
            .saturating_mul(factor)
            .min(self.max_interval);
        if self.jitter {
            // up to 25% below the nominal delay so retries of many loops spread out
            base.mul_f64(1.0 - fastrand::f64() * 0.25)
        } else {
            base
        }
    }
}

/// Errors a cold provider knows how to classify
pub trait Retryable: fmt::Display {
    fn is_retryable(&self) -> bool;

    fn failure(&self) -> Option<ProviderFailure> {
        None
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }

    fn failure(&self) -> Option<ProviderFailure> {
        Some(self.reason)
    }
}

#[derive(Debug, Clone)]
pub enum RetryError<E> {
    Exhausted { name: String, attempts: u32, error: E },
    NonRetryable { name: String, error: E },
    Cancelled,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                name,
                attempts,
                error,
            } => write!(f, "{name}: gave up after {attempts} attempts: {error}"),
            RetryError::NonRetryable { name, error } => write!(f, "{name}: {error}"),
            RetryError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { error, .. } | RetryError::NonRetryable { error, .. } => {
                Some(error)
            }
            RetryError::Cancelled => None,
        }
    }
}

/// Published on the wallet's fatal-error channel when a loop gives up
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{component}: {message}")]
pub struct FatalError {
    pub component: String,
    pub message: String,
    pub reason: Option<ProviderFailure>,
}

impl FatalError {
    pub fn from_retry<E: Retryable>(component: &str, error: &RetryError<E>) -> Option<Self> {
        let reason = match error {
            RetryError::Exhausted { error, .. } | RetryError::NonRetryable { error, .. } => {
                error.failure()
            }
            RetryError::Cancelled => return None,
        };
        Some(Self {
            component: component.to_string(),
            message: error.to_string(),
            reason,
        })
    }
}

type FetchFn<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Something that fires when a cold provider should fetch again
#[async_trait]
pub trait Trigger: Send {
    /// Resolves on the next trigger event; false when the source ended
    async fn fired(&mut self) -> bool;
}

#[async_trait]
impl<T: Clone + Send + Sync> Trigger for Subscription<T> {
    async fn fired(&mut self) -> bool {
        self.changed().await
    }
}

/// Fires when either trigger fires; ends when either source ends
pub struct AnyOf<A, B>(pub A, pub B);

#[async_trait]
impl<A: Trigger, B: Trigger> Trigger for AnyOf<A, B> {
    async fn fired(&mut self) -> bool {
        tokio::select! {
            fired = self.0.fired() => fired,
            fired = self.1.fired() => fired,
        }
    }
}

/// Never fires again after the initial fetch
pub struct Once;

#[async_trait]
impl Trigger for Once {
    async fn fired(&mut self) -> bool {
        std::future::pending::<()>().await;
        false
    }
}

pub struct ColdProvider<T, E = ProviderError> {
    name: String,
    fetch: FetchFn<T, E>,
    config: RetryBackoffConfig,
    connection: Subscription<ConnectionStatus>,
    equals: Option<fn(&T, &T) -> bool>,
}

impl<T, E> ColdProvider<T, E>
where
    T: Clone + Send + 'static,
    E: Retryable + Send + 'static,
{
    pub fn new<F, Fut>(
        name: impl Into<String>,
        config: RetryBackoffConfig,
        connection: Subscription<ConnectionStatus>,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let fetch: FetchFn<T, E> = Arc::new(move || Box::pin(fetch()));
        Self {
            name: name.into(),
            fetch,
            config,
            connection,
            equals: None,
        }
    }

    /// Suppress values equal to the previous one in [`ColdProvider::run`]
    pub fn with_equals(mut self, equals: fn(&T, &T) -> bool) -> Self {
        self.equals = Some(equals);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One fetch, retried until it succeeds, fails for good, or the
    /// connection signal ends. While the connection is down no attempt is
    /// made; the attempt counter survives the outage.
    pub async fn fetch(&mut self) -> Result<T, RetryError<E>> {
        let mut attempt = 0u32;
        loop {
            if self.connection.wait_for(ConnectionStatus::is_up).await.is_none() {
                return Err(RetryError::Cancelled);
            }

            let call = (self.fetch)();
            let outcome = tokio::select! {
                result = call => Ok(result),
                status = self.connection.wait_for(|status| !status.is_up()) => Err(status),
            };

            let error = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(Some(_)) => {
                    debug!("{}: connection lost, suspending fetch", self.name);
                    continue;
                }
                Err(None) => return Err(RetryError::Cancelled),
            };

            if !error.is_retryable() {
                return Err(RetryError::NonRetryable {
                    name: self.name.clone(),
                    error,
                });
            }
            if let Some(max_retries) = self.config.max_retries {
                if attempt >= max_retries {
                    return Err(RetryError::Exhausted {
                        name: self.name.clone(),
                        attempts: attempt + 1,
                        error,
                    });
                }
            }

            let delay = self.config.delay_for(attempt);
            attempt += 1;
            warn!(
                "{}: fetch failed ({}), retry {} in {:?}",
                self.name, error, attempt, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetches immediately and again on every trigger event, handing each
    /// distinct value to `sink`. Failures that end a fetch go to `fatal`;
    /// the loop itself keeps waiting for the next trigger.
    ///
    /// Cancellation is not reported as fatal: it only happens when the
    /// connection signal completes, which is part of wallet shutdown.
    pub async fn run<R, S, Fut>(
        mut self,
        mut trigger: R,
        fatal: Arc<EventChannel<FatalError>>,
        mut sink: S,
    ) where
        R: Trigger,
        S: FnMut(T) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let mut last: Option<T> = None;
        loop {
            match self.fetch().await {
                Ok(value) => {
                    let duplicate = match (&last, self.equals) {
                        (Some(previous), Some(equals)) => equals(previous, &value),
                        _ => false,
                    };
                    if duplicate {
                        debug!("{}: unchanged", self.name);
                    } else {
                        last = Some(value.clone());
                        sink(value).await;
                    }
                }
                Err(RetryError::Cancelled) => break,
                Err(e) => {
                    error!("{}", e);
                    if let Some(fatal_error) = FatalError::from_retry(&self.name, &e) {
                        fatal.emit(fatal_error);
                    }
                }
            }
            if !trigger.fired().await {
                break;
            }
        }
        debug!("{}: provider loop finished", self.name);
    }
}
