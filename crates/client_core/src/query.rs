//! Lifecycle of one asynchronous remote query.
//!
//! A [`QueryUnit`] owns the state of a logical query (fetcher plus dependency
//! key). Every request is stamped with the key it was issued under and a
//! request generation; a response is applied only if both still match when it
//! arrives, so a later dependency change or refetch always wins. Superseded
//! requests are never cancelled, they simply complete without effect.

use std::{fmt::Debug, future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
        }
    }

    pub fn loading(data: Option<T>) -> Self {
        Self {
            status: QueryStatus::Loading,
            data,
            error: None,
        }
    }

    pub fn success(data: T) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::failed(message, None)
    }

    /// An error that still carries the last data fetched for the same key.
    pub fn failed(message: impl Into<String>, stale: Option<T>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: stale,
            error: Some(message.into()),
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

/// How a request ended from the point of view of the unit's state.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    /// The response was current and is now the unit's state.
    Applied(QueryState<T>),
    /// A newer request or a dependency change superseded this one.
    Superseded,
    /// The unit is disabled; nothing was fetched.
    Disabled,
}

impl<T> Settled<T> {
    pub fn applied(&self) -> Option<&QueryState<T>> {
        match self {
            Self::Applied(state) => Some(state),
            _ => None,
        }
    }
}

#[async_trait]
pub trait QueryFetcher<K, T>: Send + Sync {
    async fn fetch(&self, key: &K) -> Result<T, ClientError>;
}

#[async_trait]
impl<K, T, F, Fut> QueryFetcher<K, T> for F
where
    K: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
{
    async fn fetch(&self, key: &K) -> Result<T, ClientError> {
        (self)(key.clone()).await
    }
}

struct RequestTracker<K> {
    key: Option<K>,
    enabled: bool,
    generation: u64,
}

pub struct QueryUnit<K, T> {
    fetcher: Arc<dyn QueryFetcher<K, T>>,
    tracker: Mutex<RequestTracker<K>>,
    state: watch::Sender<QueryState<T>>,
}

impl<K, T> QueryUnit<K, T>
where
    K: Clone + PartialEq + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: impl QueryFetcher<K, T> + 'static) -> Self {
        Self::from_arc(Arc::new(fetcher))
    }

    pub fn from_arc(fetcher: Arc<dyn QueryFetcher<K, T>>) -> Self {
        let (state, _) = watch::channel(QueryState::idle());
        Self {
            fetcher,
            tracker: Mutex::new(RequestTracker {
                key: None,
                enabled: false,
                generation: 0,
            }),
            state,
        }
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.subscribe()
    }

    pub async fn current_key(&self) -> Option<K> {
        self.tracker.lock().await.key.clone()
    }

    /// Applies a new dependency key. When enabled the unit fetches for `key`;
    /// when disabled it drops to idle and ignores anything still in flight.
    pub async fn set_dependency(&self, key: K, enabled: bool) -> Settled<T> {
        if !enabled {
            let mut tracker = self.tracker.lock().await;
            tracker.generation += 1;
            tracker.key = Some(key);
            tracker.enabled = false;
            self.state.send_replace(QueryState::idle());
            return Settled::Disabled;
        }

        let fetcher = Arc::clone(&self.fetcher);
        self.fetch_with(key, move |key| async move { fetcher.fetch(&key).await })
            .await
    }

    /// Disables the unit without a key, as for a dependent query whose id is
    /// not known yet.
    pub async fn disable(&self) {
        let mut tracker = self.tracker.lock().await;
        tracker.generation += 1;
        tracker.key = None;
        tracker.enabled = false;
        self.state.send_replace(QueryState::idle());
    }

    /// Repeats the fetch for the current key regardless of the current state.
    pub async fn refetch(&self) -> Settled<T> {
        let key = {
            let tracker = self.tracker.lock().await;
            match (&tracker.key, tracker.enabled) {
                (Some(key), true) => key.clone(),
                _ => return Settled::Disabled,
            }
        };
        self.set_dependency(key, true).await
    }

    /// Stores externally known data as a successful result for `key` without
    /// any network call. Requests still in flight are superseded.
    pub async fn seed(&self, key: K, data: T) {
        let mut tracker = self.tracker.lock().await;
        tracker.generation += 1;
        tracker.key = Some(key);
        tracker.enabled = true;
        self.state.send_replace(QueryState::success(data));
    }

    /// Runs one request for `key` with an ad-hoc fetch operation.
    ///
    /// Data already held for the same key stays visible while loading and
    /// after a failure; data for a different key is discarded immediately.
    pub async fn fetch_with<F, Fut>(&self, key: K, fetch: F) -> Settled<T>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let generation = {
            let mut tracker = self.tracker.lock().await;
            tracker.generation += 1;
            let same_key = tracker.key.as_ref() == Some(&key);
            tracker.key = Some(key.clone());
            tracker.enabled = true;
            let retained = if same_key {
                self.state.borrow().data.clone()
            } else {
                None
            };
            self.state.send_replace(QueryState::loading(retained));
            tracker.generation
        };

        let result = fetch(key.clone()).await;

        let tracker = self.tracker.lock().await;
        if tracker.generation != generation || tracker.key.as_ref() != Some(&key) {
            debug!(?key, generation, "dropping superseded query response");
            return Settled::Superseded;
        }

        let next = match result {
            Ok(data) => QueryState::success(data),
            // the loading state holds whatever was retained for this key
            Err(err) => QueryState::failed(err.to_string(), self.state.borrow().data.clone()),
        };
        self.state.send_replace(next.clone());
        Settled::Applied(next)
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
