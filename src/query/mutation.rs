//! Mutation coordinator
//!
//! A `Mutation` runs a caller-supplied write operation once per `mutate`
//! call. It never touches the cache on its own; the `on_success` callback
//! gets a handle to the [`QueryClient`] so the caller can invalidate
//! whatever the write made outdated.

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use super::client::QueryClient;
use super::error::LoaderError;

/// The write operation behind a mutation
pub type MutationFn<V, T> = Arc<dyn Fn(V) -> BoxFuture<'static, Result<T, LoaderError>> + Send + Sync>;

type SuccessCallback<V, T, Q> = Arc<dyn Fn(&T, &V, &QueryClient<Q>) + Send + Sync>;
type ErrorCallback<V> = Arc<dyn Fn(&LoaderError, &V) + Send + Sync>;

/// Wraps an async closure as a [`MutationFn`]
pub fn mutation_fn<V, T, F, Fut>(f: F) -> MutationFn<V, T>
where
    F: Fn(V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, LoaderError>> + Send + 'static,
{
    Arc::new(move |variables| f(variables).boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// What the UI sees of the most recent `mutate` call
#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<V, T> {
    pub status: MutationStatus,
    pub data: Option<T>,
    pub error: Option<LoaderError>,
    pub variables: Option<V>,
}

impl<V, T> MutationState<V, T> {
    fn idle() -> Self {
        Self {
            status: MutationStatus::Idle,
            data: None,
            error: None,
            variables: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == MutationStatus::Idle
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }
}

struct Tracker<V, T> {
    /// Bumped by every `mutate` call; only the newest call writes `state`
    generation: u64,
    state: MutationState<V, T>,
}

/// Coordinates a write operation and its follow-up cache invalidation
pub struct Mutation<V, T, Q> {
    client: QueryClient<Q>,
    mutation_fn: MutationFn<V, T>,
    on_success: Option<SuccessCallback<V, T, Q>>,
    on_error: Option<ErrorCallback<V>>,
    tracker: Arc<Mutex<Tracker<V, T>>>,
}

impl<V, T, Q> Clone for Mutation<V, T, Q> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            mutation_fn: Arc::clone(&self.mutation_fn),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<V, T, Q> Mutation<V, T, Q>
where
    V: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    Q: Clone + Send + Sync + 'static,
{
    pub fn new(client: QueryClient<Q>, mutation_fn: MutationFn<V, T>) -> Self {
        Self {
            client,
            mutation_fn,
            on_success: None,
            on_error: None,
            tracker: Arc::new(Mutex::new(Tracker {
                generation: 0,
                state: MutationState::idle(),
            })),
        }
    }

    /// Runs after every successful call, with the result, the call's
    /// variables and the cache
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T, &V, &QueryClient<Q>) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LoaderError, &V) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tracker<V, T>> {
        self.tracker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> MutationState<V, T> {
        self.lock().state.clone()
    }

    /// Back to Idle; an in-flight call will no longer report into the state
    pub fn reset(&self) {
        let mut tracker = self.lock();
        tracker.generation += 1;
        tracker.state = MutationState::idle();
    }

    /// Executes the write once
    ///
    /// Two calls are two operations; nothing is deduplicated.
    pub async fn mutate(&self, variables: V) -> Result<T, LoaderError> {
        let generation = {
            let mut tracker = self.lock();
            tracker.generation += 1;
            tracker.state = MutationState::idle();
            tracker.state.status = MutationStatus::Pending;
            tracker.state.variables = Some(variables.clone());
            tracker.generation
        };
        debug!(generation, "mutation started");

        let result = (self.mutation_fn)(variables.clone()).await;

        match &result {
            Ok(data) => {
                debug!(generation, "mutation succeeded");
                if let Some(callback) = &self.on_success {
                    callback(data, &variables, &self.client);
                }
            }
            Err(err) => {
                warn!(generation, error = %err, "mutation failed");
                if let Some(callback) = &self.on_error {
                    callback(err, &variables);
                }
            }
        }

        let mut tracker = self.lock();
        if tracker.generation == generation {
            match &result {
                Ok(data) => {
                    tracker.state.status = MutationStatus::Success;
                    tracker.state.data = Some(data.clone());
                }
                Err(err) => {
                    tracker.state.status = MutationStatus::Error;
                    tracker.state.error = Some(err.clone());
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryConfig, QueryKey};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn client() -> QueryClient<String> {
        QueryClient::new(QueryConfig {
            stale_time: Duration::from_secs(60),
        })
    }

    fn echo() -> MutationFn<u32, String> {
        mutation_fn(|id: u32| async move {
            sleep(Duration::from_millis(10)).await;
            Ok(format!("todo {id}"))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_moves_idle_pending_success() {
        let mutation = Mutation::new(client(), echo());
        assert!(mutation.state().is_idle());

        let running = mutation.clone();
        let task = tokio::spawn(async move { running.mutate(1).await });
        sleep(Duration::from_millis(1)).await;
        let state = mutation.state();
        assert!(state.is_pending());
        assert_eq!(state.variables, Some(1));

        assert_eq!(task.await.unwrap(), Ok("todo 1".to_string()));
        let state = mutation.state();
        assert!(state.is_success());
        assert_eq!(state.data, Some("todo 1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_call_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mutation = Mutation::new(
            client(),
            mutation_fn(move |id: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(id) }
            }),
        );

        let (a, b) = futures::join!(mutation.mutate(1), mutation.mutate(1));
        assert_eq!((a, b), (Ok(1), Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_success_can_invalidate() {
        let cache = client();
        let key = QueryKey::new("todos").with(1);
        cache.set_query_data(&key, "old".to_string());

        let mutation = Mutation::new(cache.clone(), echo()).on_success(
            |_data: &String, id: &u32, client: &QueryClient<String>| {
                client.invalidate(QueryKey::new("todos").with(*id));
            },
        );
        mutation.mutate(1).await.unwrap();

        let state = cache.get(&key);
        assert!(state.is_stale);
        assert_eq!(state.data, Some("old".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reports_error_and_leaves_cache_alone() {
        let cache = client();
        let key = QueryKey::new("todos").with(1);
        cache.set_query_data(&key, "old".to_string());
        let before = cache.get(&key);

        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        let mutation = Mutation::new(
            cache.clone(),
            mutation_fn(|_id: u32| async { Err::<String, _>(LoaderError::Status { status: 500 }) }),
        )
        .on_success(|_: &String, _: &u32, client: &QueryClient<String>| {
            client.invalidate(QueryKey::new("todos"));
        })
        .on_error(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let result = mutation.mutate(1).await;
        assert_eq!(result, Err(LoaderError::Status { status: 500 }));
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        let state = mutation.state();
        assert!(state.is_error());
        assert_eq!(state.error, Some(LoaderError::Status { status: 500 }));
        assert_eq!(cache.get(&key), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_call_owns_the_state() {
        let mutation = Mutation::new(
            client(),
            mutation_fn(|delay_ms: u64| async move {
                sleep(Duration::from_millis(delay_ms)).await;
                Ok(format!("after {delay_ms}"))
            }),
        );

        let slow = mutation.clone();
        let slow_task = tokio::spawn(async move { slow.mutate(50).await });
        sleep(Duration::from_millis(1)).await;
        mutation.mutate(5).await.unwrap();
        slow_task.await.unwrap().unwrap();

        let state = mutation.state();
        assert_eq!(state.data, Some("after 5".to_string()));
        assert_eq!(state.variables, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_idle() {
        let mutation = Mutation::new(client(), echo());
        mutation.mutate(3).await.unwrap();
        mutation.reset();
        assert!(mutation.state().is_idle());
    }
}
