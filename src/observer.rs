//! Query observer for the UI loop
//!
//! Subscribes to one key and forwards every state transition over a tokio
//! channel, so the event loop can pick up changes between frames without
//! blocking on the cache.

use tokio::sync::mpsc;

use crate::query::{Loader, QueryClient, QueryKey, QueryState, Subscription};

/// Watches a single query and keeps the newest state it has seen
pub struct QueryObserver<T> {
    /// Channel receiving state snapshots from the cache
    receiver: mpsc::UnboundedReceiver<QueryState<T>>,
    /// Most recent state pulled off the channel
    current: QueryState<T>,
    /// Dropping the observer unsubscribes
    subscription: Subscription<T>,
}

impl<T: Clone + Send + Sync + 'static> QueryObserver<T> {
    /// Subscribes to `key` and performs the mount read with `loader`
    ///
    /// Must be called from within a Tokio runtime, since the read may start
    /// a fetch.
    pub fn observe(client: &QueryClient<T>, key: QueryKey, loader: Loader<T>) -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        let subscription = client.subscribe(&key, move |state: &QueryState<T>| {
            // receiver gone means the observer is being torn down
            let _ = tx.send(state.clone());
        });
        let current = client.read(&key, loader);
        Self {
            receiver,
            current,
            subscription,
        }
    }

    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    pub fn current(&self) -> &QueryState<T> {
        &self.current
    }

    /// Takes the next pending update without blocking
    pub fn try_recv(&mut self) -> Option<QueryState<T>> {
        let state = self.receiver.try_recv().ok()?;
        self.current = state.clone();
        Some(state)
    }

    /// Waits for the next update
    pub async fn recv(&mut self) -> Option<QueryState<T>> {
        let state = self.receiver.recv().await?;
        self.current = state.clone();
        Some(state)
    }

    /// Drains pending updates and returns the newest state
    pub fn latest(&mut self) -> &QueryState<T> {
        while self.try_recv().is_some() {}
        &self.current
    }
}
