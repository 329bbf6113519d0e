//! Request cache and mutation coordination
//!
//! A `QueryClient` caches loader results by structural key, shares one
//! in-flight fetch between concurrent callers, keeps serving old values
//! while it revalidates, and refetches watched keys when they are
//! invalidated. A `Mutation` performs writes and hands the client to its
//! success callback so related queries can be invalidated.

mod client;
mod entry;
mod error;
mod key;
mod mutation;
mod retry;

pub use client::{loader, FetchHandle, Loader, LoaderFuture, QueryClient, QueryConfig, Subscription};
pub use entry::{QueryState, QueryStatus};
pub use error::{LoaderError, QueryError};
pub use key::{KeyFilter, KeyPart, QueryKey};
pub use mutation::{mutation_fn, Mutation, MutationFn, MutationState, MutationStatus};
pub use retry::{with_retry, RetryPolicy};
