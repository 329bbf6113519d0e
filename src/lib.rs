//! todoquery library
//!
//! A request cache and mutation coordinator: deduplicated loads per query key,
//! stale-while-revalidate reads, prefix invalidation and tracked mutations,
//! plus the todo API client and page definitions the TUI is built on.

pub mod api;
pub mod cli;
pub mod logging;
pub mod observer;
pub mod pages;
pub mod query;
