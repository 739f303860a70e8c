//! Effigy Cache: Revision-Aware Loading Cache
//!
//! Shared cache for resolved enforcer values (or any other remotely owned
//! value) with three properties the enforcement hot path depends on:
//!
//! - **Revision ordering**: entries carry a logical revision and are only
//!   replaced by strictly newer ones, so out-of-order loads and invalidation
//!   races never regress a key to stale data.
//! - **Single-flight loads**: concurrent misses for one key share a single
//!   loader invocation; the load runs on a detached task so an abandoned
//!   caller never cancels it.
//! - **Non-final failures**: a failed fetch is delivered to everyone waiting
//!   on it but is retried on the next lookup instead of being cached.

#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod cache;
pub mod entry;
pub mod key;
pub mod loader;

pub use cache::LoadingCache;
pub use entry::{CacheEntry, Revision};
pub use key::CacheKey;
pub use loader::CacheLoader;
