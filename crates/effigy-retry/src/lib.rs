//! Effigy Retry: Ask-with-Retry toward Remote Entity Owners
//!
//! Entities live behind remote owners reached only by message exchange; an
//! owner may be slow, mid-rebalance, or transiently unavailable. This crate
//! provides the retry protocol the enforcement loaders use:
//!
//! - [`RetryStrategy`] selection (no-retry, fixed-delay, exponential backoff
//!   with jitter) re-exported from the configuration surface
//! - [`RetryAttempt`], the ephemeral per-ask state machine
//! - [`ask_with_retry`], which re-resolves the target on every attempt,
//!   bounds each attempt with a timeout, and lets a caller-supplied
//!   classifier decide which outcomes are worth another attempt

#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod ask;
pub mod strategy;

pub use ask::{ask_with_retry, AskVerdict, MessageTarget};
pub use effigy_core::config::{AskConfig, RetryStrategy};
pub use strategy::RetryAttempt;
