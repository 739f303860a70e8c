//! Effigy Core: Shared Domain Types
//!
//! Foundation crate for the Effigy enforcement core. Provides the types every
//! other crate in the workspace speaks in:
//!
//! - Entity identifiers and resource-type tags
//! - The `Signal`/`SignalResponse` command envelopes
//! - The resolved [`EffectiveEnforcer`] permission table
//! - The unified [`EffigyError`] type
//! - Configuration structs for the enforcement pipeline
//!
//! This crate deliberately contains no I/O and no async code; it is pure data
//! plus the predicates evaluated over it.

#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod config;
pub mod enforcer;
pub mod errors;
pub mod identifiers;
pub mod signal;

pub use config::{AskConfig, CacheConfig, EnforcementConfig, GossipConfig, RetryStrategy};
pub use enforcer::{EffectiveEnforcer, Permission};
pub use errors::{EffigyError, EffigyResult};
pub use identifiers::{EntityId, ResourceType};
pub use signal::{
    AuthContext, Signal, SignalAction, SignalHeaders, SignalResponse, SignalStatus,
};
