//! Effigy Enforcement: The Authorization Gate
//!
//! The single choke point every protected command passes through before
//! reaching its target, and every response passes through before reaching its
//! caller. The pipeline per signal:
//!
//! 1. consult the replicated namespace blocklist (fail fast when blocked)
//! 2. obtain the effective enforcer from the loading cache (loading on miss
//!    through the retrying owner protocol)
//! 3. authorize the signal through the command family's [`EnforcementOps`]
//! 4. forward the authorized signal to its target
//! 5. filter the response before releasing it
//!
//! Cache freshness is maintained by the [`InvalidationListener`], which
//! subscribes to the entity-change broadcast topic and evicts the enforcer
//! entry of each changed policy.

#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod events;
pub mod gate;
pub mod listener;
pub mod loader;
pub mod ops;
pub mod protocol;

pub use events::{ChangeBroadcast, ChangeTopic, EntityChange};
pub use gate::{EnforcementGate, SignalForwarder};
pub use listener::InvalidationListener;
pub use loader::EnforcerLoader;
pub use ops::{
    EnforcementOps, EnforcementRegistry, PolicyEnforcement, ThingEnforcement,
    UnenforcedPassthrough,
};
pub use protocol::{EnforcerRequest, EnforcerResponse, OwnerResolver};
