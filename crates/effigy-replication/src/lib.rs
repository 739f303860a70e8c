//! Effigy Replication: Cluster-Replicated Namespace Blocklist
//!
//! The blocklist is the emergency circuit breaker consulted before any
//! enforcement work begins. It is replicated across cluster members as an
//! add-wins set: local reads are immediate and eventually consistent, writes
//! resolve once the local replica has applied and published them, and
//! concurrent updates from any member merge deterministically without
//! coordination.
//!
//! The merge algorithm stays internal to [`orset`]; everything else sees only
//! `contains`/`add`/`remove`/`subscribe_for_changes`.

#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]

pub mod blocklist;
pub mod gossip;
pub mod orset;

pub use blocklist::{BlocklistChanged, NamespaceBlocklist};
pub use gossip::{GossipBus, ReplicaTransport};
pub use orset::OrSet;
