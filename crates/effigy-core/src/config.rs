//! Configuration surface for the enforcement pipeline
//!
//! Plain deserializable structs with conservative defaults. Durations are
//! carried as integer milliseconds so the structs stay trivially
//! serde-friendly; accessors convert to [`Duration`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry strategy for asks toward a remote entity owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// Single attempt, no retry
    NoRetry,
    /// Fixed number of attempts with a constant wait between them
    FixedDelay {
        /// Total attempts, including the first
        attempts: u32,
        /// Constant delay between attempts in milliseconds
        delay_ms: u64,
    },
    /// Exponentially growing wait with multiplicative jitter
    ExponentialBackoff {
        /// Total attempts, including the first
        attempts: u32,
        /// First backoff interval in milliseconds
        min_delay_ms: u64,
        /// Cap on the backoff interval in milliseconds
        max_delay_ms: u64,
        /// Jitter factor in `[0, 1]`, applied multiplicatively per attempt
        random_factor: f64,
    },
}

impl RetryStrategy {
    /// Total attempts this strategy allows, including the first
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::NoRetry => 1,
            Self::FixedDelay { attempts, .. } | Self::ExponentialBackoff { attempts, .. } => {
                (*attempts).max(1)
            }
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::ExponentialBackoff {
            attempts: 3,
            min_delay_ms: 100,
            max_delay_ms: 10_000,
            random_factor: 0.2,
        }
    }
}

/// Configuration for one ask exchange with a remote entity owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskConfig {
    /// Per-attempt response timeout in milliseconds
    pub timeout_ms: u64,
    /// Retry strategy applied across attempts
    pub retry: RetryStrategy,
}

impl AskConfig {
    /// Per-attempt timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retry: RetryStrategy::default(),
        }
    }
}

/// Bounds on the enforcer cache; both disabled by default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached entries; the oldest-written slot is evicted
    /// when the bound is hit
    pub max_entries: Option<usize>,
    /// Entry time-to-live in milliseconds; an expired slot is a miss
    pub ttl_ms: Option<u64>,
}

impl CacheConfig {
    /// Entry TTL as a [`Duration`], if configured
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

/// Configuration for in-process blocklist gossip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipConfig {
    /// Buffered states per subscriber before lagging replicas drop updates
    pub channel_capacity: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Top-level configuration for the enforcement core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Ask timeout and retry strategy for policy-owner exchanges
    #[serde(default)]
    pub ask: AskConfig,
    /// Enforcer cache bounds
    #[serde(default)]
    pub cache: CacheConfig,
    /// Blocklist gossip settings
    #[serde(default)]
    pub gossip: GossipConfig,
}
