//! Unified error system for the Effigy enforcement core
//!
//! A single error enum shared across the workspace. Authorization failures
//! surface as typed variants rather than generic exceptions, and the
//! enforcement pipeline relies on the transient/terminal split encoded in
//! [`EffigyError::is_transient`] when no caller-supplied classifier overrides
//! it.

use serde::{Deserialize, Serialize};

/// Convenience alias used throughout the workspace.
pub type EffigyResult<T> = Result<T, EffigyError>;

/// Unified error type for all Effigy enforcement operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum EffigyError {
    /// Authorization check failed; never retried automatically
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation
        message: String,
    },

    /// Entity absent or the caller is not allowed to know it exists.
    /// Intentionally indistinguishable from a missing entity so existence
    /// information never leaks to unauthorized callers.
    #[error("Not accessible: {message}")]
    NotAccessible {
        /// Description of the inaccessible entity
        message: String,
    },

    /// Namespace is on the replicated blocklist; failed before any cache or
    /// remote work was attempted
    #[error("Namespace blocked: {message}")]
    NamespaceBlocked {
        /// The blocked namespace
        message: String,
    },

    /// Transient fetch failure; the caller may retry the whole operation
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Description of the transient failure
        message: String,
    },

    /// All configured ask attempts failed
    #[error("Retry attempts exhausted: {message}")]
    RetryExhausted {
        /// The last observed cause
        message: String,
    },

    /// Invalid input or configuration (programming-contract violation)
    #[error("Invalid: {message}")]
    Invalid {
        /// Description of the invalid input
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl EffigyError {
    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a not accessible error
    pub fn not_accessible(message: impl Into<String>) -> Self {
        Self::NotAccessible {
            message: message.into(),
        }
    }

    /// Create a namespace blocked error
    pub fn namespace_blocked(namespace: impl Into<String>) -> Self {
        Self::NamespaceBlocked {
            message: namespace.into(),
        }
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Create a retry exhausted error
    pub fn retry_exhausted(message: impl Into<String>) -> Self {
        Self::RetryExhausted {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry of the failed operation could reasonably succeed.
    ///
    /// Used as the default ask classifier; callers with richer response
    /// taxonomies supply their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. } | Self::RetryExhausted { .. } | Self::Internal { .. }
        )
    }
}
