//! Error types for sync operations.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Every variant is swallowed at the fire-and-forget boundary: sync
/// failures are logged and retried by the next cycle, never surfaced to
/// the interactive caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote replica rejected or mangled an exchange.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Not connected to the remote replica.
    #[error("not connected to remote replica")]
    NotConnected,

    /// A sync cycle is already in progress.
    #[error("sync cycle already in progress")]
    AlreadyRunning,

    /// Local datastore error while applying merge results.
    #[error("local store error: {0}")]
    Core(#[from] tagstore_core::CoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::NotConnected => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(SyncError::NotConnected.is_retryable());
        assert!(!SyncError::AlreadyRunning.is_retryable());
        assert!(!SyncError::Protocol("garbage".into()).is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            SyncError::NotConnected.to_string(),
            "not connected to remote replica"
        );
        assert!(SyncError::transport_fatal("boom").to_string().contains("boom"));
    }
}
