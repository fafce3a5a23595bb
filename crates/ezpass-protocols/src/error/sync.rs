//! Sync channel (transport) errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timed out after {0} ms")]
    ConnectionTimeout(u64),

    #[error("No answer within {0} ms")]
    ResponseTimeout(u64),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Channel not connected")]
    NotConnected,

    #[error("Reconnect attempts exhausted after {attempts} tries")]
    RetriesExhausted { attempts: u32 },

    #[error("Fetch superseded by a newer request")]
    Superseded,

    #[error("Channel closed")]
    Closed,

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl SyncError {
    /// Whether a fresh connection attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::ConnectionTimeout(_)
                | SyncError::SendFailed(_)
                | SyncError::NotConnected
                | SyncError::Closed
        )
    }
}
