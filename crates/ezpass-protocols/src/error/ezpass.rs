//! Top-level error type.

use thiserror::Error;

use super::{DomError, StoreError, SyncError};

/// Top-level error type. Nothing here is fatal to the host process; callers
/// degrade every variant to "no autofill / no save this time".
#[derive(Debug, Error)]
pub enum EzpassError {
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("DOM error: {0}")]
    Dom(#[from] DomError),

    #[error("Extension context invalidated")]
    ContextInvalidated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
