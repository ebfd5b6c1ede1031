use thiserror::Error;

/// Errors reported by host collaborators across the bridge boundary.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The collaborator refused the request (bad credential, unsupported voice, ...).
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// A byte stream ended abruptly after it had started producing data.
    #[error("Stream interrupted after {received} bytes: {reason}")]
    StreamInterrupted { received: u64, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::OperationFailed(_) | BridgeError::StreamInterrupted { .. } | BridgeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
