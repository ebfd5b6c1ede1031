use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl CoreError {
    /// Whether the user can reasonably retry the failed action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Playback(err) if err.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
