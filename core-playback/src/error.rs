//! # Playback Error Types
//!
//! Errors raised while producing chunk streams, caching them and driving the
//! playback engine.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Production Errors
    // ========================================================================
    /// Remote production failed before or during the byte stream.
    #[error("Streaming failed: {0}")]
    StreamingFailed(String),

    /// A speech request was made but no synthesizer is configured.
    #[error("No speech synthesizer configured")]
    SynthesizerUnavailable,

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Operation not allowed in the engine's current state.
    #[error("Invalid playback state: {0}")]
    InvalidState(String),

    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f32),

    #[error("Invalid position: {0}")]
    InvalidPosition(f64),

    /// Replay or retry requested before anything was played.
    #[error("No request to replay")]
    NoRequest,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if re-running the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::StreamingFailed(_) | PlaybackError::Io(_) => true,
            PlaybackError::Bridge(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Builds an equivalent error for another consumer of the same failure.
    ///
    /// Wrapped I/O errors keep their kind and bridge errors their variant, so
    /// the copy classifies exactly like the original.
    pub fn replicate(&self) -> Self {
        match self {
            PlaybackError::StreamingFailed(msg) => PlaybackError::StreamingFailed(msg.clone()),
            PlaybackError::SynthesizerUnavailable => PlaybackError::SynthesizerUnavailable,
            PlaybackError::InvalidState(msg) => PlaybackError::InvalidState(msg.clone()),
            PlaybackError::InvalidVolume(v) => PlaybackError::InvalidVolume(*v),
            PlaybackError::InvalidRate(r) => PlaybackError::InvalidRate(*r),
            PlaybackError::InvalidPosition(p) => PlaybackError::InvalidPosition(*p),
            PlaybackError::NoRequest => PlaybackError::NoRequest,
            PlaybackError::Io(err) => PlaybackError::Io(copy_io(err)),
            PlaybackError::Bridge(err) => PlaybackError::Bridge(match err {
                BridgeError::NotAvailable(msg) => BridgeError::NotAvailable(msg.clone()),
                BridgeError::OperationFailed(msg) => BridgeError::OperationFailed(msg.clone()),
                BridgeError::Rejected(msg) => BridgeError::Rejected(msg.clone()),
                BridgeError::StreamInterrupted { received, reason } => {
                    BridgeError::StreamInterrupted {
                        received: *received,
                        reason: reason.clone(),
                    }
                }
                BridgeError::Io(err) => BridgeError::Io(copy_io(err)),
            }),
            PlaybackError::Internal(msg) => PlaybackError::Internal(msg.clone()),
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::StreamingFailed(_)
                | PlaybackError::Bridge(BridgeError::StreamInterrupted { .. })
        )
    }
}

fn copy_io(err: &std::io::Error) -> std::io::Error {
    std::io::Error::new(err.kind(), err.to_string())
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
