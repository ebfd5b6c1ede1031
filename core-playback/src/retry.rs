//! # Retry State
//!
//! Failure presentation for the user: set when the engine reports an error,
//! cleared when the user dismisses it or retries.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub error_message: Option<String>,
    pub is_presenting_failure: bool,
}

/// Owner of the [`RetryState`] channel.
#[derive(Debug)]
pub struct RetryCoordinator {
    state: watch::Sender<RetryState>,
}

impl RetryCoordinator {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(RetryState::default()),
        }
    }

    /// Shows `message` as a failure the user can retry or dismiss.
    pub fn present_failure(&self, message: impl Into<String>) {
        let message = message.into();
        info!(error = %message, "Presenting playback failure");
        self.state.send_replace(RetryState {
            error_message: Some(message),
            is_presenting_failure: true,
        });
    }

    /// Cancel action: clears the failure without restarting anything.
    pub fn dismiss(&self) {
        debug!("Failure dismissed");
        self.clear();
    }

    /// Retry action: clears the failure before the caller restarts playback.
    pub fn begin_retry(&self) {
        debug!("Retry requested");
        self.clear();
    }

    fn clear(&self) {
        self.state.send_if_modified(|state| {
            if *state == RetryState::default() {
                false
            } else {
                *state = RetryState::default();
                true
            }
        });
    }

    pub fn state(&self) -> RetryState {
        self.state.borrow().clone()
    }

    pub fn is_presenting_failure(&self) -> bool {
        self.state.borrow().is_presenting_failure
    }

    pub fn subscribe(&self) -> watch::Receiver<RetryState> {
        self.state.subscribe()
    }
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
