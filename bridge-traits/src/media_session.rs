//! Media session bridge traits.
//!
//! Two host surfaces live outside the core but must track its playback state:
//!
//! - a system "now playing" display that receives a [`NowPlayingInfo`] record
//!   every time the playback signals change, and
//! - a remote command transport (media keys, lock screen, headset buttons)
//!   that invokes a [`RemoteCommandHandler`] asynchronously, on no guaranteed
//!   task or thread, and expects a [`CommandStatus`] acknowledgment back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Record published to the host "now playing" display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Elapsed playback time in seconds.
    pub elapsed_seconds: f64,
    /// Total duration in seconds; `0.0` while unknown.
    pub duration_seconds: f64,
    /// Effective playback rate; `0.0` when not actively playing.
    pub playback_rate: f32,
    pub is_live_stream: bool,
}

/// Sink for the host "now playing" display.
pub trait NowPlayingSink: Send + Sync {
    /// Replace the displayed record.
    fn publish(&self, info: NowPlayingInfo);

    /// Remove the displayed record entirely.
    fn clear(&self);
}

/// Kinds of remote commands the core can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteCommandKind {
    Play,
    Pause,
    Stop,
    TogglePlayPause,
    SkipBackward,
    SkipForward,
    ChangePlaybackPosition,
}

impl RemoteCommandKind {
    pub const ALL: [RemoteCommandKind; 7] = [
        RemoteCommandKind::Play,
        RemoteCommandKind::Pause,
        RemoteCommandKind::Stop,
        RemoteCommandKind::TogglePlayPause,
        RemoteCommandKind::SkipBackward,
        RemoteCommandKind::SkipForward,
        RemoteCommandKind::ChangePlaybackPosition,
    ];
}

/// A single externally originated transport event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemoteCommand {
    Play,
    Pause,
    Stop,
    TogglePlayPause,
    SkipBackward,
    SkipForward,
    /// Absolute target position as reported by the transport, in seconds.
    ChangePlaybackPosition { position_seconds: f64 },
}

impl RemoteCommand {
    pub fn kind(&self) -> RemoteCommandKind {
        match self {
            RemoteCommand::Play => RemoteCommandKind::Play,
            RemoteCommand::Pause => RemoteCommandKind::Pause,
            RemoteCommand::Stop => RemoteCommandKind::Stop,
            RemoteCommand::TogglePlayPause => RemoteCommandKind::TogglePlayPause,
            RemoteCommand::SkipBackward => RemoteCommandKind::SkipBackward,
            RemoteCommand::SkipForward => RemoteCommandKind::SkipForward,
            RemoteCommand::ChangePlaybackPosition { .. } => {
                RemoteCommandKind::ChangePlaybackPosition
            }
        }
    }
}

/// Acknowledgment returned to the transport for each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    /// Nothing is available to act on (e.g. the playback session is gone).
    NoSuchContent,
    Failed,
}

impl CommandStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandStatus::Success)
    }
}

/// Receiver of remote commands, implemented by the core.
#[async_trait]
pub trait RemoteCommandHandler: Send + Sync {
    async fn handle(&self, command: RemoteCommand) -> CommandStatus;
}

/// Everything the transport needs to route commands into the core.
#[derive(Clone)]
pub struct CommandRegistration {
    pub handler: Arc<dyn RemoteCommandHandler>,
    pub commands: Vec<RemoteCommandKind>,
    /// Interval advertised for the skip commands.
    pub skip_interval: Duration,
}

impl std::fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("handler", &"RemoteCommandHandler { ... }")
            .field("commands", &self.commands)
            .field("skip_interval", &self.skip_interval)
            .finish()
    }
}

/// Host remote command transport.
pub trait RemoteCommandCenter: Send + Sync {
    /// Route the listed commands to the registration's handler, replacing any
    /// previous registration.
    fn register(&self, registration: CommandRegistration);

    /// Disable every command and drop the handler.
    fn unregister_all(&self);
}
