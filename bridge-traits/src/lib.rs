//! # Host Bridge Traits
//!
//! Contracts between the speech playback core and the host collaborators it
//! drives or is driven by.
//!
//! ## Traits
//!
//! ### Producers
//! - [`SpeechSynthesizer`](speech::SpeechSynthesizer) - Remote text-to-speech
//!   call yielding an ordered stream of encoded audio chunks
//!
//! ### Control Surface
//! - [`NowPlayingSink`](media_session::NowPlayingSink) - System "now playing"
//!   display kept in sync with the playback signals
//! - [`RemoteCommandCenter`](media_session::RemoteCommandCenter) - Media key /
//!   lock screen transport that routes commands into a
//!   [`RemoteCommandHandler`](media_session::RemoteCommandHandler)
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! The playback engine itself is not a bridge trait: the core consumes it
//! through `core_playback::PlaybackEngine` so that engine failures stay in the
//! playback error domain.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with actionable messages.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; command handlers in particular are
//! invoked from whatever task or thread the host transport uses.

pub mod error;
pub mod logging;
pub mod media_session;
pub mod speech;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media_session::{
    CommandRegistration, CommandStatus, NowPlayingInfo, NowPlayingSink, RemoteCommand,
    RemoteCommandCenter, RemoteCommandHandler, RemoteCommandKind,
};
pub use speech::{AudioContainer, ByteStream, SpeechModel, SpeechRequest, SpeechSynthesizer, Voice};
