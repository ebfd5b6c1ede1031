//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (now-playing sink,
//! remote command center, speech synthesizer) and a host playback engine into
//! a [`PlaybackSession`]. Desktop apps typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) and use
//! `bootstrap_desktop`; mobile hosts build a
//! [`CoreConfig`](core_runtime::config::CoreConfig) with their own bridges.

pub mod error;
pub mod session;

pub use error::{CoreError, Result};
pub use session::{PlaybackSession, SessionStatus};

pub use core_playback::{
    EngineState, PlaybackConfig, PlaybackEngine, RetryState, StreamRequest, TrackMetadata,
};
pub use bridge_traits::{CommandStatus, RemoteCommand};
pub use core_runtime::config::CoreConfig;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::InProcessCommandCenter;

#[cfg(feature = "desktop-shims")]
use bridge_traits::SpeechSynthesizer;
#[cfg(feature = "desktop-shims")]
use std::sync::Arc;

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the desktop now-playing sink and enables speech requests when a
/// synthesizer is given. The returned [`InProcessCommandCenter`] is already
/// bound to the session; media-key listeners and tray menus feed it through
/// [`InProcessCommandCenter::dispatch`].
///
/// ```ignore
/// use core_service::{bootstrap_desktop, RemoteCommand, StreamRequest, TrackMetadata};
///
/// let (session, commands) = bootstrap_desktop(Arc::new(MyEngine::new()), None)?;
/// session
///     .play(StreamRequest::File("intro.mp3".into()), TrackMetadata::new("Intro"))
///     .await?;
/// commands.dispatch(RemoteCommand::Pause).await;
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(
    engine: Arc<dyn PlaybackEngine>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
) -> Result<(PlaybackSession, Arc<InProcessCommandCenter>)> {
    let commands = Arc::new(InProcessCommandCenter::new());
    let mut builder = CoreConfig::builder().remote_commands(commands.clone());
    if let Some(synthesizer) = synthesizer {
        builder = builder.speech_synthesizer(synthesizer);
    }
    let config = builder
        .build()
        .map_err(|err| match err {
            core_runtime::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::InitializationFailed(other.to_string()),
        })?;
    let session = PlaybackSession::new(engine, config, PlaybackConfig::default())?;
    Ok((session, commands))
}
