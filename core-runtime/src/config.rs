//! # Core Configuration Module
//!
//! Builder-based configuration holding the host bridges a playback session
//! needs.
//!
//! ## Required Dependencies
//!
//! - `NowPlayingSink` - System "now playing" display
//!
//! ## Optional Dependencies
//!
//! - `RemoteCommandCenter` - Media keys / lock screen transport
//! - `SpeechSynthesizer` - Remote text-to-speech producer
//! - `EventBus` - Shared bus for core events
//!
//! When the `desktop-shims` feature is enabled, the desktop
//! `TracingNowPlayingSink` from `bridge-desktop` is injected if no sink is
//! provided. A command center is never injected: the host has to hold it to
//! dispatch commands.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .now_playing_sink(Arc::new(MyNowPlayingSink))
//!     .speech_synthesizer(Arc::new(MySynthesizer))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{NowPlayingSink, RemoteCommandCenter, SpeechSynthesizer};
use std::sync::Arc;

/// Host bridges and switches for one playback session.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Now-playing display (required)
    pub now_playing_sink: Arc<dyn NowPlayingSink>,

    /// Remote command transport (optional)
    pub remote_commands: Option<Arc<dyn RemoteCommandCenter>>,

    /// Text-to-speech producer; speech requests fail without it
    pub speech_synthesizer: Option<Arc<dyn SpeechSynthesizer>>,

    /// Event bus shared with the host; a private one is created if absent
    pub event_bus: EventBus,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("now_playing_sink", &"NowPlayingSink { ... }")
            .field(
                "remote_commands",
                &self
                    .remote_commands
                    .as_ref()
                    .map(|_| "RemoteCommandCenter { ... }"),
            )
            .field(
                "speech_synthesizer",
                &self
                    .speech_synthesizer
                    .as_ref()
                    .map(|_| "SpeechSynthesizer { ... }"),
            )
            .field("event_bus", &self.event_bus)
            .field("features", &self.features)
            .finish()
    }
}

/// Optional behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Bind the remote command router to the command center
    pub enable_remote_commands: bool,

    /// Accept text-to-speech requests (requires a SpeechSynthesizer)
    pub enable_speech_synthesis: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_remote_commands: true,
            enable_speech_synthesis: false,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Checks feature flags against the bridges that were provided.
    pub fn validate(&self) -> Result<()> {
        if self.features.enable_speech_synthesis && self.speech_synthesizer.is_none() {
            return Err(Error::Config(
                "Speech synthesis enabled but no SpeechSynthesizer provided. \
                 Disable the feature or inject a SpeechSynthesizer implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Whether the router should be bound to a command center.
    pub fn remote_commands_enabled(&self) -> bool {
        self.features.enable_remote_commands && self.remote_commands.is_some()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn now_playing_sink_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "NowPlayingSink".to_string(),
        message: "NowPlayingSink implementation is required to publish playback metadata. \
                 Desktop: enable the 'desktop-shims' feature to use TracingNowPlayingSink. \
                 Mobile: inject MPNowPlayingInfoCenter / MediaSession backed sinks."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_now_playing_sink() -> Result<Arc<dyn NowPlayingSink>> {
    use bridge_desktop::TracingNowPlayingSink;

    let sink: Arc<dyn NowPlayingSink> = Arc::new(TracingNowPlayingSink::new());
    Ok(sink)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_now_playing_sink() -> Result<Arc<dyn NowPlayingSink>> {
    Err(now_playing_sink_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    now_playing_sink: Option<Arc<dyn NowPlayingSink>>,
    remote_commands: Option<Arc<dyn RemoteCommandCenter>>,
    speech_synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    event_bus: Option<EventBus>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    /// Sets the now-playing sink (required).
    pub fn now_playing_sink(mut self, sink: Arc<dyn NowPlayingSink>) -> Self {
        self.now_playing_sink = Some(sink);
        self
    }

    pub fn remote_commands(mut self, center: Arc<dyn RemoteCommandCenter>) -> Self {
        self.remote_commands = Some(center);
        self
    }

    /// Sets the speech synthesizer and enables speech requests.
    pub fn speech_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech_synthesizer = Some(synthesizer);
        let mut features = self.features.unwrap_or_default();
        features.enable_speech_synthesis = true;
        self.features = Some(features);
        self
    }

    /// Shares an existing event bus instead of creating one.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn enable_remote_commands(mut self, enable: bool) -> Self {
        let mut features = self.features.unwrap_or_default();
        features.enable_remote_commands = enable;
        self.features = Some(features);
        self
    }

    pub fn enable_speech_synthesis(mut self, enable: bool) -> Self {
        let mut features = self.features.unwrap_or_default();
        features.enable_speech_synthesis = enable;
        self.features = Some(features);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no now-playing sink is available
    /// - [`Error::Config`] when enabled features lack their bridge
    pub fn build(self) -> Result<CoreConfig> {
        let now_playing_sink = match self.now_playing_sink {
            Some(sink) => sink,
            None => provide_default_now_playing_sink()?,
        };

        let config = CoreConfig {
            now_playing_sink,
            remote_commands: self.remote_commands,
            speech_synthesizer: self.speech_synthesizer,
            event_bus: self.event_bus.unwrap_or_default(),
            features: self.features.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
