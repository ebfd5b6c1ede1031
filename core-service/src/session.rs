//! # Playback Session
//!
//! Wires one host session together:
//!
//! ```text
//! StreamRequest ──> ChunkSource ──> StreamCache ──> PlaybackController ──> engine
//!                                                          │
//!                          NowPlayingSink <── StateSynchronizer ──> RetryCoordinator
//!                                                          ^
//!                 RemoteCommandCenter ──> RemoteCommandRouter
//! ```
//!
//! The session owns the user-facing dispatch (play, toggle, retry, cancel);
//! the remote command transport talks to the controller through the router
//! without going through the session.

use crate::error::{CoreError, Result};
use bridge_traits::{RemoteCommandCenter, SpeechSynthesizer};
use core_playback::{
    ChunkSource, EngineState, PlaybackConfig, PlaybackController, PlaybackEngine, PlaybackError,
    RemoteCommandRouter, RetryCoordinator, RetryState, StateSynchronizer, StreamCache,
    StreamRequest, SynchronizerHandle, TrackMetadata,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// The request and metadata of the most recent `play`.
#[derive(Debug, Clone)]
struct LastPlay {
    request: StreamRequest,
    metadata: TrackMetadata,
}

/// Serializable summary of a session, for host diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub state: EngineState,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub rate: f32,
    pub cached_bytes: Option<usize>,
    pub retry: RetryState,
}

pub struct PlaybackSession {
    id: Uuid,
    config: PlaybackConfig,
    controller: Arc<PlaybackController>,
    cache: StreamCache<StreamRequest>,
    retry: Arc<RetryCoordinator>,
    router: Arc<RemoteCommandRouter>,
    remote_commands: Option<Arc<dyn RemoteCommandCenter>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    metadata: watch::Sender<TrackMetadata>,
    /// Serializes play/toggle/retry and remembers what to replay.
    last: Mutex<Option<LastPlay>>,
    synchronizer: parking_lot::Mutex<Option<SynchronizerHandle>>,
    events: EventBus,
}

impl PlaybackSession {
    /// Builds the session around `engine` and starts its background task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`] when `core` fails validation
    /// - [`CoreError::InitializationFailed`] when `playback` is invalid
    pub fn new(
        engine: Arc<dyn PlaybackEngine>,
        core: CoreConfig,
        playback: PlaybackConfig,
    ) -> Result<Self> {
        core.validate()?;
        playback
            .validate()
            .map_err(|msg| CoreError::InitializationFailed(format!("playback config: {msg}")))?;

        let id = Uuid::new_v4();
        let events = core.event_bus.clone();
        let controller = Arc::new(PlaybackController::new(engine));
        let retry = Arc::new(RetryCoordinator::new());
        let (metadata, metadata_rx) = watch::channel(TrackMetadata::default());

        let synchronizer = StateSynchronizer::new(
            controller.signals(),
            metadata_rx,
            Arc::clone(&core.now_playing_sink),
            Arc::clone(&retry),
        )
        .with_event_bus(events.clone())
        .spawn();

        let router = Arc::new(
            RemoteCommandRouter::new(&controller, &playback).with_event_bus(events.clone()),
        );
        let remote_commands = if core.remote_commands_enabled() {
            core.remote_commands.clone()
        } else {
            None
        };
        if let Some(center) = &remote_commands {
            router.bind(center.as_ref());
        }

        let synthesizer = if core.features.enable_speech_synthesis {
            core.speech_synthesizer.clone()
        } else {
            None
        };

        info!(
            session_id = %id,
            remote_commands = remote_commands.is_some(),
            speech = synthesizer.is_some(),
            "Playback session created"
        );

        Ok(Self {
            id,
            cache: StreamCache::new().with_event_bus(events.clone()),
            config: playback,
            controller,
            retry,
            router,
            remote_commands,
            synthesizer,
            metadata,
            last: Mutex::new(None),
            synchronizer: parking_lot::Mutex::new(Some(synchronizer)),
            events,
        })
    }

    /// Converts `request` to a chunk stream and plays it.
    ///
    /// Stops whatever is playing first. A request identical to the previous
    /// one is served from the cache once its production has completed.
    #[instrument(skip(self, request, metadata), fields(session_id = %self.id, request = %request.describe()))]
    pub async fn play(&self, request: StreamRequest, metadata: TrackMetadata) -> Result<()> {
        let mut last = self.last.lock().await;
        let play = LastPlay { request, metadata };
        *last = Some(play.clone());
        self.start(&play).await
    }

    /// UI play/pause button.
    ///
    /// Pauses while playing and resumes while paused; from any idle state it
    /// replays the last request.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoRequest`] when idle and nothing was played yet.
    pub async fn toggle(&self) -> Result<()> {
        let last = self.last.lock().await;
        match self.controller.state() {
            EngineState::Playing => Ok(self.controller.pause().await?),
            EngineState::Paused => Ok(self.controller.resume().await?),
            EngineState::Initial | EngineState::Completed | EngineState::Failed => {
                let play = last.as_ref().ok_or(PlaybackError::NoRequest)?;
                debug!(session_id = %self.id, "Replaying last request");
                self.start(play).await
            }
        }
    }

    /// Retry action: clears the failure and reruns the last request from the
    /// beginning.
    ///
    /// A production that failed never committed, so the producer is invoked
    /// again; a completed one is replayed from the cache.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn retry(&self) -> Result<()> {
        let last = self.last.lock().await;
        self.retry.begin_retry();
        let play = last.as_ref().ok_or(PlaybackError::NoRequest)?;
        info!("Retrying playback");
        self.start(play).await
    }

    /// Cancel action: clears the failure without restarting anything.
    pub fn cancel_retry(&self) {
        self.retry.dismiss();
    }

    /// Drops cached content so the next play produces again.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    async fn start(&self, play: &LastPlay) -> Result<()> {
        if self.controller.state().is_active() {
            self.controller.stop().await?;
        }

        self.metadata.send_replace(play.metadata.clone());

        let source =
            ChunkSource::from_request(&play.request, self.synthesizer.clone(), &self.config)?;
        let stream = self
            .cache
            .create_stream(play.request.clone(), move || source.into_stream());

        self.controller
            .start(stream, play.request.format())
            .await
            .map_err(|err| {
                warn!(session_id = %self.id, error = %err, "Engine refused stream");
                err
            })?;

        let _ = self.events.emit(CoreEvent::Playback(PlaybackEvent::Started {
            request: play.request.describe(),
            title: play.metadata.title.clone(),
        }));
        Ok(())
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry.state()
    }

    pub fn subscribe_retry(&self) -> watch::Receiver<RetryState> {
        self.retry.subscribe()
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn status(&self) -> SessionStatus {
        let snapshot = self.controller.snapshot();
        SessionStatus {
            session_id: self.id,
            state: snapshot.state,
            position_ms: snapshot.time.as_millis() as u64,
            duration_ms: snapshot.duration.as_millis() as u64,
            rate: snapshot.rate,
            cached_bytes: self.cache.cached_len(),
            retry: self.retry.state(),
        }
    }

    /// Unbinds remote commands, stops the synchronizer (clearing the
    /// now-playing display) and stops the engine.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(center) = &self.remote_commands {
            self.router.unbind(center.as_ref());
        }

        let synchronizer = self.synchronizer.lock().take();
        if let Some(handle) = synchronizer {
            handle.shutdown().await;
        }

        self.controller.stop().await?;
        info!("Playback session shut down");
        Ok(())
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("controller", &self.controller)
            .field("cache", &self.cache)
            .field("remote_commands", &self.remote_commands.is_some())
            .field("speech", &self.synthesizer.is_some())
            .finish()
    }
}
