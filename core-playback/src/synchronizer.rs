//! # State Synchronizer
//!
//! Keeps the host "now playing" display and the retry state in step with the
//! engine's signals.
//!
//! ## Dispatch
//!
//! One spawned task owns a receiver for each signal plus the track metadata
//! channel and waits on all of them in a single biased `select!`:
//!
//! ```text
//! error ─┐
//! time ──┤
//! duration ┤   select! (biased)   snapshot all five   NowPlayingInfo
//! rate ──┼──────────────────> ──────────────────> ──────────────> NowPlayingSink
//! state ─┤                                │
//! metadata┘                               └── error set ──> RetryCoordinator
//! ```
//!
//! Handling is therefore serialized: every notification is processed to
//! completion before the next one is looked at, and each one republishes a
//! record derived from a complete snapshot rather than from the one value
//! that changed.

use crate::retry::RetryCoordinator;
use crate::traits::{EngineState, PlaybackSignals, SignalSnapshot};
use bridge_traits::{NowPlayingInfo, NowPlayingSink};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Static description of what is playing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl TrackMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            artist: None,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }
}

/// Derivation of the now-playing record from the playback signals.
pub trait NowPlayingExt {
    fn from_snapshot(snapshot: &SignalSnapshot, metadata: &TrackMetadata) -> Self;
}

impl NowPlayingExt for NowPlayingInfo {
    /// Pure: equal inputs always give an equal record.
    ///
    /// The rate is reported as `0.0` unless the engine is playing, and the
    /// stream counts as live while its duration is still unknown.
    fn from_snapshot(snapshot: &SignalSnapshot, metadata: &TrackMetadata) -> Self {
        NowPlayingInfo {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            elapsed_seconds: snapshot.time.as_secs_f64(),
            duration_seconds: snapshot.duration.as_secs_f64(),
            playback_rate: if snapshot.state == EngineState::Playing {
                snapshot.rate
            } else {
                0.0
            },
            is_live_stream: snapshot.duration.is_zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Initial,
    Error,
    Time,
    Duration,
    Rate,
    State,
    Metadata,
}

impl Change {
    fn as_str(&self) -> &'static str {
        match self {
            Change::Initial => "initial",
            Change::Error => "error",
            Change::Time => "time",
            Change::Duration => "duration",
            Change::Rate => "rate",
            Change::State => "state",
            Change::Metadata => "metadata",
        }
    }
}

pub struct StateSynchronizer {
    signals: PlaybackSignals,
    metadata: watch::Receiver<TrackMetadata>,
    sink: Arc<dyn NowPlayingSink>,
    retry: Arc<RetryCoordinator>,
    events: Option<EventBus>,
}

impl StateSynchronizer {
    pub fn new(
        signals: PlaybackSignals,
        metadata: watch::Receiver<TrackMetadata>,
        sink: Arc<dyn NowPlayingSink>,
        retry: Arc<RetryCoordinator>,
    ) -> Self {
        Self {
            signals,
            metadata,
            sink,
            retry,
            events: None,
        }
    }

    /// Mirrors every handled change as a [`PlaybackEvent`] on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Spawns the dispatch task on the current tokio runtime.
    pub fn spawn(self) -> SynchronizerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        SynchronizerHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        debug!("State synchronizer started");
        self.handle(Change::Initial);

        loop {
            let change = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.sink.clear();
                    info!("State synchronizer stopped");
                    return;
                }
                changed = self.signals.error.changed() => changed.map(|_| Change::Error),
                changed = self.signals.time.changed() => changed.map(|_| Change::Time),
                changed = self.signals.duration.changed() => changed.map(|_| Change::Duration),
                changed = self.signals.rate.changed() => changed.map(|_| Change::Rate),
                changed = self.signals.state.changed() => changed.map(|_| Change::State),
                changed = self.metadata.changed() => changed.map(|_| Change::Metadata),
            };

            match change {
                Ok(change) => self.handle(change),
                Err(_) => {
                    debug!("Signal source closed, state synchronizer exiting");
                    return;
                }
            }
        }
    }

    fn handle(&self, change: Change) {
        let snapshot = self.signals.snapshot();
        let metadata = self.metadata.borrow().clone();

        debug!(
            signal = change.as_str(),
            state = %snapshot.state,
            time_ms = snapshot.time.as_millis() as u64,
            duration_ms = snapshot.duration.as_millis() as u64,
            rate = snapshot.rate,
            error = snapshot.error.as_deref().unwrap_or(""),
            "Playback signal changed"
        );

        // An error already present at startup counts as a change too.
        if matches!(change, Change::Error | Change::Initial) {
            if let Some(message) = &snapshot.error {
                self.retry.present_failure(message.clone());
            }
        }

        self.sink
            .publish(NowPlayingInfo::from_snapshot(&snapshot, &metadata));

        if let Some(event) = event_for(change, &snapshot, &metadata) {
            if let Some(bus) = &self.events {
                let _ = bus.emit(CoreEvent::Playback(event));
            }
        }
    }
}

fn event_for(
    change: Change,
    snapshot: &SignalSnapshot,
    metadata: &TrackMetadata,
) -> Option<PlaybackEvent> {
    match change {
        Change::Initial => None,
        Change::Error => snapshot.error.as_ref().map(|message| PlaybackEvent::Error {
            message: message.clone(),
            recoverable: true,
        }),
        Change::Time => Some(PlaybackEvent::PositionChanged {
            position_ms: snapshot.time.as_millis() as u64,
            duration_ms: snapshot.duration.as_millis() as u64,
        }),
        Change::Duration => Some(PlaybackEvent::DurationChanged {
            duration_ms: snapshot.duration.as_millis() as u64,
        }),
        Change::Rate => Some(PlaybackEvent::RateChanged {
            rate: snapshot.rate,
        }),
        Change::State => Some(PlaybackEvent::StateChanged {
            state: snapshot.state.as_str().to_string(),
        }),
        Change::Metadata => Some(PlaybackEvent::MetadataChanged {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
        }),
    }
}

/// Handle to the running synchronizer task.
///
/// Dropping the handle cancels the task as well.
#[derive(Debug)]
pub struct SynchronizerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SynchronizerHandle {
    /// Stops the task, clears the now-playing display and waits for exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SynchronizerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
