//! # Core Playback Traits
//!
//! Abstractions the playback core drives. The engine itself (decoding,
//! buffering, audio output) lives in the host; the core only hands it a
//! [`ChunkStream`] and observes it through [`PlaybackSignals`].
//!
//! ## Signals
//!
//! The engine exposes five independently changing values, each on its own
//! `tokio::sync::watch` channel:
//!
//! | Signal     | Type              | Meaning                                 |
//! |------------|-------------------|-----------------------------------------|
//! | `state`    | [`EngineState`]   | Lifecycle state                         |
//! | `time`     | `Duration`        | Elapsed playback time                   |
//! | `duration` | `Duration`        | Total duration, zero while unknown      |
//! | `rate`     | `f32`             | Configured playback rate                |
//! | `error`    | `Option<String>`  | Latest failure, `None` when healthy     |
//!
//! No signal implies the value of another; consumers that need a coherent
//! view take a [`SignalSnapshot`].
//!
//! Engine implementations can use [`SignalPublisher`] to own the sending
//! half of all five channels.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use core_playback::{ChunkStream, PlaybackEngine};
//! use bridge_traits::AudioContainer;
//!
//! async fn play(engine: &dyn PlaybackEngine, stream: ChunkStream) -> core_playback::Result<()> {
//!     engine.start(stream, AudioContainer::Mp3).await?;
//!     let mut state = engine.signals().state;
//!     while state.changed().await.is_ok() {
//!         println!("state: {:?}", *state.borrow());
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::AudioContainer;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::sync::watch;

/// Lazy, finite, ordered and non-restartable sequence of encoded audio chunks.
///
/// The stream ends either cleanly or with a single terminal `Err` item.
pub type ChunkStream = BoxStream<'static, std::result::Result<Bytes, PlaybackError>>;

// ============================================================================
// Engine State
// ============================================================================

/// Lifecycle state reported by the engine.
///
/// ```text
/// Initial ──start──> Playing <──pause/resume──> Paused
///                       │
///                       └──end of data──> Completed
/// any ──failure──> Failed        any ──stop──> Initial
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Initial,
    Playing,
    Paused,
    Completed,
    Failed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Initial => "initial",
            EngineState::Playing => "playing",
            EngineState::Paused => "paused",
            EngineState::Completed => "completed",
            EngineState::Failed => "failed",
        }
    }

    /// Whether a new stream may be started from this state.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            EngineState::Initial | EngineState::Completed | EngineState::Failed
        )
    }

    /// Whether a stream is loaded and either playing or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, EngineState::Playing | EngineState::Paused)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Signals
// ============================================================================

/// Receiving half of the engine's five signal channels.
#[derive(Debug, Clone)]
pub struct PlaybackSignals {
    pub state: watch::Receiver<EngineState>,
    pub time: watch::Receiver<Duration>,
    pub duration: watch::Receiver<Duration>,
    pub rate: watch::Receiver<f32>,
    pub error: watch::Receiver<Option<String>>,
}

impl PlaybackSignals {
    /// Reads the latest value of all five signals.
    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            state: *self.state.borrow(),
            time: *self.time.borrow(),
            duration: *self.duration.borrow(),
            rate: *self.rate.borrow(),
            error: self.error.borrow().clone(),
        }
    }
}

/// Latest values of all five signals, read together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub state: EngineState,
    pub time: Duration,
    pub duration: Duration,
    pub rate: f32,
    pub error: Option<String>,
}

impl Default for SignalSnapshot {
    fn default() -> Self {
        Self {
            state: EngineState::Initial,
            time: Duration::ZERO,
            duration: Duration::ZERO,
            rate: 1.0,
            error: None,
        }
    }
}

/// Sending half of the five signal channels.
///
/// Every setter notifies receivers even when the value is unchanged, so
/// observers see repeated notifications the way real engines emit them.
#[derive(Debug)]
pub struct SignalPublisher {
    state: watch::Sender<EngineState>,
    time: watch::Sender<Duration>,
    duration: watch::Sender<Duration>,
    rate: watch::Sender<f32>,
    error: watch::Sender<Option<String>>,
}

impl SignalPublisher {
    pub fn new() -> Self {
        let initial = SignalSnapshot::default();
        Self {
            state: watch::Sender::new(initial.state),
            time: watch::Sender::new(initial.time),
            duration: watch::Sender::new(initial.duration),
            rate: watch::Sender::new(initial.rate),
            error: watch::Sender::new(initial.error),
        }
    }

    pub fn subscribe(&self) -> PlaybackSignals {
        PlaybackSignals {
            state: self.state.subscribe(),
            time: self.time.subscribe(),
            duration: self.duration.subscribe(),
            rate: self.rate.subscribe(),
            error: self.error.subscribe(),
        }
    }

    pub fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
    }

    pub fn set_time(&self, time: Duration) {
        self.time.send_replace(time);
    }

    pub fn set_duration(&self, duration: Duration) {
        self.duration.send_replace(duration);
    }

    pub fn set_rate(&self, rate: f32) {
        self.rate.send_replace(rate);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.error.send_replace(error);
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        SignalSnapshot {
            state: *self.state.borrow(),
            time: *self.time.borrow(),
            duration: *self.duration.borrow(),
            rate: *self.rate.borrow(),
            error: self.error.borrow().clone(),
        }
    }
}

impl Default for SignalPublisher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Playback Engine
// ============================================================================

/// Host playback engine consuming chunk streams.
///
/// `start` takes ownership of the stream and returns once the engine has
/// accepted it; the engine then pulls chunks at its own pace, so
/// backpressure flows from the engine to the producer. Dropping the stream
/// (on `stop` or a new `start`) cancels production.
///
/// Failures while playing are reported through the `error` and `state`
/// signals, not through the returned `Result`.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Begin consuming `stream`; `format` is a decoding hint.
    async fn start(&self, stream: ChunkStream, format: AudioContainer) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Drop the current stream and return to `Initial`.
    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position: Duration) -> Result<()>;

    fn set_volume(&self, volume: f32) -> Result<()>;

    fn volume(&self) -> f32;

    fn set_rate(&self, rate: f32) -> Result<()>;

    fn signals(&self) -> PlaybackSignals;

    /// Volume values the engine accepts.
    fn volume_range(&self) -> RangeInclusive<f32> {
        0.0..=1.0
    }

    /// Playback rates the engine accepts.
    fn rate_range(&self) -> RangeInclusive<f32> {
        (1.0 / 32.0)..=32.0
    }
}
