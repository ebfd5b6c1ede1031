//! # Event Bus System
//!
//! Decoupled notification of what the playback core is doing, built on
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐
//! │ StreamCache  ├────────────>│           │
//! └──────────────┘             │           │   subscribe   ┌────────────┐
//! ┌──────────────┐    emit     │ EventBus  ├──────────────>│ Subscriber │
//! │ Synchronizer ├────────────>│ (broadcast│               └────────────┘
//! └──────────────┘             │  channel) │   subscribe   ┌────────────┐
//! ┌──────────────┐    emit     │           ├──────────────>│ Subscriber │
//! │ RemoteRouter ├────────────>│           │               └────────────┘
//! └──────────────┘             └───────────┘
//! ```
//!
//! Emitting never blocks. Subscribers that fall behind receive
//! `RecvError::Lagged(n)` and may keep reading; `RecvError::Closed` means
//! every sender is gone.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus, EventStream};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut cache_events =
//!     EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Cache(_)));
//!
//! bus.emit(CoreEvent::Cache(CacheEvent::Reset)).ok();
//! assert_eq!(cache_events.recv().await.unwrap(), CoreEvent::Cache(CacheEvent::Reset));
//! # }
//! ```

use bridge_traits::{CommandStatus, RemoteCommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Engine signal changes as observed by the synchronizer
    Playback(PlaybackEvent),
    /// Stream cache activity
    Cache(CacheEvent),
    /// Remote command dispatch
    Remote(RemoteEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Remote(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::Discarded { .. }) => EventSeverity::Warning,
            CoreEvent::Remote(RemoteEvent::Dispatched { status, .. }) if !status.is_success() => {
                EventSeverity::Warning
            }
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Cache(CacheEvent::Committed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Changes to the engine's observable signals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new stream was handed to the engine.
    Started {
        /// Short description of the request (file name or voice/model).
        request: String,
        title: Option<String>,
    },
    /// Engine state changed (`initial`, `playing`, `paused`, `completed`, `failed`).
    StateChanged { state: String },
    /// Elapsed time changed (milliseconds).
    PositionChanged { position_ms: u64, duration_ms: u64 },
    /// Total duration became known or changed (milliseconds, 0 = unknown).
    DurationChanged { duration_ms: u64 },
    RateChanged { rate: f32 },
    /// Static title/artist of the current request changed.
    MetadataChanged {
        title: Option<String>,
        artist: Option<String>,
    },
    /// The engine reported a failure.
    Error {
        message: String,
        /// Whether the user can retry.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::DurationChanged { .. } => "Playback duration changed",
            PlaybackEvent::RateChanged { .. } => "Playback rate changed",
            PlaybackEvent::MetadataChanged { .. } => "Track metadata changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Stream cache activity, keyed by a printable form of the request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// Content served from a completed entry.
    Hit { key: String, bytes: u64 },
    /// Nothing cached; the producer was invoked.
    Miss { key: String },
    /// A caller joined an in-progress production.
    Joined { key: String },
    /// Production finished cleanly and the entry became complete.
    Committed { key: String, bytes: u64 },
    /// Accumulated data was thrown away (failure, abandonment, supersession).
    Discarded { key: String, reason: String },
    /// The cache was cleared on request.
    Reset,
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Hit { .. } => "Cache hit",
            CacheEvent::Miss { .. } => "Cache miss",
            CacheEvent::Joined { .. } => "Joined in-progress production",
            CacheEvent::Committed { .. } => "Cache entry committed",
            CacheEvent::Discarded { .. } => "Cache accumulation discarded",
            CacheEvent::Reset => "Cache reset",
        }
    }
}

// ============================================================================
// Remote Events
// ============================================================================

/// Remote command transport activity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum RemoteEvent {
    /// Router registered with a command center.
    Bound { commands: usize, skip_interval_ms: u64 },
    /// Router removed from a command center.
    Unbound,
    /// A command was handled and acknowledged.
    Dispatched {
        command: RemoteCommand,
        status: CommandStatus,
    },
}

impl RemoteEvent {
    fn description(&self) -> &str {
        match self {
            RemoteEvent::Bound { .. } => "Remote commands bound",
            RemoteEvent::Unbound => "Remote commands unbound",
            RemoteEvent::Dispatched { .. } => "Remote command dispatched",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus shares the underlying channel. Each call to
/// [`subscribe`](EventBus::subscribe) creates an independent receiver that
/// sees every event emitted afterwards.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers, or an error when nobody is
    /// subscribed. Producers in this workspace ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate applied on receipt.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`/`try_recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
