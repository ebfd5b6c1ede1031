//! # Playback & Streaming Module
//!
//! Moves encoded audio from producers into a host playback engine and keeps
//! the host control surface in step with the engine.
//!
//! ## Overview
//!
//! - [`source`]: lazy chunk producers (local file, speech synthesis)
//! - [`stream_cache`]: single-flight memoization of one request's chunks
//! - [`controller`]: gated façade over the [`PlaybackEngine`]
//! - [`synchronizer`]: signal → now-playing / retry state propagation
//! - [`remote`]: remote command transport → controller dispatch
//! - [`retry`]: user-facing failure state

pub mod config;
pub mod controller;
pub mod error;
pub mod remote;
pub mod retry;
pub mod source;
pub mod stream_cache;
pub mod synchronizer;
pub mod traits;

pub use config::PlaybackConfig;
pub use controller::PlaybackController;
pub use error::{PlaybackError, Result};
pub use remote::RemoteCommandRouter;
pub use retry::{RetryCoordinator, RetryState};
pub use source::{ChunkSource, StreamRequest};
pub use stream_cache::{CacheStatus, StreamCache};
pub use synchronizer::{NowPlayingExt, StateSynchronizer, SynchronizerHandle, TrackMetadata};
pub use traits::{
    ChunkStream, EngineState, PlaybackEngine, PlaybackSignals, SignalPublisher, SignalSnapshot,
};
