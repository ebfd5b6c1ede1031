//! # Playback Controller
//!
//! Façade over a [`PlaybackEngine`] that enforces the start gate and the
//! seek, volume and rate bounds before anything reaches the engine.

use crate::error::{PlaybackError, Result};
use crate::traits::{ChunkStream, EngineState, PlaybackEngine, PlaybackSignals, SignalSnapshot};
use bridge_traits::AudioContainer;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub struct PlaybackController {
    engine: Arc<dyn PlaybackEngine>,
    signals: PlaybackSignals,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn PlaybackEngine>) -> Self {
        let signals = engine.signals();
        Self { engine, signals }
    }

    /// Hands `stream` to the engine.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::InvalidState`] while a stream is playing or paused;
    /// the engine is not touched in that case.
    #[instrument(skip(self, stream))]
    pub async fn start(&self, stream: ChunkStream, format: AudioContainer) -> Result<()> {
        let state = self.state();
        if !state.can_start() {
            return Err(PlaybackError::InvalidState(format!(
                "cannot start a new stream while {}",
                state
            )));
        }
        info!("Starting playback");
        self.engine.start(stream, format).await
    }

    pub async fn pause(&self) -> Result<()> {
        debug!("Pause");
        self.engine.pause().await
    }

    pub async fn resume(&self) -> Result<()> {
        debug!("Resume");
        self.engine.resume().await
    }

    pub async fn stop(&self) -> Result<()> {
        debug!("Stop");
        self.engine.stop().await
    }

    /// Seeks to `to`, clamped to the duration once it is known.
    ///
    /// Returns the position actually requested from the engine.
    pub async fn seek(&self, to: Duration) -> Result<Duration> {
        let target = self.clamp_to_duration(to);
        debug!(target_ms = target.as_millis() as u64, "Seek");
        self.engine.seek(target).await?;
        Ok(target)
    }

    /// Seeks back by `by`, stopping at zero.
    pub async fn rewind(&self, by: Duration) -> Result<Duration> {
        self.seek(self.time().saturating_sub(by)).await
    }

    /// Seeks ahead by `by`, never past the known duration.
    pub async fn forward(&self, by: Duration) -> Result<Duration> {
        self.seek(self.time().saturating_add(by)).await
    }

    fn clamp_to_duration(&self, position: Duration) -> Duration {
        let duration = self.duration();
        if duration.is_zero() {
            position
        } else {
            position.min(duration)
        }
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    /// Sets the volume clamped to the engine's range; returns the applied value.
    pub fn set_volume(&self, volume: f32) -> Result<f32> {
        if !volume.is_finite() {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        let range = self.engine.volume_range();
        let applied = volume.clamp(*range.start(), *range.end());
        self.engine.set_volume(applied)?;
        Ok(applied)
    }

    pub fn rate(&self) -> f32 {
        *self.signals.rate.borrow()
    }

    /// Sets the playback rate clamped to the engine's range; returns the
    /// applied value.
    pub fn set_rate(&self, rate: f32) -> Result<f32> {
        if !rate.is_finite() {
            return Err(PlaybackError::InvalidRate(rate));
        }
        let range = self.engine.rate_range();
        let applied = rate.clamp(*range.start(), *range.end());
        self.engine.set_rate(applied)?;
        Ok(applied)
    }

    pub fn state(&self) -> EngineState {
        *self.signals.state.borrow()
    }

    pub fn time(&self) -> Duration {
        *self.signals.time.borrow()
    }

    pub fn duration(&self) -> Duration {
        *self.signals.duration.borrow()
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        self.signals.snapshot()
    }

    /// Fresh receivers for all five signals.
    pub fn signals(&self) -> PlaybackSignals {
        self.signals.clone()
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("engine", &"PlaybackEngine { ... }")
            .field("state", &self.state())
            .finish()
    }
}
