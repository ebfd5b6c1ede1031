//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{AudioContainer, NowPlayingInfo, NowPlayingSink};
use bytes::Bytes;
use core_playback::{
    ChunkStream, EngineState, PlaybackEngine, PlaybackError, PlaybackSignals, Result,
    SignalPublisher,
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// In-memory engine that drains the stream it is given.
///
/// When the stream ends the engine completes, unless built with
/// [`FakeEngine::holding`], in which case it keeps "playing" until stopped.
pub struct FakeEngine {
    publisher: Arc<SignalPublisher>,
    received: Arc<Mutex<Vec<Bytes>>>,
    volume: Mutex<f32>,
    starts: AtomicUsize,
    seeks: Mutex<Vec<Duration>>,
    formats: Mutex<Vec<AudioContainer>>,
    task: Mutex<Option<JoinHandle<()>>>,
    complete_on_end: bool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    pub fn holding() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    fn build(complete_on_end: bool) -> Self {
        Self {
            publisher: Arc::new(SignalPublisher::new()),
            received: Arc::new(Mutex::new(Vec::new())),
            volume: Mutex::new(1.0),
            starts: AtomicUsize::new(0),
            seeks: Mutex::new(Vec::new()),
            formats: Mutex::new(Vec::new()),
            task: Mutex::new(None),
            complete_on_end,
        }
    }

    /// Direct access to the signal senders, to simulate engine progress.
    pub fn publisher(&self) -> &SignalPublisher {
        &self.publisher
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().concat()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.seeks.lock().clone()
    }

    pub fn formats(&self) -> Vec<AudioContainer> {
        self.formats.lock().clone()
    }

    /// Waits until the engine reports `target`.
    pub async fn wait_for_state(&self, target: EngineState) {
        let mut state = self.publisher.subscribe().state;
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == target))
            .await
            .expect("timed out waiting for engine state")
            .expect("signal channel closed");
    }

    fn abort_task(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl PlaybackEngine for FakeEngine {
    async fn start(&self, mut stream: ChunkStream, format: AudioContainer) -> Result<()> {
        self.abort_task();
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.formats.lock().push(format);
        self.received.lock().clear();

        self.publisher.set_error(None);
        self.publisher.set_time(Duration::ZERO);
        self.publisher.set_state(EngineState::Playing);

        let publisher = Arc::clone(&self.publisher);
        let received = Arc::clone(&self.received);
        let complete_on_end = self.complete_on_end;
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => received.lock().push(chunk),
                    Err(err) => {
                        publisher.set_error(Some(err.to_string()));
                        publisher.set_state(EngineState::Failed);
                        return;
                    }
                }
            }
            if complete_on_end {
                publisher.set_state(EngineState::Completed);
            }
        });
        *self.task.lock() = Some(task);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if self.publisher.snapshot().state == EngineState::Playing {
            self.publisher.set_state(EngineState::Paused);
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        if self.publisher.snapshot().state == EngineState::Paused {
            self.publisher.set_state(EngineState::Playing);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.abort_task();
        self.publisher.set_time(Duration::ZERO);
        self.publisher.set_state(EngineState::Initial);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.seeks.lock().push(position);
        self.publisher.set_time(position);
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        *self.volume.lock() = volume;
        Ok(())
    }

    fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    fn set_rate(&self, rate: f32) -> Result<()> {
        if rate <= 0.0 {
            return Err(PlaybackError::InvalidRate(rate));
        }
        self.publisher.set_rate(rate);
        Ok(())
    }

    fn signals(&self) -> PlaybackSignals {
        self.publisher.subscribe()
    }
}

/// Now-playing sink recording every call.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<NowPlayingInfo>>,
    clears: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn published(&self) -> Vec<NowPlayingInfo> {
        self.published.lock().clone()
    }

    pub fn last(&self) -> Option<NowPlayingInfo> {
        self.published.lock().last().cloned()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` records were published.
    pub async fn wait_for_count(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.published.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for now-playing updates");
    }
}

impl NowPlayingSink for RecordingSink {
    fn publish(&self, info: NowPlayingInfo) {
        self.published.lock().push(info);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn chunk(data: &'static [u8]) -> Result<Bytes> {
    Ok(Bytes::from_static(data))
}
