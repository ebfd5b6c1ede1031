//! # Cached File Playback Example
//!
//! Streams a generated file through the stream cache into a toy engine
//! twice: the first run reads the file block by block, the second is served
//! from the cache in one chunk.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use async_trait::async_trait;
use bridge_traits::{AudioContainer, LogLevel};
use core_playback::{
    ChunkSource, ChunkStream, EngineState, PlaybackConfig, PlaybackController, PlaybackEngine,
    PlaybackSignals, Result, SignalPublisher, StreamCache, StreamRequest,
};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Engine that counts chunks and bytes instead of decoding them.
struct CountingEngine {
    publisher: Arc<SignalPublisher>,
}

#[async_trait]
impl PlaybackEngine for CountingEngine {
    async fn start(&self, mut stream: ChunkStream, format: AudioContainer) -> Result<()> {
        let publisher = Arc::clone(&self.publisher);
        publisher.set_state(EngineState::Playing);
        tokio::spawn(async move {
            let (mut chunks, mut bytes) = (0usize, 0usize);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        chunks += 1;
                        bytes += chunk.len();
                    }
                    Err(err) => {
                        publisher.set_error(Some(err.to_string()));
                        publisher.set_state(EngineState::Failed);
                        return;
                    }
                }
            }
            println!("  engine drained {chunks} chunk(s), {bytes} bytes of {format}");
            publisher.set_state(EngineState::Completed);
        });
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.publisher.set_state(EngineState::Paused);
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.publisher.set_state(EngineState::Playing);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.publisher.set_state(EngineState::Initial);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> Result<()> {
        self.publisher.set_time(position);
        Ok(())
    }

    fn set_volume(&self, _volume: f32) -> Result<()> {
        Ok(())
    }

    fn volume(&self) -> f32 {
        1.0
    }

    fn set_rate(&self, rate: f32) -> Result<()> {
        self.publisher.set_rate(rate);
        Ok(())
    }

    fn signals(&self) -> PlaybackSignals {
        self.publisher.subscribe()
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Debug),
    )?;

    let mut file = tempfile::Builder::new().suffix(".wav").tempfile()?;
    file.write_all(&vec![0u8; 10_000])?;

    let engine = Arc::new(CountingEngine {
        publisher: Arc::new(SignalPublisher::new()),
    });
    let controller = PlaybackController::new(engine.clone());
    let config = PlaybackConfig::default();
    let cache = StreamCache::new();
    let request = StreamRequest::File(file.path().to_path_buf());

    for run in 1..=2 {
        println!("Run {run}: {:?}", cache.status(&request));
        let source = ChunkSource::from_request(&request, None, &config)?;
        let stream = cache.create_stream(request.clone(), move || source.into_stream());
        controller.start(stream, request.format()).await?;

        let mut state = controller.signals().state;
        state.wait_for(|s| *s == EngineState::Completed).await?;
    }

    println!("Final: {:?}", cache.status(&request));
    Ok(())
}
