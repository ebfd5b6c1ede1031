use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioContainer, BridgeError, ByteStream, NowPlayingInfo, NowPlayingSink, SpeechRequest,
    SpeechSynthesizer,
};
use bytes::Bytes;
use core_playback::{ChunkStream, PlaybackError, PlaybackSignals, SignalPublisher};
use core_service::{
    CoreConfig, CoreError, EngineState, PlaybackConfig, PlaybackEngine, PlaybackSession,
    RetryState, StreamRequest, TrackMetadata,
};
use futures::{stream, StreamExt};
use mockall::{mock, Sequence};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

// ============================================================================
// Test doubles
// ============================================================================

struct TestEngine {
    publisher: Arc<SignalPublisher>,
    received: Arc<Mutex<Vec<u8>>>,
    starts: AtomicUsize,
    formats: Mutex<Vec<AudioContainer>>,
    task: Mutex<Option<JoinHandle<()>>>,
    complete_on_end: bool,
}

impl TestEngine {
    fn completing() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn holding() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    fn build(complete_on_end: bool) -> Self {
        Self {
            publisher: Arc::new(SignalPublisher::new()),
            received: Arc::default(),
            starts: AtomicUsize::new(0),
            formats: Mutex::default(),
            task: Mutex::default(),
            complete_on_end,
        }
    }

    async fn wait_for_state(&self, target: EngineState) {
        let mut state = self.publisher.subscribe().state;
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == target))
            .await
            .expect("timed out waiting for engine state")
            .expect("signal channel closed");
    }

    fn received(&self) -> Vec<u8> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl PlaybackEngine for TestEngine {
    async fn start(&self, mut stream: ChunkStream, format: AudioContainer) -> core_playback::Result<()> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.formats.lock().push(format);
        self.received.lock().clear();
        self.publisher.set_error(None);
        self.publisher.set_state(EngineState::Playing);

        let publisher = Arc::clone(&self.publisher);
        let received = Arc::clone(&self.received);
        let complete_on_end = self.complete_on_end;
        *self.task.lock() = Some(tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => received.lock().extend_from_slice(&chunk),
                    Err(err) => {
                        publisher.set_state(EngineState::Failed);
                        publisher.set_error(Some(err.to_string()));
                        return;
                    }
                }
            }
            if complete_on_end {
                publisher.set_state(EngineState::Completed);
            }
        }));
        Ok(())
    }

    async fn pause(&self) -> core_playback::Result<()> {
        self.publisher.set_state(EngineState::Paused);
        Ok(())
    }

    async fn resume(&self) -> core_playback::Result<()> {
        self.publisher.set_state(EngineState::Playing);
        Ok(())
    }

    async fn stop(&self) -> core_playback::Result<()> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.publisher.set_time(Duration::ZERO);
        self.publisher.set_state(EngineState::Initial);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> core_playback::Result<()> {
        self.publisher.set_time(position);
        Ok(())
    }

    fn set_volume(&self, _volume: f32) -> core_playback::Result<()> {
        Ok(())
    }

    fn volume(&self) -> f32 {
        1.0
    }

    fn set_rate(&self, rate: f32) -> core_playback::Result<()> {
        self.publisher.set_rate(rate);
        Ok(())
    }

    fn signals(&self) -> PlaybackSignals {
        self.publisher.subscribe()
    }
}

#[derive(Default)]
struct CountingSink {
    published: Mutex<Vec<NowPlayingInfo>>,
    clears: AtomicUsize,
}

impl NowPlayingSink for CountingSink {
    fn publish(&self, info: NowPlayingInfo) {
        self.published.lock().push(info);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

mock! {
    pub Synth {}

    #[async_trait]
    impl SpeechSynthesizer for Synth {
        async fn synthesize(&self, request: SpeechRequest) -> BridgeResult<ByteStream>;
    }
}

fn bytes_stream(parts: &[&'static [u8]], fail: bool) -> ByteStream {
    let mut items: Vec<BridgeResult<Bytes>> =
        parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
    if fail {
        items.push(Err(BridgeError::StreamInterrupted {
            received: 3,
            reason: "connection reset".into(),
        }));
    }
    stream::iter(items).boxed()
}

fn session_with(
    engine: Arc<TestEngine>,
    sink: Arc<CountingSink>,
    synthesizer: Option<MockSynth>,
) -> PlaybackSession {
    let mut builder = CoreConfig::builder()
        .now_playing_sink(sink)
        .enable_remote_commands(false);
    if let Some(synthesizer) = synthesizer {
        builder = builder.speech_synthesizer(Arc::new(synthesizer));
    }
    PlaybackSession::new(engine, builder.build().unwrap(), PlaybackConfig::default()).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_mid_stream_failure_then_retry_commits_cache() {
    let mut synth = MockSynth::new();
    let mut seq = Sequence::new();
    synth
        .expect_synthesize()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(bytes_stream(&[b"one", b"two", b"three"], true)));
    synth
        .expect_synthesize()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(bytes_stream(&[b"one", b"two", b"three", b"four"], false)));

    let engine = TestEngine::completing();
    let session = session_with(engine.clone(), Arc::default(), Some(synth));
    let request = StreamRequest::Speech(SpeechRequest::new("sk-test", "Good morning"));

    session
        .play(request.clone(), TrackMetadata::new("Greeting"))
        .await
        .unwrap();
    engine.wait_for_state(EngineState::Failed).await;
    assert_eq!(engine.received(), b"onetwothree");

    let mut retry = session.subscribe_retry();
    tokio::time::timeout(
        Duration::from_secs(5),
        retry.wait_for(|state| state.is_presenting_failure),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(session
        .retry_state()
        .error_message
        .unwrap()
        .contains("connection reset"));
    assert_eq!(session.status().cached_bytes, None);

    session.retry().await.unwrap();
    assert!(!session.retry_state().is_presenting_failure);
    engine.wait_for_state(EngineState::Completed).await;
    assert_eq!(engine.received(), b"onetwothreefour");
    assert_eq!(session.status().cached_bytes, Some(15));

    // A repeat request is served from the cache; a third synthesis call
    // would fail the mock.
    session
        .play(request, TrackMetadata::new("Greeting"))
        .await
        .unwrap();
    engine.wait_for_state(EngineState::Completed).await;
    assert_eq!(engine.received(), b"onetwothreefour");
    assert_eq!(engine.starts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_file_completes_without_failure() {
    let engine = TestEngine::completing();
    let session = session_with(engine.clone(), Arc::default(), None);

    session
        .play(
            StreamRequest::File("/nonexistent/chapter.m4a".into()),
            TrackMetadata::new("Chapter"),
        )
        .await
        .unwrap();
    engine.wait_for_state(EngineState::Completed).await;

    let status = session.status();
    assert_eq!(status.state, EngineState::Completed);
    assert_eq!(status.duration_ms, 0);
    assert!(!status.retry.is_presenting_failure);
    assert!(engine.received().is_empty());
    assert_eq!(engine.formats.lock().as_slice(), &[AudioContainer::Aac]);
}

#[tokio::test]
async fn test_speech_without_synthesizer_is_rejected() {
    let engine = TestEngine::completing();
    let session = session_with(engine.clone(), Arc::default(), None);

    let err = session
        .play(
            StreamRequest::Speech(SpeechRequest::new("sk", "hi")),
            TrackMetadata::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::SynthesizerUnavailable)
    ));
    assert_eq!(engine.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_toggle_pauses_resumes_and_replays() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[7u8; 9000]).unwrap();
    let request = StreamRequest::File(file.path().to_path_buf());

    let engine = TestEngine::holding();
    let session = session_with(engine.clone(), Arc::default(), None);

    let err = session.toggle().await.unwrap_err();
    assert!(matches!(err, CoreError::Playback(PlaybackError::NoRequest)));

    session
        .play(request, TrackMetadata::new("Notes"))
        .await
        .unwrap();
    session.toggle().await.unwrap();
    assert_eq!(session.controller().state(), EngineState::Paused);
    session.toggle().await.unwrap();
    assert_eq!(session.controller().state(), EngineState::Playing);

    // From an idle state the last request is replayed.
    session.controller().stop().await.unwrap();
    session.toggle().await.unwrap();
    assert_eq!(engine.starts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_play_stops_active_stream_first() {
    let engine = TestEngine::holding();
    let session = session_with(engine.clone(), Arc::default(), None);

    session
        .play(StreamRequest::File("/nonexistent/a.mp3".into()), TrackMetadata::new("A"))
        .await
        .unwrap();
    assert_eq!(session.controller().state(), EngineState::Playing);

    session
        .play(StreamRequest::File("/nonexistent/b.wav".into()), TrackMetadata::new("B"))
        .await
        .unwrap();
    assert_eq!(engine.starts.load(Ordering::SeqCst), 2);
    assert_eq!(
        engine.formats.lock().as_slice(),
        &[AudioContainer::Mp3, AudioContainer::Wav]
    );
}

#[tokio::test]
async fn test_cancel_retry_clears_failure() {
    let engine = TestEngine::holding();
    let session = session_with(engine.clone(), Arc::default(), None);

    engine.publisher.set_error(Some("decoder error".into()));
    let mut retry = session.subscribe_retry();
    tokio::time::timeout(
        Duration::from_secs(5),
        retry.wait_for(|state| state.is_presenting_failure),
    )
    .await
    .unwrap()
    .unwrap();

    session.cancel_retry();
    assert_eq!(session.retry_state(), RetryState::default());
    assert_eq!(engine.starts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_clears_display_and_stops_engine() {
    let engine = TestEngine::holding();
    let sink = Arc::new(CountingSink::default());
    let session = session_with(engine.clone(), sink.clone(), None);

    session
        .play(StreamRequest::File("/nonexistent/a.mp3".into()), TrackMetadata::new("A"))
        .await
        .unwrap();
    session.shutdown().await.unwrap();

    assert_eq!(sink.clears.load(Ordering::SeqCst), 1);
    assert_eq!(session.controller().state(), EngineState::Initial);
}

#[tokio::test]
async fn test_now_playing_carries_track_metadata() {
    let engine = TestEngine::holding();
    let sink = Arc::new(CountingSink::default());
    let session = session_with(engine.clone(), sink.clone(), None);

    session
        .play(
            StreamRequest::File("/nonexistent/a.mp3".into()),
            TrackMetadata::new("Morning Brief").with_artist("Newsroom"),
        )
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let found = sink
                .published
                .lock()
                .iter()
                .any(|info| info.title.as_deref() == Some("Morning Brief") && info.playback_rate > 0.0);
            if found {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[cfg(feature = "desktop-shims")]
#[tokio::test]
async fn test_skip_forward_clamps_to_duration() {
    use bridge_desktop::InProcessCommandCenter;
    use bridge_traits::{CommandStatus, RemoteCommand};

    let engine = TestEngine::holding();
    let center = Arc::new(InProcessCommandCenter::new());
    let config = CoreConfig::builder()
        .now_playing_sink(Arc::new(CountingSink::default()))
        .remote_commands(center.clone())
        .build()
        .unwrap();
    let session = PlaybackSession::new(engine.clone(), config, PlaybackConfig::default()).unwrap();

    session
        .play(StreamRequest::File("/nonexistent/ten.mp3".into()), TrackMetadata::new("Ten"))
        .await
        .unwrap();
    engine.publisher.set_duration(Duration::from_secs(10));
    engine.publisher.set_time(Duration::ZERO);

    assert_eq!(
        center.dispatch(RemoteCommand::SkipForward).await,
        CommandStatus::Success
    );
    assert_eq!(session.controller().time(), Duration::from_secs(5));

    engine.publisher.set_time(Duration::from_secs(8));
    assert_eq!(
        center.dispatch(RemoteCommand::SkipForward).await,
        CommandStatus::Success
    );
    assert_eq!(session.controller().time(), Duration::from_secs(10));

    session.shutdown().await.unwrap();
    assert!(!center.is_bound());
    assert_eq!(
        center.dispatch(RemoteCommand::Play).await,
        CommandStatus::NoSuchContent
    );
}

#[cfg(feature = "desktop-shims")]
#[tokio::test]
async fn test_desktop_bootstrap_exposes_bound_command_center() {
    use core_service::{bootstrap_desktop, CommandStatus, RemoteCommand};

    let engine = TestEngine::holding();
    let (session, commands) = bootstrap_desktop(engine.clone(), None).unwrap();
    assert!(commands.is_bound());

    session
        .play(StreamRequest::File("/nonexistent/brief.mp3".into()), TrackMetadata::new("Brief"))
        .await
        .unwrap();
    engine.wait_for_state(EngineState::Playing).await;

    assert_eq!(commands.dispatch(RemoteCommand::Pause).await, CommandStatus::Success);
    engine.wait_for_state(EngineState::Paused).await;

    session.shutdown().await.unwrap();
    assert!(!commands.is_bound());
}
