//! # Chunk Sources
//!
//! Producers of [`ChunkStream`]s: a local file read in fixed-size blocks on a
//! blocking worker, or a remote speech synthesis call.
//!
//! Both variants are lazy. Nothing is opened or requested until the returned
//! stream is first polled, and dropping the stream stops production.
//!
//! ```text
//! File:     spawn_blocking ──blocks──> mpsc(depth) ──> ChunkStream
//! Network:  SpeechSynthesizer::synthesize ──ByteStream──> ChunkStream
//! ```

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::traits::ChunkStream;
use bridge_traits::{AudioContainer, SpeechRequest, SpeechSynthesizer};
use bytes::Bytes;
use core_runtime::logging::strip_path;
use futures::stream::{self, StreamExt};
use futures::Stream;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

// ============================================================================
// Requests
// ============================================================================

/// Logical input of a playback: what gets produced and cached.
///
/// Two requests are equal exactly when they would produce the same bytes,
/// which is what the stream cache keys on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum StreamRequest {
    /// Local audio file
    File(PathBuf),
    /// Remote text-to-speech synthesis
    Speech(SpeechRequest),
}

impl StreamRequest {
    /// Container hint handed to the engine.
    pub fn format(&self) -> AudioContainer {
        match self {
            StreamRequest::File(path) => path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(AudioContainer::from_extension)
                .unwrap_or_default(),
            StreamRequest::Speech(request) => request.format,
        }
    }

    /// Short printable form for logs and events; never includes credentials.
    pub fn describe(&self) -> String {
        match self {
            StreamRequest::File(path) => strip_path(&path.to_string_lossy()).to_string(),
            StreamRequest::Speech(request) => format!(
                "speech:{:?}/{:?}/{} ({} chars)",
                request.voice,
                request.model,
                request.format,
                request.input.chars().count()
            ),
        }
    }
}

impl fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamRequest::File(path) => f.debug_tuple("File").field(path).finish(),
            StreamRequest::Speech(request) => f.debug_tuple("Speech").field(request).finish(),
        }
    }
}

impl From<PathBuf> for StreamRequest {
    fn from(path: PathBuf) -> Self {
        StreamRequest::File(path)
    }
}

impl From<SpeechRequest> for StreamRequest {
    fn from(request: SpeechRequest) -> Self {
        StreamRequest::Speech(request)
    }
}

// ============================================================================
// Chunk Source
// ============================================================================

/// A producer able to turn one request into one chunk stream.
#[derive(Clone)]
pub enum ChunkSource {
    File {
        path: PathBuf,
        chunk_bytes: usize,
        channel_depth: usize,
    },
    Network {
        synthesizer: Arc<dyn SpeechSynthesizer>,
        request: SpeechRequest,
    },
}

impl ChunkSource {
    pub fn file(path: impl Into<PathBuf>, config: &PlaybackConfig) -> Self {
        ChunkSource::File {
            path: path.into(),
            chunk_bytes: config.file_chunk_bytes.max(1),
            channel_depth: config.file_channel_depth.max(1),
        }
    }

    pub fn network(synthesizer: Arc<dyn SpeechSynthesizer>, request: SpeechRequest) -> Self {
        ChunkSource::Network {
            synthesizer,
            request,
        }
    }

    /// Picks the variant matching `request`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::SynthesizerUnavailable`] for a speech request when no
    /// synthesizer is configured.
    pub fn from_request(
        request: &StreamRequest,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        config: &PlaybackConfig,
    ) -> Result<Self> {
        match request {
            StreamRequest::File(path) => Ok(Self::file(path.clone(), config)),
            StreamRequest::Speech(speech) => {
                let synthesizer = synthesizer.ok_or(PlaybackError::SynthesizerUnavailable)?;
                Ok(Self::network(synthesizer, speech.clone()))
            }
        }
    }

    /// Converts the source into its lazy chunk stream.
    pub fn into_stream(self) -> ChunkStream {
        match self {
            ChunkSource::File {
                path,
                chunk_bytes,
                channel_depth,
            } => file_stream(path, chunk_bytes, channel_depth),
            ChunkSource::Network {
                synthesizer,
                request,
            } => network_stream(synthesizer, request),
        }
    }
}

impl fmt::Debug for ChunkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSource::File {
                path, chunk_bytes, ..
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("chunk_bytes", chunk_bytes)
                .finish(),
            ChunkSource::Network { request, .. } => f
                .debug_struct("Network")
                .field("request", request)
                .finish(),
        }
    }
}

// ============================================================================
// File Variant
// ============================================================================

enum FileState {
    Pending {
        path: PathBuf,
        chunk_bytes: usize,
        channel_depth: usize,
    },
    Reading {
        receiver: mpsc::Receiver<Result<Bytes>>,
        worker: JoinHandle<()>,
    },
    Done,
}

fn file_stream(path: PathBuf, chunk_bytes: usize, channel_depth: usize) -> ChunkStream {
    let initial = FileState::Pending {
        path,
        chunk_bytes,
        channel_depth,
    };

    stream::unfold(initial, |state| async move {
        let (mut receiver, worker) = match state {
            FileState::Pending {
                path,
                chunk_bytes,
                channel_depth,
            } => {
                let (sender, receiver) = mpsc::channel(channel_depth);
                let worker =
                    tokio::task::spawn_blocking(move || read_blocks(&path, chunk_bytes, sender));
                (receiver, worker)
            }
            FileState::Reading { receiver, worker } => (receiver, worker),
            FileState::Done => return None,
        };

        match receiver.recv().await {
            Some(Ok(chunk)) => Some((Ok(chunk), FileState::Reading { receiver, worker })),
            Some(Err(err)) => Some((Err(err), FileState::Done)),
            // The sender is gone: either a clean end or a worker that died.
            None => match worker.await {
                Ok(()) => None,
                Err(err) => {
                    warn!(error = %err, "File reader stopped unexpectedly");
                    let err = PlaybackError::Internal(format!("file reader stopped: {err}"));
                    Some((Err(err), FileState::Done))
                }
            },
        }
    })
    .boxed()
}

/// Blocking worker: reads `path` block by block into `sender`.
///
/// Returns (closing the file) on end of data, on a read error, or as soon as
/// the receiving stream has been dropped.
fn read_blocks(path: &Path, chunk_bytes: usize, sender: mpsc::Sender<Result<Bytes>>) {
    let display = path.to_string_lossy();
    let file_name = strip_path(&display);

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(file = file_name, error = %err, "Failed to open file, producing no data");
            return;
        }
    };

    debug!(file = file_name, chunk_bytes, "Reading file");
    let mut total: u64 = 0;
    loop {
        let mut block = Vec::with_capacity(chunk_bytes);
        match (&mut file).take(chunk_bytes as u64).read_to_end(&mut block) {
            Ok(0) => {
                debug!(file = file_name, bytes = total, "End of file");
                return;
            }
            Ok(read) => {
                total += read as u64;
                if sender.blocking_send(Ok(Bytes::from(block))).is_err() {
                    debug!(file = file_name, bytes = total, "Consumer dropped, closing file");
                    return;
                }
            }
            Err(err) => {
                warn!(file = file_name, error = %err, bytes = total, "File read failed");
                let _ = sender.blocking_send(Err(PlaybackError::Io(err)));
                return;
            }
        }
    }
}

// ============================================================================
// Network Variant
// ============================================================================

fn network_stream(synthesizer: Arc<dyn SpeechSynthesizer>, request: SpeechRequest) -> ChunkStream {
    let span = info_span!(
        "synthesize",
        voice = ?request.voice,
        model = ?request.model,
        format = %request.format
    );

    let call = async move {
        info!(input_chars = request.input.chars().count(), "Requesting speech");
        synthesizer.synthesize(request).await
    }
    .instrument(span);

    let chunks = stream::once(call).flat_map(|result| match result {
        Ok(bytes) => bytes
            .map(|item| {
                item.map_err(|err| {
                    warn!(error = %err, retryable = err.is_retryable(), "Speech stream failed");
                    PlaybackError::Bridge(err)
                })
            })
            .boxed(),
        Err(err) => {
            warn!(error = %err, retryable = err.is_retryable(), "Speech request failed");
            stream::iter([Err(PlaybackError::Bridge(err))]).boxed()
        }
    });

    stop_after_error(chunks)
}

/// Ends `inner` right after its first error item.
pub(crate) fn stop_after_error<S>(inner: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    stream::unfold((Box::pin(inner), false), |(mut inner, failed)| async move {
        if failed {
            return None;
        }
        let item = inner.next().await?;
        let failed = item.is_err();
        Some((item, (inner, failed)))
    })
    .boxed()
}
