//! Speech Synthesis Abstraction
//!
//! Contract for the remote text-to-speech collaborator. The core treats the
//! synthesizer as an opaque producer: one asynchronous call that yields an
//! ordered stream of encoded audio byte chunks.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BridgeError, Result};

/// Ordered stream of encoded audio bytes produced by a host collaborator.
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, BridgeError>>;

/// Audio container formats a synthesis request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioContainer {
    #[default]
    Mp3,
    Opus,
    Aac,
    Flac,
    Wav,
    Pcm,
}

impl AudioContainer {
    /// Wire name of the container.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioContainer::Mp3 => "mp3",
            AudioContainer::Opus => "opus",
            AudioContainer::Aac => "aac",
            AudioContainer::Flac => "flac",
            AudioContainer::Wav => "wav",
            AudioContainer::Pcm => "pcm",
        }
    }

    /// Guess the container from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioContainer::Mp3),
            "opus" | "ogg" => Some(AudioContainer::Opus),
            "aac" | "m4a" => Some(AudioContainer::Aac),
            "flac" => Some(AudioContainer::Flac),
            "wav" | "wave" => Some(AudioContainer::Wav),
            "pcm" | "raw" => Some(AudioContainer::Pcm),
            _ => None,
        }
    }
}

impl fmt::Display for AudioContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Voices offered by the synthesis collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

/// Synthesis models offered by the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SpeechModel {
    #[default]
    #[serde(rename = "tts-1")]
    Tts1,
    #[serde(rename = "tts-1-hd")]
    Tts1Hd,
}

/// Parameters for a single synthesis request.
///
/// Two requests are the same logical input when every field matches, which is
/// what the stream cache keys on.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeechRequest {
    /// API credential forwarded to the collaborator. Never logged.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    pub voice: Voice,
    pub model: SpeechModel,
    #[serde(rename = "response_format")]
    pub format: AudioContainer,
    pub stream: bool,
    pub input: String,
}

impl SpeechRequest {
    pub fn new(api_key: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            voice: Voice::default(),
            model: SpeechModel::default(),
            format: AudioContainer::default(),
            stream: true,
            input: input.into(),
        }
    }

    pub fn voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    pub fn model(mut self, model: SpeechModel) -> Self {
        self.model = model;
        self
    }

    pub fn format(mut self, format: AudioContainer) -> Self {
        self.format = format;
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

impl fmt::Debug for SpeechRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechRequest")
            .field("api_key", &"[REDACTED]")
            .field("voice", &self.voice)
            .field("model", &self.model)
            .field("format", &self.format)
            .field("stream", &self.stream)
            .field("input_len", &self.input.len())
            .finish()
    }
}

/// Remote text-to-speech collaborator.
///
/// Implementations issue one request per call. Failures before the first
/// chunk are returned from `synthesize`; failures after that are delivered as
/// the terminal item of the returned stream.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SpeechRequest) -> Result<ByteStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let request = SpeechRequest::new("sk-secret", "hello");
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_request_wire_names() {
        let request = SpeechRequest::new("key", "hi")
            .voice(Voice::Nova)
            .model(SpeechModel::Tts1Hd)
            .format(AudioContainer::Opus);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["voice"], "nova");
        assert_eq!(json["model"], "tts-1-hd");
        assert_eq!(json["response_format"], "opus");
        assert_eq!(json["stream"], true);
        assert!(json.get("api_key").is_none());
    }

    #[test]
    fn test_container_from_extension() {
        assert_eq!(AudioContainer::from_extension("MP3"), Some(AudioContainer::Mp3));
        assert_eq!(AudioContainer::from_extension("m4a"), Some(AudioContainer::Aac));
        assert_eq!(AudioContainer::from_extension("txt"), None);
    }

    #[test]
    fn test_request_equality_tracks_every_field() {
        let a = SpeechRequest::new("key", "hello");
        let b = a.clone().voice(Voice::Echo);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
