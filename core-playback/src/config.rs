//! # Playback Configuration
//!
//! Tunables for chunk production, remote command skipping and seeking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Interval applied by the skip forward/backward remote commands and
    /// advertised to the command transport.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_skip_interval")]
    pub skip_interval: Duration,

    /// Size of each block read from a local file; every chunk has this size
    /// except possibly the last.
    ///
    /// Default: 4096 bytes.
    #[serde(default = "default_file_chunk_bytes")]
    pub file_chunk_bytes: usize,

    /// Blocks the file reader may have queued ahead of the consumer.
    ///
    /// Default: 1.
    #[serde(default = "default_file_channel_depth")]
    pub file_channel_depth: usize,

    /// Granularity positions from remote commands are rounded to.
    ///
    /// Default: 1 millisecond.
    #[serde(default = "default_seek_precision")]
    pub seek_precision: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            skip_interval: default_skip_interval(),
            file_chunk_bytes: default_file_chunk_bytes(),
            file_channel_depth: default_file_channel_depth(),
            seek_precision: default_seek_precision(),
        }
    }
}

impl PlaybackConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.skip_interval.is_zero() {
            return Err("skip_interval must be > 0".to_string());
        }

        if self.file_chunk_bytes == 0 {
            return Err("file_chunk_bytes must be > 0".to_string());
        }

        if self.file_channel_depth == 0 {
            return Err("file_channel_depth must be > 0".to_string());
        }

        if self.seek_precision.is_zero() {
            return Err("seek_precision must be > 0".to_string());
        }

        Ok(())
    }

    /// Converts an absolute position in seconds to a duration rounded to
    /// `seek_precision`. Negative positions clamp to zero; `None` for
    /// non-finite input.
    pub fn position_from_seconds(&self, seconds: f64) -> Option<Duration> {
        if !seconds.is_finite() {
            return None;
        }
        let step_nanos = self.seek_precision.as_nanos().max(1) as u64;
        let steps = (seconds.max(0.0) * 1e9 / step_nanos as f64).round() as u64;
        Some(Duration::from_nanos(steps.saturating_mul(step_nanos)))
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_skip_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_file_chunk_bytes() -> usize {
    4096
}

fn default_file_channel_depth() -> usize {
    1
}

fn default_seek_precision() -> Duration {
    Duration::from_millis(1)
}
