//! Now Playing Sink Implementation

use bridge_traits::{NowPlayingInfo, NowPlayingSink};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Desktop now-playing sink.
///
/// Desktop shells have no system media overlay we can drive portably, so
/// published records are logged and kept for the host to poll.
#[derive(Default)]
pub struct TracingNowPlayingSink {
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    last: Option<NowPlayingInfo>,
    publish_count: u64,
}

impl TracingNowPlayingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent record, `None` before the first publish or after `clear`.
    pub fn last_published(&self) -> Option<NowPlayingInfo> {
        self.state.lock().last.clone()
    }

    /// Number of `publish` calls since creation.
    pub fn publish_count(&self) -> u64 {
        self.state.lock().publish_count
    }
}

impl NowPlayingSink for TracingNowPlayingSink {
    fn publish(&self, info: NowPlayingInfo) {
        debug!(
            title = info.title.as_deref().unwrap_or(""),
            artist = info.artist.as_deref().unwrap_or(""),
            elapsed = info.elapsed_seconds,
            duration = info.duration_seconds,
            rate = info.playback_rate,
            live = info.is_live_stream,
            "Now playing updated"
        );

        let mut state = self.state.lock();
        state.last = Some(info);
        state.publish_count += 1;
    }

    fn clear(&self) {
        info!("Now playing cleared");
        self.state.lock().last = None;
    }
}
