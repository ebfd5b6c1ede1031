//! # Desktop Bridge Implementations
//!
//! Default implementations of the media-session bridge traits for desktop
//! hosts (macOS, Windows, Linux) and for tests.
//!
//! ## Overview
//!
//! - `NowPlayingSink` using `tracing` ([`TracingNowPlayingSink`]); the last
//!   published record is retained so hosts can poll it
//! - `RemoteCommandCenter` as an in-process registry
//!   ([`InProcessCommandCenter`]); media-key handlers or tests dispatch
//!   commands into whichever handler is registered
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{InProcessCommandCenter, TracingNowPlayingSink};
//! use bridge_traits::RemoteCommand;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(TracingNowPlayingSink::new());
//! let center = Arc::new(InProcessCommandCenter::new());
//!
//! // ... build a CoreConfig with both, start a session ...
//!
//! let status = center.dispatch(RemoteCommand::TogglePlayPause).await;
//! ```

mod now_playing;
mod remote;

pub use now_playing::TracingNowPlayingSink;
pub use remote::InProcessCommandCenter;
