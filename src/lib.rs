//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `speech-player-workspace`
//! and enable `desktop-shims` to receive the session façade together with the
//! desktop bridge implementations, without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
