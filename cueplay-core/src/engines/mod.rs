//! Built-in [`PlaybackEngine`](crate::PlaybackEngine) implementations.

pub mod clock;

pub use clock::ClockEngine;
