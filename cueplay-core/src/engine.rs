//! Playback engine abstraction.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Playback state as reported live by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Nothing loaded yet
    #[default]
    Idle,
    Playing,
    Paused,
    Stopped,
    /// Reached the end of the media
    Ended,
    /// Playback aborted by an engine-side failure
    Error,
}

impl EngineState {
    /// Whether the engine has finished with the current media and will not
    /// continue without a new load.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }
}

/// Errors raised by a playback engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not open or decode the media.
    #[error("Failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// A transport command was issued with no media loaded.
    #[error("No media loaded in engine")]
    NoMedia,

    /// Opaque failure from the engine backend.
    #[error("Engine backend error: {0}")]
    Backend(String),
}

/// The audio decoder/output that actually renders a file.
///
/// Implementations must be internally synchronized: the session issues
/// mutating calls one at a time, but status queries read position, length
/// and state concurrently with them. All calls are expected to return
/// quickly.
pub trait PlaybackEngine: Send + Sync {
    /// Returns a human-readable name for this engine.
    fn name(&self) -> &'static str;

    /// Replace the current media with the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    fn load(&self, path: &Path) -> Result<(), EngineError>;

    /// Start playback of the loaded media.
    ///
    /// # Errors
    ///
    /// Returns an error if no media is loaded or the backend fails.
    fn play(&self) -> Result<(), EngineError>;

    /// Toggle between playing and paused.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn pause(&self) -> Result<(), EngineError>;

    /// Stop playback and rewind.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn stop(&self) -> Result<(), EngineError>;

    /// Seek to an absolute offset into the loaded file.
    ///
    /// # Errors
    ///
    /// Returns an error if no media is loaded or the backend fails.
    fn set_position_ms(&self, position_ms: u64) -> Result<(), EngineError>;

    /// Current absolute position into the loaded file.
    fn position_ms(&self) -> u64;

    /// Length of the loaded file, 0 when unknown.
    fn length_ms(&self) -> u64;

    fn is_playing(&self) -> bool;

    fn state(&self) -> EngineState;
}

/// One consistent set of live readings taken from an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineReadings {
    pub state: EngineState,
    pub position_ms: u64,
    pub length_ms: u64,
}

impl EngineReadings {
    /// Read state, position and length from `engine`
    #[must_use]
    pub fn capture(engine: &dyn PlaybackEngine) -> Self {
        Self {
            state: engine.state(),
            position_ms: engine.position_ms(),
            length_ms: engine.length_ms(),
        }
    }
}
