use crate::engine::EngineError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error("Config file not found at {path}. A template has been created - please set library.music_dir and restart.")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    // Library errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Path escapes the music library: {path}")]
    PathOutsideLibrary { path: PathBuf },

    // Cue sheet errors
    #[error("Malformed cue sheet {path}: {reason}")]
    MalformedSheet { path: PathBuf, reason: String },

    #[error("Cue sheet {path} contains no tracks")]
    NoTracks { path: PathBuf },

    #[error("Track {track} not found in cue sheet {path}")]
    TrackNotFound { path: PathBuf, track: u32 },

    #[error("Track {track} is not preceded by a FILE directive")]
    TrackHasNoFile { track: u32 },

    // Transport errors
    #[error("No media loaded")]
    NoActiveMedia,

    #[error("Invalid seek target: {reason}")]
    InvalidSeek { reason: String },

    #[error("Playback engine failed: {0}")]
    EngineFailure(#[from] EngineError),

    // IO errors
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
