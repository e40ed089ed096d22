pub mod config;
pub mod cue;
pub mod engine;
pub mod engines;
pub mod error;
pub mod library;
pub mod paths;
pub mod playback;
pub mod session;
pub mod time;

pub use config::{Config, LibraryConfig, LoggingConfig, PlaybackConfig, ServerConfig};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use cue::{CueSheet, SheetSyntaxError, Track};
pub use engine::{EngineError, EngineReadings, EngineState, PlaybackEngine};
pub use engines::ClockEngine;
pub use error::{CoreError, Result};
pub use library::{CueTrackEntry, Entry, Library, Listing};
pub use paths::{config_dir, config_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
pub use playback::{PlaybackMode, PlaybackState, StatusReport, TrackStatus, TransportStatus};
pub use session::{PlaybackSession, SeekTarget, TransportOutcome};
pub use time::{format_clock, DurationExt};
