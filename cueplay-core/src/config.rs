use crate::error::{CoreError, Result};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5000;

/// Default delay between starting playback and seeking to a cue track
pub const DEFAULT_SEEK_SETTLE_MS: u64 = 200;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub library: LibraryConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root folder served to clients; nothing outside it is reachable
    #[serde(default)]
    pub music_dir: PathBuf,
    /// File extensions listed as playable audio (without the dot)
    #[serde(default = "default_audio_extensions")]
    pub audio_extensions: Vec<String>,
}

fn default_audio_extensions() -> Vec<String> {
    ["mp3", "wav", "flac", "ogg", "m4a"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl LibraryConfig {
    #[must_use]
    pub fn new(music_dir: impl Into<PathBuf>) -> Self {
        Self {
            music_dir: music_dir.into(),
            audio_extensions: default_audio_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Some engines ignore seeks issued before playback has started
    #[serde(default = "default_seek_settle_ms")]
    pub seek_settle_ms: u64,
}

const fn default_seek_settle_ms() -> u64 {
    DEFAULT_SEEK_SETTLE_MS
}

impl PlaybackConfig {
    #[must_use]
    pub const fn seek_settle(&self) -> Duration {
        Duration::from_millis(self.seek_settle_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            seek_settle_ms: default_seek_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Also write logs to the cache directory
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    /// Get the config file path (~/.config/cueplay/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed, or fails validation.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            // Create config directory if it doesn't exist
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        Self::load(&config_path)
    }

    /// Load and validate config from a specific file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate config from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this structure or
    /// required fields are missing.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.library.music_dir.as_os_str().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "library.music_dir".to_string(),
            });
        }
        if !self.library.music_dir.is_dir() {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "library.music_dir {} is not a directory",
                    self.library.music_dir.display()
                ),
            });
        }
        if self.library.audio_extensions.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "library.audio_extensions must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# cueplay Configuration
# ~/.config/cueplay/config.toml

[server]
host = "0.0.0.0"
port = "#,
    DEFAULT_PORT,
    r#"

[library]
# Required: folder containing your audio files and cue sheets
music_dir = ""
audio_extensions = ["mp3", "wav", "flac", "ogg", "m4a"]

[playback]
# Delay before seeking to a cue track once playback has started
seek_settle_ms = "#,
    DEFAULT_SEEK_SETTLE_MS,
    r#"

[logging]
# Also write logs to the cache directory
enabled = false
"#
);
