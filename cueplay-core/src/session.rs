use crate::config::PlaybackConfig;
use crate::cue::CueSheet;
use crate::engine::{EngineError, EngineReadings, PlaybackEngine};
use crate::error::{CoreError, Result};
use crate::playback::{PlaybackMode, PlaybackState, StatusReport, TransportStatus};
use crate::time::format_clock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Result of a pause/resume/stop request.
///
/// `NotPlaying` and `NotPaused` are benign no-ops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportOutcome {
    #[serde(rename = "paused")]
    Paused,
    #[serde(rename = "resumed")]
    Resumed,
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "not playing")]
    NotPlaying,
    #[serde(rename = "not paused")]
    NotPaused,
}

/// Where to seek
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Fraction of the current length, `0.0..=1.0`
    Fraction(f64),
    /// Milliseconds; track-relative when a cue track is active
    AbsoluteMs(u64),
}

/// The single playback session shared by all request handlers.
///
/// Transport commands serialize on `command`, which owns the authoritative
/// [`PlaybackState`] and is held for the whole command, engine calls
/// included. Each command publishes its state to `published`, so
/// [`status`](Self::status) never waits behind a load in progress.
pub struct PlaybackSession {
    engine: Box<dyn PlaybackEngine>,
    command: Mutex<PlaybackState>,
    published: RwLock<PlaybackState>,
    seek_settle: Duration,
    /// When set, media outside this folder is refused
    media_root: Option<PathBuf>,
}

impl PlaybackSession {
    /// Create a new session owning `engine`
    #[must_use]
    pub fn new(engine: impl PlaybackEngine + 'static, config: &PlaybackConfig) -> Arc<Self> {
        Self::build(engine, config, None)
    }

    /// Create a session that only plays media under `root`.
    ///
    /// Applies to the files named by cue sheets as well, so a sheet cannot
    /// reach outside the library through an absolute or `..` `FILE` name.
    #[must_use]
    pub fn with_media_root(
        engine: impl PlaybackEngine + 'static,
        config: &PlaybackConfig,
        root: impl Into<PathBuf>,
    ) -> Arc<Self> {
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        Self::build(engine, config, Some(root))
    }

    fn build(
        engine: impl PlaybackEngine + 'static,
        config: &PlaybackConfig,
        media_root: Option<PathBuf>,
    ) -> Arc<Self> {
        info!(
            "Playback session using {} engine (seek settle {:?})",
            engine.name(),
            config.seek_settle()
        );

        Arc::new(Self {
            engine: Box::new(engine),
            command: Mutex::new(PlaybackState::default()),
            published: RwLock::new(PlaybackState::default()),
            seek_settle: config.seek_settle(),
            media_root,
        })
    }

    /// Load and play a plain audio file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileNotFound`] if `path` does not exist,
    /// [`CoreError::PathOutsideLibrary`] if it lies outside the media root,
    /// or [`CoreError::EngineFailure`] if the engine rejects a command.
    pub async fn load_plain(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            warn!("Refusing to play missing file {}", path.display());
            return Err(CoreError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let media = self.confine(path)?;

        let mut state = self.command.lock().await;
        self.start_source(&mut state, &media, PlaybackState::plain(media.clone()), 0)
            .await?;

        info!("Playing {}", path.display());
        Ok(())
    }

    /// Load a cue sheet and play one of its tracks (the first by default).
    ///
    /// Starts the track's physical file from the beginning, then seeks to
    /// the track start once the configured settle delay has passed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::FileNotFound`] if the sheet or its audio file is
    /// missing, [`CoreError::MalformedSheet`] if parsing fails,
    /// [`CoreError::NoTracks`] for an empty sheet, [`CoreError::TrackNotFound`]
    /// for an unknown track number, [`CoreError::TrackHasNoFile`] when the
    /// track has no `FILE`, [`CoreError::PathOutsideLibrary`] when the sheet
    /// or its audio file lies outside the media root, or
    /// [`CoreError::EngineFailure`].
    pub async fn load_cue(&self, cue_path: impl AsRef<Path>, track: Option<u32>) -> Result<()> {
        let cue_path = cue_path.as_ref();
        if !cue_path.is_file() {
            warn!("Refusing to play missing cue sheet {}", cue_path.display());
            return Err(CoreError::FileNotFound {
                path: cue_path.to_path_buf(),
            });
        }

        self.confine(cue_path)?;
        let sheet = CueSheet::from_path(cue_path)?;
        let target = match track {
            Some(number) => sheet.track(number).ok_or(CoreError::TrackNotFound {
                path: cue_path.to_path_buf(),
                track: number,
            })?,
            None => sheet.first_track().ok_or(CoreError::NoTracks {
                path: cue_path.to_path_buf(),
            })?,
        };

        let source = target
            .source_file
            .as_deref()
            .ok_or(CoreError::TrackHasNoFile {
                track: target.number,
            })?;
        let audio_path = resolve_source(cue_path, source);
        if !audio_path.is_file() {
            warn!(
                "Cue sheet {} references missing file {}",
                cue_path.display(),
                audio_path.display()
            );
            return Err(CoreError::FileNotFound { path: audio_path });
        }
        let audio_path = self.confine(&audio_path)?;

        let number = target.number;
        let start_ms = target.start_ms;
        let next = PlaybackState::cue_indexed(audio_path.clone(), Arc::new(sheet), number);

        let mut state = self.command.lock().await;
        self.start_source(&mut state, &audio_path, next, start_ms)
            .await?;

        info!(
            "Playing track {} of {} from {} ({})",
            number,
            cue_path.display(),
            format_clock(start_ms),
            audio_path.display()
        );
        Ok(())
    }

    /// Pause playback.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveMedia`] if nothing is loaded, or
    /// [`CoreError::EngineFailure`].
    pub async fn pause(&self) -> Result<TransportOutcome> {
        let mut state = self.command.lock().await;
        if state.mode == PlaybackMode::Idle {
            return Err(CoreError::NoActiveMedia);
        }
        if state.transport != TransportStatus::Playing {
            debug!("Pause ignored, transport is {:?}", state.transport);
            return Ok(TransportOutcome::NotPlaying);
        }

        self.engine.pause()?;
        state.transport = TransportStatus::Paused;
        self.publish(&state).await;

        info!("Playback paused");
        Ok(TransportOutcome::Paused)
    }

    /// Resume paused playback.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveMedia`] if nothing is loaded, or
    /// [`CoreError::EngineFailure`].
    pub async fn resume(&self) -> Result<TransportOutcome> {
        let mut state = self.command.lock().await;
        if state.mode == PlaybackMode::Idle {
            return Err(CoreError::NoActiveMedia);
        }
        if state.transport != TransportStatus::Paused {
            debug!("Resume ignored, transport is {:?}", state.transport);
            return Ok(TransportOutcome::NotPaused);
        }

        // Engine pause toggles back to playing
        self.engine.pause()?;
        state.transport = TransportStatus::Playing;
        self.publish(&state).await;

        info!("Playback resumed");
        Ok(TransportOutcome::Resumed)
    }

    /// Stop playback, keeping the loaded source for status queries.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EngineFailure`] if the engine fails to stop.
    pub async fn stop(&self) -> Result<TransportOutcome> {
        let mut state = self.command.lock().await;

        self.engine.stop()?;
        state.transport = TransportStatus::Stopped;
        self.publish(&state).await;

        info!("Playback stopped");
        Ok(TransportOutcome::Stopped)
    }

    /// Seek within the loaded source.
    ///
    /// For a cue track, positions are relative to the track and the engine
    /// target never passes the track end.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveMedia`] if nothing is loaded,
    /// [`CoreError::InvalidSeek`] for a non-finite fraction, or
    /// [`CoreError::EngineFailure`].
    pub async fn seek(&self, target: SeekTarget) -> Result<()> {
        let state = self.command.lock().await;
        let length_ms = self.engine.length_ms();
        let known_length = (length_ms > 0).then_some(length_ms);

        let engine_ms = match state.mode {
            PlaybackMode::Idle => return Err(CoreError::NoActiveMedia),
            PlaybackMode::PlainFile => match target {
                SeekTarget::AbsoluteMs(ms) => known_length.map_or(ms, |len| ms.min(len)),
                SeekTarget::Fraction(fraction) => scale(length_ms, fraction)?,
            },
            PlaybackMode::CueIndexed => {
                let track = state.active_track().ok_or(CoreError::NoActiveMedia)?;
                let end = track.end_ms.or(known_length);
                let offset = match target {
                    SeekTarget::AbsoluteMs(ms) => ms,
                    SeekTarget::Fraction(fraction) => {
                        let span = end.map_or(0, |end| end.saturating_sub(track.start_ms));
                        scale(span, fraction)?
                    }
                };
                let absolute = track.start_ms.saturating_add(offset);
                end.map_or(absolute, |end| absolute.min(end))
            }
        };

        debug!("Seeking engine to {} ms ({:?})", engine_ms, target);
        self.engine.set_position_ms(engine_ms)?;
        Ok(())
    }

    /// Report what is playing, with cue tracks in track-relative terms.
    pub async fn status(&self) -> StatusReport {
        let state = self.published.read().await.clone();
        StatusReport::compute(&state, EngineReadings::capture(self.engine.as_ref()))
    }

    /// Last committed session state
    pub async fn state(&self) -> PlaybackState {
        self.published.read().await.clone()
    }

    /// Replace the loaded source.
    ///
    /// `next` is published as soon as the engine is playing the new file, so
    /// status during the settle delay already describes it. If any engine
    /// call fails once the old source was stopped, the engine is stopped and
    /// the session falls back to `Idle`; the two never disagree about what
    /// is loaded.
    async fn start_source(
        &self,
        state: &mut PlaybackState,
        media: &Path,
        next: PlaybackState,
        start_ms: u64,
    ) -> Result<()> {
        if state.transport.is_active() || self.engine.is_playing() {
            self.engine.stop()?;
        }

        debug!("Engine load {}", media.display());
        if let Err(e) = self.engine.load(media).and_then(|()| self.engine.play()) {
            return Err(self.abandon(state, e).await);
        }

        *state = next;
        self.publish(state).await;

        if start_ms > 0 {
            // Engines may drop seeks issued before playback has begun
            tokio::time::sleep(self.seek_settle).await;
            debug!("Engine seek to track start {} ms", start_ms);
            if let Err(e) = self.engine.set_position_ms(start_ms) {
                return Err(self.abandon(state, e).await);
            }
        }
        Ok(())
    }

    /// Stop whatever the engine holds after a failed load and fall back to `Idle`
    async fn abandon(&self, state: &mut PlaybackState, err: EngineError) -> CoreError {
        warn!("Engine failed while starting playback: {}", err);
        if let Err(stop_err) = self.engine.stop() {
            warn!("Engine also failed to stop: {}", stop_err);
        }

        *state = PlaybackState::default();
        self.publish(state).await;
        err.into()
    }

    /// Canonical form of `path`, refused if it lies outside the media root
    fn confine(&self, path: &Path) -> Result<PathBuf> {
        let Some(root) = &self.media_root else {
            return Ok(path.to_path_buf());
        };

        let resolved = std::fs::canonicalize(path).map_err(|_| CoreError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        if !resolved.starts_with(root) {
            warn!("Refusing media outside the library: {}", resolved.display());
            return Err(CoreError::PathOutsideLibrary { path: resolved });
        }
        Ok(resolved)
    }

    async fn publish(&self, state: &PlaybackState) {
        *self.published.write().await = state.clone();
    }
}

/// Resolve a `FILE` name against the directory holding the cue sheet
fn resolve_source(cue_path: &Path, source: &str) -> PathBuf {
    cue_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(source)
}

/// `fraction` of `span`, clamped to the span
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scale(span: u64, fraction: f64) -> Result<u64> {
    if !fraction.is_finite() {
        return Err(CoreError::InvalidSeek {
            reason: format!("fraction {fraction} is not a number"),
        });
    }

    // Clamped to [0, 1], so the product stays within 0..=span
    let fraction = fraction.clamp(0.0, 1.0);
    Ok(((span as f64) * fraction).round() as u64)
}
