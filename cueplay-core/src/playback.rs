use crate::cue::{CueSheet, Track};
use crate::engine::{EngineReadings, EngineState};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// What kind of source is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    Idle,
    PlainFile,
    CueIndexed,
}

/// Transport status as last commanded through the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportStatus {
    /// Whether the engine is expected to hold live media
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// The single session record of what is loaded and how to report it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub mode: PlaybackMode,
    /// Physical file handed to the engine
    pub loaded_path: Option<PathBuf>,
    /// Present iff `mode == CueIndexed`
    pub cue_sheet: Option<Arc<CueSheet>>,
    pub active_track: Option<u32>,
    pub transport: TransportStatus,
}

impl PlaybackState {
    /// State for a freshly started plain file
    #[must_use]
    pub fn plain(path: PathBuf) -> Self {
        Self {
            mode: PlaybackMode::PlainFile,
            loaded_path: Some(path),
            cue_sheet: None,
            active_track: None,
            transport: TransportStatus::Playing,
        }
    }

    /// State for a freshly started cue track
    #[must_use]
    pub fn cue_indexed(audio_path: PathBuf, sheet: Arc<CueSheet>, track: u32) -> Self {
        Self {
            mode: PlaybackMode::CueIndexed,
            loaded_path: Some(audio_path),
            cue_sheet: Some(sheet),
            active_track: Some(track),
            transport: TransportStatus::Playing,
        }
    }

    /// The track selected at load time, if any
    #[must_use]
    pub fn active_track(&self) -> Option<&Track> {
        let number = self.active_track?;
        self.cue_sheet.as_deref()?.track(number)
    }

    /// File name of the loaded media
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.loaded_path
            .as_deref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Track summary attached to a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackStatus {
    pub number: u32,
    pub title: Option<String>,
}

/// Answer to a status query. `length` and `position` are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub playing: bool,
    pub paused: bool,
    pub ended: bool,
    pub length: u64,
    pub position: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackStatus>,
}

impl StatusReport {
    /// Combine session state with live engine readings.
    ///
    /// A terminal engine state always wins over whatever transport status
    /// the session last stored.
    #[must_use]
    pub fn compute(state: &PlaybackState, readings: EngineReadings) -> Self {
        if state.mode == PlaybackMode::Idle {
            return Self::default();
        }

        let track = state.active_track().map(|t| TrackStatus {
            number: t.number,
            title: t.title.clone(),
        });
        let file = state.file_name();

        if readings.state.is_terminal() {
            return Self {
                file,
                ended: true,
                track,
                ..Self::default()
            };
        }

        let (position, length) = match state.active_track() {
            Some(active) if state.mode == PlaybackMode::CueIndexed => {
                let length = active
                    .duration_ms()
                    .unwrap_or_else(|| readings.length_ms.saturating_sub(active.start_ms));
                (readings.position_ms.saturating_sub(active.start_ms), length)
            }
            _ => (readings.position_ms, readings.length_ms),
        };

        if readings.state == EngineState::Stopped {
            return Self {
                file,
                length,
                track,
                ..Self::default()
            };
        }

        Self {
            file,
            playing: readings.state == EngineState::Playing,
            paused: readings.state == EngineState::Paused,
            ended: false,
            length,
            position,
            track,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALBUM: &str = "FILE \"album.flac\" WAVE\n\
        TRACK 01 AUDIO\nTITLE \"One\"\nINDEX 01 00:00:00\n\
        TRACK 02 AUDIO\nTITLE \"Two\"\nINDEX 01 03:00:00\n\
        TRACK 03 AUDIO\nTITLE \"Three\"\nINDEX 01 06:02:00\n";

    fn cue_state(track: u32) -> PlaybackState {
        let sheet = Arc::new(CueSheet::parse(ALBUM).unwrap());
        PlaybackState::cue_indexed(PathBuf::from("/music/album.flac"), sheet, track)
    }

    fn readings(state: EngineState, position_ms: u64, length_ms: u64) -> EngineReadings {
        EngineReadings {
            state,
            position_ms,
            length_ms,
        }
    }

    #[test]
    fn test_playback_state_default() {
        let state = PlaybackState::default();
        assert_eq!(state.mode, PlaybackMode::Idle);
        assert_eq!(state.transport, TransportStatus::Stopped);
        assert!(state.loaded_path.is_none());
        assert!(state.cue_sheet.is_none());
        assert!(state.active_track().is_none());
    }

    #[test]
    fn test_plain_state() {
        let state = PlaybackState::plain(PathBuf::from("/music/song.mp3"));
        assert_eq!(state.mode, PlaybackMode::PlainFile);
        assert_eq!(state.transport, TransportStatus::Playing);
        assert_eq!(state.file_name().as_deref(), Some("song.mp3"));
        assert!(state.cue_sheet.is_none());
    }

    #[test]
    fn test_active_track_lookup() {
        let state = cue_state(2);
        let track = state.active_track().unwrap();
        assert_eq!(track.start_ms, 180_000);
        assert_eq!(track.end_ms, Some(362_000));
    }

    #[test]
    fn test_status_idle_all_false() {
        let report = StatusReport::compute(
            &PlaybackState::default(),
            readings(EngineState::Playing, 5000, 10_000),
        );
        assert_eq!(report, StatusReport::default());
    }

    #[test]
    fn test_status_plain_reports_raw_values() {
        let state = PlaybackState::plain(PathBuf::from("/music/song.mp3"));
        let report = StatusReport::compute(&state, readings(EngineState::Playing, 42_000, 200_000));
        assert!(report.playing);
        assert!(!report.paused);
        assert_eq!(report.position, 42_000);
        assert_eq!(report.length, 200_000);
        assert_eq!(report.track, None);
        assert_eq!(report.file.as_deref(), Some("song.mp3"));
    }

    #[test]
    fn test_status_cue_track_relative() {
        let report = StatusReport::compute(
            &cue_state(2),
            readings(EngineState::Playing, 200_000, 600_000),
        );
        assert_eq!(report.position, 20_000);
        assert_eq!(report.length, 182_000);
        assert_eq!(
            report.track,
            Some(TrackStatus {
                number: 2,
                title: Some("Two".to_string()),
            })
        );
    }

    #[test]
    fn test_status_last_track_uses_engine_length() {
        let report = StatusReport::compute(
            &cue_state(3),
            readings(EngineState::Playing, 400_000, 600_000),
        );
        assert_eq!(report.position, 38_000);
        assert_eq!(report.length, 238_000);
    }

    #[test]
    fn test_status_position_before_track_start_clamps_to_zero() {
        // Engine has not applied the seek yet
        let report = StatusReport::compute(
            &cue_state(2),
            readings(EngineState::Playing, 150, 600_000),
        );
        assert_eq!(report.position, 0);
    }

    #[test]
    fn test_status_ended_overrides_session() {
        let mut state = cue_state(2);
        state.transport = TransportStatus::Paused;

        let report = StatusReport::compute(&state, readings(EngineState::Ended, 600_000, 600_000));
        assert!(report.ended);
        assert!(!report.playing);
        assert!(!report.paused);
        assert_eq!(report.position, 0);
        assert_eq!(report.length, 0);
        assert_eq!(report.file.as_deref(), Some("album.flac"));
    }

    #[test]
    fn test_status_engine_error_is_terminal() {
        let state = PlaybackState::plain(PathBuf::from("/music/song.mp3"));
        let report = StatusReport::compute(&state, readings(EngineState::Error, 1000, 2000));
        assert!(report.ended);
    }

    #[test]
    fn test_status_engine_stopped_zeroes_position() {
        let mut state = cue_state(2);
        state.transport = TransportStatus::Stopped;

        let report = StatusReport::compute(&state, readings(EngineState::Stopped, 0, 600_000));
        assert!(!report.playing);
        assert!(!report.paused);
        assert!(!report.ended);
        assert_eq!(report.position, 0);
        assert_eq!(report.length, 182_000);
    }

    #[test]
    fn test_status_paused() {
        let state = PlaybackState::plain(PathBuf::from("/music/song.mp3"));
        let report = StatusReport::compute(&state, readings(EngineState::Paused, 1000, 2000));
        assert!(report.paused);
    }

    #[test]
    fn test_status_report_json_shape() {
        let report = StatusReport::compute(
            &cue_state(1),
            readings(EngineState::Playing, 1000, 600_000),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["file"], "album.flac");
        assert_eq!(json["playing"], true);
        assert_eq!(json["length"], 180_000);
        assert_eq!(json["position"], 1000);
        assert_eq!(json["track"]["number"], 1);
        assert_eq!(json["track"]["title"], "One");

        let idle = serde_json::to_value(StatusReport::default()).unwrap();
        assert!(idle.get("file").is_none());
        assert!(idle.get("track").is_none());
        assert_eq!(idle["ended"], false);
    }

    #[test]
    fn test_transport_is_active() {
        assert!(TransportStatus::Playing.is_active());
        assert!(TransportStatus::Paused.is_active());
        assert!(!TransportStatus::Stopped.is_active());
    }
}
