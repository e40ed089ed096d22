use crate::error::{CoreError, Result};
use crate::time::timecode_to_ms;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::trace;

/// Parsed cue sheet: the ordered logical tracks of one or more album files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CueSheet {
    tracks: Vec<Track>,
}

/// A logical track embedded in a physical audio file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub number: u32,
    pub title: Option<String>,
    /// Name from the `FILE` directive in force when the track was declared
    pub source_file: Option<String>,
    /// Offset into `source_file` from `INDEX 01`
    pub start_ms: u64,
    /// Start of the next track in the same file, `None` for the last one
    pub end_ms: Option<u64>,
}

/// A syntax error that makes the whole sheet untrustworthy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct SheetSyntaxError {
    pub line: usize,
    pub reason: String,
}

impl CueSheet {
    /// Read and parse a cue sheet from disk.
    ///
    /// Sheets are decoded lossily so Latin-1 titles do not reject the file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedSheet`] if the file cannot be read or
    /// contains a corrupt track number or timecode.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| CoreError::MalformedSheet {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::parse(&String::from_utf8_lossy(&bytes)).map_err(|e| CoreError::MalformedSheet {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse cue sheet text.
    ///
    /// Unknown directives are skipped, so sheets carrying `REM`, `PERFORMER`,
    /// `FLAGS` and the like parse fine.
    ///
    /// # Errors
    ///
    /// Returns a [`SheetSyntaxError`] for a non-integer `TRACK` number or a
    /// malformed `INDEX 01` timecode.
    pub fn parse(input: &str) -> std::result::Result<Self, SheetSyntaxError> {
        let mut current_file: Option<String> = None;
        let mut tracks: Vec<Track> = Vec::new();

        for (idx, raw) in input.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim_start_matches('\u{feff}').trim();
            if line.is_empty() {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };
            let syntax_error = |reason: String| SheetSyntaxError {
                line: line_no,
                reason,
            };

            if keyword.eq_ignore_ascii_case("FILE") {
                if let Some(name) = quoted_or_token(line, tokens.next()) {
                    current_file = Some(name);
                }
            } else if keyword.eq_ignore_ascii_case("TRACK") {
                let token = tokens
                    .next()
                    .ok_or_else(|| syntax_error("TRACK without a number".to_string()))?;
                let number = token
                    .parse::<u32>()
                    .map_err(|_| syntax_error(format!("invalid track number {token:?}")))?;

                tracks.push(Track {
                    number,
                    title: None,
                    source_file: current_file.clone(),
                    start_ms: 0,
                    end_ms: None,
                });
            } else if keyword.eq_ignore_ascii_case("TITLE") {
                // Before the first TRACK this is the album title
                if let Some(track) = tracks.last_mut() {
                    track.title = quoted_or_rest(line, keyword);
                }
            } else if keyword.eq_ignore_ascii_case("INDEX") {
                let Some(track) = tracks.last_mut() else {
                    continue;
                };
                let index_token = tokens
                    .next()
                    .ok_or_else(|| syntax_error("INDEX without a number".to_string()))?;
                let index = index_token
                    .parse::<u32>()
                    .map_err(|_| syntax_error(format!("invalid index number {index_token:?}")))?;

                // INDEX 00 marks the pre-gap; playback starts at INDEX 01
                if index != 1 {
                    continue;
                }

                let timecode = tokens
                    .next()
                    .ok_or_else(|| syntax_error("INDEX 01 without a timecode".to_string()))?;
                track.start_ms = parse_timecode(timecode)
                    .ok_or_else(|| syntax_error(format!("invalid timecode {timecode:?}")))?;
            } else {
                trace!("Skipping cue directive at line {}: {}", line_no, keyword);
            }
        }

        derive_end_offsets(&mut tracks);

        Ok(Self { tracks })
    }

    /// All tracks in sheet order
    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Find a track by its `TRACK` number
    #[must_use]
    pub fn track(&self, number: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }

    /// The first track in sheet order
    #[must_use]
    pub fn first_track(&self) -> Option<&Track> {
        self.tracks.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Track {
    /// Length of the track, `None` when it runs to the end of the file
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_ms.map(|end| end.saturating_sub(self.start_ms))
    }
}

/// Each track ends where the next track of the same file starts.
fn derive_end_offsets(tracks: &mut [Track]) {
    let mut next_start: HashMap<Option<String>, u64> = HashMap::new();

    for track in tracks.iter_mut().rev() {
        track.end_ms = next_start.get(&track.source_file).copied();
        next_start.insert(track.source_file.clone(), track.start_ms);
    }
}

/// Parse an `mm:ss:ff` timecode into milliseconds
fn parse_timecode(s: &str) -> Option<u64> {
    let mut parts = s.split(':');
    let minutes = parts.next()?.parse::<u64>().ok()?;
    let seconds = parts.next()?.parse::<u64>().ok()?;
    let frames = parts.next()?.parse::<u64>().ok()?;

    if parts.next().is_some() {
        return None;
    }

    timecode_to_ms(minutes, seconds, frames)
}

/// First double-quoted string on the line, falling back to the bare token
fn quoted_or_token(line: &str, token: Option<&str>) -> Option<String> {
    quoted(line).or_else(|| token.map(str::to_string))
}

/// First double-quoted string on the line, falling back to everything after the keyword
fn quoted_or_rest(line: &str, keyword: &str) -> Option<String> {
    quoted(line).or_else(|| {
        let rest = line[keyword.len()..].trim();
        (!rest.is_empty()).then(|| rest.to_string())
    })
}

fn quoted(line: &str) -> Option<String> {
    let start = line.find('"')? + 1;
    let len = line[start..].find('"')?;
    Some(line[start..start + len].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALBUM: &str = r#"
REM GENRE Rock
PERFORMER "Some Band"
TITLE "Some Album"
FILE "album.flac" WAVE
  TRACK 01 AUDIO
    TITLE "Opening"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Middle"
    INDEX 00 02:58:00
    INDEX 01 03:00:00
  TRACK 03 AUDIO
    TITLE "Closing"
    INDEX 01 06:02:00
"#;

    #[test]
    fn test_parse_album() {
        let sheet = CueSheet::parse(ALBUM).unwrap();
        assert_eq!(sheet.len(), 3);

        let starts: Vec<u64> = sheet.tracks().iter().map(|t| t.start_ms).collect();
        assert_eq!(starts, vec![0, 180_000, 362_000]);

        let titles: Vec<_> = sheet.tracks().iter().map(|t| t.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("Opening"), Some("Middle"), Some("Closing")]);

        assert!(sheet
            .tracks()
            .iter()
            .all(|t| t.source_file.as_deref() == Some("album.flac")));
    }

    #[test]
    fn test_end_offsets_follow_next_track() {
        let sheet = CueSheet::parse(ALBUM).unwrap();
        let tracks = sheet.tracks();
        assert_eq!(tracks[0].end_ms, Some(180_000));
        assert_eq!(tracks[1].end_ms, Some(362_000));
        assert_eq!(tracks[2].end_ms, None);
        assert_eq!(tracks[1].duration_ms(), Some(182_000));
        assert_eq!(tracks[2].duration_ms(), None);
    }

    #[test]
    fn test_end_offsets_per_file() {
        let input = r#"
FILE "disc1.flac" WAVE
TRACK 1 AUDIO
INDEX 01 00:00:00
TRACK 2 AUDIO
INDEX 01 04:00:00
FILE "disc2.flac" WAVE
TRACK 3 AUDIO
INDEX 01 00:00:00
TRACK 4 AUDIO
INDEX 01 05:00:00
"#;
        let sheet = CueSheet::parse(input).unwrap();
        let ends: Vec<_> = sheet.tracks().iter().map(|t| t.end_ms).collect();
        assert_eq!(ends, vec![Some(240_000), None, Some(300_000), None]);
        assert_eq!(sheet.track(3).unwrap().source_file.as_deref(), Some("disc2.flac"));
    }

    #[test]
    fn test_parse_empty_sheet() {
        let sheet = CueSheet::parse("").unwrap();
        assert!(sheet.is_empty());
        assert!(sheet.first_track().is_none());
    }

    #[test]
    fn test_parse_sheet_without_tracks() {
        let sheet = CueSheet::parse("TITLE \"Album\"\nFILE \"a.flac\" WAVE\n").unwrap();
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_frame_conversion_truncates() {
        let sheet = CueSheet::parse("TRACK 1 AUDIO\nINDEX 01 00:02:37").unwrap();
        assert_eq!(sheet.tracks()[0].start_ms, 2481);
    }

    #[test]
    fn test_index_00_ignored() {
        let input = "FILE \"a.flac\" WAVE\nTRACK 1 AUDIO\nINDEX 00 00:01:00\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(sheet.tracks()[0].start_ms, 0);

        let input = "TRACK 1 AUDIO\nINDEX 01 00:05:00\nINDEX 00 00:01:00\nINDEX 02 00:09:00\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(sheet.tracks()[0].start_ms, 5000);
    }

    #[test]
    fn test_title_before_track_ignored() {
        let input = "TITLE \"Album Title\"\nTRACK 1 AUDIO\nINDEX 01 00:00:00\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(sheet.tracks()[0].title, None);
    }

    #[test]
    fn test_index_before_track_ignored() {
        let sheet = CueSheet::parse("INDEX 01 00:10:00\nTRACK 1 AUDIO\n").unwrap();
        assert_eq!(sheet.tracks()[0].start_ms, 0);
    }

    #[test]
    fn test_track_without_file() {
        let sheet = CueSheet::parse("TRACK 1 AUDIO\nINDEX 01 00:00:00\n").unwrap();
        assert_eq!(sheet.tracks()[0].source_file, None);
    }

    #[test]
    fn test_directives_case_insensitive() {
        let input = "file \"a.wav\" wave\ntrack 7 audio\n  title \"Lower\"\n  index 01 01:00:00\n";
        let sheet = CueSheet::parse(input).unwrap();
        let track = sheet.track(7).unwrap();
        assert_eq!(track.source_file.as_deref(), Some("a.wav"));
        assert_eq!(track.title.as_deref(), Some("Lower"));
        assert_eq!(track.start_ms, 60_000);
    }

    #[test]
    fn test_crlf_and_bom() {
        let input = "\u{feff}FILE \"a.flac\" WAVE\r\nTRACK 01 AUDIO\r\nINDEX 01 00:01:00\r\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(sheet.tracks()[0].start_ms, 1000);
        assert_eq!(sheet.tracks()[0].source_file.as_deref(), Some("a.flac"));
    }

    #[test]
    fn test_unquoted_names() {
        let input = "FILE album.flac WAVE\nTRACK 1 AUDIO\nTITLE Plain Title\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(sheet.tracks()[0].source_file.as_deref(), Some("album.flac"));
        assert_eq!(sheet.tracks()[0].title.as_deref(), Some("Plain Title"));
    }

    #[test]
    fn test_quoted_name_with_spaces() {
        let input = "FILE \"My Album (Remaster).flac\" WAVE\nTRACK 1 AUDIO\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(
            sheet.tracks()[0].source_file.as_deref(),
            Some("My Album (Remaster).flac")
        );
    }

    #[test]
    fn test_invalid_track_number_fails() {
        let err = CueSheet::parse("TRACK one AUDIO\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("track number"));

        assert!(CueSheet::parse("TRACK\n").is_err());
    }

    #[test]
    fn test_malformed_timecode_fails() {
        for timecode in ["00:02", "00:02:37:01", "aa:02:37", "00:xx:00", "00:00:"] {
            let input = format!("TRACK 1 AUDIO\nINDEX 01 {timecode}\n");
            let err = CueSheet::parse(&input).unwrap_err();
            assert_eq!(err.line, 2, "timecode {timecode}");
        }

        assert!(CueSheet::parse("TRACK 1 AUDIO\nINDEX 01\n").is_err());
    }

    #[test]
    fn test_timecode_overflow_fails() {
        for timecode in [
            "999999999999999999:00:00",
            "00:18446744073709551615:00",
            "00:00:18446744073709551615",
        ] {
            let input = format!("TRACK 1 AUDIO\nINDEX 01 {timecode}\n");
            let err = CueSheet::parse(&input).unwrap_err();
            assert_eq!(err.line, 2, "timecode {timecode}");
            assert!(err.reason.contains("invalid timecode"));
        }
    }

    #[test]
    fn test_unknown_directives_skipped() {
        let input = "CATALOG 1234567890123\nFLAGS DCP\nTRACK 1 AUDIO\nISRC ABC\nPOSTGAP 00:02:00\n";
        let sheet = CueSheet::parse(input).unwrap();
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn test_from_path_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("album.cue");
        std::fs::write(&path, ALBUM).unwrap();

        let first = CueSheet::from_path(&path).unwrap();
        let second = CueSheet::from_path(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_path_latin1_title() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("album.cue");
        let mut bytes = b"TRACK 1 AUDIO\nTITLE \"Caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\"\n");
        std::fs::write(&path, bytes).unwrap();

        let sheet = CueSheet::from_path(&path).unwrap();
        assert_eq!(sheet.tracks()[0].title.as_deref(), Some("Caf\u{fffd}"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = CueSheet::from_path("/nonexistent/album.cue").unwrap_err();
        assert!(matches!(err, CoreError::MalformedSheet { .. }));
    }

    #[test]
    fn test_from_path_reports_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cue");
        std::fs::write(&path, "TRACK 1 AUDIO\nINDEX 01 00:0\n").unwrap();

        match CueSheet::from_path(&path).unwrap_err() {
            CoreError::MalformedSheet { path: p, reason } => {
                assert_eq!(p, path);
                assert!(reason.starts_with("line 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
