use crate::engine::{EngineError, EngineState, PlaybackEngine};
use crate::time::DurationExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::time::Instant;
use tracing::debug;

const LOG_TARGET: &str = "cueplay::engine::clock";

/// Headless engine that keeps transport timing without rendering audio.
///
/// The file length is probed with symphonia on load; position advances with
/// a monotonic clock while playing. Once the position reaches a known length
/// the engine reports [`EngineState::Ended`]. Uses the tokio clock so paused
/// test runtimes can drive it with `tokio::time::advance`.
#[derive(Debug, Default)]
pub struct ClockEngine {
    inner: Mutex<ClockInner>,
}

#[derive(Debug, Default)]
struct ClockInner {
    media: Option<PathBuf>,
    length_ms: u64,
    state: EngineState,
    /// Position accumulated up to `started_at`
    base_ms: u64,
    /// Set while the clock is running
    started_at: Option<Instant>,
}

impl ClockInner {
    fn position_ms(&self) -> u64 {
        let elapsed = self
            .started_at
            .map_or(0, |started| started.elapsed().as_millis_u64());
        let position = self.base_ms.saturating_add(elapsed);

        if self.length_ms > 0 {
            position.min(self.length_ms)
        } else {
            position
        }
    }

    fn reached_end(&self) -> bool {
        self.started_at.is_some() && self.length_ms > 0 && self.position_ms() >= self.length_ms
    }

    fn freeze(&mut self) {
        self.base_ms = self.position_ms();
        self.started_at = None;
    }
}

impl ClockEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlaybackEngine for ClockEngine {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn load(&self, path: &Path) -> Result<(), EngineError> {
        if !path.is_file() {
            return Err(EngineError::Load {
                path: path.to_path_buf(),
                reason: "not a readable file".to_string(),
            });
        }

        let length_ms = probe_length_ms(path).unwrap_or_else(|| {
            debug!(target: LOG_TARGET, "Could not determine length of {}", path.display());
            0
        });

        let mut inner = self.lock();
        *inner = ClockInner {
            media: Some(path.to_path_buf()),
            length_ms,
            state: EngineState::Stopped,
            base_ms: 0,
            started_at: None,
        };

        debug!(target: LOG_TARGET, "Loaded {} ({} ms)", path.display(), length_ms);
        Ok(())
    }

    fn play(&self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.media.is_none() {
            return Err(EngineError::NoMedia);
        }

        // Playing again after the end starts over
        if inner.reached_end() {
            inner.base_ms = 0;
            inner.started_at = None;
        }
        if inner.started_at.is_none() {
            inner.started_at = Some(Instant::now());
        }
        inner.state = EngineState::Playing;
        Ok(())
    }

    fn pause(&self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        match inner.state {
            EngineState::Playing if !inner.reached_end() => {
                inner.freeze();
                inner.state = EngineState::Paused;
            }
            EngineState::Paused => {
                inner.started_at = Some(Instant::now());
                inner.state = EngineState::Playing;
            }
            _ => {}
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        let mut inner = self.lock();
        inner.started_at = None;
        inner.base_ms = 0;
        if inner.media.is_some() {
            inner.state = EngineState::Stopped;
        }
        Ok(())
    }

    fn set_position_ms(&self, position_ms: u64) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.media.is_none() {
            return Err(EngineError::NoMedia);
        }

        inner.base_ms = if inner.length_ms > 0 {
            position_ms.min(inner.length_ms)
        } else {
            position_ms
        };
        if inner.started_at.is_some() {
            inner.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn position_ms(&self) -> u64 {
        self.lock().position_ms()
    }

    fn length_ms(&self) -> u64 {
        self.lock().length_ms
    }

    fn is_playing(&self) -> bool {
        self.state() == EngineState::Playing
    }

    fn state(&self) -> EngineState {
        let inner = self.lock();
        if inner.state == EngineState::Playing && inner.reached_end() {
            EngineState::Ended
        } else {
            inner.state
        }
    }
}

/// Read the duration of the default audio track from container metadata
fn probe_length_ms(path: &Path) -> Option<u64> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;

    let frames = track.codec_params.n_frames?;
    let sample_rate = u64::from(track.codec_params.sample_rate?);
    if sample_rate == 0 {
        return None;
    }

    Some(frames.saturating_mul(1000) / sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Write a silent 8 kHz mono WAV of the given length
    fn write_wav(dir: &Path, name: &str, secs: u32) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..(8000 * secs) {
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_probe_wav_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "tone.wav", 3);
        assert_eq!(probe_length_ms(&path), Some(3000));
    }

    #[test]
    fn test_probe_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.flac");
        std::fs::write(&path, b"definitely not flac").unwrap();
        assert_eq!(probe_length_ms(&path), None);
    }

    #[test]
    fn test_load_missing_file() {
        let engine = ClockEngine::new();
        let err = engine.load(Path::new("/nonexistent/song.wav")).unwrap_err();
        assert!(matches!(err, EngineError::Load { .. }));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_play_without_media() {
        let engine = ClockEngine::new();
        assert!(matches!(engine.play(), Err(EngineError::NoMedia)));
        assert!(matches!(engine.set_position_ms(10), Err(EngineError::NoMedia)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_while_playing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "tone.wav", 5);
        let engine = ClockEngine::new();

        engine.load(&path).unwrap();
        assert_eq!(engine.length_ms(), 5000);
        assert_eq!(engine.state(), EngineState::Stopped);

        engine.play().unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(engine.position_ms(), 1500);
        assert!(engine.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_toggles_and_freezes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "tone.wav", 5);
        let engine = ClockEngine::new();
        engine.load(&path).unwrap();
        engine.play().unwrap();

        tokio::time::advance(Duration::from_millis(1000)).await;
        engine.pause().unwrap();
        assert_eq!(engine.state(), EngineState::Paused);

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(engine.position_ms(), 1000);

        engine.pause().unwrap();
        assert_eq!(engine.state(), EngineState::Playing);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(engine.position_ms(), 1500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_and_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "tone.wav", 2);
        let engine = ClockEngine::new();
        engine.load(&path).unwrap();
        engine.play().unwrap();

        engine.set_position_ms(1800).unwrap();
        assert_eq!(engine.position_ms(), 1800);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(engine.position_ms(), 2000);
        assert_eq!(engine.state(), EngineState::Ended);
        assert!(!engine.is_playing());

        // Seeks past the end clamp to the length
        engine.set_position_ms(10_000).unwrap();
        assert_eq!(engine.position_ms(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_rewinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(dir.path(), "tone.wav", 5);
        let engine = ClockEngine::new();
        engine.load(&path).unwrap();
        engine.play().unwrap();
        tokio::time::advance(Duration::from_millis(700)).await;

        engine.stop().unwrap();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(engine.position_ms(), 0);
        assert_eq!(engine.length_ms(), 5000);
    }

    #[test]
    fn test_unknown_length_never_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opaque.bin");
        std::fs::write(&path, b"raw").unwrap();

        let engine = ClockEngine::new();
        engine.load(&path).unwrap();
        engine.play().unwrap();
        engine.set_position_ms(99_000).unwrap();
        assert_eq!(engine.length_ms(), 0);
        assert!(engine.position_ms() >= 99_000);
        assert_eq!(engine.state(), EngineState::Playing);
    }
}
