//! Time and duration conversion utilities.
//!
//! Cue sheets address audio in `mm:ss:ff` timecodes (75 frames per second),
//! while the playback engine works in milliseconds. Everything in between
//! goes through the helpers here.

use std::time::Duration;

/// Frames per second in a cue sheet timecode (Red Book CD audio).
pub const FRAMES_PER_SECOND: u64 = 75;

/// Milliseconds per frame, truncated (1000 / 75 = 13).
pub const MS_PER_FRAME: u64 = 1000 / FRAMES_PER_SECOND;

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    ///
    /// In practice, this is always safe because durations exceeding `u64::MAX`
    /// milliseconds would represent ~584 million years.
    fn as_millis_u64(&self) -> u64;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Convert a cue timecode split into minutes, seconds and frames to milliseconds.
///
/// Frames are converted with the truncated [`MS_PER_FRAME`], so `00:02:37`
/// is `2000 + 37 * 13 = 2481` ms. Returns `None` if the result overflows.
#[must_use]
pub const fn timecode_to_ms(minutes: u64, seconds: u64, frames: u64) -> Option<u64> {
    let Some(secs) = minutes.checked_mul(60) else {
        return None;
    };
    let Some(secs) = secs.checked_add(seconds) else {
        return None;
    };
    let Some(ms) = secs.checked_mul(1000) else {
        return None;
    };
    let Some(frame_ms) = frames.checked_mul(MS_PER_FRAME) else {
        return None;
    };
    ms.checked_add(frame_ms)
}

/// Format milliseconds as `mm:ss` for log output.
#[must_use]
pub fn format_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
