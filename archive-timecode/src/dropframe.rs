//! Drop-frame timecode arithmetic keyed by the rounded timecode base.
//!
//! Drop-frame timecode skips frame numbers so that the label stays close to
//! wall-clock time at 30000/1001 and 60000/1001 edit rates:
//! - `2 * base / 30` labels are skipped at the start of each minute
//! - except for minutes 0, 10, 20, 30, 40 and 50
//!
//! MXF timecode components carry only the rounded base and a drop flag, so
//! every conversion here takes the base explicitly.

use crate::error::{Result, TimecodeError};
use crate::smpte::Timecode;
use serde::{Deserialize, Serialize};

/// Drop-frame counts for a rounded timecode base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropFrameConfig {
    /// Number of labels dropped per minute (except every 10th minute)
    pub frames_dropped_per_minute: u32,
    /// Rounded timecode base
    pub nominal_fps: u32,
    /// Frames per 10 minutes (accounting for drops)
    pub frames_per_10_minutes: u64,
    /// Frames per dropping minute
    pub frames_per_minute: u64,
}

impl DropFrameConfig {
    /// Configuration for a rounded base; `None` when the base drops nothing.
    #[must_use]
    pub fn for_rounded_base(rounded_base: u32) -> Option<Self> {
        let drop = drop_count(rounded_base);
        if drop == 0 {
            return None;
        }
        let fps = rounded_base as u64;
        Some(Self {
            frames_dropped_per_minute: drop,
            nominal_fps: rounded_base,
            frames_per_10_minutes: fps * 600 - 9 * drop as u64,
            frames_per_minute: fps * 60 - drop as u64,
        })
    }

    /// Frames in a full 24 hour day.
    #[must_use]
    pub fn frames_per_day(&self) -> u64 {
        self.frames_per_10_minutes * 6 * 24
    }
}

/// Number of labels dropped per minute for a rounded base.
#[must_use]
pub const fn drop_count(rounded_base: u32) -> u32 {
    2 * rounded_base / 30
}

/// Position of a timecode label counted from 00:00:00:00.
///
/// With `drop_frame` set, `drop_count(base) * (total_minutes - total_minutes / 10)`
/// is subtracted from the non-drop position.
#[must_use]
pub fn timecode_to_position(
    hours: u8,
    minutes: u8,
    seconds: u8,
    frames: u8,
    rounded_base: u32,
    drop_frame: bool,
) -> i64 {
    let base = rounded_base as i64;
    let mut position = hours as i64 * 3600 * base
        + minutes as i64 * 60 * base
        + seconds as i64 * base
        + frames as i64;

    if drop_frame {
        let total_minutes = hours as i64 * 60 + minutes as i64;
        position -= drop_count(rounded_base) as i64 * (total_minutes - total_minutes / 10);
    }

    position
}

/// Split a position into `(hours, minutes, seconds, frames)`.
///
/// Positions wrap at 24 hours, negative ones included.
#[must_use]
pub fn position_to_components(
    position: i64,
    rounded_base: u32,
    drop_frame: bool,
) -> (u8, u8, u8, u8) {
    if rounded_base == 0 {
        return (0, 0, 0, 0);
    }
    let base = rounded_base as i64;

    let mut frame = position;
    match DropFrameConfig::for_rounded_base(rounded_base).filter(|_| drop_frame) {
        Some(config) => {
            let drop = config.frames_dropped_per_minute as i64;
            let per_10 = config.frames_per_10_minutes as i64;
            let per_min = config.frames_per_minute as i64;

            frame = frame.rem_euclid(config.frames_per_day() as i64);
            let tens = frame / per_10;
            let rest = frame % per_10;
            frame += 9 * drop * tens;
            if rest > drop {
                frame += drop * ((rest - drop) / per_min);
            }
        }
        None => {
            frame = frame.rem_euclid(base * 3600 * 24);
        }
    }

    let frames = (frame % base) as u8;
    let total_seconds = frame / base;
    let seconds = (total_seconds % 60) as u8;
    let minutes = ((total_seconds / 60) % 60) as u8;
    let hours = ((total_seconds / 3600) % 24) as u8;
    (hours, minutes, seconds, frames)
}

/// Check if a label is one of those skipped by drop-frame counting.
#[must_use]
pub fn is_dropped_frame(minutes: u8, seconds: u8, frames: u8, rounded_base: u32) -> bool {
    let drop = drop_count(rounded_base);
    if drop == 0 {
        return false;
    }

    if seconds == 0 && minutes % 10 != 0 {
        (frames as u32) < drop
    } else {
        false
    }
}

/// Validate that a drop-frame timecode doesn't name a skipped label.
pub fn validate_drop_frame_timecode(tc: &Timecode) -> Result<()> {
    if !tc.drop_frame {
        return Ok(());
    }

    if is_dropped_frame(
        tc.minutes,
        tc.seconds,
        tc.frames,
        tc.frame_rate.nominal_fps(),
    ) {
        return Err(TimecodeError::drop_frame(format!(
            "Frame {:02}:{:02}:{:02};{:02} is a dropped frame",
            tc.hours, tc.minutes, tc.seconds, tc.frames
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smpte::FrameRate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_drop_frame_config() {
        let config = DropFrameConfig::for_rounded_base(30).unwrap();
        assert_eq!(config.frames_dropped_per_minute, 2);
        assert_eq!(config.frames_per_10_minutes, 17982);
        assert_eq!(config.frames_per_minute, 1798);

        let config = DropFrameConfig::for_rounded_base(60).unwrap();
        assert_eq!(config.frames_dropped_per_minute, 4);
        assert_eq!(config.frames_per_10_minutes, 35964);

        assert!(DropFrameConfig::for_rounded_base(12).is_none());
    }

    #[test]
    fn test_is_dropped_frame() {
        assert!(is_dropped_frame(1, 0, 0, 30));
        assert!(is_dropped_frame(1, 0, 1, 30));
        assert!(!is_dropped_frame(1, 0, 2, 30));
        assert!(!is_dropped_frame(10, 0, 0, 30));
        assert!(!is_dropped_frame(0, 0, 0, 30));
        assert!(!is_dropped_frame(5, 1, 0, 30));
        assert!(is_dropped_frame(1, 0, 3, 60));
    }

    #[test]
    fn test_timecode_to_position() {
        assert_eq!(timecode_to_position(0, 0, 1, 0, 25, false), 25);
        assert_eq!(timecode_to_position(1, 0, 0, 0, 25, false), 90000);
        // 00:01:00;02 is the first label after the drop at minute 1
        assert_eq!(timecode_to_position(0, 1, 0, 2, 30, true), 1800);
        assert_eq!(timecode_to_position(0, 10, 0, 0, 30, true), 17982);
        assert_eq!(timecode_to_position(0, 1, 0, 4, 60, true), 3600);
    }

    #[test]
    fn test_position_to_components_at_minute_boundary() {
        assert_eq!(position_to_components(1799, 30, true), (0, 0, 59, 29));
        assert_eq!(position_to_components(1800, 30, true), (0, 1, 0, 2));
        assert_eq!(position_to_components(17982, 30, true), (0, 10, 0, 0));
        assert_eq!(position_to_components(3600, 60, true), (0, 1, 0, 4));
    }

    #[test]
    fn test_position_wraps_at_24_hours() {
        assert_eq!(position_to_components(-1, 25, false), (23, 59, 59, 24));
        assert_eq!(position_to_components(25 * 86400, 25, false), (0, 0, 0, 0));
    }

    #[test]
    fn test_drop_frame_roundtrip() {
        for position in [0i64, 29, 30, 1799, 1800, 1801, 17981, 17982, 17983, 107892] {
            let (h, m, s, f) = position_to_components(position, 30, true);
            assert_eq!(
                position,
                timecode_to_position(h, m, s, f, 30, true),
                "position {} via {:02}:{:02}:{:02};{:02}",
                position,
                h,
                m,
                s,
                f
            );
        }
    }

    #[test]
    fn test_validate_drop_frame_timecode() {
        let tc = Timecode {
            hours: 0,
            minutes: 1,
            seconds: 0,
            frames: 2,
            frame_rate: FrameRate::Fps29_97,
            drop_frame: true,
        };
        assert!(validate_drop_frame_timecode(&tc).is_ok());

        let tc = Timecode { frames: 0, ..tc };
        assert!(validate_drop_frame_timecode(&tc).is_err());
    }
}
