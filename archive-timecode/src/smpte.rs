//! SMPTE 12M timecode values.
//!
//! This module provides SMPTE timecode (HH:MM:SS:FF) support with:
//! - Standard frame rates (24, 25, 30 fps and fractional variants)
//! - Conversion to and from frame counts keyed by the rounded timecode base
//! - An "invalid" sentinel used for absent VITC/LTC observations
//! - String parsing and formatting

use crate::dropframe;
use crate::error::{Result, TimecodeError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Hour value marking a timecode as absent (e.g. no VITC on this frame).
pub const INVALID_TIMECODE_HOUR: u8 = 0xff;

/// Common frame rates used in video production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameRate {
    /// 24 fps (film)
    Fps24,
    /// 23.976 fps (24000/1001, NTSC film)
    Fps23_976,
    /// 25 fps (PAL)
    Fps25,
    /// 29.97 fps (30000/1001, NTSC)
    Fps29_97,
    /// 30 fps
    Fps30,
    /// 48 fps (HFR film)
    Fps48,
    /// 50 fps (PAL)
    Fps50,
    /// 59.94 fps (60000/1001, NTSC)
    Fps59_94,
    /// 60 fps
    Fps60,
    /// Custom frame rate (numerator, denominator)
    Custom {
        /// Frame rate numerator.
        numerator: u32,
        /// Frame rate denominator.
        denominator: u32,
    },
}

impl FrameRate {
    /// Get the frame rate as a rational number (numerator, denominator).
    #[must_use]
    pub fn as_rational(&self) -> (u32, u32) {
        match self {
            Self::Fps24 => (24, 1),
            Self::Fps23_976 => (24000, 1001),
            Self::Fps25 => (25, 1),
            Self::Fps29_97 => (30000, 1001),
            Self::Fps30 => (30, 1),
            Self::Fps48 => (48, 1),
            Self::Fps50 => (50, 1),
            Self::Fps59_94 => (60000, 1001),
            Self::Fps60 => (60, 1),
            Self::Custom {
                numerator,
                denominator,
            } => (*numerator, *denominator),
        }
    }

    /// Get the nominal frame rate (the rounded timecode base).
    #[must_use]
    pub fn nominal_fps(&self) -> u32 {
        match self {
            Self::Fps24 | Self::Fps23_976 => 24,
            Self::Fps25 => 25,
            Self::Fps29_97 | Self::Fps30 => 30,
            Self::Fps48 => 48,
            Self::Fps50 => 50,
            Self::Fps59_94 | Self::Fps60 => 60,
            Self::Custom {
                numerator,
                denominator,
            } => {
                if *denominator == 0 {
                    0
                } else {
                    ((*numerator as f64) / (*denominator as f64)).round() as u32
                }
            }
        }
    }

    /// Get the frame rate as a floating point value.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        let (num, den) = self.as_rational();
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    /// Check if this frame rate requires drop-frame timecode.
    #[must_use]
    pub fn is_drop_frame_rate(&self) -> bool {
        matches!(self, Self::Fps29_97 | Self::Fps59_94)
    }

    /// Create a custom frame rate.
    pub fn custom(numerator: u32, denominator: u32) -> Result<Self> {
        if denominator == 0 {
            return Err(TimecodeError::invalid_frame_rate(numerator, denominator));
        }
        Ok(Self::Custom {
            numerator,
            denominator,
        })
    }

    /// Try to match a rational frame rate to a standard one.
    #[must_use]
    pub fn from_rational(numerator: u32, denominator: u32) -> Self {
        match (numerator, denominator) {
            (24, 1) => Self::Fps24,
            (24000, 1001) => Self::Fps23_976,
            (25, 1) => Self::Fps25,
            (30000, 1001) => Self::Fps29_97,
            (30, 1) => Self::Fps30,
            (48, 1) => Self::Fps48,
            (50, 1) => Self::Fps50,
            (60000, 1001) => Self::Fps59_94,
            (60, 1) => Self::Fps60,
            _ => Self::Custom {
                numerator,
                denominator,
            },
        }
    }

    /// Frame rate implied by an MXF timecode component's rounded base and
    /// drop-frame flag.
    #[must_use]
    pub fn from_rounded_base(rounded_base: u32, drop_frame: bool) -> Self {
        match (rounded_base, drop_frame) {
            (24, _) => Self::Fps24,
            (25, _) => Self::Fps25,
            (30, true) => Self::Fps29_97,
            (30, false) => Self::Fps30,
            (48, _) => Self::Fps48,
            (50, _) => Self::Fps50,
            (60, true) => Self::Fps59_94,
            (60, false) => Self::Fps60,
            (base, _) => Self::Custom {
                numerator: base,
                denominator: 1,
            },
        }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fps24 => write!(f, "24"),
            Self::Fps23_976 => write!(f, "23.976"),
            Self::Fps25 => write!(f, "25"),
            Self::Fps29_97 => write!(f, "29.97"),
            Self::Fps30 => write!(f, "30"),
            Self::Fps48 => write!(f, "48"),
            Self::Fps50 => write!(f, "50"),
            Self::Fps59_94 => write!(f, "59.94"),
            Self::Fps60 => write!(f, "60"),
            Self::Custom {
                numerator,
                denominator,
            } => {
                write!(f, "{}/{}", numerator, denominator)
            }
        }
    }
}

/// SMPTE timecode representation.
///
/// Represents timecode in HH:MM:SS:FF format as defined by SMPTE 12M. A
/// timecode whose hour is [`INVALID_TIMECODE_HOUR`] is the "absent"
/// sentinel; see [`Timecode::invalid`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timecode {
    /// Hours (0-23)
    pub hours: u8,
    /// Minutes (0-59)
    pub minutes: u8,
    /// Seconds (0-59)
    pub seconds: u8,
    /// Frames (0 to fps-1)
    pub frames: u8,
    /// Frame rate
    pub frame_rate: FrameRate,
    /// Whether this is drop-frame timecode
    pub drop_frame: bool,
}

impl Timecode {
    /// Create a new timecode.
    pub fn new(
        hours: u8,
        minutes: u8,
        seconds: u8,
        frames: u8,
        frame_rate: FrameRate,
    ) -> Result<Self> {
        let tc = Self {
            hours,
            minutes,
            seconds,
            frames,
            frame_rate,
            drop_frame: false,
        };
        tc.validate()?;
        Ok(tc)
    }

    /// Create a new drop-frame timecode.
    pub fn new_drop_frame(
        hours: u8,
        minutes: u8,
        seconds: u8,
        frames: u8,
        frame_rate: FrameRate,
    ) -> Result<Self> {
        if !frame_rate.is_drop_frame_rate() {
            return Err(TimecodeError::unsupported_frame_rate(
                "drop-frame",
                frame_rate.to_string(),
            ));
        }
        let tc = Self {
            hours,
            minutes,
            seconds,
            frames,
            frame_rate,
            drop_frame: true,
        };
        tc.validate()?;
        Ok(tc)
    }

    /// The "absent timecode" sentinel.
    #[must_use]
    pub fn invalid(frame_rate: FrameRate) -> Self {
        Self {
            hours: INVALID_TIMECODE_HOUR,
            minutes: 0,
            seconds: 0,
            frames: 0,
            frame_rate,
            drop_frame: false,
        }
    }

    /// Returns false for the [`Timecode::invalid`] sentinel.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.hours != INVALID_TIMECODE_HOUR
    }

    /// Create timecode from a frame count since 00:00:00:00.
    ///
    /// Frame counts beyond 24 hours wrap.
    #[must_use]
    pub fn from_frame_number(frame_number: u64, frame_rate: FrameRate, drop_frame: bool) -> Self {
        let drop_frame = drop_frame && frame_rate.is_drop_frame_rate();
        let (hours, minutes, seconds, frames) = dropframe::position_to_components(
            frame_number as i64,
            frame_rate.nominal_fps(),
            drop_frame,
        );

        Self {
            hours,
            minutes,
            seconds,
            frames,
            frame_rate,
            drop_frame,
        }
    }

    /// Convert timecode to a frame count since 00:00:00:00.
    #[must_use]
    pub fn to_frame_number(&self) -> u64 {
        self.to_position(self.frame_rate.nominal_fps()).max(0) as u64
    }

    /// Timecode at an absolute position counted in `rounded_base` frames
    /// per second, as stored in MXF timecode components.
    #[must_use]
    pub fn from_position(position: i64, rounded_base: u32, drop_frame: bool) -> Self {
        let frame_rate = FrameRate::from_rounded_base(rounded_base, drop_frame);
        let drop_frame = drop_frame && dropframe::drop_count(rounded_base) > 0;
        let (hours, minutes, seconds, frames) =
            dropframe::position_to_components(position, rounded_base, drop_frame);
        Self {
            hours,
            minutes,
            seconds,
            frames,
            frame_rate,
            drop_frame,
        }
    }

    /// Convert to an absolute position using an explicit rounded timecode
    /// base, applying the drop-frame correction when flagged.
    #[must_use]
    pub fn to_position(&self, rounded_base: u32) -> i64 {
        dropframe::timecode_to_position(
            self.hours,
            self.minutes,
            self.seconds,
            self.frames,
            rounded_base,
            self.drop_frame,
        )
    }

    /// Convert timecode to seconds.
    #[must_use]
    pub fn to_seconds(&self) -> f64 {
        let fps = self.frame_rate.as_f64();
        if fps == 0.0 {
            return 0.0;
        }
        self.to_frame_number() as f64 / fps
    }

    /// Validate the timecode components.
    pub fn validate(&self) -> Result<()> {
        let max_frames = self.frame_rate.nominal_fps().min(u8::MAX as u32) as u8;

        if self.hours > 23 {
            return Err(TimecodeError::invalid_component(
                "hours",
                self.hours as u32,
                23,
            ));
        }
        if self.minutes > 59 {
            return Err(TimecodeError::invalid_component(
                "minutes",
                self.minutes as u32,
                59,
            ));
        }
        if self.seconds > 59 {
            return Err(TimecodeError::invalid_component(
                "seconds",
                self.seconds as u32,
                59,
            ));
        }
        if max_frames == 0 || self.frames >= max_frames {
            return Err(TimecodeError::invalid_component(
                "frames",
                self.frames as u32,
                max_frames.saturating_sub(1) as u32,
            ));
        }

        dropframe::validate_drop_frame_timecode(self)
    }

    /// Add frames to the timecode.
    pub fn add_frames(&self, frames: i64) -> Result<Self> {
        let current = self.to_frame_number() as i64;
        let new_frame = current + frames;

        if new_frame < 0 {
            return Err(TimecodeError::Underflow);
        }

        Ok(Self::from_frame_number(
            new_frame as u64,
            self.frame_rate,
            self.drop_frame,
        ))
    }

    /// Check if timecode is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0 && self.frames == 0
    }

    /// Get the separator character for display.
    #[must_use]
    pub fn separator(&self) -> char {
        if self.drop_frame {
            ';'
        } else {
            ':'
        }
    }
}

impl Default for Timecode {
    fn default() -> Self {
        Self {
            hours: 0,
            minutes: 0,
            seconds: 0,
            frames: 0,
            frame_rate: FrameRate::Fps25,
            drop_frame: false,
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "--:--:--:--");
        }
        write!(
            f,
            "{:02}:{:02}:{:02}{}{:02}",
            self.hours,
            self.minutes,
            self.seconds,
            self.separator(),
            self.frames
        )
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self> {
        let frame_rate = if s.contains(';') {
            FrameRate::Fps29_97
        } else {
            FrameRate::Fps25
        };
        parse_timecode(s, frame_rate)
    }
}

impl PartialEq for Timecode {
    fn eq(&self, other: &Self) -> bool {
        if self.frame_rate == other.frame_rate && self.drop_frame == other.drop_frame {
            self.hours == other.hours
                && self.minutes == other.minutes
                && self.seconds == other.seconds
                && self.frames == other.frames
        } else {
            (self.to_seconds() - other.to_seconds()).abs() < 0.0001
        }
    }
}

impl Eq for Timecode {}

impl PartialOrd for Timecode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timecode {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.frame_rate == other.frame_rate && self.drop_frame == other.drop_frame {
            self.to_frame_number().cmp(&other.to_frame_number())
        } else {
            self.to_seconds()
                .partial_cmp(&other.to_seconds())
                .unwrap_or(Ordering::Equal)
        }
    }
}

/// Parse a timecode string with explicit frame rate.
///
/// Accepts `HH:MM:SS:FF` and the drop-frame form `HH:MM:SS;FF`.
pub fn parse_timecode(s: &str, frame_rate: FrameRate) -> Result<Timecode> {
    let s = s.trim();
    let drop_frame = s.contains(';');

    let parts: Vec<&str> = s.split([':', ';']).collect();
    if parts.len() != 4 {
        return Err(TimecodeError::invalid_format(
            "Expected format HH:MM:SS:FF or HH:MM:SS;FF",
        ));
    }

    let field = |name: &str, value: &str| -> Result<u8> {
        value
            .parse()
            .map_err(|_| TimecodeError::invalid_format(format!("Invalid {}: {}", name, value)))
    };
    let hours = field("hours", parts[0])?;
    let minutes = field("minutes", parts[1])?;
    let seconds = field("seconds", parts[2])?;
    let frames = field("frames", parts[3])?;

    if drop_frame {
        Timecode::new_drop_frame(hours, minutes, seconds, frames, frame_rate)
    } else {
        Timecode::new(hours, minutes, seconds, frames, frame_rate)
    }
}
