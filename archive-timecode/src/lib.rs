//! SMPTE timecode support for archive capture and MXF reading.
//!
//! This crate provides:
//!
//! - **SMPTE Timecode**: HH:MM:SS:FF values with an "absent" sentinel
//! - **Drop-Frame Arithmetic**: keyed by the rounded timecode base carried
//!   in MXF timecode components
//! - **Timecode Index**: a run-length, append-only map from content package
//!   position to timecode with frozen run detection
//! - **Searchers**: forward-only cursors answering position to timecode and
//!   timecode to position queries
//! - **Dual Reconciliation**: aligning VITC and LTC observations to one
//!   position
//!
//! # Quick Start
//!
//! ```rust
//! use archive_timecode::{Timecode, FrameRate};
//!
//! let tc = Timecode::new(1, 30, 45, 12, FrameRate::Fps25).unwrap();
//! assert_eq!(tc.to_string(), "01:30:45:12");
//!
//! let tc2: Timecode = "01:30:45:12".parse().unwrap();
//! assert_eq!(tc, tc2);
//!
//! let tc3 = tc.add_frames(13).unwrap();
//! assert_eq!(tc3.to_string(), "01:30:46:00");
//! ```
//!
//! # Reconciling VITC and LTC
//!
//! ```rust
//! use archive_timecode::{find_position_at_dual_timecode, FrameRate, Timecode, TimecodeIndex};
//!
//! let mut vitc = TimecodeIndex::new(64, 25);
//! let mut ltc = TimecodeIndex::new(64, 25);
//! for frame in 0..100 {
//!     vitc.add_timecode(&Timecode::from_frame_number(frame, FrameRate::Fps25, false));
//!     ltc.add_timecode(&Timecode::from_frame_number(5000 + frame, FrameRate::Fps25, false));
//! }
//!
//! let mut vitc_searcher = vitc.searcher();
//! let mut ltc_searcher = ltc.searcher();
//! let position = find_position_at_dual_timecode(
//!     &mut vitc_searcher,
//!     &Timecode::from_frame_number(40, FrameRate::Fps25, false),
//!     &mut ltc_searcher,
//!     &Timecode::invalid(FrameRate::Fps25),
//! );
//! assert_eq!(position, Some(40));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod dropframe;
pub mod dual;
pub mod error;
pub mod index;
pub mod smpte;

pub use dual::find_position_at_dual_timecode;
pub use error::{Result, TimecodeError};
pub use index::{
    TimecodeIndex, TimecodeIndexArray, TimecodeIndexElement, TimecodeIndexSearcher,
    DEFAULT_ARRAY_SIZE,
};
pub use smpte::{parse_timecode, FrameRate, Timecode, INVALID_TIMECODE_HOUR};

pub use dropframe::{
    drop_count, is_dropped_frame, position_to_components, timecode_to_position,
    validate_drop_frame_timecode, DropFrameConfig,
};

/// The version of SMPTE standard this library implements.
pub const SMPTE_VERSION: &str = "SMPTE 12M-2008";

/// Maximum hours value in timecode (23).
pub const MAX_HOURS: u8 = 23;

/// Create a non-drop-frame timecode.
///
/// ```rust
/// use archive_timecode::{timecode, FrameRate};
///
/// let tc = timecode(1, 30, 45, 12, FrameRate::Fps24).unwrap();
/// assert_eq!(tc.to_string(), "01:30:45:12");
/// ```
pub fn timecode(
    hours: u8,
    minutes: u8,
    seconds: u8,
    frames: u8,
    frame_rate: FrameRate,
) -> Result<Timecode> {
    Timecode::new(hours, minutes, seconds, frames, frame_rate)
}

/// Create a drop-frame timecode.
///
/// ```rust
/// use archive_timecode::{timecode_df, FrameRate};
///
/// let tc = timecode_df(1, 0, 0, 2, FrameRate::Fps29_97).unwrap();
/// assert_eq!(tc.to_string(), "01:00:00;02");
/// ```
pub fn timecode_df(
    hours: u8,
    minutes: u8,
    seconds: u8,
    frames: u8,
    frame_rate: FrameRate,
) -> Result<Timecode> {
    Timecode::new_drop_frame(hours, minutes, seconds, frames, frame_rate)
}

/// Duration between two timecodes in frames, negative if `end` is first.
#[must_use]
pub fn duration_frames(start: &Timecode, end: &Timecode) -> i64 {
    end.to_frame_number() as i64 - start.to_frame_number() as i64
}
