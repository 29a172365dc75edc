//! Start timecodes of the material, file source and physical source
//! packages.

use crate::edit_rate::{convert_position, Rounding};
use crate::metadata::{HeaderMetadata, Package, TimecodeComponent};
use crate::types::{Rational, Umid};
use crate::ul::DataDefinition;
use archive_timecode::Timecode;
use std::collections::HashSet;
use tracing::{debug, warn};

/// A timecode track component and the offset of clip position 0 in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct StartTimecode {
    component: TimecodeComponent,
    edit_rate: Rational,
    offset: i64,
}

impl StartTimecode {
    /// Timecode at clip `position` counted at `clip_rate`.
    pub(crate) fn timecode_at(&self, position: i64, clip_rate: Rational) -> Timecode {
        let position = convert_position(position, clip_rate, self.edit_rate, Rounding::Down);
        Timecode::from_position(
            self.component.start_timecode + self.offset + position,
            self.component.rounded_base as u32,
            self.component.drop_frame,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StartTimecodes {
    pub(crate) material: Option<StartTimecode>,
    pub(crate) file_source: Option<StartTimecode>,
    pub(crate) physical_source: Option<StartTimecode>,
    pub(crate) physical_source_package_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wanted {
    FileSource,
    PhysicalSource,
}

impl StartTimecodes {
    /// Follow the source clips of the first essence track of `material`
    /// down to the file source and physical source packages.
    pub(crate) fn extract(header: &HeaderMetadata, material: &Package) -> Self {
        let mut timecodes = StartTimecodes {
            material: package_timecode(material, 0, Rational::ZERO),
            ..Default::default()
        };

        let Some(mut track) = material
            .tracks
            .iter()
            .find(|t| t.data_def().is_essence() && t.sequence.effective_source_clip().is_some())
        else {
            return timecodes;
        };
        let mut offset = 0;
        let mut wanted = Wanted::FileSource;
        let mut visited: HashSet<(Umid, u32)> = HashSet::new();
        visited.insert((material.uid, track.track_id));

        while let Some((clip, _)) = track.sequence.effective_source_clip() {
            if clip.is_null_reference() {
                break;
            }
            let Some(package) = header.find_package(&clip.source_package_id) else {
                debug!(package = %clip.source_package_id, "source package not in this file");
                break;
            };
            let Some(source_track) = package.find_track(clip.source_track_id) else {
                break;
            };
            if !visited.insert((package.uid, source_track.track_id)) {
                warn!(
                    package = %package.uid,
                    track_id = source_track.track_id,
                    "source clip reference cycle"
                );
                break;
            }
            offset = clip.start_position
                + convert_position(offset, track.edit_rate, source_track.edit_rate, Rounding::Down);

            match wanted {
                Wanted::FileSource if package.is_file_source() => {
                    timecodes.file_source = package_timecode(package, offset, source_track.edit_rate);
                    wanted = Wanted::PhysicalSource;
                }
                Wanted::PhysicalSource if package.is_physical_source() => {
                    timecodes.physical_source =
                        package_timecode(package, offset, source_track.edit_rate);
                    timecodes.physical_source_package_name = package.name.clone();
                    break;
                }
                _ => {}
            }
            track = source_track;
        }
        timecodes
    }
}

/// The first timecode component of `package`, with `offset` counted at
/// `offset_rate` converted to the timecode track rate.
fn package_timecode(package: &Package, offset: i64, offset_rate: Rational) -> Option<StartTimecode> {
    package
        .tracks
        .iter()
        .filter(|track| track.data_def() == DataDefinition::Timecode)
        .find_map(|track| {
            let component = track
                .sequence
                .components()
                .iter()
                .find_map(|c| c.timecode())?;
            Some(StartTimecode {
                component: *component,
                edit_rate: track.edit_rate,
                offset: convert_position(offset, offset_rate, track.edit_rate, Rounding::Down),
            })
        })
}
