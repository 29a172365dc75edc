//! Precharge and rollout of long GOP essence.
//!
//! Frames of inter-frame coded essence are stored in decode order. The
//! index table's temporal offset maps a displayed frame to its stored
//! frame and the key frame offset leads back to the frame decoding must
//! start at. Precharge counts the edit units to read before a position
//! (zero or negative), rollout those to read after it (zero or positive).

use super::{MxfFileReader, OpenFile};
use crate::edit_rate::to_higher;
use crate::error::{MxfError, Result};
use crate::essence_reader::EssenceReader;

impl MxfFileReader {
    /// Edit units to read before `position` so that it can be decoded.
    ///
    /// With `limit_to_available` the result does not reach before the
    /// first indexed edit unit. Fails with [`MxfError::Precondition`] for
    /// incomplete files.
    pub fn max_precharge(&self, position: i64, limit_to_available: bool) -> Result<i64> {
        Ok(self
            .precharge_constraint(position, limit_to_available)?
            .unwrap_or(0))
    }

    /// Edit units to read after `position` so that it can be decoded.
    ///
    /// With `limit_to_available` the result does not reach past the last
    /// indexed edit unit. Fails with [`MxfError::Precondition`] for
    /// incomplete files.
    pub fn max_rollout(&self, position: i64, limit_to_available: bool) -> Result<i64> {
        Ok(self
            .rollout_constraint(position, limit_to_available)?
            .unwrap_or(0))
    }

    /// The precharge and rollout extended clip as `(start, duration)`.
    pub fn max_read_limits(&self) -> Result<(i64, i64)> {
        let file = self.complete_file()?;
        if file.duration <= 0 {
            return Ok((0, 0));
        }
        let start = self.max_precharge(0, true)?;
        let last = file.duration - 1;
        let end = last + self.max_rollout(last, true)?;
        Ok((start, end - start + 1))
    }

    fn complete_file(&self) -> Result<&OpenFile> {
        match &self.file {
            Some(file) if self.is_complete() => Ok(file),
            Some(_) => Err(MxfError::precondition(
                "precharge and rollout need a complete file",
            )),
            None => Err(MxfError::precondition("no file is open")),
        }
    }

    /// Precharge required by the readers with long GOP tracks, `None` when
    /// no reader has any.
    fn precharge_constraint(&self, position: i64, limit_to_available: bool) -> Result<Option<i64>> {
        let file = self.complete_file()?;
        let mut constraint = None;
        if let Some(essence_reader) = long_gop_reader(file) {
            let precharge = internal_precharge(essence_reader, position, limit_to_available);
            constraint = Some(intersect(constraint, precharge));
        }
        for (index, external) in file.externals.iter().enumerate() {
            if !is_rate_compatible(&external.sample_sequence) || !file.external_enabled(index) {
                continue;
            }
            let external_position = to_higher(position, &external.sample_sequence);
            let precharge = external
                .reader
                .borrow()
                .precharge_constraint(external_position, limit_to_available)?;
            if let Some(precharge) = precharge {
                constraint = Some(intersect(constraint, precharge));
            }
        }
        Ok(constraint)
    }

    fn rollout_constraint(&self, position: i64, limit_to_available: bool) -> Result<Option<i64>> {
        let file = self.complete_file()?;
        let mut constraint = None;
        if let Some(essence_reader) = long_gop_reader(file) {
            let rollout = internal_rollout(essence_reader, position, limit_to_available);
            constraint = Some(intersect(constraint, rollout));
        }
        for (index, external) in file.externals.iter().enumerate() {
            if !is_rate_compatible(&external.sample_sequence) || !file.external_enabled(index) {
                continue;
            }
            let external_position = to_higher(position, &external.sample_sequence);
            let rollout = external
                .reader
                .borrow()
                .rollout_constraint(external_position, limit_to_available)?;
            if let Some(rollout) = rollout {
                constraint = Some(intersect(constraint, rollout));
            }
        }
        Ok(constraint)
    }
}

/// The essence reader, if an enabled internal track is long GOP.
fn long_gop_reader(file: &OpenFile) -> Option<&EssenceReader> {
    let long_gop = file.internal_tracks.iter().any(|track| {
        let track = track.borrow();
        track.is_enabled() && track.info().essence_type.is_mpeg2_long_gop()
    });
    file.essence_reader.as_ref().filter(|_| long_gop)
}

/// Readers at the clip edit rate.
fn is_rate_compatible(sequence: &[u32]) -> bool {
    matches!(sequence, [1])
}

/// The smaller magnitude of two constraints.
fn intersect(current: Option<i64>, value: i64) -> i64 {
    match current {
        Some(current) if current.abs() <= value.abs() => current,
        _ => value,
    }
}

fn internal_precharge(essence_reader: &EssenceReader, position: i64, limit_to_available: bool) -> i64 {
    let Some(entry) = essence_reader.index_entry(position) else {
        return 0;
    };
    let temporal_offset = entry.temporal_offset as i64;
    let key_frame_offset = essence_reader
        .index_entry(position + temporal_offset)
        .map_or(0, |stored| stored.key_frame_offset as i64);
    let precharge = (temporal_offset + key_frame_offset).min(0);
    if limit_to_available {
        let first = essence_reader.legitimise_position(position + precharge);
        precharge.max(first - position).min(0)
    } else {
        precharge
    }
}

fn internal_rollout(essence_reader: &EssenceReader, position: i64, limit_to_available: bool) -> i64 {
    let Some(entry) = essence_reader.index_entry(position) else {
        return 0;
    };
    let rollout = (entry.temporal_offset as i64).max(0);
    if limit_to_available {
        let last = essence_reader.indexed_duration() - essence_reader.origin() - 1;
        rollout.min(last - position).max(0)
    } else {
        rollout
    }
}
