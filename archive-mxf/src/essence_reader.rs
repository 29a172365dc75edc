//! Reading internal essence.
//!
//! Positions are relative to the track origin: position 0 is the first
//! edit unit after precharge and precharge edit units have negative
//! positions. The edit unit at position `p` has index position
//! `p + origin`.

use crate::error::{MxfError, Result};
use crate::frame::Frame;
use crate::index::{EditUnitEntry, IndexTable};
use crate::klv::{KlHeader, KlvStream};
use crate::partition::{Partition, PartitionSet};
use crate::track_reader::{MxfTrackReader, TrackDetails};
use crate::types::Rational;
use crate::ul::{DataDefinition, WrappingType};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// An internal track read by an [`EssenceReader`].
#[derive(Debug, Clone)]
pub struct EssenceTrack {
    /// Track number in the essence element keys
    pub track_number: u32,
    /// Bytes per edit unit of clip wrapped essence without an index, 0 if
    /// not constant
    pub sample_size: u32,
    /// Reader receiving the frames
    pub reader: Rc<RefCell<MxfTrackReader>>,
}

#[derive(Debug, Clone, Copy)]
struct BodyRange {
    stream_offset: u64,
    file_start: u64,
    file_end: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct ClipElement {
    value_offset: u64,
    length: u64,
}

struct ContentPackage {
    elements: Vec<(u32, Vec<u8>)>,
    next_offset: u64,
}

/// Reads the essence container of one BodySID.
pub struct EssenceReader {
    stream: KlvStream,
    body_sid: u32,
    wrapping: WrappingType,
    edit_rate: Rational,
    origin: i64,
    tracks: Vec<EssenceTrack>,
    ranges: Vec<BodyRange>,
    index: Option<IndexTable>,
    file_complete: bool,
    /// File offsets of content packages found by scanning, by index position
    package_offsets: Vec<u64>,
    scan_exhausted: bool,
    /// KL read past the end of the previous content package
    pending: Option<KlHeader>,
    clip: Option<ClipElement>,
    position: i64,
    read_start: i64,
    read_duration: i64,
}

impl std::fmt::Debug for EssenceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EssenceReader")
            .field("body_sid", &self.body_sid)
            .field("wrapping", &self.wrapping)
            .field("position", &self.position)
            .finish()
    }
}

impl EssenceReader {
    /// Create a reader for the essence of `body_sid`.
    ///
    /// A complete file must carry an index table for `index_sid`; growing
    /// and streamed files are read sequentially when it is missing.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut stream: KlvStream,
        partitions: &PartitionSet,
        body_sid: u32,
        index_sid: u32,
        wrapping: WrappingType,
        edit_rate: Rational,
        origin: i64,
        tracks: Vec<EssenceTrack>,
        file_complete: bool,
    ) -> Result<Self> {
        let seekable = stream.is_seekable();
        let all = partitions.partitions();

        let mut ranges = Vec::new();
        for (i, partition) in all.iter().enumerate() {
            if partition.body_sid != body_sid {
                continue;
            }
            ranges.push(BodyRange {
                stream_offset: partition.body_offset,
                file_start: partition.essence_start(),
                file_end: all.get(i + 1).map(|next| next.this_partition),
            });
        }

        let index = if seekable && index_sid != 0 {
            match IndexTable::read(&mut stream, all, index_sid) {
                Ok(index) => index,
                Err(e) if !file_complete => {
                    warn!(error = %e, "ignoring index table of incomplete file");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        if file_complete && index.is_none() {
            return Err(MxfError::NoIndexTable(index_sid));
        }
        if let Some(index) = &index {
            if !index.edit_rate().same_rate(&edit_rate) {
                warn!(
                    index_rate = %index.edit_rate(),
                    essence_rate = %edit_rate,
                    "index edit rate differs from essence edit rate"
                );
            }
        }
        if wrapping == WrappingType::Clip && tracks.len() != 1 {
            return Err(MxfError::not_supported(format!(
                "clip wrapped essence with {} tracks",
                tracks.len()
            )));
        }

        // scanning starts at a partition pack so the body SID is known
        let first_offset = match partitions
            .partitions()
            .iter()
            .find(|p| p.body_sid == body_sid)
        {
            Some(partition) if seekable => partition.this_partition,
            Some(partition) => partition.essence_start(),
            None => partitions.header().essence_start(),
        };

        debug!(
            body_sid,
            index_sid,
            ?wrapping,
            ranges = ranges.len(),
            indexed = index.is_some(),
            "created essence reader"
        );

        Ok(EssenceReader {
            stream,
            body_sid,
            wrapping,
            edit_rate,
            origin,
            tracks,
            ranges,
            index,
            file_complete,
            package_offsets: vec![first_offset],
            scan_exhausted: false,
            pending: None,
            clip: None,
            position: 0,
            read_start: -origin,
            read_duration: -1,
        })
    }

    /// Precharge edit units before position 0.
    pub fn origin(&self) -> i64 {
        self.origin
    }

    /// The next position [`read`](Self::read) delivers.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Move to `position`; nothing is read until the next
    /// [`read`](Self::read).
    pub fn seek(&mut self, position: i64) {
        self.position = position;
    }

    /// Complete file with a finite index table.
    pub fn is_complete(&self) -> bool {
        self.file_complete && self.indexed_duration() >= 0
    }

    /// Whether the underlying stream can seek.
    pub fn is_seekable(&self) -> bool {
        self.stream.is_seekable()
    }

    /// Index information for `position`.
    pub fn index_entry(&self, position: i64) -> Option<EditUnitEntry> {
        self.index.as_ref()?.entry(position + self.origin)
    }

    /// Edit units covered by the index, including precharge, or -1.
    pub fn indexed_duration(&self) -> i64 {
        let Some(index) = &self.index else {
            return -1;
        };
        match index.indexed_duration() {
            Some(duration) => duration,
            None => self.cbe_duration_from_size().unwrap_or(-1),
        }
    }

    fn cbe_duration_from_size(&self) -> Option<i64> {
        let edit_unit_size = self.index.as_ref()?.edit_unit_byte_count() as u64;
        if edit_unit_size == 0 {
            return None;
        }
        let bytes = match self.wrapping {
            WrappingType::Clip => self.clip?.length,
            WrappingType::Frame => self.ranges.iter().try_fold(0u64, |total, range| {
                range
                    .file_end
                    .map(|end| total + end.saturating_sub(range.file_start))
            })?,
        };
        Some((bytes / edit_unit_size) as i64)
    }

    /// Clamp `position` to the positions that exist in the essence.
    pub fn legitimise_position(&self, position: i64) -> i64 {
        let duration = self.indexed_duration();
        if duration >= 0 && position > duration - self.origin {
            duration - self.origin
        } else if position < -self.origin {
            -self.origin
        } else {
            position
        }
    }

    /// Restrict reads to `duration` edit units from `start`. A negative
    /// duration leaves the end open.
    pub fn set_read_limits(&mut self, start: i64, duration: i64) {
        self.read_start = start;
        self.read_duration = duration;
    }

    /// The read limits as `(start, duration)`.
    pub fn read_limits(&self) -> (i64, i64) {
        (self.read_start, self.read_duration)
    }

    /// Read up to `num_samples` edit units into the track frame buffers
    /// and return how many were read. Fewer are read at the end of the
    /// essence or the read limits.
    pub fn read(&mut self, num_samples: u32) -> Result<u32> {
        let mut count = num_samples as i64;
        if self.position < self.read_start {
            return Ok(0);
        }
        if self.read_duration >= 0 {
            count = count.min(self.read_start + self.read_duration - self.position);
        }
        if count <= 0 {
            return Ok(0);
        }

        let read = match self.wrapping {
            WrappingType::Frame => self.read_frames(count)?,
            WrappingType::Clip => self.read_clip(count)?,
        };
        self.position += read;
        Ok(read as u32)
    }

    fn read_frames(&mut self, count: i64) -> Result<i64> {
        let mut read = 0;
        while read < count {
            let position = self.position + read;
            let entry = self.index_entry(position);
            let offset = match entry {
                Some(entry) => self.file_offset(entry.stream_offset)?,
                None if self.index.is_some() && self.file_complete => break,
                None => match self.package_offset(position + self.origin)? {
                    Some(offset) => offset,
                    None => break,
                },
            };

            let Some(package) = self.read_content_package(offset, true)? else {
                break;
            };
            self.remember_next_package(position + self.origin, package.next_offset);

            for track in &self.tracks {
                let mut reader = track.reader.borrow_mut();
                if !reader.is_enabled() {
                    continue;
                }
                let data = package
                    .elements
                    .iter()
                    .find(|(number, _)| *number == track.track_number)
                    .map(|(_, data)| data.clone())
                    .unwrap_or_default();
                let num_samples = samples_in(&reader, &data);
                let mut frame = Frame::new(position, self.edit_rate, num_samples, data);
                if let Some(entry) = entry {
                    frame.temporal_offset = entry.temporal_offset;
                    frame.key_frame_offset = entry.key_frame_offset;
                    frame.flags = entry.flags;
                }
                reader.frame_buffer_mut().push(frame);
            }
            read += 1;
        }
        Ok(read)
    }

    fn read_clip(&mut self, count: i64) -> Result<i64> {
        let clip = match self.clip {
            Some(clip) => clip,
            None => {
                let Some(clip) = self.locate_clip_element()? else {
                    return Ok(0);
                };
                self.clip = Some(clip);
                clip
            }
        };
        let index_position = self.position + self.origin;
        if index_position < 0 {
            return Ok(0);
        }

        let (start, end, count) = match &self.index {
            Some(index) if index.is_cbe() => {
                let size = index.edit_unit_byte_count() as u64;
                let available = (clip.length / size) as i64 - index_position;
                let count = count.min(available.max(0));
                let start = index_position as u64 * size;
                (start, start + count as u64 * size, count)
            }
            Some(index) => {
                let duration = index.indexed_duration().unwrap_or(0);
                let count = count.min(duration - index_position);
                let Some(first) = index.entry(index_position).filter(|_| count > 0) else {
                    return Ok(0);
                };
                let end = match index.entry(index_position + count) {
                    Some(next) => next.stream_offset,
                    None => clip.length,
                };
                (first.stream_offset, end, count)
            }
            None => {
                let size = self.tracks[0].sample_size as u64;
                if size == 0 {
                    return Err(MxfError::not_supported(
                        "clip wrapped essence without index table or constant sample size",
                    ));
                }
                let available = (clip.length / size) as i64 - index_position;
                let count = count.min(available.max(0));
                let start = index_position as u64 * size;
                (start, start + count as u64 * size, count)
            }
        };
        if count <= 0 || end > clip.length || start > end {
            return Ok(0);
        }

        self.stream.seek(clip.value_offset + start)?;
        let data = self.stream.read_value(end - start)?;

        let track = &self.tracks[0];
        let mut reader = track.reader.borrow_mut();
        if reader.is_enabled() {
            let num_samples = match reader.info().data_def {
                DataDefinition::Sound => samples_in(&reader, &data),
                _ => count as u32,
            };
            let mut frame = Frame::new(self.position, self.edit_rate, num_samples, data);
            if let Some(entry) = self.index_entry(self.position) {
                frame.temporal_offset = entry.temporal_offset;
                frame.key_frame_offset = entry.key_frame_offset;
                frame.flags = entry.flags;
            }
            reader.frame_buffer_mut().push(frame);
        }
        Ok(count)
    }

    fn file_offset(&self, stream_offset: u64) -> Result<u64> {
        let range = self
            .ranges
            .iter()
            .rev()
            .find(|r| r.stream_offset <= stream_offset)
            .ok_or_else(|| {
                MxfError::Read(format!(
                    "stream offset {} precedes body SID {}",
                    stream_offset, self.body_sid
                ))
            })?;
        let offset = range.file_start + (stream_offset - range.stream_offset);
        if range.file_end.is_some_and(|end| offset >= end) {
            return Err(MxfError::Read(format!(
                "stream offset {} is outside the body partitions",
                stream_offset
            )));
        }
        Ok(offset)
    }

    fn remember_next_package(&mut self, index_position: i64, next_offset: u64) {
        let next = (index_position + 1) as usize;
        if next == self.package_offsets.len() {
            self.package_offsets.push(next_offset);
        }
    }

    /// File offset to scan from for the content package at
    /// `index_position`, discovering earlier packages as needed.
    fn package_offset(&mut self, index_position: i64) -> Result<Option<u64>> {
        if index_position < 0 {
            return Ok(None);
        }
        let target = index_position as usize;
        while self.package_offsets.len() <= target {
            if self.scan_exhausted {
                return Ok(None);
            }
            let last = self.package_offsets.len() - 1;
            let offset = self.package_offsets[last];
            match self.read_content_package(offset, false)? {
                Some(package) => self.package_offsets.push(package.next_offset),
                None => {
                    self.scan_exhausted = true;
                    return Ok(None);
                }
            }
        }
        Ok(Some(self.package_offsets[target]))
    }

    fn next_kl(&mut self, offset: u64) -> Result<Option<KlHeader>> {
        if let Some(pending) = self.pending.take() {
            if pending.offset == offset && self.stream.tell() == pending.value_offset() {
                return Ok(Some(pending));
            }
        }
        self.stream.seek(offset)?;
        self.stream.read_kl_opt()
    }

    /// Read the content package starting at or after `offset`. Returns
    /// `None` when no further essence of this body exists.
    fn read_content_package(
        &mut self,
        offset: u64,
        read_values: bool,
    ) -> Result<Option<ContentPackage>> {
        let mut elements = Vec::new();
        let mut first_key = None;
        let mut in_body = true;
        let mut next = offset;

        loop {
            let Some(kl) = self.next_kl(next)? else {
                break;
            };
            next = kl.end_offset();

            if kl.key.is_partition_pack() {
                if first_key.is_some() {
                    self.pending = Some(kl);
                    next = kl.offset;
                    break;
                }
                let value = self.stream.read_value(kl.length)?;
                let partition = Partition::parse(&kl.key, &value)?;
                in_body = partition.body_sid == self.body_sid;
                next = kl.end_offset() + partition.header_byte_count + partition.index_byte_count;
                continue;
            }
            if !kl.key.is_essence_element() || !in_body {
                if kl.key.is_random_index_pack() && first_key.is_none() {
                    return Ok(None);
                }
                continue;
            }
            if first_key.is_some_and(|key| key == kl.key) {
                self.pending = Some(kl);
                next = kl.offset;
                break;
            }
            first_key.get_or_insert(kl.key);

            let track_number = kl.key.essence_track_number();
            let wanted = self.tracks.iter().any(|t| t.track_number == track_number);
            if read_values && wanted {
                let value = self.stream.read_value(kl.length)?;
                elements.push((track_number, value));
            } else {
                elements.push((track_number, Vec::new()));
            }
        }

        if first_key.is_none() {
            return Ok(None);
        }
        Ok(Some(ContentPackage {
            elements,
            next_offset: next,
        }))
    }

    fn locate_clip_element(&mut self) -> Result<Option<ClipElement>> {
        let track_number = self.tracks[0].track_number;
        let mut next = self.package_offsets[0];
        let mut in_body = true;
        loop {
            let Some(kl) = self.next_kl(next)? else {
                return Ok(None);
            };
            next = kl.end_offset();
            if kl.key.is_partition_pack() {
                let value = self.stream.read_value(kl.length)?;
                let partition = Partition::parse(&kl.key, &value)?;
                in_body = partition.body_sid == self.body_sid;
                next += partition.header_byte_count + partition.index_byte_count;
            } else if in_body
                && kl.key.is_essence_element()
                && kl.key.essence_track_number() == track_number
            {
                return Ok(Some(ClipElement {
                    value_offset: kl.value_offset(),
                    length: kl.length,
                }));
            }
        }
    }

    /// Locate clip wrapped essence ahead of the first read, so that
    /// durations derived from its size are available.
    pub fn prepare(&mut self) -> Result<()> {
        if self.wrapping == WrappingType::Clip && self.clip.is_none() && self.is_seekable() {
            self.clip = self.locate_clip_element()?;
        }
        Ok(())
    }
}

fn samples_in(reader: &MxfTrackReader, data: &[u8]) -> u32 {
    let info = reader.info();
    if info.data_def != DataDefinition::Sound {
        return 1;
    }
    match &info.details {
        TrackDetails::Sound(sound) if sound.block_align > 0 => {
            (data.len() / sound.block_align as usize) as u32
        }
        _ => 1,
    }
}
