//! Index table segments and index tables.
//!
//! An index table maps edit units of one essence stream (IndexSID) to byte
//! offsets in that stream. Constant bytes-per-element (CBE) tables store a
//! single edit unit byte count; variable (VBE) tables store one entry per
//! edit unit, with temporal and key frame offsets for reordered essence.

use crate::error::{MxfError, Result};
use crate::klv::{local_items, read_batch_header, write_local_item, Klv, KlvStream};
use crate::metadata::TAG_INSTANCE_UID;
use crate::partition::Partition;
use crate::types::Rational;
use crate::ul::{labels, UniversalLabel};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;
use tracing::{debug, warn};
use uuid::Uuid;

const TAG_INDEX_EDIT_RATE: u16 = 0x3F0B;
const TAG_INDEX_START_POSITION: u16 = 0x3F0C;
const TAG_INDEX_DURATION: u16 = 0x3F0D;
const TAG_EDIT_UNIT_BYTE_COUNT: u16 = 0x3F05;
const TAG_INDEX_SID: u16 = 0x3F06;
const TAG_BODY_SID: u16 = 0x3F07;
const TAG_SLICE_COUNT: u16 = 0x3F08;
const TAG_POS_TABLE_COUNT: u16 = 0x3F0E;
const TAG_DELTA_ENTRY_ARRAY: u16 = 0x3F09;
const TAG_INDEX_ENTRY_ARRAY: u16 = 0x3F0A;

/// Index table segment
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTableSegment {
    /// Instance ID
    pub instance_id: Uuid,
    /// Index edit rate
    pub index_edit_rate: Rational,
    /// Index start position
    pub index_start_position: i64,
    /// Index duration
    pub index_duration: i64,
    /// Edit unit byte count (0 for variable)
    pub edit_unit_byte_count: u32,
    /// Index SID
    pub index_sid: u32,
    /// Body SID
    pub body_sid: u32,
    /// Slice count (for interleaved essence)
    pub slice_count: u8,
    /// Position table count
    pub pos_table_count: u8,
    /// Delta entries
    pub delta_entries: Vec<DeltaEntry>,
    /// Index entries
    pub index_entries: Vec<IndexEntry>,
}

impl Default for IndexTableSegment {
    fn default() -> Self {
        IndexTableSegment {
            instance_id: Uuid::nil(),
            index_edit_rate: Rational::fps_25(),
            index_start_position: 0,
            index_duration: 0,
            edit_unit_byte_count: 0,
            index_sid: 1,
            body_sid: 1,
            slice_count: 0,
            pos_table_count: 0,
            delta_entries: Vec::new(),
            index_entries: Vec::new(),
        }
    }
}

/// Delta entry (for multi-track essence)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEntry {
    /// Position offset
    pub pos_table_index: i8,
    /// Slice number
    pub slice: u8,
    /// Element delta (bytes from start)
    pub element_delta: u32,
}

/// Index entry
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Temporal offset
    pub temporal_offset: i8,
    /// Key frame offset
    pub key_frame_offset: i8,
    /// Flags
    pub flags: u8,
    /// Stream offset
    pub stream_offset: u64,
    /// Slice offsets (for interleaved)
    pub slice_offsets: Vec<u32>,
    /// Position table (for delta entries)
    pub pos_table: Vec<Rational>,
}

impl IndexEntry {
    /// Random access flag
    pub const FLAG_RANDOM_ACCESS: u8 = 0x80;
    /// Sequence header flag
    pub const FLAG_SEQUENCE_HEADER: u8 = 0x40;
    /// Forward prediction flag
    pub const FLAG_FORWARD_PREDICTION: u8 = 0x20;
    /// Backward prediction flag
    pub const FLAG_BACKWARD_PREDICTION: u8 = 0x10;

    /// Entry with no slices or position table.
    pub fn new(stream_offset: u64, temporal_offset: i8, key_frame_offset: i8, flags: u8) -> Self {
        IndexEntry {
            temporal_offset,
            key_frame_offset,
            flags,
            stream_offset,
            slice_offsets: Vec::new(),
            pos_table: Vec::new(),
        }
    }

    /// Check if this is a random access point
    pub fn is_random_access(&self) -> bool {
        (self.flags & Self::FLAG_RANDOM_ACCESS) != 0
    }
}

fn malformed(message: impl Into<String>) -> MxfError {
    MxfError::IncompleteIndexTable(message.into())
}

impl IndexTableSegment {
    /// Decode an index table segment value.
    pub fn parse(value: &[u8]) -> Result<Self> {
        let mut segment = IndexTableSegment {
            index_sid: 0,
            body_sid: 0,
            ..Default::default()
        };
        let mut delta_array = None;
        let mut entry_array = None;

        for item in local_items(value) {
            let (tag, mut data) = item?;
            match tag {
                TAG_INSTANCE_UID => {
                    segment.instance_id =
                        Uuid::from_slice(data).map_err(|_| malformed("bad segment InstanceUID"))?
                }
                TAG_INDEX_EDIT_RATE => {
                    let numerator = data.read_i32::<BigEndian>()?;
                    let denominator = data.read_i32::<BigEndian>()?;
                    segment.index_edit_rate = Rational::new(numerator, denominator);
                }
                TAG_INDEX_START_POSITION => {
                    segment.index_start_position = data.read_i64::<BigEndian>()?
                }
                TAG_INDEX_DURATION => segment.index_duration = data.read_i64::<BigEndian>()?,
                TAG_EDIT_UNIT_BYTE_COUNT => {
                    segment.edit_unit_byte_count = data.read_u32::<BigEndian>()?
                }
                TAG_INDEX_SID => segment.index_sid = data.read_u32::<BigEndian>()?,
                TAG_BODY_SID => segment.body_sid = data.read_u32::<BigEndian>()?,
                TAG_SLICE_COUNT => segment.slice_count = data.read_u8()?,
                TAG_POS_TABLE_COUNT => segment.pos_table_count = data.read_u8()?,
                TAG_DELTA_ENTRY_ARRAY => delta_array = Some(data),
                TAG_INDEX_ENTRY_ARRAY => entry_array = Some(data),
                _ => {}
            }
        }

        if let Some(data) = delta_array {
            let (count, item_size) = read_batch_header(data)?;
            if count > 0 && item_size < 6 {
                return Err(malformed(format!("delta entry size {}", item_size)));
            }
            for item in data[8..8 + count * item_size].chunks_exact(item_size.max(1)) {
                let mut item = item;
                segment.delta_entries.push(DeltaEntry {
                    pos_table_index: item.read_i8()?,
                    slice: item.read_u8()?,
                    element_delta: item.read_u32::<BigEndian>()?,
                });
            }
        }

        if let Some(data) = entry_array {
            let (count, item_size) = read_batch_header(data)?;
            let expected =
                11 + 4 * segment.slice_count as usize + 8 * segment.pos_table_count as usize;
            if count > 0 && item_size < expected {
                return Err(malformed(format!(
                    "index entry size {} smaller than {}",
                    item_size, expected
                )));
            }
            for item in data[8..8 + count * item_size].chunks_exact(item_size.max(1)) {
                let mut item = item;
                let temporal_offset = item.read_i8()?;
                let key_frame_offset = item.read_i8()?;
                let flags = item.read_u8()?;
                let stream_offset = item.read_u64::<BigEndian>()?;
                let slice_offsets = (0..segment.slice_count)
                    .map(|_| item.read_u32::<BigEndian>())
                    .collect::<std::io::Result<_>>()?;
                let pos_table = (0..segment.pos_table_count)
                    .map(|_| {
                        let numerator = item.read_i32::<BigEndian>()?;
                        let denominator = item.read_i32::<BigEndian>()?;
                        Ok::<_, std::io::Error>(Rational::new(numerator, denominator))
                    })
                    .collect::<std::io::Result<_>>()?;
                segment.index_entries.push(IndexEntry {
                    temporal_offset,
                    key_frame_offset,
                    flags,
                    stream_offset,
                    slice_offsets,
                    pos_table,
                });
            }
        }

        Ok(segment)
    }

    /// Write the segment as a KLV.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut value = Vec::new();
        let instance_id = if self.instance_id.is_nil() {
            Uuid::new_v4()
        } else {
            self.instance_id
        };
        write_local_item(&mut value, TAG_INSTANCE_UID, instance_id.as_bytes())?;

        let mut rate = Vec::with_capacity(8);
        rate.write_i32::<BigEndian>(self.index_edit_rate.numerator)?;
        rate.write_i32::<BigEndian>(self.index_edit_rate.denominator)?;
        write_local_item(&mut value, TAG_INDEX_EDIT_RATE, &rate)?;
        write_local_item(
            &mut value,
            TAG_INDEX_START_POSITION,
            &self.index_start_position.to_be_bytes(),
        )?;
        write_local_item(&mut value, TAG_INDEX_DURATION, &self.index_duration.to_be_bytes())?;
        write_local_item(
            &mut value,
            TAG_EDIT_UNIT_BYTE_COUNT,
            &self.edit_unit_byte_count.to_be_bytes(),
        )?;
        write_local_item(&mut value, TAG_INDEX_SID, &self.index_sid.to_be_bytes())?;
        write_local_item(&mut value, TAG_BODY_SID, &self.body_sid.to_be_bytes())?;
        write_local_item(&mut value, TAG_SLICE_COUNT, &[self.slice_count])?;
        write_local_item(&mut value, TAG_POS_TABLE_COUNT, &[self.pos_table_count])?;

        if !self.delta_entries.is_empty() {
            let mut array = Vec::new();
            array.write_u32::<BigEndian>(self.delta_entries.len() as u32)?;
            array.write_u32::<BigEndian>(6)?;
            for delta in &self.delta_entries {
                array.write_i8(delta.pos_table_index)?;
                array.write_u8(delta.slice)?;
                array.write_u32::<BigEndian>(delta.element_delta)?;
            }
            write_local_item(&mut value, TAG_DELTA_ENTRY_ARRAY, &array)?;
        }

        if !self.index_entries.is_empty() {
            let entry_size =
                11 + 4 * self.slice_count as usize + 8 * self.pos_table_count as usize;
            let mut array = Vec::new();
            array.write_u32::<BigEndian>(self.index_entries.len() as u32)?;
            array.write_u32::<BigEndian>(entry_size as u32)?;
            for entry in &self.index_entries {
                array.write_i8(entry.temporal_offset)?;
                array.write_i8(entry.key_frame_offset)?;
                array.write_u8(entry.flags)?;
                array.write_u64::<BigEndian>(entry.stream_offset)?;
                for slice in entry.slice_offsets.iter().take(self.slice_count as usize) {
                    array.write_u32::<BigEndian>(*slice)?;
                }
                for pos in entry.pos_table.iter().take(self.pos_table_count as usize) {
                    array.write_i32::<BigEndian>(pos.numerator)?;
                    array.write_i32::<BigEndian>(pos.denominator)?;
                }
            }
            write_local_item(&mut value, TAG_INDEX_ENTRY_ARRAY, &array)?;
        }

        Klv::new(labels::INDEX_TABLE_SEGMENT, value).write(writer)
    }

    fn is_cbe(&self) -> bool {
        self.edit_unit_byte_count > 0
    }
}

/// Index information for one edit unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditUnitEntry {
    /// Offset in the essence stream
    pub stream_offset: u64,
    /// Bytes up to the next edit unit, when known
    pub size: Option<u64>,
    /// Offset from presentation to stored order
    pub temporal_offset: i8,
    /// Offset to the preceding key frame
    pub key_frame_offset: i8,
    /// Index entry flags
    pub flags: u8,
}

/// The index table of one essence stream.
#[derive(Debug, Clone)]
pub struct IndexTable {
    index_sid: u32,
    edit_rate: Rational,
    edit_unit_byte_count: u32,
    segments: Vec<IndexTableSegment>,
}

impl IndexTable {
    /// Combine the segments of one IndexSID.
    ///
    /// VBE tables must cover edit units from 0 without gaps.
    pub fn from_segments(index_sid: u32, mut segments: Vec<IndexTableSegment>) -> Result<Self> {
        segments.retain(|s| s.index_sid == index_sid);
        if segments.is_empty() {
            return Err(MxfError::NoIndexTable(index_sid));
        }

        // later segments (e.g. repeated in the footer) replace earlier ones
        segments.reverse();
        segments.sort_by_key(|s| s.index_start_position);
        segments.dedup_by_key(|s| s.index_start_position);

        let edit_rate = segments[0].index_edit_rate;
        if let Some(cbe) = segments.iter().find(|s| s.is_cbe()) {
            let edit_unit_byte_count = cbe.edit_unit_byte_count;
            let segments = segments.into_iter().filter(|s| s.is_cbe()).collect();
            return Ok(IndexTable {
                index_sid,
                edit_rate,
                edit_unit_byte_count,
                segments,
            });
        }

        let mut expected_start = 0;
        for segment in &segments {
            if segment.index_start_position != expected_start {
                return Err(MxfError::IncompleteIndexTable(format!(
                    "index SID {} segment starts at {}, expected {}",
                    index_sid, segment.index_start_position, expected_start
                )));
            }
            if segment.index_entries.len() as i64 != segment.index_duration {
                return Err(MxfError::IncompleteIndexTable(format!(
                    "index SID {} segment at {} has {} entries for duration {}",
                    index_sid,
                    segment.index_start_position,
                    segment.index_entries.len(),
                    segment.index_duration
                )));
            }
            expected_start += segment.index_duration;
        }

        Ok(IndexTable {
            index_sid,
            edit_rate,
            edit_unit_byte_count: 0,
            segments,
        })
    }

    /// Read every index table segment of `index_sid` from the partitions.
    ///
    /// Returns `Ok(None)` when the file has no segments for the stream.
    pub fn read(
        stream: &mut KlvStream,
        partitions: &[Partition],
        index_sid: u32,
    ) -> Result<Option<Self>> {
        let mut segments = Vec::new();
        for partition in partitions
            .iter()
            .filter(|p| p.index_sid == index_sid && p.index_byte_count > 0)
        {
            let start = partition.pack_end + partition.header_byte_count;
            let end = start + partition.index_byte_count;
            stream.seek(start)?;
            while stream.tell() < end {
                let kl = stream.read_kl()?;
                if UniversalLabel::is_index_table_segment(&kl.key) {
                    let value = stream.read_value(kl.length)?;
                    segments.push(IndexTableSegment::parse(&value)?);
                } else {
                    stream.skip(kl.length)?;
                }
            }
        }
        debug!(index_sid, segments = segments.len(), "read index table segments");

        if segments.iter().all(|s| s.index_sid != index_sid) {
            return Ok(None);
        }
        Self::from_segments(index_sid, segments).map(Some)
    }

    /// The IndexSID.
    pub fn index_sid(&self) -> u32 {
        self.index_sid
    }

    /// The index edit rate.
    pub fn edit_rate(&self) -> Rational {
        self.edit_rate
    }

    /// Constant bytes per edit unit.
    pub fn is_cbe(&self) -> bool {
        self.edit_unit_byte_count > 0
    }

    /// Bytes per edit unit of a CBE table.
    pub fn edit_unit_byte_count(&self) -> u32 {
        self.edit_unit_byte_count
    }

    /// Edit units covered, or `None` for a CBE table without a duration.
    pub fn indexed_duration(&self) -> Option<i64> {
        let last = self.segments.last()?;
        if self.is_cbe() && last.index_duration == 0 {
            return None;
        }
        Some(last.index_start_position + last.index_duration)
    }

    /// Index information for `position` (0 = first edit unit of the stream).
    pub fn entry(&self, position: i64) -> Option<EditUnitEntry> {
        if position < 0 {
            return None;
        }
        if self.is_cbe() {
            if self.indexed_duration().is_some_and(|d| position >= d) {
                return None;
            }
            let size = self.edit_unit_byte_count as u64;
            return Some(EditUnitEntry {
                stream_offset: position as u64 * size,
                size: Some(size),
                temporal_offset: 0,
                key_frame_offset: 0,
                flags: IndexEntry::FLAG_RANDOM_ACCESS,
            });
        }

        let (segment_index, entry_index) = self.locate(position)?;
        let entry = &self.segments[segment_index].index_entries[entry_index];
        let size = self
            .locate(position + 1)
            .map(|(s, e)| self.segments[s].index_entries[e].stream_offset)
            .and_then(|next| next.checked_sub(entry.stream_offset));
        Some(EditUnitEntry {
            stream_offset: entry.stream_offset,
            size,
            temporal_offset: entry.temporal_offset,
            key_frame_offset: entry.key_frame_offset,
            flags: entry.flags,
        })
    }

    fn locate(&self, position: i64) -> Option<(usize, usize)> {
        let segment_index = match self
            .segments
            .binary_search_by_key(&position, |s| s.index_start_position)
        {
            Ok(index) => index,
            Err(0) => return None,
            Err(index) => index - 1,
        };
        let segment = &self.segments[segment_index];
        let offset = (position - segment.index_start_position) as usize;
        if offset >= segment.index_entries.len() {
            if segment.index_entries.len() as i64 != segment.index_duration {
                warn!(
                    index_sid = self.index_sid,
                    position, "index segment entries do not match its duration"
                );
            }
            return None;
        }
        Some((segment_index, offset))
    }
}
