//! MXF partition handling
//!
//! MXF files are divided into partitions:
//! - Header partition (required)
//! - Body partitions (optional)
//! - Footer partition (required for closed/complete files)
//!
//! A Random Index Pack at the end of the file lists every partition.
//! Files without one are located through the footer / previous partition
//! chain or, failing that, a forward scan.

use crate::error::{MxfError, Result};
use crate::klv::{encode_ber_length, read_batch_header, KlvStream};
use crate::ul::{
    essence_container_wrapping, labels, OperationalPattern, UniversalLabel, WrappingType, UL,
};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;
use tracing::{debug, warn};

/// Fixed part of a partition pack value, before the essence container batch items.
const PARTITION_PACK_FIXED_SIZE: usize = 88;

/// Partition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Header partition
    Header,
    /// Body partition
    Body,
    /// Footer partition
    Footer,
}

/// Partition status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    /// Open (not yet finalized)
    Open,
    /// Closed (finalized)
    Closed,
}

/// Partition completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionCompleteness {
    /// Incomplete (missing some metadata)
    Incomplete,
    /// Complete
    Complete,
}

/// MXF partition pack
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Partition kind
    pub kind: PartitionKind,
    /// Status (open/closed)
    pub status: PartitionStatus,
    /// Completeness
    pub completeness: PartitionCompleteness,
    /// Major version (should be 1)
    pub major_version: u16,
    /// Minor version (should be 2 or 3)
    pub minor_version: u16,
    /// KAG size (key alignment grid)
    pub kag_size: u32,
    /// This partition offset in file
    pub this_partition: u64,
    /// Previous partition offset
    pub previous_partition: u64,
    /// Footer partition offset
    pub footer_partition: u64,
    /// Header byte count (bytes after partition pack)
    pub header_byte_count: u64,
    /// Index byte count
    pub index_byte_count: u64,
    /// Index SID (stream ID for index)
    pub index_sid: u32,
    /// Body offset (for body partitions)
    pub body_offset: u64,
    /// Body SID (stream ID for essence)
    pub body_sid: u32,
    /// Operational pattern
    pub operational_pattern: UL,
    /// Essence containers
    pub essence_containers: Vec<UL>,
    /// File offset just after the partition pack KLV. Not serialised.
    pub pack_end: u64,
}

impl Default for Partition {
    fn default() -> Self {
        Partition {
            kind: PartitionKind::Header,
            status: PartitionStatus::Closed,
            completeness: PartitionCompleteness::Complete,
            major_version: 1,
            minor_version: 3,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern: labels::OP_1A,
            essence_containers: Vec::new(),
            pack_end: 0,
        }
    }
}

impl Partition {
    /// Create header partition
    pub fn header() -> Self {
        Partition {
            kind: PartitionKind::Header,
            ..Default::default()
        }
    }

    /// Create body partition
    pub fn body() -> Self {
        Partition {
            kind: PartitionKind::Body,
            ..Default::default()
        }
    }

    /// Create footer partition
    pub fn footer() -> Self {
        Partition {
            kind: PartitionKind::Footer,
            ..Default::default()
        }
    }

    /// Get the partition pack UL based on kind and status
    pub fn pack_ul(&self) -> UL {
        let kind = match self.kind {
            PartitionKind::Header => 0x02,
            PartitionKind::Body => 0x03,
            PartitionKind::Footer => 0x04,
        };
        let status = match (self.status, self.completeness) {
            (PartitionStatus::Open, PartitionCompleteness::Incomplete) => 0x01,
            (PartitionStatus::Closed, PartitionCompleteness::Incomplete) => 0x02,
            (PartitionStatus::Open, PartitionCompleteness::Complete) => 0x03,
            (PartitionStatus::Closed, PartitionCompleteness::Complete) => 0x04,
        };
        let mut key = labels::PARTITION_PACK_BASE;
        key[13] = kind;
        key[14] = status;
        key
    }

    /// Parse a partition pack from its key and value
    pub fn parse(key: &UniversalLabel, value: &[u8]) -> Result<Self> {
        if !key.is_partition_pack() {
            return Err(MxfError::InvalidPartition(format!(
                "{:?} is not a partition pack",
                key
            )));
        }
        if value.len() < PARTITION_PACK_FIXED_SIZE {
            return Err(MxfError::InsufficientData {
                needed: PARTITION_PACK_FIXED_SIZE,
                available: value.len(),
            });
        }

        let kind = match key.0[13] {
            0x02 => PartitionKind::Header,
            0x03 => PartitionKind::Body,
            _ => PartitionKind::Footer,
        };
        let (status, completeness) = match key.0[14] {
            0x01 => (PartitionStatus::Open, PartitionCompleteness::Incomplete),
            0x02 => (PartitionStatus::Closed, PartitionCompleteness::Incomplete),
            0x03 => (PartitionStatus::Open, PartitionCompleteness::Complete),
            0x04 => (PartitionStatus::Closed, PartitionCompleteness::Complete),
            other => {
                return Err(MxfError::InvalidPartition(format!(
                    "unknown partition status {:02x}",
                    other
                )))
            }
        };

        let mut cursor = value;
        let major_version = cursor.read_u16::<BigEndian>()?;
        let minor_version = cursor.read_u16::<BigEndian>()?;
        let kag_size = cursor.read_u32::<BigEndian>()?;
        let this_partition = cursor.read_u64::<BigEndian>()?;
        let previous_partition = cursor.read_u64::<BigEndian>()?;
        let footer_partition = cursor.read_u64::<BigEndian>()?;
        let header_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_sid = cursor.read_u32::<BigEndian>()?;
        let body_offset = cursor.read_u64::<BigEndian>()?;
        let body_sid = cursor.read_u32::<BigEndian>()?;

        let mut operational_pattern = [0u8; 16];
        operational_pattern.copy_from_slice(&cursor[..16]);

        let batch = &cursor[16..];
        let (count, item_size) = read_batch_header(batch)?;
        let essence_containers = if item_size == 16 {
            batch[8..8 + count * 16]
                .chunks_exact(16)
                .map(|chunk| {
                    let mut ul = [0u8; 16];
                    ul.copy_from_slice(chunk);
                    ul
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Partition {
            kind,
            status,
            completeness,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern,
            essence_containers,
            pack_end: 0,
        })
    }

    /// Write partition pack
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        writer.write_all(&self.pack_ul())?;

        let value_size = self.value_size();
        let len_bytes = encode_ber_length(value_size as u64);
        writer.write_all(&len_bytes)?;

        writer.write_u16::<BigEndian>(self.major_version)?;
        writer.write_u16::<BigEndian>(self.minor_version)?;
        writer.write_u32::<BigEndian>(self.kag_size)?;
        writer.write_u64::<BigEndian>(self.this_partition)?;
        writer.write_u64::<BigEndian>(self.previous_partition)?;
        writer.write_u64::<BigEndian>(self.footer_partition)?;
        writer.write_u64::<BigEndian>(self.header_byte_count)?;
        writer.write_u64::<BigEndian>(self.index_byte_count)?;
        writer.write_u32::<BigEndian>(self.index_sid)?;
        writer.write_u64::<BigEndian>(self.body_offset)?;
        writer.write_u32::<BigEndian>(self.body_sid)?;
        writer.write_all(&self.operational_pattern)?;

        writer.write_u32::<BigEndian>(self.essence_containers.len() as u32)?;
        writer.write_u32::<BigEndian>(16)?;
        for ec in &self.essence_containers {
            writer.write_all(ec)?;
        }

        Ok(16 + len_bytes.len() + value_size)
    }

    fn value_size(&self) -> usize {
        PARTITION_PACK_FIXED_SIZE + self.essence_containers.len() * 16
    }

    /// Calculate total size
    pub fn size(&self) -> usize {
        let value_size = self.value_size();
        16 + crate::klv::ber_length_size(value_size as u64) + value_size
    }

    /// Add essence container
    pub fn add_essence_container(&mut self, ul: UL) {
        if !self.essence_containers.contains(&ul) {
            self.essence_containers.push(ul);
        }
    }

    /// Closed partitions carry final metadata values.
    pub fn is_closed(&self) -> bool {
        self.status == PartitionStatus::Closed
    }

    /// Whether the pack records a footer partition offset.
    pub fn has_footer(&self) -> bool {
        self.footer_partition != 0
    }

    /// Classified operational pattern label.
    pub fn operational_pattern(&self) -> OperationalPattern {
        OperationalPattern::from_label(&self.operational_pattern)
    }

    /// File offset of the first essence byte, after header metadata and index segments.
    pub fn essence_start(&self) -> u64 {
        self.pack_end + self.header_byte_count + self.index_byte_count
    }
}

/// Random Index Pack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    /// Body SID (0 for header/footer)
    pub body_sid: u32,
    /// Byte offset of partition
    pub byte_offset: u64,
}

/// Random Index Pack
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RandomIndexPack {
    /// Partition entries in file order
    pub entries: Vec<RipEntry>,
}

impl RandomIndexPack {
    /// Create new RIP
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entry
    pub fn add_entry(&mut self, body_sid: u32, byte_offset: u64) {
        self.entries.push(RipEntry {
            body_sid,
            byte_offset,
        });
    }

    /// Parse a RIP value: 12-byte entries followed by the overall length
    pub fn parse(value: &[u8]) -> Result<Self> {
        if value.len() < 4 || (value.len() - 4) % 12 != 0 {
            return Err(MxfError::InvalidPartition(format!(
                "random index pack value of {} bytes",
                value.len()
            )));
        }

        let mut entries = Vec::with_capacity((value.len() - 4) / 12);
        let mut cursor = &value[..value.len() - 4];
        while !cursor.is_empty() {
            let body_sid = cursor.read_u32::<BigEndian>()?;
            let byte_offset = cursor.read_u64::<BigEndian>()?;
            entries.push(RipEntry {
                body_sid,
                byte_offset,
            });
        }

        Ok(RandomIndexPack { entries })
    }

    /// Write RIP
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let value_size = self.entries.len() * 12 + 4;

        writer.write_all(&labels::RANDOM_INDEX_PACK)?;
        let len_bytes = encode_ber_length(value_size as u64);
        writer.write_all(&len_bytes)?;

        for entry in &self.entries {
            writer.write_u32::<BigEndian>(entry.body_sid)?;
            writer.write_u64::<BigEndian>(entry.byte_offset)?;
        }

        let overall_length = (16 + len_bytes.len() + value_size) as u32;
        writer.write_u32::<BigEndian>(overall_length)?;

        Ok(overall_length as usize)
    }
}

/// The partitions of one file, ordered by file offset.
#[derive(Debug, Clone, Default)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
}

impl PartitionSet {
    /// Read the header partition pack at the start of the stream.
    pub fn read_header_partition(stream: &mut KlvStream) -> Result<Self> {
        stream.seek(0)?;
        let kl = stream.read_kl()?;
        if !kl.key.is_partition_pack() || kl.key.0[13] != 0x02 {
            return Err(MxfError::InvalidFile(
                "file does not start with a header partition pack".into(),
            ));
        }
        let value = stream.read_value(kl.length)?;
        let mut header = Partition::parse(&kl.key, &value)?;
        header.pack_end = kl.end_offset();

        Ok(PartitionSet {
            partitions: vec![header],
        })
    }

    /// Locate and read every partition pack. Partitions read before a
    /// failure are kept.
    pub fn read_partitions(&mut self, stream: &mut KlvStream) -> Result<()> {
        match self.partition_offsets_from_rip(stream) {
            Ok(Some(offsets)) => {
                for offset in offsets {
                    let partition = read_partition_at(stream, offset)?;
                    self.insert(partition);
                }
                return Ok(());
            }
            Ok(None) => debug!("no random index pack"),
            Err(e) => debug!(error = %e, "failed to read random index pack"),
        }

        if self.header().has_footer() {
            self.read_footer_chain(stream)
        } else {
            self.scan_forward(stream)
        }
    }

    fn partition_offsets_from_rip(&self, stream: &mut KlvStream) -> Result<Option<Vec<u64>>> {
        let size = stream.size()?;
        if size < 20 {
            return Ok(None);
        }
        stream.seek(size - 4)?;
        let mut length_bytes = [0u8; 4];
        stream.read_exact(&mut length_bytes)?;
        let overall_length = u32::from_be_bytes(length_bytes) as u64;
        if overall_length < 20 || overall_length > size {
            return Ok(None);
        }

        stream.seek(size - overall_length)?;
        let kl = stream.read_kl()?;
        if !kl.key.is_random_index_pack() || kl.end_offset() != size {
            return Ok(None);
        }
        let value = stream.read_value(kl.length)?;
        let rip = RandomIndexPack::parse(&value)?;
        Ok(Some(rip.entries.iter().map(|e| e.byte_offset).collect()))
    }

    fn read_footer_chain(&mut self, stream: &mut KlvStream) -> Result<()> {
        let mut offset = self.header().footer_partition;
        loop {
            let partition = read_partition_at(stream, offset)?;
            let previous = partition.previous_partition;
            self.insert(partition);
            if previous == 0 {
                return Ok(());
            }
            if previous >= offset {
                return Err(MxfError::InvalidPartition(format!(
                    "previous partition offset {} does not precede {}",
                    previous, offset
                )));
            }
            offset = previous;
        }
    }

    fn scan_forward(&mut self, stream: &mut KlvStream) -> Result<()> {
        stream.seek(self.header().pack_end)?;
        while let Some(kl) = stream.read_kl_opt()? {
            if kl.key.is_partition_pack() {
                let value = stream.read_value(kl.length)?;
                let mut partition = Partition::parse(&kl.key, &value)?;
                partition.pack_end = kl.end_offset();
                self.insert(partition);
            } else {
                stream.skip(kl.length)?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, partition: Partition) {
        match self
            .partitions
            .binary_search_by_key(&partition.this_partition, |p| p.this_partition)
        {
            Ok(index) => self.partitions[index] = partition,
            Err(index) => self.partitions.insert(index, partition),
        }
    }

    /// The header partition.
    pub fn header(&self) -> &Partition {
        &self.partitions[0]
    }

    /// All partitions in file order.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// A footer partition was found, so the partition list is final.
    pub fn is_complete(&self) -> bool {
        self.partitions
            .last()
            .is_some_and(|p| p.kind == PartitionKind::Footer)
    }

    /// The latest partition carrying header metadata.
    pub fn metadata_partition(&self) -> Option<&Partition> {
        self.partitions.iter().rev().find(|p| p.header_byte_count > 0)
    }

    /// Operational pattern declared by the header partition.
    pub fn operational_pattern(&self) -> OperationalPattern {
        self.header().operational_pattern()
    }

    /// Wrapping type from the essence container labels, or a guess from the
    /// operational pattern.
    pub fn wrapping_type(&self) -> WrappingType {
        let declared = self
            .header()
            .essence_containers
            .iter()
            .find_map(essence_container_wrapping);
        match declared {
            Some(wrapping) => wrapping,
            None if self.operational_pattern() == OperationalPattern::OpAtom => {
                warn!("unknown essence container wrapping, assuming clip wrapped");
                WrappingType::Clip
            }
            None => {
                warn!("unknown essence container wrapping, assuming frame wrapped");
                WrappingType::Frame
            }
        }
    }
}

fn read_partition_at(stream: &mut KlvStream, offset: u64) -> Result<Partition> {
    stream.seek(offset)?;
    let kl = stream.read_kl()?;
    let value = stream.read_value(kl.length)?;
    let mut partition = Partition::parse(&kl.key, &value)?;
    partition.pack_end = kl.end_offset();
    if partition.this_partition != offset {
        warn!(
            offset,
            this_partition = partition.this_partition,
            "partition pack offset mismatch"
        );
        partition.this_partition = offset;
    }
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klv::Klv;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn pack_bytes(partition: &Partition) -> Vec<u8> {
        let mut buffer = Vec::new();
        partition.write(&mut buffer).unwrap();
        buffer
    }

    fn parse_back(bytes: &[u8]) -> Partition {
        let mut key = [0u8; 16];
        key.copy_from_slice(&bytes[..16]);
        let (_, len_size) = crate::klv::decode_ber_length(&bytes[16..]).unwrap();
        Partition::parse(&UniversalLabel(key), &bytes[16 + len_size..]).unwrap()
    }

    #[test]
    fn test_partition_default() {
        let part = Partition::default();
        assert_eq!(part.kind, PartitionKind::Header);
        assert_eq!(part.major_version, 1);
        assert_eq!(part.minor_version, 3);
        assert!(part.is_closed());
        assert!(!part.has_footer());
    }

    #[test]
    fn test_partition_write_parse() {
        let mut part = Partition::body();
        part.status = PartitionStatus::Open;
        part.completeness = PartitionCompleteness::Incomplete;
        part.kag_size = 512;
        part.body_sid = 1;
        part.body_offset = 4096;
        part.operational_pattern = labels::OP_ATOM;
        part.add_essence_container(labels::MPEG_ES_CLIP_CONTAINER);
        part.add_essence_container(labels::MPEG_ES_CLIP_CONTAINER);

        let bytes = pack_bytes(&part);
        assert_eq!(bytes.len(), part.size());
        assert_eq!(&bytes[..16], &labels::BODY_PARTITION_OPEN_INCOMPLETE);

        let parsed = parse_back(&bytes);
        assert_eq!(parsed, part);
        assert_eq!(parsed.operational_pattern(), OperationalPattern::OpAtom);
    }

    #[test]
    fn test_partition_parse_rejects_other_keys() {
        let bytes = pack_bytes(&Partition::header());
        let err = Partition::parse(&UniversalLabel(labels::PRIMER_PACK), &bytes[17..]);
        assert!(matches!(err, Err(MxfError::InvalidPartition(_))));
    }

    #[test]
    fn test_essence_start() {
        let part = Partition {
            pack_end: 120,
            header_byte_count: 1000,
            index_byte_count: 200,
            ..Partition::header()
        };
        assert_eq!(part.essence_start(), 1320);
    }

    #[test]
    fn test_rip() {
        let mut rip = RandomIndexPack::new();
        rip.add_entry(0, 0);
        rip.add_entry(1, 1000);
        rip.add_entry(0, 5000);

        let mut buffer = Vec::new();
        let size = rip.write(&mut buffer).unwrap();
        assert_eq!(size, buffer.len());
        assert_eq!(
            u32::from_be_bytes(buffer[buffer.len() - 4..].try_into().unwrap()) as usize,
            buffer.len()
        );

        assert_eq!(RandomIndexPack::parse(&buffer[17..]).unwrap(), rip);
        assert!(RandomIndexPack::parse(&buffer[17..buffer.len() - 1]).is_err());
    }

    fn three_partition_file(with_rip: bool, with_footer_offset: bool) -> Vec<u8> {
        let mut header = Partition::header();
        header.header_byte_count = 24;
        let header_size = header.size() as u64 + 24;

        let mut body = Partition::body();
        body.this_partition = header_size;
        body.body_sid = 1;
        let body_size = body.size() as u64 + 20;

        let mut footer = Partition::footer();
        footer.this_partition = header_size + body_size;
        footer.previous_partition = header_size;
        footer.header_byte_count = 24;
        if with_footer_offset {
            header.footer_partition = footer.this_partition;
            body.footer_partition = footer.this_partition;
        }
        footer.footer_partition = footer.this_partition;

        let mut data = Vec::new();
        header.write(&mut data).unwrap();
        Klv::new(labels::FILL_ITEM, vec![0; 7]).write(&mut data).unwrap();
        body.write(&mut data).unwrap();
        Klv::new(labels::essence_element_key(0x1501_0101), vec![0; 3])
            .write(&mut data)
            .unwrap();
        footer.write(&mut data).unwrap();
        Klv::new(labels::FILL_ITEM, vec![0; 7]).write(&mut data).unwrap();
        if with_rip {
            let mut rip = RandomIndexPack::new();
            rip.add_entry(0, 0);
            rip.add_entry(1, header_size);
            rip.add_entry(0, footer.this_partition);
            rip.write(&mut data).unwrap();
        }
        data
    }

    fn read_set(data: Vec<u8>) -> (PartitionSet, Result<()>) {
        let mut stream = KlvStream::new(Box::new(Cursor::new(data)));
        let mut set = PartitionSet::read_header_partition(&mut stream).unwrap();
        let result = set.read_partitions(&mut stream);
        (set, result)
    }

    #[test]
    fn test_read_partitions_from_rip() {
        let (set, result) = read_set(three_partition_file(true, true));
        result.unwrap();
        assert_eq!(set.partitions().len(), 3);
        assert!(set.is_complete());
        assert_eq!(set.metadata_partition().unwrap().kind, PartitionKind::Footer);
    }

    #[test]
    fn test_read_partitions_from_footer_chain() {
        let (set, result) = read_set(three_partition_file(false, true));
        result.unwrap();
        let kinds: Vec<_> = set.partitions().iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PartitionKind::Header,
                PartitionKind::Body,
                PartitionKind::Footer
            ]
        );
    }

    #[test]
    fn test_read_partitions_by_scanning() {
        let (set, result) = read_set(three_partition_file(false, false));
        result.unwrap();
        assert_eq!(set.partitions().len(), 3);
        assert!(set.is_complete());
    }

    #[test]
    fn test_truncated_scan_keeps_partitions_read() {
        let mut data = three_partition_file(false, false);
        let footer_offset = data.len() - 24 - Partition::footer().size();
        data.truncate(footer_offset + 30);

        let (set, result) = read_set(data);
        assert!(result.is_err());
        assert_eq!(set.partitions().len(), 2);
        assert!(!set.is_complete());
        assert_eq!(set.metadata_partition().unwrap().kind, PartitionKind::Header);
    }

    #[test]
    fn test_read_header_partition_rejects_other_start() {
        let mut data = Vec::new();
        Klv::new(labels::FILL_ITEM, vec![0; 4]).write(&mut data).unwrap();
        let mut stream = KlvStream::new(Box::new(Cursor::new(data)));
        assert!(matches!(
            PartitionSet::read_header_partition(&mut stream),
            Err(MxfError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_wrapping_guess() {
        let mut header = Partition::header();
        header.operational_pattern = labels::OP_ATOM;
        let set = PartitionSet {
            partitions: vec![header.clone()],
        };
        assert_eq!(set.wrapping_type(), WrappingType::Clip);

        header.operational_pattern = labels::OP_1A;
        header.add_essence_container(labels::MPEG_ES_CLIP_CONTAINER);
        let set = PartitionSet {
            partitions: vec![header],
        };
        assert_eq!(set.wrapping_type(), WrappingType::Clip);
    }
}
