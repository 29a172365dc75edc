//! Universal Label (UL) types for MXF
//!
//! Universal Labels are 16-byte identifiers defined by SMPTE for
//! identifying every key, operational pattern, essence container and data
//! definition in an MXF file. Byte 7 is the registry version and is ignored
//! when comparing labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16-byte Universal Label
pub type UL = [u8; 16];

/// Universal Label wrapper with helper methods
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniversalLabel(pub UL);

impl UniversalLabel {
    /// Create from raw bytes
    pub fn new(bytes: UL) -> Self {
        UniversalLabel(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &UL {
        &self.0
    }

    /// Check if this is a SMPTE-registered label (starts with 06 0E 2B 34)
    pub fn is_smpte(&self) -> bool {
        self.0[0..4] == labels::SMPTE_PREFIX
    }

    /// Compare with `other` ignoring the version byte.
    pub fn matches(&self, other: &UL) -> bool {
        equal_ignoring_version(&self.0, other)
    }

    /// Check if this is a partition pack
    pub fn is_partition_pack(&self) -> bool {
        // the primer pack shares the first 13 bytes with byte 13 = 0x05
        self.0[0..13] == labels::PARTITION_PACK_BASE[0..13] && (0x02..=0x04).contains(&self.0[13])
    }

    /// Check if this is a primer pack
    pub fn is_primer_pack(&self) -> bool {
        self.0[0..13] == labels::PRIMER_PACK[0..13] && self.0[13] == 0x05
    }

    /// Check if this is a fill item
    pub fn is_fill_item(&self) -> bool {
        equal_ignoring_version(&self.0, &labels::FILL_ITEM)
            || equal_ignoring_version(&self.0, &labels::LEGACY_FILL_ITEM)
    }

    /// Check if this is an index table segment
    pub fn is_index_table_segment(&self) -> bool {
        self.is_smpte() && self.0[4] == 0x02 && self.0[8..15] == labels::INDEX_TABLE_SEGMENT[8..15]
    }

    /// Check if this is the random index pack
    pub fn is_random_index_pack(&self) -> bool {
        equal_ignoring_version(&self.0, &labels::RANDOM_INDEX_PACK)
    }

    /// Check if this is a generic container essence element key
    pub fn is_essence_element(&self) -> bool {
        self.0[0..7] == labels::ESSENCE_ELEMENT_PREFIX[0..7]
            && self.0[8..12] == labels::ESSENCE_ELEMENT_PREFIX[8..12]
    }

    /// Check if this is a header metadata local set
    pub fn is_local_set(&self) -> bool {
        self.is_smpte() && self.0[4] == 0x02 && self.0[5] == 0x53
    }

    /// Byte 14 of a structural metadata set key, identifying the set class.
    pub fn set_class(&self) -> Option<u8> {
        (self.is_local_set() && self.0[8..14] == labels::SET_KEY_BASE[8..14]).then_some(self.0[14])
    }

    /// Track number carried by an essence element key.
    pub fn essence_track_number(&self) -> u32 {
        u32::from_be_bytes([self.0[12], self.0[13], self.0[14], self.0[15]])
    }

    /// Get kind description
    pub fn kind(&self) -> LabelKind {
        if self.is_partition_pack() {
            LabelKind::PartitionPack
        } else if self.is_primer_pack() {
            LabelKind::PrimerPack
        } else if self.is_fill_item() {
            LabelKind::FillItem
        } else if self.is_random_index_pack() {
            LabelKind::RandomIndexPack
        } else if self.is_index_table_segment() {
            LabelKind::IndexTableSegment
        } else if self.is_essence_element() {
            LabelKind::EssenceElement
        } else if self.is_local_set() {
            LabelKind::MetadataSet
        } else {
            LabelKind::Unknown
        }
    }
}

impl fmt::Debug for UniversalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UL(")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for UniversalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", labels::lookup_name(&self.0))
    }
}

impl From<UL> for UniversalLabel {
    fn from(bytes: UL) -> Self {
        UniversalLabel(bytes)
    }
}

/// Kind of Universal Label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Partition pack
    PartitionPack,
    /// Primer pack
    PrimerPack,
    /// Fill item (KLV fill)
    FillItem,
    /// Random index pack
    RandomIndexPack,
    /// Index table segment
    IndexTableSegment,
    /// Essence element
    EssenceElement,
    /// Metadata set
    MetadataSet,
    /// Unknown
    Unknown,
}

/// Compare two labels ignoring the registry version byte.
pub fn equal_ignoring_version(a: &UL, b: &UL) -> bool {
    a[0..7] == b[0..7] && a[8..16] == b[8..16]
}

/// Operational pattern declared by a partition pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationalPattern {
    /// OP-Atom: one essence track per file.
    OpAtom,
    /// OP-1A: single item, single package.
    Op1a,
    /// OP-1B: single item, ganged packages.
    Op1b,
    /// Any other pattern.
    Other,
}

impl OperationalPattern {
    /// Classify an operational pattern label.
    pub fn from_label(ul: &UL) -> Self {
        if ul[0..4] != labels::SMPTE_PREFIX || ul[8..12] != [0x0D, 0x01, 0x02, 0x01] {
            return OperationalPattern::Other;
        }
        match (ul[12], ul[13]) {
            (0x10, _) => OperationalPattern::OpAtom,
            (0x01, 0x01) => OperationalPattern::Op1a,
            (0x01, 0x02) => OperationalPattern::Op1b,
            _ => OperationalPattern::Other,
        }
    }

    /// Label written for this pattern.
    pub fn label(self) -> UL {
        match self {
            OperationalPattern::OpAtom => labels::OP_ATOM,
            OperationalPattern::Op1a => labels::OP_1A,
            OperationalPattern::Op1b => labels::OP_1B,
            OperationalPattern::Other => labels::OP_2A,
        }
    }

    /// Whether the file reader handles this pattern.
    pub fn is_supported(self) -> bool {
        self != OperationalPattern::Other
    }
}

impl fmt::Display for OperationalPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationalPattern::OpAtom => "OP-Atom",
            OperationalPattern::Op1a => "OP-1A",
            OperationalPattern::Op1b => "OP-1B",
            OperationalPattern::Other => "other",
        };
        f.write_str(name)
    }
}

/// How essence is wrapped in the generic container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrappingType {
    /// One KLV per edit unit per element.
    Frame,
    /// One KLV holding every edit unit of the element.
    Clip,
}

/// Check if a label is a generic container essence container label
pub fn is_generic_container_label(ul: &UL) -> bool {
    ul[0..4] == labels::SMPTE_PREFIX && ul[4] == 0x04 && ul[8..13] == [0x0D, 0x01, 0x03, 0x01, 0x02]
}

/// Wrapping signalled by an essence container label, if recognised.
pub fn essence_container_wrapping(ul: &UL) -> Option<WrappingType> {
    use WrappingType::{Clip, Frame};

    if !is_generic_container_label(ul) {
        return None;
    }
    match (ul[13], ul[14], ul[15]) {
        // D10
        (0x01, _, _) => Some(Frame),
        // DV, MPEG ES, uncompressed, AVC
        (0x02 | 0x04 | 0x05 | 0x10, _, 0x01) => Some(Frame),
        (0x02 | 0x04 | 0x05 | 0x10, _, 0x02) => Some(Clip),
        // BWF and AES3
        (0x06, 0x01 | 0x03, _) => Some(Frame),
        (0x06, 0x02 | 0x04, _) => Some(Clip),
        // JPEG 2000, VC-3
        (0x0C | 0x11, 0x01, _) => Some(Frame),
        (0x0C | 0x11, 0x02, _) => Some(Clip),
        // VBI, ANC
        (0x0D | 0x0E, _, _) => Some(Frame),
        _ => None,
    }
}

/// Data definition of a track or structural component.
///
/// The variant order is the order tracks are presented in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum DataDefinition {
    /// Picture essence
    Picture,
    /// Sound essence
    Sound,
    /// Data essence (ANC, VBI)
    Data,
    /// Timecode
    Timecode,
    /// Descriptive metadata
    DescriptiveMetadata,
    /// Unrecognised label
    Unknown,
}

impl DataDefinition {
    /// Classify a data definition label.
    pub fn from_label(ul: &UL) -> Self {
        if ul[0..4] != labels::SMPTE_PREFIX {
            return DataDefinition::Unknown;
        }
        match ul[8..13] {
            [0x01, 0x03, 0x02, 0x02, 0x01] => DataDefinition::Picture,
            [0x01, 0x03, 0x02, 0x02, 0x02] => DataDefinition::Sound,
            [0x01, 0x03, 0x02, 0x02, 0x03] => DataDefinition::Data,
            [0x01, 0x03, 0x02, 0x01, 0x01] => DataDefinition::Timecode,
            [0x01, 0x03, 0x02, 0x01, 0x10] => DataDefinition::DescriptiveMetadata,
            _ => DataDefinition::Unknown,
        }
    }

    /// Label written for this data definition.
    pub fn label(self) -> UL {
        let last = match self {
            DataDefinition::Picture => [0x02, 0x01],
            DataDefinition::Sound => [0x02, 0x02],
            DataDefinition::Data => [0x02, 0x03],
            DataDefinition::Timecode => [0x01, 0x01],
            DataDefinition::DescriptiveMetadata => [0x01, 0x10],
            DataDefinition::Unknown => [0x00, 0x00],
        };
        [
            0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x01, 0x03, 0x02, last[0], last[1],
            0x00, 0x00, 0x00,
        ]
    }

    /// Picture, sound or data essence.
    pub fn is_essence(self) -> bool {
        matches!(
            self,
            DataDefinition::Picture | DataDefinition::Sound | DataDefinition::Data
        )
    }
}

/// Well-known Universal Labels
pub mod labels {
    use super::UL;

    /// SMPTE Label prefix
    pub const SMPTE_PREFIX: [u8; 4] = [0x06, 0x0E, 0x2B, 0x34];

    /// Partition pack base (last 3 bytes vary)
    pub const PARTITION_PACK_BASE: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x00, 0x00,
        0x00,
    ];

    /// Header partition - open incomplete
    pub const HEADER_PARTITION_OPEN_INCOMPLETE: UL = partition_key(0x02, 0x01);
    /// Header partition - closed incomplete
    pub const HEADER_PARTITION_CLOSED_INCOMPLETE: UL = partition_key(0x02, 0x02);
    /// Header partition - open complete
    pub const HEADER_PARTITION_OPEN_COMPLETE: UL = partition_key(0x02, 0x03);
    /// Header partition - closed complete
    pub const HEADER_PARTITION_CLOSED_COMPLETE: UL = partition_key(0x02, 0x04);
    /// Body partition - open incomplete
    pub const BODY_PARTITION_OPEN_INCOMPLETE: UL = partition_key(0x03, 0x01);
    /// Body partition - closed complete
    pub const BODY_PARTITION_CLOSED_COMPLETE: UL = partition_key(0x03, 0x04);
    /// Footer partition - closed complete
    pub const FOOTER_PARTITION: UL = partition_key(0x04, 0x04);

    /// Primer pack
    pub const PRIMER_PACK: UL = partition_key(0x05, 0x01);

    /// Fill item
    pub const FILL_ITEM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x02, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00,
        0x00,
    ];

    /// Fill item with the pre-2004 registry byte 8 value
    pub const LEGACY_FILL_ITEM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00,
        0x00,
    ];

    /// Index table segment
    pub const INDEX_TABLE_SEGMENT: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01,
        0x00,
    ];

    /// Random index pack
    pub const RANDOM_INDEX_PACK: UL = partition_key(0x11, 0x01);

    /// Generic container essence element key prefix
    pub const ESSENCE_ELEMENT_PREFIX: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x00, 0x00, 0x00,
        0x00,
    ];

    /// Structural metadata set key base; byte 14 is the set class
    pub const SET_KEY_BASE: UL = set_key(0x00);

    // Metadata sets

    /// Preface (root of metadata tree)
    pub const PREFACE: UL = set_key(0x2F);
    /// Content storage
    pub const CONTENT_STORAGE: UL = set_key(0x18);
    /// Essence container data
    pub const ESSENCE_CONTAINER_DATA: UL = set_key(0x23);
    /// Material package
    pub const MATERIAL_PACKAGE: UL = set_key(0x36);
    /// Source package
    pub const SOURCE_PACKAGE: UL = set_key(0x37);
    /// Timeline track
    pub const TIMELINE_TRACK: UL = set_key(0x3B);
    /// Event track
    pub const EVENT_TRACK: UL = set_key(0x39);
    /// Static track
    pub const STATIC_TRACK: UL = set_key(0x3A);
    /// Sequence
    pub const SEQUENCE: UL = set_key(0x0F);
    /// Source clip
    pub const SOURCE_CLIP: UL = set_key(0x11);
    /// Filler
    pub const FILLER: UL = set_key(0x09);
    /// Timecode component
    pub const TIMECODE_COMPONENT: UL = set_key(0x14);
    /// Essence group (Avid)
    pub const ESSENCE_GROUP: UL = set_key(0x05);
    /// Network locator
    pub const NETWORK_LOCATOR: UL = set_key(0x32);
    /// Text locator
    pub const TEXT_LOCATOR: UL = set_key(0x33);

    // Essence descriptors

    /// Plain file descriptor
    pub const FILE_DESCRIPTOR: UL = set_key(0x25);
    /// Generic picture essence descriptor
    pub const GENERIC_PICTURE_DESCRIPTOR: UL = set_key(0x27);
    /// CDCI descriptor (component video)
    pub const CDCI_DESCRIPTOR: UL = set_key(0x28);
    /// RGBA descriptor
    pub const RGBA_DESCRIPTOR: UL = set_key(0x29);
    /// MPEG video descriptor (a CDCI descriptor)
    pub const MPEG_VIDEO_DESCRIPTOR: UL = set_key(0x51);
    /// Generic sound essence descriptor
    pub const GENERIC_SOUND_DESCRIPTOR: UL = set_key(0x42);
    /// Wave audio descriptor
    pub const WAVE_AUDIO_DESCRIPTOR: UL = set_key(0x48);
    /// AES3 audio descriptor
    pub const AES3_AUDIO_DESCRIPTOR: UL = set_key(0x47);
    /// Generic data essence descriptor
    pub const GENERIC_DATA_DESCRIPTOR: UL = set_key(0x43);
    /// VBI data descriptor
    pub const VBI_DATA_DESCRIPTOR: UL = set_key(0x5B);
    /// ANC data descriptor
    pub const ANC_DATA_DESCRIPTOR: UL = set_key(0x5C);
    /// Multiple descriptor
    pub const MULTIPLE_DESCRIPTOR: UL = set_key(0x44);
    /// Tape descriptor
    pub const TAPE_DESCRIPTOR: UL = set_key(0x2E);
    /// Import descriptor
    pub const IMPORT_DESCRIPTOR: UL = set_key(0x4A);
    /// Recording descriptor
    pub const RECORDING_DESCRIPTOR: UL = set_key(0x61);

    // Operational patterns

    /// OP-Atom
    pub const OP_ATOM: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x02, 0x0D, 0x01, 0x02, 0x01, 0x10, 0x00, 0x00,
        0x00,
    ];
    /// OP-1A, internal essence, stream file, multi-track
    pub const OP_1A: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x01, 0x09,
        0x00,
    ];
    /// OP-1B, internal essence, stream file, multi-track
    pub const OP_1B: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x02, 0x09,
        0x00,
    ];
    /// OP-2A
    pub const OP_2A: UL = [
        0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x02, 0x01, 0x09,
        0x00,
    ];

    // Essence container labels

    /// D10 50Mbps 625/50i, frame wrapped
    pub const D10_50_625_CONTAINER: UL = container_label(0x01, 0x01, 0x01);
    /// MPEG ES video stream 0, frame wrapped
    pub const MPEG_ES_FRAME_CONTAINER: UL = container_label(0x04, 0x60, 0x01);
    /// MPEG ES video stream 0, clip wrapped
    pub const MPEG_ES_CLIP_CONTAINER: UL = container_label(0x04, 0x60, 0x02);
    /// Uncompressed picture, frame wrapped
    pub const UNCOMPRESSED_FRAME_CONTAINER: UL = container_label(0x05, 0x7F, 0x01);
    /// BWF audio, frame wrapped
    pub const BWF_FRAME_CONTAINER: UL = container_label(0x06, 0x01, 0x00);
    /// BWF audio, clip wrapped
    pub const BWF_CLIP_CONTAINER: UL = container_label(0x06, 0x02, 0x00);
    /// AES3 audio, frame wrapped
    pub const AES3_FRAME_CONTAINER: UL = container_label(0x06, 0x03, 0x00);
    /// AVC byte stream, frame wrapped
    pub const AVC_FRAME_CONTAINER: UL = container_label(0x10, 0x60, 0x01);
    /// VC-3, frame wrapped
    pub const VC3_FRAME_CONTAINER: UL = container_label(0x11, 0x01, 0x00);
    /// VBI data
    pub const VBI_CONTAINER: UL = container_label(0x0D, 0x00, 0x00);
    /// ANC data
    pub const ANC_CONTAINER: UL = container_label(0x0E, 0x00, 0x00);

    // Picture essence coding labels

    /// MPEG-2 422P@HL long GOP
    pub const MPEG2_422P_HL_LONG_GOP: UL = picture_coding([0x01, 0x04, 0x03, 0x00], 0x03);
    /// MPEG-2 MP@HL long GOP
    pub const MPEG2_MP_HL_LONG_GOP: UL = picture_coding([0x01, 0x03, 0x03, 0x00], 0x03);
    /// MPEG-2 MP@H-14 long GOP
    pub const MPEG2_MP_H14_LONG_GOP: UL = picture_coding([0x01, 0x05, 0x03, 0x00], 0x03);
    /// MPEG-2 422P@HL I-frame
    pub const MPEG2_422P_HL_I_FRAME: UL = picture_coding([0x01, 0x04, 0x02, 0x00], 0x03);
    /// D10 50Mbps 625
    pub const D10_50_625_CODING: UL = picture_coding([0x01, 0x02, 0x01, 0x05], 0x01);
    /// AVC-Intra 100 1080i
    pub const AVCI_100_1080I_CODING: UL = picture_coding([0x01, 0x32, 0x31, 0x03], 0x0A);
    /// VC-3 1080p 220
    pub const VC3_1080P_1235_CODING: UL = picture_coding([0x71, 0x01, 0x00, 0x00], 0x0A);

    const fn partition_key(kind: u8, status: u8) -> UL {
        [
            0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, kind,
            status, 0x00,
        ]
    }

    const fn set_key(class: u8) -> UL {
        [
            0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x01, 0x01, 0x01, 0x01,
            class, 0x00,
        ]
    }

    const fn container_label(mapping: u8, b14: u8, b15: u8) -> UL {
        [
            0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x02, mapping,
            b14, b15,
        ]
    }

    const fn picture_coding(tail: [u8; 4], version: u8) -> UL {
        [
            0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, version, 0x04, 0x01, 0x02, 0x02, tail[0],
            tail[1], tail[2], tail[3],
        ]
    }

    /// Essence element key for a track number.
    pub const fn essence_element_key(track_number: u32) -> UL {
        let n = track_number.to_be_bytes();
        [
            0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, n[0], n[1],
            n[2], n[3],
        ]
    }

    /// Lookup human-readable name for a UL
    pub fn lookup_name(ul: &UL) -> &'static str {
        let label = super::UniversalLabel(*ul);
        if label.is_primer_pack() {
            return "Primer Pack";
        }
        if label.is_partition_pack() {
            return match ul[13] {
                0x02 => "Header Partition",
                0x03 => "Body Partition",
                _ => "Footer Partition",
            };
        }
        if label.is_fill_item() {
            return "Fill Item";
        }
        if label.is_random_index_pack() {
            return "Random Index Pack";
        }
        if label.is_index_table_segment() {
            return "Index Table Segment";
        }
        if label.is_essence_element() {
            return "Essence Element";
        }
        match label.set_class() {
            Some(0x2F) => "Preface",
            Some(0x18) => "Content Storage",
            Some(0x23) => "Essence Container Data",
            Some(0x36) => "Material Package",
            Some(0x37) => "Source Package",
            Some(0x3B) => "Timeline Track",
            Some(0x39) => "Event Track",
            Some(0x3A) => "Static Track",
            Some(0x0F) => "Sequence",
            Some(0x11) => "Source Clip",
            Some(0x09) => "Filler",
            Some(0x14) => "Timecode Component",
            Some(0x05) => "Essence Group",
            Some(0x32) => "Network Locator",
            Some(0x33) => "Text Locator",
            Some(0x25) => "File Descriptor",
            Some(0x27) => "Generic Picture Descriptor",
            Some(0x28) => "CDCI Descriptor",
            Some(0x29) => "RGBA Descriptor",
            Some(0x51) => "MPEG Video Descriptor",
            Some(0x42) => "Generic Sound Descriptor",
            Some(0x48) => "Wave Audio Descriptor",
            Some(0x47) => "AES3 Audio Descriptor",
            Some(0x43) => "Generic Data Descriptor",
            Some(0x5B) => "VBI Data Descriptor",
            Some(0x5C) => "ANC Data Descriptor",
            Some(0x44) => "Multiple Descriptor",
            Some(0x2E) => "Tape Descriptor",
            Some(0x4A) => "Import Descriptor",
            Some(0x61) => "Recording Descriptor",
            Some(_) => "Metadata Set",
            None if label.is_local_set() => "Metadata Set",
            None => "Unknown",
        }
    }
}
