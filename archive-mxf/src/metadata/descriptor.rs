//! Essence descriptors.
//!
//! The descriptor set hierarchy is flattened into [`DescriptorKind`], a
//! closed sum type decided once when the header metadata is decoded.

use super::sets::MetadataSet;
use super::Decoder;
use crate::error::Result;
use crate::types::Rational;
use crate::ul::{labels, UL};
use serde::{Deserialize, Serialize};
use tracing::warn;

mod tags {
    pub const LOCATORS: u16 = 0x2F01;
    pub const URL_STRING: u16 = 0x4001;
    pub const LOCATOR_NAME: u16 = 0x4101;

    pub const LINKED_TRACK_ID: u16 = 0x3006;
    pub const SAMPLE_RATE: u16 = 0x3001;
    pub const CONTAINER_DURATION: u16 = 0x3002;
    pub const ESSENCE_CONTAINER: u16 = 0x3004;
    pub const CODEC: u16 = 0x3005;

    pub const FRAME_LAYOUT: u16 = 0x320C;
    pub const STORED_WIDTH: u16 = 0x3203;
    pub const STORED_HEIGHT: u16 = 0x3202;
    pub const DISPLAY_WIDTH: u16 = 0x3209;
    pub const DISPLAY_HEIGHT: u16 = 0x3208;
    pub const ASPECT_RATIO: u16 = 0x320E;
    pub const PICTURE_CODING: u16 = 0x3201;
    pub const SIGNAL_STANDARD: u16 = 0x3215;

    pub const COMPONENT_DEPTH: u16 = 0x3301;
    pub const HORIZONTAL_SUBSAMPLING: u16 = 0x3302;
    pub const VERTICAL_SUBSAMPLING: u16 = 0x3308;

    pub const AUDIO_SAMPLING_RATE: u16 = 0x3D03;
    pub const LOCKED: u16 = 0x3D02;
    pub const CHANNEL_COUNT: u16 = 0x3D07;
    pub const QUANTIZATION_BITS: u16 = 0x3D01;
    pub const SOUND_COMPRESSION: u16 = 0x3D06;
    pub const BLOCK_ALIGN: u16 = 0x3D0A;
    pub const AVG_BPS: u16 = 0x3D09;

    pub const DATA_CODING: u16 = 0x3E01;

    pub const SUB_DESCRIPTORS: u16 = 0x3F01;
}

use tags::*;

/// Where external essence lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// URL or relative path to another file
    Network(String),
    /// Free text, e.g. a tape label
    Text(String),
}

/// Fields shared by picture descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PictureFields {
    pub frame_layout: Option<u8>,
    pub stored_width: u32,
    pub stored_height: u32,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    pub aspect_ratio: Rational,
    pub picture_coding: Option<UL>,
    pub signal_standard: Option<u8>,
}

/// CDCI (component video) fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CdciFields {
    pub component_depth: u32,
    pub horizontal_subsampling: u32,
    pub vertical_subsampling: u32,
}

/// Fields shared by sound descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundFields {
    pub sampling_rate: Rational,
    pub locked: Option<bool>,
    pub channel_count: u32,
    pub quantization_bits: u32,
    pub compression: Option<UL>,
}

/// Wave (and AES3) audio fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveFields {
    pub block_align: u16,
    pub avg_bps: u32,
}

/// Fields shared by data descriptors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFields {
    pub data_coding: Option<UL>,
}

/// The concrete descriptor class.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorKind {
    /// CDCI picture, including MPEG video descriptors
    Cdci(PictureFields, CdciFields),
    /// RGBA picture
    Rgba(PictureFields),
    /// Generic picture
    GenericPicture(PictureFields),
    /// Wave audio
    Wave(SoundFields, WaveFields),
    /// AES3 audio
    Aes3(SoundFields, WaveFields),
    /// Generic sound
    GenericSound(SoundFields),
    /// SMPTE ST 436 ANC data
    Anc(DataFields),
    /// SMPTE ST 436 VBI data
    Vbi(DataFields),
    /// Generic data
    GenericData(DataFields),
    /// Multiple descriptor with one sub-descriptor per track
    Multiple(Vec<Descriptor>),
    /// Plain file descriptor
    File,
    /// Tape (physical) descriptor
    Tape,
    /// Import (physical) descriptor
    Import,
    /// Recording (physical) descriptor
    Recording,
}

/// An essence descriptor attached to a source package.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub linked_track_id: Option<u32>,
    pub sample_rate: Rational,
    pub container_duration: Option<i64>,
    pub essence_container: Option<UL>,
    pub codec: Option<UL>,
    pub locators: Vec<Locator>,
    pub kind: DescriptorKind,
}

impl Descriptor {
    /// File descriptors describe essence in a file; physical ones describe
    /// source media.
    pub fn is_file_descriptor(&self) -> bool {
        !self.is_physical_descriptor()
    }

    /// Tape, import and recording descriptors.
    pub fn is_physical_descriptor(&self) -> bool {
        matches!(
            self.kind,
            DescriptorKind::Tape | DescriptorKind::Import | DescriptorKind::Recording
        )
    }

    /// The file descriptor describing `track_id`: the matching
    /// sub-descriptor of a multiple descriptor, otherwise this one.
    pub fn file_descriptor_for_track(&self, track_id: u32) -> Option<&Descriptor> {
        match &self.kind {
            DescriptorKind::Multiple(subs) => subs
                .iter()
                .find(|sub| sub.linked_track_id == Some(track_id)),
            _ if self.is_file_descriptor() => Some(self),
            _ => None,
        }
    }

    /// Picture fields, if a picture descriptor.
    pub fn picture(&self) -> Option<&PictureFields> {
        match &self.kind {
            DescriptorKind::Cdci(picture, _)
            | DescriptorKind::Rgba(picture)
            | DescriptorKind::GenericPicture(picture) => Some(picture),
            _ => None,
        }
    }

    /// Sound fields, if a sound descriptor.
    pub fn sound(&self) -> Option<&SoundFields> {
        match &self.kind {
            DescriptorKind::Wave(sound, _)
            | DescriptorKind::Aes3(sound, _)
            | DescriptorKind::GenericSound(sound) => Some(sound),
            _ => None,
        }
    }

    /// Data fields, if a data descriptor.
    pub fn data(&self) -> Option<&DataFields> {
        match &self.kind {
            DescriptorKind::Anc(data)
            | DescriptorKind::Vbi(data)
            | DescriptorKind::GenericData(data) => Some(data),
            _ => None,
        }
    }

    /// Wave fields of wave and AES3 descriptors.
    pub fn wave(&self) -> Option<&WaveFields> {
        match &self.kind {
            DescriptorKind::Wave(_, wave) | DescriptorKind::Aes3(_, wave) => Some(wave),
            _ => None,
        }
    }
}

fn picture_fields(set: &MetadataSet) -> Result<PictureFields> {
    Ok(PictureFields {
        frame_layout: set.get_u8(FRAME_LAYOUT)?,
        stored_width: set.get_u32(STORED_WIDTH)?.unwrap_or(0),
        stored_height: set.get_u32(STORED_HEIGHT)?.unwrap_or(0),
        display_width: set.get_u32(DISPLAY_WIDTH)?,
        display_height: set.get_u32(DISPLAY_HEIGHT)?,
        aspect_ratio: set.get_rational(ASPECT_RATIO)?.unwrap_or_default(),
        picture_coding: set.get_ul(PICTURE_CODING)?,
        signal_standard: set.get_u8(SIGNAL_STANDARD)?,
    })
}

fn cdci_fields(set: &MetadataSet) -> Result<CdciFields> {
    Ok(CdciFields {
        component_depth: set.get_u32(COMPONENT_DEPTH)?.unwrap_or(0),
        horizontal_subsampling: set.get_u32(HORIZONTAL_SUBSAMPLING)?.unwrap_or(0),
        vertical_subsampling: set.get_u32(VERTICAL_SUBSAMPLING)?.unwrap_or(0),
    })
}

fn sound_fields(set: &MetadataSet) -> Result<SoundFields> {
    Ok(SoundFields {
        sampling_rate: set.get_rational(AUDIO_SAMPLING_RATE)?.unwrap_or_default(),
        locked: set.get_bool(LOCKED)?,
        channel_count: set.get_u32(CHANNEL_COUNT)?.unwrap_or(0),
        quantization_bits: set.get_u32(QUANTIZATION_BITS)?.unwrap_or(0),
        compression: set.get_ul(SOUND_COMPRESSION)?,
    })
}

fn wave_fields(set: &MetadataSet) -> Result<WaveFields> {
    Ok(WaveFields {
        block_align: set.get_u16(BLOCK_ALIGN)?.unwrap_or(0),
        avg_bps: set.get_u32(AVG_BPS)?.unwrap_or(0),
    })
}

fn data_fields(set: &MetadataSet) -> Result<DataFields> {
    Ok(DataFields {
        data_coding: set.get_ul(DATA_CODING)?,
    })
}

impl<'a> Decoder<'a> {
    /// Decode a descriptor set. Unknown classes and dangling locator or
    /// sub-descriptor references are logged and skipped.
    pub(super) fn descriptor(&mut self, set: &'a MetadataSet) -> Result<Option<Descriptor>> {
        let kind = match set.class() {
            Some(c) if c == labels::CDCI_DESCRIPTOR[14] || c == labels::MPEG_VIDEO_DESCRIPTOR[14] => {
                DescriptorKind::Cdci(picture_fields(set)?, cdci_fields(set)?)
            }
            Some(c) if c == labels::RGBA_DESCRIPTOR[14] => DescriptorKind::Rgba(picture_fields(set)?),
            Some(c) if c == labels::GENERIC_PICTURE_DESCRIPTOR[14] => {
                DescriptorKind::GenericPicture(picture_fields(set)?)
            }
            Some(c) if c == labels::WAVE_AUDIO_DESCRIPTOR[14] => {
                DescriptorKind::Wave(sound_fields(set)?, wave_fields(set)?)
            }
            Some(c) if c == labels::AES3_AUDIO_DESCRIPTOR[14] => {
                DescriptorKind::Aes3(sound_fields(set)?, wave_fields(set)?)
            }
            Some(c) if c == labels::GENERIC_SOUND_DESCRIPTOR[14] => {
                DescriptorKind::GenericSound(sound_fields(set)?)
            }
            Some(c) if c == labels::ANC_DATA_DESCRIPTOR[14] => DescriptorKind::Anc(data_fields(set)?),
            Some(c) if c == labels::VBI_DATA_DESCRIPTOR[14] => DescriptorKind::Vbi(data_fields(set)?),
            Some(c) if c == labels::GENERIC_DATA_DESCRIPTOR[14] => {
                DescriptorKind::GenericData(data_fields(set)?)
            }
            Some(c) if c == labels::MULTIPLE_DESCRIPTOR[14] => {
                let mut subs = Vec::new();
                for uid in set.get_uuid_batch(SUB_DESCRIPTORS)? {
                    let Some(sub_set) = self.sets.get(&uid) else {
                        warn!(%uid, "ignoring unresolved sub-descriptor reference");
                        continue;
                    };
                    let sub = self.with_set(sub_set, |decoder, sub_set| decoder.descriptor(sub_set))?;
                    subs.extend(sub);
                }
                DescriptorKind::Multiple(subs)
            }
            Some(c) if c == labels::FILE_DESCRIPTOR[14] => DescriptorKind::File,
            Some(c) if c == labels::TAPE_DESCRIPTOR[14] => DescriptorKind::Tape,
            Some(c) if c == labels::IMPORT_DESCRIPTOR[14] => DescriptorKind::Import,
            Some(c) if c == labels::RECORDING_DESCRIPTOR[14] => DescriptorKind::Recording,
            _ => {
                warn!(key = %set.key, "ignoring unknown descriptor");
                return Ok(None);
            }
        };

        let mut locators = Vec::new();
        for uid in set.get_uuid_batch(LOCATORS)? {
            let Some(locator) = self.sets.get(&uid) else {
                warn!(%uid, "ignoring unresolved locator reference");
                continue;
            };
            if locator.key.matches(&labels::NETWORK_LOCATOR) {
                if let Some(url) = locator.get_string(URL_STRING)? {
                    locators.push(Locator::Network(url));
                }
            } else if locator.key.matches(&labels::TEXT_LOCATOR) {
                if let Some(name) = locator.get_string(LOCATOR_NAME)? {
                    locators.push(Locator::Text(name));
                }
            }
        }

        Ok(Some(Descriptor {
            linked_track_id: set.get_u32(LINKED_TRACK_ID)?,
            sample_rate: set.get_rational(SAMPLE_RATE)?.unwrap_or_default(),
            container_duration: set.get_i64(CONTAINER_DURATION)?,
            essence_container: set.get_ul(ESSENCE_CONTAINER)?,
            codec: set.get_ul(CODEC)?,
            locators,
            kind,
        }))
    }
}
