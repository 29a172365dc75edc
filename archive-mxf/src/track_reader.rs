//! Track readers and the track information they carry.

use crate::essence_type::EssenceType;
use crate::frame::FrameBuffer;
use crate::frame_info::{extractor_for, FrameInfo, FrameInfoExtractor};
use crate::metadata::{CdciFields, Descriptor, DescriptorKind, PictureFields, SoundFields};
use crate::types::{Rational, Umid};
use crate::ul::{DataDefinition, UL};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Picture track properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PictureTrackInfo {
    pub picture: PictureFields,
    /// Present for CDCI descriptors
    pub cdci: Option<CdciFields>,
    /// In-frame AVC-Intra header
    pub avci_header: Option<Vec<u8>>,
}

/// Sound track properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundTrackInfo {
    pub sound: SoundFields,
    pub block_align: u16,
    /// D10 AES3 channel valid flags
    pub d10_aes3_valid_flags: Option<u8>,
}

/// Data track properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTrackInfo {
    pub data_coding: Option<UL>,
    pub anc_manifest: Vec<crate::frame_info::AncManifestElement>,
    pub vbi_manifest: Vec<crate::frame_info::VbiManifestElement>,
}

/// Essence kind specific properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackDetails {
    Picture(PictureTrackInfo),
    Sound(SoundTrackInfo),
    Data(DataTrackInfo),
}

impl TrackDetails {
    /// Details taken from a file descriptor.
    pub fn from_descriptor(data_def: DataDefinition, descriptor: &Descriptor) -> Self {
        match data_def {
            DataDefinition::Picture => TrackDetails::Picture(PictureTrackInfo {
                picture: descriptor.picture().cloned().unwrap_or_default(),
                cdci: match &descriptor.kind {
                    DescriptorKind::Cdci(_, cdci) => Some(cdci.clone()),
                    _ => None,
                },
                avci_header: None,
            }),
            DataDefinition::Sound => TrackDetails::Sound(SoundTrackInfo {
                sound: descriptor.sound().cloned().unwrap_or_default(),
                block_align: descriptor.wave().map(|w| w.block_align).unwrap_or(0),
                d10_aes3_valid_flags: None,
            }),
            _ => TrackDetails::Data(DataTrackInfo {
                data_coding: descriptor.data().and_then(|d| d.data_coding),
                ..Default::default()
            }),
        }
    }

    /// Copy extracted frame information into the details.
    pub fn apply_frame_info(&mut self, info: &FrameInfo) {
        match self {
            TrackDetails::Picture(picture) => {
                if info.avci_header.is_some() {
                    picture.avci_header.clone_from(&info.avci_header);
                }
            }
            TrackDetails::Sound(sound) => {
                if info.d10_aes3_valid_flags.is_some() {
                    sound.d10_aes3_valid_flags = info.d10_aes3_valid_flags;
                }
            }
            TrackDetails::Data(data) => {
                data.anc_manifest.clone_from(&info.anc_manifest);
                data.vbi_manifest.clone_from(&info.vbi_manifest);
            }
        }
    }
}

/// Properties of one readable track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MxfTrackInfo {
    pub data_def: DataDefinition,
    pub essence_type: EssenceType,
    /// Material track edit rate
    pub edit_rate: Rational,
    /// Duration at `edit_rate`, -1 when unknown
    pub duration: i64,
    pub material_package_uid: Umid,
    pub material_track_id: u32,
    pub material_track_number: u32,
    pub file_package_uid: Umid,
    pub file_track_id: u32,
    pub file_track_number: u32,
    /// Edit rate of the file source track
    pub file_edit_rate: Rational,
    /// Filler preceding the source clip in the material track
    pub lead_filler_offset: i64,
    pub essence_container_label: Option<UL>,
    pub details: TrackDetails,
}

impl MxfTrackInfo {
    /// Audio sampling rate of sound tracks.
    pub fn sampling_rate(&self) -> Option<Rational> {
        match &self.details {
            TrackDetails::Sound(sound) => Some(sound.sound.sampling_rate),
            _ => None,
        }
    }
}

/// Reader state for one track.
pub struct MxfTrackReader {
    info: MxfTrackInfo,
    enabled: bool,
    frame_buffer: FrameBuffer,
    pub(crate) extractor: Option<Box<dyn FrameInfoExtractor>>,
    pub(crate) frame_info: FrameInfo,
    /// Frames the extractor accepted so far
    pub(crate) frame_info_frames: u32,
}

impl fmt::Debug for MxfTrackReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MxfTrackReader")
            .field("info", &self.info)
            .field("enabled", &self.enabled)
            .field("buffered", &self.frame_buffer.len())
            .finish()
    }
}

impl MxfTrackReader {
    /// Create an enabled track reader.
    pub fn new(info: MxfTrackInfo) -> Self {
        let extractor = extractor_for(info.essence_type);
        MxfTrackReader {
            info,
            enabled: true,
            frame_buffer: FrameBuffer::new(),
            extractor,
            frame_info: FrameInfo::default(),
            frame_info_frames: 0,
        }
    }

    /// Track properties.
    pub fn info(&self) -> &MxfTrackInfo {
        &self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut MxfTrackInfo {
        &mut self.info
    }

    /// Whether frames are read for this track.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Frames read and not yet consumed.
    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame_buffer
    }

    /// Mutable access to the frame buffer, e.g. to pop frames.
    pub fn frame_buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.frame_buffer
    }

    /// Whether frame info extraction is still pending.
    pub(crate) fn wants_frame_info(&self) -> bool {
        self.enabled && self.extractor.is_some()
    }

    /// Finish extraction and publish what was found.
    pub(crate) fn finish_frame_info(&mut self) {
        self.extractor = None;
        let frame_info = std::mem::take(&mut self.frame_info);
        self.info.details.apply_frame_info(&frame_info);
    }
}
