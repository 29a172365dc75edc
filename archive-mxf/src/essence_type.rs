//! Essence type classification from descriptors.

use crate::metadata::{Descriptor, DescriptorKind};
use crate::ul::{is_generic_container_label, UL};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Essence carried by a track.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EssenceType {
    /// D10 30 Mbps
    D10_30,
    /// D10 40 Mbps
    D10_40,
    /// D10 50 Mbps
    D10_50,
    /// MPEG-2 422P@HL long GOP
    Mpeg2Lg422PHl,
    /// MPEG-2 MP@HL long GOP
    Mpeg2LgMpHl,
    /// MPEG-2 MP@H-14 long GOP
    Mpeg2LgMpH14,
    /// MPEG-2 MP@ML long GOP
    Mpeg2LgMpMl,
    /// MPEG-2 422P@ML long GOP
    Mpeg2Lg422PMl,
    /// MPEG-2 I-frame only
    Mpeg2IFrame,
    /// AVC-Intra
    AvcIntra,
    /// DV
    Dv,
    /// Uncompressed standard definition
    UncompressedSd,
    /// Uncompressed high definition
    UncompressedHd,
    /// VC-3 (DNxHD)
    Vc3,
    /// JPEG 2000
    Jpeg2000,
    /// Other picture essence
    Picture,
    /// Wave PCM
    WavePcm,
    /// AES3 PCM
    Aes3Pcm,
    /// AES3 PCM carried in a D10 content package
    D10Aes3Pcm,
    /// Other sound essence
    Sound,
    /// SMPTE ST 436 ancillary data
    AncData,
    /// SMPTE ST 436 vertical blanking data
    VbiData,
    /// Other data essence
    Data,
}

impl EssenceType {
    /// Classify the essence described by a file descriptor.
    pub fn from_descriptor(descriptor: &Descriptor) -> Self {
        let container = descriptor.essence_container.as_ref();
        let is_d10_container = container.is_some_and(is_d10_container);

        if let Some(picture) = descriptor.picture() {
            let from_coding = picture
                .picture_coding
                .as_ref()
                .and_then(|coding| picture_type(coding, picture.stored_height));
            return match from_coding {
                Some(essence_type) => essence_type,
                None if is_d10_container => d10_type_from_container(container),
                None if container.is_some_and(is_uncompressed_container) => {
                    if picture.stored_height > 576 {
                        EssenceType::UncompressedHd
                    } else {
                        EssenceType::UncompressedSd
                    }
                }
                None => EssenceType::Picture,
            };
        }

        match &descriptor.kind {
            DescriptorKind::Wave(..) | DescriptorKind::Aes3(..) if is_d10_container => {
                EssenceType::D10Aes3Pcm
            }
            DescriptorKind::Aes3(..) => EssenceType::Aes3Pcm,
            DescriptorKind::Wave(..) => EssenceType::WavePcm,
            DescriptorKind::GenericSound(_) => EssenceType::Sound,
            DescriptorKind::Anc(_) => EssenceType::AncData,
            DescriptorKind::Vbi(_) => EssenceType::VbiData,
            _ => match container.map(|c| c[13]) {
                Some(0x0E) => EssenceType::AncData,
                Some(0x0D) => EssenceType::VbiData,
                _ => EssenceType::Data,
            },
        }
    }

    /// Inter-frame coded essence that needs precharge and rollout.
    pub fn is_mpeg2_long_gop(self) -> bool {
        matches!(
            self,
            EssenceType::Mpeg2Lg422PHl
                | EssenceType::Mpeg2LgMpHl
                | EssenceType::Mpeg2LgMpH14
                | EssenceType::Mpeg2LgMpMl
                | EssenceType::Mpeg2Lg422PMl
        )
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            EssenceType::D10_30 => "D10 30Mbps",
            EssenceType::D10_40 => "D10 40Mbps",
            EssenceType::D10_50 => "D10 50Mbps",
            EssenceType::Mpeg2Lg422PHl => "MPEG-2 Long GOP 422P@HL",
            EssenceType::Mpeg2LgMpHl => "MPEG-2 Long GOP MP@HL",
            EssenceType::Mpeg2LgMpH14 => "MPEG-2 Long GOP MP@H-14",
            EssenceType::Mpeg2LgMpMl => "MPEG-2 Long GOP MP@ML",
            EssenceType::Mpeg2Lg422PMl => "MPEG-2 Long GOP 422P@ML",
            EssenceType::Mpeg2IFrame => "MPEG-2 I-frame",
            EssenceType::AvcIntra => "AVC-Intra",
            EssenceType::Dv => "DV",
            EssenceType::UncompressedSd => "Uncompressed SD",
            EssenceType::UncompressedHd => "Uncompressed HD",
            EssenceType::Vc3 => "VC-3",
            EssenceType::Jpeg2000 => "JPEG 2000",
            EssenceType::Picture => "Picture",
            EssenceType::WavePcm => "WAVE PCM",
            EssenceType::Aes3Pcm => "AES3 PCM",
            EssenceType::D10Aes3Pcm => "D10 AES3 PCM",
            EssenceType::Sound => "Sound",
            EssenceType::AncData => "ANC data",
            EssenceType::VbiData => "VBI data",
            EssenceType::Data => "Data",
        }
    }
}

impl fmt::Display for EssenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_d10_container(ul: &UL) -> bool {
    is_generic_container_label(ul) && ul[13] == 0x01
}

fn is_uncompressed_container(ul: &UL) -> bool {
    is_generic_container_label(ul) && ul[13] == 0x05
}

fn d10_type_from_container(container: Option<&UL>) -> EssenceType {
    // byte 14: 01/02 50 Mbps, 03/04 40 Mbps, 05/06 30 Mbps
    match container.map(|c| c[14]) {
        Some(0x03 | 0x04) => EssenceType::D10_40,
        Some(0x05 | 0x06) => EssenceType::D10_30,
        _ => EssenceType::D10_50,
    }
}

fn picture_type(coding: &UL, stored_height: u32) -> Option<EssenceType> {
    if coding[0..4] != [0x06, 0x0E, 0x2B, 0x34] {
        return None;
    }
    if coding[8..11] == [0x04, 0x01, 0x02] && coding[11] == 0x01 {
        return Some(if stored_height > 576 {
            EssenceType::UncompressedHd
        } else {
            EssenceType::UncompressedSd
        });
    }
    if coding[8..12] != [0x04, 0x01, 0x02, 0x02] {
        return None;
    }

    match (coding[12], coding[13], coding[14]) {
        (0x01, 0x02, 0x01) => Some(match coding[15] {
            0x01 | 0x02 => EssenceType::D10_30,
            0x03 | 0x04 => EssenceType::D10_40,
            _ => EssenceType::D10_50,
        }),
        (0x01, 0x32, 0x20..=0x3F) => Some(EssenceType::AvcIntra),
        (0x01, _, 0x02) => Some(EssenceType::Mpeg2IFrame),
        (0x01, profile, 0x03) => Some(match profile {
            0x04 => EssenceType::Mpeg2Lg422PHl,
            0x03 => EssenceType::Mpeg2LgMpHl,
            0x05 => EssenceType::Mpeg2LgMpH14,
            0x01 => EssenceType::Mpeg2LgMpMl,
            0x02 => EssenceType::Mpeg2Lg422PMl,
            _ => return None,
        }),
        (0x02, _, _) => Some(EssenceType::Dv),
        (0x03, 0x01, _) => Some(EssenceType::Jpeg2000),
        (0x71, _, _) => Some(EssenceType::Vc3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{PictureFields, SoundFields};
    use crate::types::Rational;
    use crate::ul::labels;
    use pretty_assertions::assert_eq;

    fn picture_descriptor(coding: Option<UL>, container: UL, height: u32) -> Descriptor {
        Descriptor {
            linked_track_id: Some(1),
            sample_rate: Rational::fps_25(),
            container_duration: None,
            essence_container: Some(container),
            codec: None,
            locators: Vec::new(),
            kind: DescriptorKind::GenericPicture(PictureFields {
                stored_height: height,
                picture_coding: coding,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_mpeg2_codings() {
        let lg = picture_descriptor(
            Some(labels::MPEG2_422P_HL_LONG_GOP),
            labels::MPEG_ES_FRAME_CONTAINER,
            1080,
        );
        assert_eq!(EssenceType::from_descriptor(&lg), EssenceType::Mpeg2Lg422PHl);
        assert!(EssenceType::from_descriptor(&lg).is_mpeg2_long_gop());

        let iframe = picture_descriptor(
            Some(labels::MPEG2_422P_HL_I_FRAME),
            labels::MPEG_ES_FRAME_CONTAINER,
            1080,
        );
        assert_eq!(EssenceType::from_descriptor(&iframe), EssenceType::Mpeg2IFrame);
        assert!(!EssenceType::Mpeg2IFrame.is_mpeg2_long_gop());
    }

    #[test]
    fn test_other_picture_codings() {
        let d10 = picture_descriptor(
            Some(labels::D10_50_625_CODING),
            labels::D10_50_625_CONTAINER,
            608,
        );
        assert_eq!(EssenceType::from_descriptor(&d10), EssenceType::D10_50);

        let avci = picture_descriptor(
            Some(labels::AVCI_100_1080I_CODING),
            labels::AVC_FRAME_CONTAINER,
            1080,
        );
        assert_eq!(EssenceType::from_descriptor(&avci), EssenceType::AvcIntra);

        let vc3 = picture_descriptor(
            Some(labels::VC3_1080P_1235_CODING),
            labels::VC3_FRAME_CONTAINER,
            1080,
        );
        assert_eq!(EssenceType::from_descriptor(&vc3), EssenceType::Vc3);

        let uncompressed = picture_descriptor(None, labels::UNCOMPRESSED_FRAME_CONTAINER, 1080);
        assert_eq!(
            EssenceType::from_descriptor(&uncompressed),
            EssenceType::UncompressedHd
        );

        let d10_no_coding = picture_descriptor(None, labels::D10_50_625_CONTAINER, 608);
        assert_eq!(EssenceType::from_descriptor(&d10_no_coding), EssenceType::D10_50);
    }

    #[test]
    fn test_sound_types() {
        let mut descriptor = Descriptor {
            linked_track_id: Some(2),
            sample_rate: Rational::fps_25(),
            container_duration: None,
            essence_container: Some(labels::D10_50_625_CONTAINER),
            codec: None,
            locators: Vec::new(),
            kind: DescriptorKind::GenericSound(SoundFields::default()),
        };
        assert_eq!(EssenceType::from_descriptor(&descriptor), EssenceType::Sound);

        descriptor.kind = DescriptorKind::Aes3(SoundFields::default(), Default::default());
        assert_eq!(
            EssenceType::from_descriptor(&descriptor),
            EssenceType::D10Aes3Pcm
        );

        descriptor.essence_container = Some(labels::BWF_FRAME_CONTAINER);
        descriptor.kind = DescriptorKind::Wave(SoundFields::default(), Default::default());
        assert_eq!(EssenceType::from_descriptor(&descriptor), EssenceType::WavePcm);
    }
}
