//! Information carried inside essence frames.
//!
//! Some track properties are only found in the essence itself: AVC-Intra
//! sequence headers, the channel valid flags of D10 AES3 audio and the
//! line layout of SMPTE ST 436 ancillary and VBI data. The file reader
//! offers the first frames of a track to an extractor after opening.

use crate::error::{MxfError, Result};
use crate::essence_type::EssenceType;
use crate::frame::Frame;
use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Seek, SeekFrom};

/// Whether an extractor wants further frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    /// Nothing more to learn
    Complete,
    /// Offer the next frame as well
    NeedMore,
}

/// The essence ended before extraction completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfEssence;

impl fmt::Display for EndOfEssence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("end of essence")
    }
}

/// One line of an ST 436 ANC element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AncManifestElement {
    pub line_number: u16,
    pub wrapping_type: u8,
    pub sample_coding: u8,
    pub did: u8,
    pub sdid: u8,
}

/// One line of an ST 436 VBI element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VbiManifestElement {
    pub line_number: u16,
    pub wrapping_type: u8,
    pub sample_coding: u8,
    pub sample_count: u16,
}

/// Results gathered by an extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// AVC-Intra SPS/PPS header found at the start of a frame
    pub avci_header: Option<Vec<u8>>,
    /// D10 AES3 channel valid flags
    pub d10_aes3_valid_flags: Option<u8>,
    /// Distinct ANC lines seen
    pub anc_manifest: Vec<AncManifestElement>,
    /// Distinct VBI lines seen
    pub vbi_manifest: Vec<VbiManifestElement>,
}

/// Inspects frames of one track.
pub trait FrameInfoExtractor {
    /// Inspect one frame, recording findings in `info`.
    ///
    /// An error means the frame could not be interpreted.
    fn extract(&mut self, frame: &Frame, info: &mut FrameInfo) -> Result<Extraction>;
}

/// The extractor for an essence type, if its frames carry track info.
pub fn extractor_for(essence_type: EssenceType) -> Option<Box<dyn FrameInfoExtractor>> {
    match essence_type {
        EssenceType::AvcIntra => Some(Box::new(AvciHeaderExtractor)),
        EssenceType::D10Aes3Pcm => Some(Box::new(D10Aes3FlagsExtractor)),
        EssenceType::AncData => Some(Box::new(AncManifestExtractor)),
        EssenceType::VbiData => Some(Box::new(VbiManifestExtractor)),
        _ => None,
    }
}

/// Header bytes inspected for an AVC-Intra sequence parameter set.
pub const AVCI_HEADER_SIZE: usize = 512;

/// Finds the in-frame SPS/PPS header of AVC-Intra essence.
#[derive(Debug, Default)]
pub struct AvciHeaderExtractor;

impl FrameInfoExtractor for AvciHeaderExtractor {
    fn extract(&mut self, frame: &Frame, info: &mut FrameInfo) -> Result<Extraction> {
        let window = &frame.data[..frame.data.len().min(AVCI_HEADER_SIZE)];
        let has_sps = window
            .windows(4)
            .any(|w| w[..3] == [0x00, 0x00, 0x01] && w[3] & 0x1F == 7);
        if has_sps && frame.data.len() >= AVCI_HEADER_SIZE {
            info.avci_header = Some(frame.data[..AVCI_HEADER_SIZE].to_vec());
        }
        // frames without a header rely on the descriptor's coding label
        Ok(Extraction::Complete)
    }
}

/// Reads the channel valid flags of D10 AES3 audio.
#[derive(Debug, Default)]
pub struct D10Aes3FlagsExtractor;

impl FrameInfoExtractor for D10Aes3FlagsExtractor {
    fn extract(&mut self, frame: &Frame, info: &mut FrameInfo) -> Result<Extraction> {
        if frame.data.len() < 4 {
            return Err(MxfError::InsufficientData {
                needed: 4,
                available: frame.data.len(),
            });
        }
        info.d10_aes3_valid_flags = Some(frame.data[3]);
        Ok(Extraction::Complete)
    }
}

struct St436Line<'a> {
    line_number: u16,
    wrapping_type: u8,
    sample_coding: u8,
    sample_count: u16,
    payload: &'a [u8],
}

fn parse_st436(data: &[u8]) -> Result<Vec<St436Line<'_>>> {
    let mut cursor = Cursor::new(data);
    let count = cursor.read_u16::<BigEndian>()?;
    let mut lines = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let line_number = cursor.read_u16::<BigEndian>()?;
        let wrapping_type = cursor.read_u8()?;
        let sample_coding = cursor.read_u8()?;
        let sample_count = cursor.read_u16::<BigEndian>()?;
        let array_count = cursor.read_u32::<BigEndian>()? as u64;
        let array_length = cursor.read_u32::<BigEndian>()? as u64;

        let start = cursor.position();
        let size = array_count * array_length;
        let end = start + size;
        if end > data.len() as u64 {
            return Err(MxfError::InsufficientData {
                needed: size as usize,
                available: data.len() - start as usize,
            });
        }
        lines.push(St436Line {
            line_number,
            wrapping_type,
            sample_coding,
            sample_count,
            payload: &data[start as usize..end as usize],
        });
        cursor.seek(SeekFrom::Start(end))?;
    }
    Ok(lines)
}

fn insert_sorted<T: Ord>(manifest: &mut Vec<T>, element: T) {
    if let Err(index) = manifest.binary_search(&element) {
        manifest.insert(index, element);
    }
}

/// Collects the distinct ANC packets of ST 436 data.
#[derive(Debug, Default)]
pub struct AncManifestExtractor;

fn anc_ids(line: &St436Line<'_>) -> (u8, u8) {
    match line.sample_coding {
        // 10-bit samples packed three to a 32-bit word
        7..=9 if line.payload.len() >= 4 => {
            let word = u32::from_be_bytes([
                line.payload[0],
                line.payload[1],
                line.payload[2],
                line.payload[3],
            ]);
            (((word >> 20) & 0xFF) as u8, ((word >> 10) & 0xFF) as u8)
        }
        _ if line.payload.len() >= 2 => (line.payload[0], line.payload[1]),
        _ => (0, 0),
    }
}

impl FrameInfoExtractor for AncManifestExtractor {
    fn extract(&mut self, frame: &Frame, info: &mut FrameInfo) -> Result<Extraction> {
        for line in parse_st436(&frame.data)? {
            let (did, sdid) = anc_ids(&line);
            insert_sorted(
                &mut info.anc_manifest,
                AncManifestElement {
                    line_number: line.line_number,
                    wrapping_type: line.wrapping_type,
                    sample_coding: line.sample_coding,
                    did,
                    sdid,
                },
            );
        }
        Ok(Extraction::NeedMore)
    }
}

/// Collects the distinct VBI lines of ST 436 data.
#[derive(Debug, Default)]
pub struct VbiManifestExtractor;

impl FrameInfoExtractor for VbiManifestExtractor {
    fn extract(&mut self, frame: &Frame, info: &mut FrameInfo) -> Result<Extraction> {
        for line in parse_st436(&frame.data)? {
            insert_sorted(
                &mut info.vbi_manifest,
                VbiManifestElement {
                    line_number: line.line_number,
                    wrapping_type: line.wrapping_type,
                    sample_coding: line.sample_coding,
                    sample_count: line.sample_count,
                },
            );
        }
        Ok(Extraction::NeedMore)
    }
}
