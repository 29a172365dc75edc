//! In-memory MXF fixtures.
//!
//! [`MxfFixture`] lays out a small but structurally complete file: header
//! partition with header metadata, a body partition with the essence and,
//! for complete files, a footer partition with the index table followed by
//! a random index pack.

#![allow(dead_code)]

use archive_mxf::index::{IndexEntry, IndexTableSegment};
use archive_mxf::klv::{write_local_item, Klv};
use archive_mxf::metadata::{PrimerPack, TAG_INSTANCE_UID};
use archive_mxf::partition::{
    Partition, PartitionCompleteness, PartitionKind, PartitionStatus, RandomIndexPack,
};
use archive_mxf::ul::labels;
use archive_mxf::{DataDefinition, Rational, Umid, UL};
use uuid::Uuid;

const CONTENT_STORAGE: u16 = 0x3B03;
const OPERATIONAL_PATTERN: u16 = 0x3B09;
const ESSENCE_CONTAINERS: u16 = 0x3B0A;
const PACKAGES: u16 = 0x1901;
const ESSENCE_CONTAINER_DATA: u16 = 0x1902;
const LINKED_PACKAGE_UID: u16 = 0x2701;
const INDEX_SID: u16 = 0x3F06;
const BODY_SID: u16 = 0x3F07;
const PACKAGE_UID: u16 = 0x4401;
const PACKAGE_NAME: u16 = 0x4402;
const TRACKS: u16 = 0x4403;
const DESCRIPTOR: u16 = 0x4701;
const TRACK_ID: u16 = 0x4801;
const TRACK_SEQUENCE: u16 = 0x4803;
const TRACK_NUMBER: u16 = 0x4804;
const EDIT_RATE: u16 = 0x4B01;
const ORIGIN: u16 = 0x4B02;
const DATA_DEFINITION: u16 = 0x0201;
const DURATION: u16 = 0x0202;
const COMPONENTS: u16 = 0x1001;
const SOURCE_PACKAGE_ID: u16 = 0x1101;
const SOURCE_TRACK_ID: u16 = 0x1102;
const START_POSITION: u16 = 0x1201;
const START_TIMECODE: u16 = 0x1501;
const ROUNDED_TIMECODE_BASE: u16 = 0x1502;
const DROP_FRAME: u16 = 0x1503;
const LOCATORS: u16 = 0x2F01;
const URL_STRING: u16 = 0x4001;
const LINKED_TRACK_ID: u16 = 0x3006;
const SAMPLE_RATE: u16 = 0x3001;
const ESSENCE_CONTAINER: u16 = 0x3004;
const PICTURE_CODING: u16 = 0x3201;
const STORED_HEIGHT: u16 = 0x3202;
const STORED_WIDTH: u16 = 0x3203;
const AUDIO_SAMPLING_RATE: u16 = 0x3D03;
const CHANNEL_COUNT: u16 = 0x3D07;
const QUANTIZATION_BITS: u16 = 0x3D01;
const BLOCK_ALIGN: u16 = 0x3D0A;
const SUB_DESCRIPTORS: u16 = 0x3F01;

const BODY: u32 = 1;
const INDEX: u32 = 2;
const TIMECODE_TRACK_ID: u32 = 900;

/// Essence kind of a fixture track.
#[derive(Debug, Clone)]
pub enum TrackKind {
    Picture { coding: Option<UL> },
    Sound { block_align: u16 },
    /// ST 436 ANC data with one element value per edit unit
    Anc { payloads: Vec<Vec<u8>> },
}

/// An internal essence track.
#[derive(Debug, Clone)]
pub struct TrackFixture {
    pub track_id: u32,
    /// Track number in the essence element keys
    pub track_number: u32,
    pub kind: TrackKind,
    /// Bytes per edit unit
    pub element_size: usize,
    /// File source track origin overriding the fixture's
    pub origin: Option<i64>,
}

impl TrackFixture {
    pub fn picture(track_id: u32, element_size: usize) -> Self {
        TrackFixture {
            track_id,
            track_number: 0x1501_0100 + track_id,
            kind: TrackKind::Picture { coding: None },
            element_size,
            origin: None,
        }
    }

    pub fn long_gop_picture(track_id: u32, element_size: usize) -> Self {
        TrackFixture {
            kind: TrackKind::Picture {
                coding: Some(labels::MPEG2_422P_HL_LONG_GOP),
            },
            ..Self::picture(track_id, element_size)
        }
    }

    /// 16-bit mono PCM at 48 kHz.
    pub fn sound(track_id: u32, samples_per_edit_unit: usize) -> Self {
        TrackFixture {
            track_id,
            track_number: 0x1601_0100 + track_id,
            kind: TrackKind::Sound { block_align: 2 },
            element_size: samples_per_edit_unit * 2,
            origin: None,
        }
    }

    /// ANC data; every payload must have the same size.
    pub fn anc(track_id: u32, payloads: Vec<Vec<u8>>) -> Self {
        TrackFixture {
            track_id,
            track_number: 0x1701_0100 + track_id,
            element_size: payloads.first().map_or(0, Vec::len),
            kind: TrackKind::Anc { payloads },
            origin: None,
        }
    }

    fn element(&self, edit_unit: usize, track_index: usize) -> Vec<u8> {
        match &self.kind {
            TrackKind::Anc { payloads } => payloads[edit_unit % payloads.len()].clone(),
            _ => vec![MxfFixture::essence_byte(edit_unit, track_index); self.element_size],
        }
    }

    fn data_def(&self) -> DataDefinition {
        match self.kind {
            TrackKind::Picture { .. } => DataDefinition::Picture,
            TrackKind::Sound { .. } => DataDefinition::Sound,
            TrackKind::Anc { .. } => DataDefinition::Data,
        }
    }
}

/// How the essence is indexed.
#[derive(Debug, Clone)]
pub enum IndexFixture {
    None,
    /// Constant edit unit byte count
    Cbe,
    /// One `(temporal offset, key frame offset, flags)` entry per edit unit
    Vbe(Vec<(i8, i8, u8)>),
}

#[derive(Debug, Clone, Copy)]
pub struct TimecodeFixture {
    pub rounded_base: u16,
    pub start: i64,
    pub drop_frame: bool,
}

impl TimecodeFixture {
    pub fn new(rounded_base: u16, start: i64) -> Self {
        TimecodeFixture {
            rounded_base,
            start,
            drop_frame: false,
        }
    }
}

/// A tape source package referenced by the file source package.
#[derive(Debug, Clone)]
pub struct PhysicalFixture {
    pub uid: Umid,
    pub name: String,
    pub timecode: TimecodeFixture,
    /// Start position of the file source clip in the tape track
    pub start_position: i64,
}

/// A material track whose essence is in another file.
#[derive(Debug, Clone)]
pub struct ExternalFixture {
    pub material_track_id: u32,
    pub data_def: DataDefinition,
    pub edit_rate: Rational,
    pub duration: i64,
    pub file_uid: Umid,
    pub file_track_id: u32,
    pub file_edit_rate: Rational,
    /// With a locator, a copy of the file source package carrying it is
    /// written; without, only the material track references the package.
    pub locator: Option<String>,
}

/// Where the file source track's source clip points.
#[derive(Debug, Clone)]
pub enum FileSourceClip {
    Null,
    Physical(PhysicalFixture),
    /// Back to the first material track, forming a cycle
    MaterialPackage,
}

#[derive(Debug, Clone)]
pub struct MxfFixture {
    pub operational_pattern: UL,
    pub essence_container: UL,
    pub clip_wrapped: bool,
    pub edit_rate: Rational,
    pub tracks: Vec<TrackFixture>,
    /// Edit units of essence written
    pub edit_units: usize,
    /// Material track duration; `None` leaves it unknown
    pub duration: Option<i64>,
    /// File source track origin
    pub origin: i64,
    /// Start position of the material track source clips
    pub material_start_position: i64,
    /// File source track IDs referenced by a second material track
    pub aliased_tracks: Vec<u32>,
    pub material_uid: Umid,
    pub material_name: Option<String>,
    pub file_uid: Umid,
    pub material_timecode: Option<TimecodeFixture>,
    pub file_timecode: Option<TimecodeFixture>,
    pub file_source_clip: FileSourceClip,
    pub index: IndexFixture,
    /// Index duration; `None` indexes the essence written
    pub index_duration: Option<i64>,
    /// A second EssenceContainerData for another body
    pub extra_essence_container_data: bool,
    /// Footer partition and random index pack
    pub complete: bool,
    pub externals: Vec<ExternalFixture>,
}

impl MxfFixture {
    /// Complete OP-1A file with frame wrapped picture and sound at 25 Hz.
    pub fn op1a(edit_units: usize) -> Self {
        MxfFixture {
            operational_pattern: labels::OP_1A,
            essence_container: labels::UNCOMPRESSED_FRAME_CONTAINER,
            clip_wrapped: false,
            edit_rate: Rational::fps_25(),
            tracks: vec![TrackFixture::picture(1, 64), TrackFixture::sound(2, 1920)],
            edit_units,
            duration: Some(edit_units as i64),
            origin: 0,
            material_start_position: 0,
            aliased_tracks: Vec::new(),
            material_uid: Umid::generate(),
            material_name: Some("fixture".into()),
            file_uid: Umid::generate(),
            material_timecode: None,
            file_timecode: None,
            file_source_clip: FileSourceClip::Null,
            index: IndexFixture::Cbe,
            index_duration: None,
            extra_essence_container_data: false,
            complete: true,
            externals: Vec::new(),
        }
    }

    /// Complete OP-Atom file with one frame wrapped picture track.
    pub fn op_atom(edit_units: usize, edit_rate: Rational) -> Self {
        MxfFixture {
            operational_pattern: labels::OP_ATOM,
            edit_rate,
            tracks: vec![TrackFixture::picture(1, 32)],
            ..Self::op1a(edit_units)
        }
    }

    /// Material package only; every track is external.
    pub fn reference(externals: Vec<ExternalFixture>) -> Self {
        MxfFixture {
            tracks: Vec::new(),
            edit_units: 0,
            index: IndexFixture::None,
            externals,
            ..Self::op1a(0)
        }
    }

    /// Byte of every essence element of `track_index` at `edit_unit`.
    pub fn essence_byte(edit_unit: usize, track_index: usize) -> u8 {
        (edit_unit as u8).wrapping_add((track_index as u8) << 6)
    }

    fn element_total_size(&self, track: &TrackFixture) -> usize {
        Klv::new(labels::essence_element_key(track.track_number), vec![0; track.element_size])
            .total_size()
    }

    fn essence(&self) -> (Vec<u8>, Vec<u64>) {
        let mut essence = Vec::new();
        let mut offsets = Vec::new();
        if self.clip_wrapped {
            for (index, track) in self.tracks.iter().enumerate() {
                let mut value = Vec::new();
                for unit in 0..self.edit_units {
                    offsets.push((unit * track.element_size) as u64);
                    value.extend(track.element(unit, index));
                }
                Klv::new(labels::essence_element_key(track.track_number), value)
                    .write(&mut essence)
                    .unwrap();
            }
            return (essence, offsets);
        }
        for unit in 0..self.edit_units {
            offsets.push(essence.len() as u64);
            for (index, track) in self.tracks.iter().enumerate() {
                let value = track.element(unit, index);
                Klv::new(labels::essence_element_key(track.track_number), value)
                    .write(&mut essence)
                    .unwrap();
            }
        }
        (essence, offsets)
    }

    fn index_segments(&self, offsets: &[u64]) -> Vec<u8> {
        let edit_unit_byte_count = match &self.index {
            IndexFixture::None => return Vec::new(),
            IndexFixture::Cbe if self.clip_wrapped => self.tracks[0].element_size as u32,
            IndexFixture::Cbe => self
                .tracks
                .iter()
                .map(|t| self.element_total_size(t))
                .sum::<usize>() as u32,
            IndexFixture::Vbe(_) => 0,
        };
        let index_entries = match &self.index {
            IndexFixture::Vbe(entries) => entries
                .iter()
                .zip(offsets)
                .map(|(&(temporal, key_frame, flags), &offset)| {
                    IndexEntry::new(offset, temporal, key_frame, flags)
                })
                .collect(),
            _ => Vec::new(),
        };
        let segment = IndexTableSegment {
            index_edit_rate: self.edit_rate,
            index_start_position: 0,
            index_duration: self.index_duration.unwrap_or(self.edit_units as i64),
            edit_unit_byte_count,
            index_sid: INDEX,
            body_sid: BODY,
            index_entries,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        segment.write(&mut bytes).unwrap();
        bytes
    }

    /// Serialise the file.
    pub fn build(&self) -> Vec<u8> {
        let metadata = self.header_metadata();
        let has_essence = !self.tracks.is_empty();
        let (essence, offsets) = if has_essence {
            self.essence()
        } else {
            (Vec::new(), Vec::new())
        };
        let index = if self.complete && has_essence {
            self.index_segments(&offsets)
        } else {
            Vec::new()
        };

        let (status, completeness) = if self.complete {
            (PartitionStatus::Closed, PartitionCompleteness::Complete)
        } else {
            (PartitionStatus::Open, PartitionCompleteness::Incomplete)
        };
        let mut header = Partition {
            kind: PartitionKind::Header,
            status,
            completeness,
            header_byte_count: metadata.len() as u64,
            operational_pattern: self.operational_pattern,
            essence_containers: vec![self.essence_container],
            ..Default::default()
        };
        let mut body = Partition {
            kind: PartitionKind::Body,
            status,
            completeness,
            body_sid: BODY,
            operational_pattern: self.operational_pattern,
            essence_containers: vec![self.essence_container],
            ..Default::default()
        };
        let mut footer = Partition {
            kind: PartitionKind::Footer,
            index_byte_count: index.len() as u64,
            index_sid: if index.is_empty() { 0 } else { INDEX },
            operational_pattern: self.operational_pattern,
            essence_containers: vec![self.essence_container],
            ..Default::default()
        };

        let body_offset = (header.size() + metadata.len()) as u64;
        let footer_offset = if has_essence {
            body_offset + (body.size() + essence.len()) as u64
        } else {
            body_offset
        };
        if self.complete {
            header.footer_partition = footer_offset;
            body.footer_partition = footer_offset;
        }
        body.this_partition = body_offset;
        footer.this_partition = footer_offset;
        footer.footer_partition = footer_offset;
        footer.previous_partition = if has_essence { body_offset } else { 0 };

        let mut file = Vec::new();
        header.write(&mut file).unwrap();
        file.extend_from_slice(&metadata);
        if has_essence {
            body.write(&mut file).unwrap();
            file.extend_from_slice(&essence);
        }
        if self.complete {
            footer.write(&mut file).unwrap();
            file.extend_from_slice(&index);
            let mut rip = RandomIndexPack::new();
            rip.add_entry(0, 0);
            if has_essence {
                rip.add_entry(BODY, body_offset);
            }
            rip.add_entry(0, footer_offset);
            rip.write(&mut file).unwrap();
        }
        file
    }

    fn header_metadata(&self) -> Vec<u8> {
        let mut sets = SetWriter::default();
        let duration = self.duration.unwrap_or(-1);
        let mut packages = Vec::new();
        let mut material_tracks = Vec::new();

        for track in &self.tracks {
            let clip = sets.source_clip(
                track.data_def(),
                duration,
                self.material_start_position,
                self.file_uid,
                track.track_id,
            );
            let sequence = sets.sequence(track.data_def(), duration, &[clip]);
            material_tracks.push(sets.track(track.track_id, track.track_id, self.edit_rate, 0, sequence));
        }
        for (alias, &file_track_id) in self.aliased_tracks.iter().enumerate() {
            let data_def = self
                .tracks
                .iter()
                .find(|t| t.track_id == file_track_id)
                .map_or(DataDefinition::Picture, TrackFixture::data_def);
            let material_track_id = 100 + alias as u32;
            let clip = sets.source_clip(data_def, duration, 0, self.file_uid, file_track_id);
            let sequence = sets.sequence(data_def, duration, &[clip]);
            material_tracks.push(sets.track(material_track_id, material_track_id, self.edit_rate, 0, sequence));
        }
        for external in &self.externals {
            let clip = sets.source_clip(
                external.data_def,
                external.duration,
                0,
                external.file_uid,
                external.file_track_id,
            );
            let sequence = sets.sequence(external.data_def, external.duration, &[clip]);
            material_tracks.push(sets.track(
                external.material_track_id,
                external.material_track_id,
                external.edit_rate,
                0,
                sequence,
            ));
        }
        if let Some(timecode) = self.material_timecode {
            material_tracks.push(sets.timecode_track(timecode, self.edit_rate, duration));
        }
        let mut material_items = vec![
            (PACKAGE_UID, self.material_uid.0.to_vec()),
            (TRACKS, refs(&material_tracks)),
        ];
        if let Some(name) = &self.material_name {
            material_items.push((PACKAGE_NAME, utf16(name)));
        }
        packages.push(sets.add(labels::MATERIAL_PACKAGE, &material_items));

        let mut ecds = Vec::new();
        if !self.tracks.is_empty() {
            packages.push(self.file_source_package(&mut sets, duration));
            ecds.push(sets.add(
                labels::ESSENCE_CONTAINER_DATA,
                &[
                    (LINKED_PACKAGE_UID, self.file_uid.0.to_vec()),
                    (INDEX_SID, INDEX.to_be_bytes().to_vec()),
                    (BODY_SID, BODY.to_be_bytes().to_vec()),
                ],
            ));
            if self.extra_essence_container_data {
                ecds.push(sets.add(
                    labels::ESSENCE_CONTAINER_DATA,
                    &[
                        (LINKED_PACKAGE_UID, self.file_uid.0.to_vec()),
                        (INDEX_SID, (INDEX + 2).to_be_bytes().to_vec()),
                        (BODY_SID, (BODY + 2).to_be_bytes().to_vec()),
                    ],
                ));
            }
        }
        if let FileSourceClip::Physical(physical) = &self.file_source_clip {
            packages.push(self.physical_package(&mut sets, physical));
        }
        for external in &self.externals {
            if let Some(locator) = &external.locator {
                packages.push(external_file_package(&mut sets, external, locator));
            }
        }

        let storage = sets.add(
            labels::CONTENT_STORAGE,
            &[(PACKAGES, refs(&packages)), (ESSENCE_CONTAINER_DATA, refs(&ecds))],
        );
        sets.add(
            labels::PREFACE,
            &[
                (CONTENT_STORAGE, storage.as_bytes().to_vec()),
                (OPERATIONAL_PATTERN, self.operational_pattern.to_vec()),
                (ESSENCE_CONTAINERS, uls(&[self.essence_container])),
            ],
        );

        let mut metadata = Vec::new();
        Klv::new(labels::PRIMER_PACK, PrimerPack::new().write_value().unwrap())
            .write(&mut metadata)
            .unwrap();
        metadata.extend_from_slice(&sets.data);
        metadata
    }

    fn file_source_package(&self, sets: &mut SetWriter, duration: i64) -> Uuid {
        let mut tracks = Vec::new();
        let mut descriptors = Vec::new();
        for track in &self.tracks {
            let data_def = track.data_def();
            let clip = match &self.file_source_clip {
                FileSourceClip::Null => sets.source_clip(data_def, duration, 0, Umid::zero(), 0),
                FileSourceClip::Physical(physical) => sets.source_clip(
                    data_def,
                    duration,
                    physical.start_position,
                    physical.uid,
                    1,
                ),
                FileSourceClip::MaterialPackage => {
                    sets.source_clip(data_def, duration, 0, self.material_uid, self.tracks[0].track_id)
                }
            };
            let sequence = sets.sequence(data_def, duration, &[clip]);
            tracks.push(sets.track(
                track.track_id,
                track.track_number,
                self.edit_rate,
                track.origin.unwrap_or(self.origin),
                sequence,
            ));
            descriptors.push(self.descriptor(sets, track));
        }
        if let Some(timecode) = self.file_timecode {
            tracks.push(sets.timecode_track(timecode, self.edit_rate, duration));
        }
        let descriptor = match descriptors.as_slice() {
            [single] => *single,
            many => sets.add(
                labels::MULTIPLE_DESCRIPTOR,
                &[
                    (SAMPLE_RATE, rate(self.edit_rate)),
                    (ESSENCE_CONTAINER, self.essence_container.to_vec()),
                    (SUB_DESCRIPTORS, refs(many)),
                ],
            ),
        };
        sets.add(
            labels::SOURCE_PACKAGE,
            &[
                (PACKAGE_UID, self.file_uid.0.to_vec()),
                (TRACKS, refs(&tracks)),
                (DESCRIPTOR, descriptor.as_bytes().to_vec()),
            ],
        )
    }

    fn descriptor(&self, sets: &mut SetWriter, track: &TrackFixture) -> Uuid {
        let mut items = vec![
            (LINKED_TRACK_ID, track.track_id.to_be_bytes().to_vec()),
            (SAMPLE_RATE, rate(self.edit_rate)),
            (ESSENCE_CONTAINER, self.essence_container.to_vec()),
        ];
        match &track.kind {
            TrackKind::Picture { coding } => {
                items.push((STORED_WIDTH, 720u32.to_be_bytes().to_vec()));
                items.push((STORED_HEIGHT, 576u32.to_be_bytes().to_vec()));
                if let Some(coding) = coding {
                    items.push((PICTURE_CODING, coding.to_vec()));
                }
                sets.add(labels::CDCI_DESCRIPTOR, &items)
            }
            TrackKind::Sound { block_align } => {
                items.push((AUDIO_SAMPLING_RATE, rate(Rational::hz_48000())));
                items.push((CHANNEL_COUNT, 1u32.to_be_bytes().to_vec()));
                items.push((QUANTIZATION_BITS, 16u32.to_be_bytes().to_vec()));
                items.push((BLOCK_ALIGN, block_align.to_be_bytes().to_vec()));
                sets.add(labels::WAVE_AUDIO_DESCRIPTOR, &items)
            }
            TrackKind::Anc { .. } => sets.add(labels::ANC_DATA_DESCRIPTOR, &items),
        }
    }

    fn physical_package(&self, sets: &mut SetWriter, physical: &PhysicalFixture) -> Uuid {
        let clip = sets.source_clip(DataDefinition::Picture, -1, 0, Umid::zero(), 0);
        let sequence = sets.sequence(DataDefinition::Picture, -1, &[clip]);
        let picture = sets.track(1, 0, self.edit_rate, 0, sequence);
        let timecode = sets.timecode_track(physical.timecode, self.edit_rate, -1);
        let descriptor = sets.add(labels::TAPE_DESCRIPTOR, &[]);
        sets.add(
            labels::SOURCE_PACKAGE,
            &[
                (PACKAGE_UID, physical.uid.0.to_vec()),
                (PACKAGE_NAME, utf16(&physical.name)),
                (TRACKS, refs(&[picture, timecode])),
                (DESCRIPTOR, descriptor.as_bytes().to_vec()),
            ],
        )
    }
}

fn external_file_package(sets: &mut SetWriter, external: &ExternalFixture, locator: &str) -> Uuid {
    let file_duration = if external.duration < 0 {
        -1
    } else {
        external.duration
    };
    let clip = sets.source_clip(external.data_def, file_duration, 0, Umid::zero(), 0);
    let sequence = sets.sequence(external.data_def, file_duration, &[clip]);
    let track = sets.track(
        external.file_track_id,
        0,
        external.file_edit_rate,
        0,
        sequence,
    );
    let network_locator = sets.add(labels::NETWORK_LOCATOR, &[(URL_STRING, utf16(locator))]);
    let descriptor = sets.add(
        labels::CDCI_DESCRIPTOR,
        &[
            (LINKED_TRACK_ID, external.file_track_id.to_be_bytes().to_vec()),
            (SAMPLE_RATE, rate(external.file_edit_rate)),
            (LOCATORS, refs(&[network_locator])),
        ],
    );
    sets.add(
        labels::SOURCE_PACKAGE,
        &[
            (PACKAGE_UID, external.file_uid.0.to_vec()),
            (TRACKS, refs(&[track])),
            (DESCRIPTOR, descriptor.as_bytes().to_vec()),
        ],
    )
}

/// Writes local sets as KLVs.
#[derive(Default)]
struct SetWriter {
    data: Vec<u8>,
}

impl SetWriter {
    fn add(&mut self, key: UL, items: &[(u16, Vec<u8>)]) -> Uuid {
        let uid = Uuid::new_v4();
        let mut value = Vec::new();
        write_local_item(&mut value, TAG_INSTANCE_UID, uid.as_bytes()).unwrap();
        for (tag, data) in items {
            write_local_item(&mut value, *tag, data).unwrap();
        }
        Klv::new(key, value).write(&mut self.data).unwrap();
        uid
    }

    fn component_items(data_def: DataDefinition, duration: i64) -> Vec<(u16, Vec<u8>)> {
        let mut items = vec![(DATA_DEFINITION, data_def.label().to_vec())];
        if duration >= 0 {
            items.push((DURATION, duration.to_be_bytes().to_vec()));
        }
        items
    }

    fn source_clip(
        &mut self,
        data_def: DataDefinition,
        duration: i64,
        start_position: i64,
        package: Umid,
        track_id: u32,
    ) -> Uuid {
        let mut items = Self::component_items(data_def, duration);
        items.push((START_POSITION, start_position.to_be_bytes().to_vec()));
        items.push((SOURCE_PACKAGE_ID, package.0.to_vec()));
        items.push((SOURCE_TRACK_ID, track_id.to_be_bytes().to_vec()));
        self.add(labels::SOURCE_CLIP, &items)
    }

    fn sequence(&mut self, data_def: DataDefinition, duration: i64, components: &[Uuid]) -> Uuid {
        let mut items = Self::component_items(data_def, duration);
        items.push((COMPONENTS, refs(components)));
        self.add(labels::SEQUENCE, &items)
    }

    fn track(
        &mut self,
        track_id: u32,
        track_number: u32,
        edit_rate: Rational,
        origin: i64,
        sequence: Uuid,
    ) -> Uuid {
        self.add(
            labels::TIMELINE_TRACK,
            &[
                (TRACK_ID, track_id.to_be_bytes().to_vec()),
                (TRACK_NUMBER, track_number.to_be_bytes().to_vec()),
                (EDIT_RATE, rate(edit_rate)),
                (ORIGIN, origin.to_be_bytes().to_vec()),
                (TRACK_SEQUENCE, sequence.as_bytes().to_vec()),
            ],
        )
    }

    fn timecode_track(&mut self, timecode: TimecodeFixture, edit_rate: Rational, duration: i64) -> Uuid {
        let mut items = Self::component_items(DataDefinition::Timecode, duration);
        items.push((START_TIMECODE, timecode.start.to_be_bytes().to_vec()));
        items.push((ROUNDED_TIMECODE_BASE, timecode.rounded_base.to_be_bytes().to_vec()));
        items.push((DROP_FRAME, vec![timecode.drop_frame as u8]));
        let component = self.add(labels::TIMECODE_COMPONENT, &items);
        let sequence = self.sequence(DataDefinition::Timecode, duration, &[component]);
        self.track(TIMECODE_TRACK_ID, 0, edit_rate, 0, sequence)
    }
}

fn refs(uids: &[Uuid]) -> Vec<u8> {
    let mut value = Vec::new();
    value.extend_from_slice(&(uids.len() as u32).to_be_bytes());
    value.extend_from_slice(&16u32.to_be_bytes());
    for uid in uids {
        value.extend_from_slice(uid.as_bytes());
    }
    value
}

fn uls(items: &[UL]) -> Vec<u8> {
    let mut value = Vec::new();
    value.extend_from_slice(&(items.len() as u32).to_be_bytes());
    value.extend_from_slice(&16u32.to_be_bytes());
    for label in items {
        value.extend_from_slice(label);
    }
    value
}

fn rate(rate: Rational) -> Vec<u8> {
    let mut value = rate.numerator.to_be_bytes().to_vec();
    value.extend_from_slice(&rate.denominator.to_be_bytes());
    value
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_be_bytes).collect()
}
