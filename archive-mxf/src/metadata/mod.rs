//! Header metadata object graph.
//!
//! Header metadata is read in two passes. The local sets of the metadata
//! partition are collected into an arena keyed by InstanceUID
//! ([`MetadataSets`]); the graph is then decoded from the single Preface
//! down, turning strong references into owned trees. Weak references
//! between packages (SourcePackageID + SourceTrackID) stay as UMIDs and
//! are resolved through [`HeaderMetadata::find_package`].

mod descriptor;
mod sets;

pub use descriptor::{
    CdciFields, DataFields, Descriptor, DescriptorKind, Locator, PictureFields, SoundFields,
    WaveFields,
};
pub use sets::{MetadataSet, MetadataSets, PrimerPack, TAG_INSTANCE_UID};

use crate::error::{MxfError, Result};
use crate::klv::KlvStream;
use crate::partition::Partition;
use crate::types::{Rational, Umid};
use crate::ul::{labels, DataDefinition, OperationalPattern, UL};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

mod tags {
    pub const CONTENT_STORAGE: u16 = 0x3B03;
    pub const OPERATIONAL_PATTERN: u16 = 0x3B09;
    pub const ESSENCE_CONTAINERS: u16 = 0x3B0A;

    pub const PACKAGES: u16 = 0x1901;
    pub const ESSENCE_CONTAINER_DATA: u16 = 0x1902;

    pub const LINKED_PACKAGE_UID: u16 = 0x2701;
    pub const INDEX_SID: u16 = 0x3F06;
    pub const BODY_SID: u16 = 0x3F07;

    pub const PACKAGE_UID: u16 = 0x4401;
    pub const PACKAGE_NAME: u16 = 0x4402;
    pub const TRACKS: u16 = 0x4403;
    pub const DESCRIPTOR: u16 = 0x4701;

    pub const TRACK_ID: u16 = 0x4801;
    pub const TRACK_NAME: u16 = 0x4802;
    pub const TRACK_SEQUENCE: u16 = 0x4803;
    pub const TRACK_NUMBER: u16 = 0x4804;
    pub const EDIT_RATE: u16 = 0x4B01;
    pub const ORIGIN: u16 = 0x4B02;
    pub const EVENT_EDIT_RATE: u16 = 0x4901;
    pub const EVENT_ORIGIN: u16 = 0x4902;

    pub const DATA_DEFINITION: u16 = 0x0201;
    pub const DURATION: u16 = 0x0202;
    pub const COMPONENTS: u16 = 0x1001;
    pub const START_POSITION: u16 = 0x1201;
    pub const SOURCE_PACKAGE_ID: u16 = 0x1101;
    pub const SOURCE_TRACK_ID: u16 = 0x1102;
    pub const START_TIMECODE: u16 = 0x1501;
    pub const ROUNDED_TIMECODE_BASE: u16 = 0x1502;
    pub const DROP_FRAME: u16 = 0x1503;
    pub const CHOICES: u16 = 0x0501;
}

use tags::*;

/// Package role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Material package: the playable clip
    Material,
    /// Source package: file or physical source
    Source,
}

/// A material or source package.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub uid: Umid,
    pub name: Option<String>,
    pub kind: PackageKind,
    pub tracks: Vec<Track>,
    /// Source packages only
    pub descriptor: Option<Descriptor>,
}

impl Package {
    /// Track with `track_id`.
    pub fn find_track(&self, track_id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    /// Source package described by a file descriptor.
    pub fn is_file_source(&self) -> bool {
        self.kind == PackageKind::Source
            && self
                .descriptor
                .as_ref()
                .is_some_and(Descriptor::is_file_descriptor)
    }

    /// Source package described by a physical descriptor.
    pub fn is_physical_source(&self) -> bool {
        self.kind == PackageKind::Source
            && self
                .descriptor
                .as_ref()
                .is_some_and(Descriptor::is_physical_descriptor)
    }
}

/// Track set class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Timeline,
    Event,
    Static,
}

/// A package track.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// 0 when absent
    pub track_id: u32,
    /// 0 when absent
    pub track_number: u32,
    pub name: Option<String>,
    pub edit_rate: Rational,
    pub origin: i64,
    pub kind: TrackKind,
    pub sequence: StructuralComponent,
}

impl Track {
    /// Data definition of the track's sequence.
    pub fn data_def(&self) -> DataDefinition {
        self.sequence.data_def
    }
}

/// Weak reference to a track in another package.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceClip {
    pub start_position: i64,
    pub source_package_id: Umid,
    pub source_track_id: u32,
}

impl SourceClip {
    /// A zero package id ends a reference chain.
    pub fn is_null_reference(&self) -> bool {
        self.source_package_id.is_zero()
    }
}

/// Timecode track component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimecodeComponent {
    pub rounded_base: u16,
    /// Frame count at the start of the track
    pub start_timecode: i64,
    pub drop_frame: bool,
}

/// Structural component subclass.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Sequence(Vec<StructuralComponent>),
    SourceClip(SourceClip),
    Filler,
    Timecode(TimecodeComponent),
    /// Avid essence group choices
    EssenceGroup(Vec<StructuralComponent>),
    Other,
}

/// A sequence or one of its components.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralComponent {
    pub data_def: DataDefinition,
    /// -1 when absent
    pub duration: i64,
    pub kind: ComponentKind,
}

impl StructuralComponent {
    /// Components of a sequence, or this component alone.
    pub fn components(&self) -> &[StructuralComponent] {
        match &self.kind {
            ComponentKind::Sequence(components) => components,
            _ => std::slice::from_ref(self),
        }
    }

    /// The component as a source clip.
    pub fn source_clip(&self) -> Option<&SourceClip> {
        match &self.kind {
            ComponentKind::SourceClip(clip) => Some(clip),
            _ => None,
        }
    }

    /// The component as a timecode component.
    pub fn timecode(&self) -> Option<&TimecodeComponent> {
        match &self.kind {
            ComponentKind::Timecode(timecode) => Some(timecode),
            _ => None,
        }
    }

    /// The source clip supplying a track's essence, with the filler
    /// duration preceding it. Essence groups contribute their first choice.
    pub fn effective_source_clip(&self) -> Option<(&SourceClip, i64)> {
        let mut lead_filler = 0;
        for component in self.components() {
            match &component.kind {
                ComponentKind::Filler => lead_filler += component.duration.max(0),
                ComponentKind::SourceClip(clip) => return Some((clip, lead_filler)),
                ComponentKind::EssenceGroup(choices) => {
                    if choices.len() > 1 {
                        warn!(
                            choices = choices.len(),
                            "essence group has several choices, using the first"
                        );
                    }
                    let clip = choices
                        .first()?
                        .components()
                        .iter()
                        .find_map(StructuralComponent::source_clip)?;
                    return Some((clip, lead_filler));
                }
                _ => {}
            }
        }
        None
    }
}

/// Links a file source package to its essence and index streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EssenceContainerData {
    pub linked_package_uid: Umid,
    pub index_sid: u32,
    pub body_sid: u32,
}

/// Decoded header metadata of one file.
#[derive(Debug, Clone)]
pub struct HeaderMetadata {
    primer: PrimerPack,
    operational_pattern: UL,
    essence_containers: Vec<UL>,
    packages: Vec<Package>,
    package_index: HashMap<Umid, usize>,
    essence_container_data: Vec<EssenceContainerData>,
}

impl HeaderMetadata {
    /// Read the header metadata that follows the pack of `partition`.
    ///
    /// Every failure is reported as [`MxfError::InvalidHeaderMetadata`].
    pub fn read(stream: &mut KlvStream, partition: &Partition) -> Result<Self> {
        Self::read_sets(stream, partition)
            .and_then(|(primer, sets)| Self::from_sets(primer, &sets))
            .map_err(|e| match e {
                MxfError::InvalidHeaderMetadata(_) => e,
                other => MxfError::InvalidHeaderMetadata(other.to_string()),
            })
    }

    fn read_sets(
        stream: &mut KlvStream,
        partition: &Partition,
    ) -> Result<(PrimerPack, MetadataSets)> {
        stream.seek(partition.pack_end)?;
        let end = partition.pack_end + partition.header_byte_count;

        let kl = stream.read_next_non_filler_kl()?;
        if !kl.key.is_primer_pack() {
            return Err(MxfError::InvalidHeaderMetadata(format!(
                "header metadata starts with {} instead of a primer pack",
                kl.key
            )));
        }
        let primer = PrimerPack::parse(&stream.read_value(kl.length)?)?;

        let mut sets = MetadataSets::new();
        while stream.tell() < end {
            let kl = stream.read_kl()?;
            if kl.key.set_class().is_some() {
                let value = stream.read_value(kl.length)?;
                sets.insert(MetadataSet::parse(kl.key, &value)?);
            } else {
                stream.skip(kl.length)?;
            }
        }
        debug!(sets = sets.len(), "read header metadata sets");
        Ok((primer, sets))
    }

    /// Decode the graph from a set arena.
    pub fn from_sets(primer: PrimerPack, sets: &MetadataSets) -> Result<Self> {
        let mut decoder = Decoder {
            sets,
            visiting: Vec::new(),
        };

        let preface = sets.preface()?;
        let operational_pattern = preface.get_ul(OPERATIONAL_PATTERN)?.unwrap_or([0; 16]);
        let essence_containers = preface.get_ul_batch(ESSENCE_CONTAINERS)?;

        let storage_uid = preface.required(CONTENT_STORAGE, preface.get_uuid(CONTENT_STORAGE)?)?;
        let storage = decoder.resolve(storage_uid, "content storage")?;

        let mut packages = Vec::new();
        for uid in storage.get_uuid_batch(PACKAGES)? {
            let set = decoder.resolve(uid, "package")?;
            packages.push(decoder.with_set(set, Decoder::package)?);
        }

        let mut essence_container_data = Vec::new();
        for uid in storage.get_uuid_batch(ESSENCE_CONTAINER_DATA)? {
            let set = decoder.resolve(uid, "essence container data")?;
            essence_container_data.push(EssenceContainerData {
                linked_package_uid: set
                    .required(LINKED_PACKAGE_UID, set.get_umid(LINKED_PACKAGE_UID)?)?,
                index_sid: set.get_u32(INDEX_SID)?.unwrap_or(0),
                body_sid: set.get_u32(BODY_SID)?.unwrap_or(0),
            });
        }

        let mut package_index = HashMap::new();
        for (index, package) in packages.iter().enumerate() {
            if package_index.insert(package.uid, index).is_some() {
                warn!(uid = %package.uid, "duplicate package UID");
            }
        }

        Ok(HeaderMetadata {
            primer,
            operational_pattern,
            essence_containers,
            packages,
            package_index,
            essence_container_data,
        })
    }

    /// The material package; the first one if there are several.
    pub fn material_package(&self) -> Option<&Package> {
        let mut materials = self
            .packages
            .iter()
            .filter(|p| p.kind == PackageKind::Material);
        let first = materials.next();
        if materials.next().is_some() {
            warn!("more than one material package, using the first");
        }
        first
    }

    /// Source packages described by file descriptors.
    pub fn file_source_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| p.is_file_source())
    }

    /// Resolve a package UMID.
    pub fn find_package(&self, uid: &Umid) -> Option<&Package> {
        self.package_index.get(uid).map(|&index| &self.packages[index])
    }

    /// All packages in content storage order.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Essence container data sets.
    pub fn essence_container_data(&self) -> &[EssenceContainerData] {
        &self.essence_container_data
    }

    /// Operational pattern declared in the Preface.
    pub fn operational_pattern(&self) -> OperationalPattern {
        OperationalPattern::from_label(&self.operational_pattern)
    }

    /// Essence container labels declared in the Preface.
    pub fn essence_containers(&self) -> &[UL] {
        &self.essence_containers
    }

    /// The primer pack.
    pub fn primer(&self) -> &PrimerPack {
        &self.primer
    }
}

/// Walks strong references, refusing cycles.
struct Decoder<'a> {
    sets: &'a MetadataSets,
    visiting: Vec<Uuid>,
}

impl<'a> Decoder<'a> {
    fn resolve(&self, uid: Uuid, what: &str) -> Result<&'a MetadataSet> {
        self.sets.get(&uid).ok_or_else(|| {
            MxfError::InvalidHeaderMetadata(format!("unresolved {} reference {}", what, uid))
        })
    }

    fn with_set<T>(
        &mut self,
        set: &'a MetadataSet,
        decode: impl FnOnce(&mut Self, &'a MetadataSet) -> Result<T>,
    ) -> Result<T> {
        if self.visiting.contains(&set.instance_uid) {
            return Err(MxfError::InvalidHeaderMetadata(format!(
                "strong reference cycle through {} set {}",
                set.key, set.instance_uid
            )));
        }
        self.visiting.push(set.instance_uid);
        let result = decode(self, set);
        self.visiting.pop();
        result
    }

    fn package(&mut self, set: &'a MetadataSet) -> Result<Package> {
        let kind = if set.key.matches(&labels::MATERIAL_PACKAGE) {
            PackageKind::Material
        } else if set.key.matches(&labels::SOURCE_PACKAGE) {
            PackageKind::Source
        } else {
            return Err(MxfError::InvalidHeaderMetadata(format!(
                "content storage references a {} set as a package",
                set.key
            )));
        };

        let mut tracks = Vec::new();
        for uid in set.get_uuid_batch(TRACKS)? {
            let track_set = self.resolve(uid, "track")?;
            tracks.push(self.with_set(track_set, Self::track)?);
        }

        let descriptor = match set.get_uuid(DESCRIPTOR)? {
            Some(uid) if kind == PackageKind::Source => match self.sets.get(&uid) {
                Some(descriptor_set) => {
                    self.with_set(descriptor_set, |decoder, set| decoder.descriptor(set))?
                }
                None => {
                    warn!(%uid, "ignoring unresolved descriptor reference");
                    None
                }
            },
            _ => None,
        };

        Ok(Package {
            uid: set.required(PACKAGE_UID, set.get_umid(PACKAGE_UID)?)?,
            name: set.get_string(PACKAGE_NAME)?,
            kind,
            tracks,
            descriptor,
        })
    }

    fn track(&mut self, set: &'a MetadataSet) -> Result<Track> {
        let (kind, edit_rate, origin) = if set.key.matches(&labels::TIMELINE_TRACK) {
            (
                TrackKind::Timeline,
                set.required(EDIT_RATE, set.get_rational(EDIT_RATE)?)?,
                set.get_i64(ORIGIN)?.unwrap_or(0),
            )
        } else if set.key.matches(&labels::EVENT_TRACK) {
            (
                TrackKind::Event,
                set.get_rational(EVENT_EDIT_RATE)?.unwrap_or_default(),
                set.get_i64(EVENT_ORIGIN)?.unwrap_or(0),
            )
        } else if set.key.matches(&labels::STATIC_TRACK) {
            (TrackKind::Static, Rational::ZERO, 0)
        } else {
            return Err(MxfError::InvalidHeaderMetadata(format!(
                "package references a {} set as a track",
                set.key
            )));
        };

        let sequence_uid = set.required(TRACK_SEQUENCE, set.get_uuid(TRACK_SEQUENCE)?)?;
        let sequence = self.component(sequence_uid)?;

        Ok(Track {
            track_id: set.get_u32(TRACK_ID)?.unwrap_or(0),
            track_number: set.get_u32(TRACK_NUMBER)?.unwrap_or(0),
            name: set.get_string(TRACK_NAME)?,
            edit_rate,
            origin,
            kind,
            sequence,
        })
    }

    fn component(&mut self, uid: Uuid) -> Result<StructuralComponent> {
        let set = self.resolve(uid, "structural component")?;
        self.with_set(set, Self::component_set)
    }

    fn components(&mut self, set: &MetadataSet, tag: u16) -> Result<Vec<StructuralComponent>> {
        set.get_uuid_batch(tag)?
            .into_iter()
            .map(|uid| self.component(uid))
            .collect()
    }

    fn component_set(&mut self, set: &'a MetadataSet) -> Result<StructuralComponent> {
        let data_def = set
            .get_ul(DATA_DEFINITION)?
            .map_or(DataDefinition::Unknown, |ul| DataDefinition::from_label(&ul));
        let duration = set.get_i64(DURATION)?.unwrap_or(-1);

        let kind = if set.key.matches(&labels::SEQUENCE) {
            ComponentKind::Sequence(self.components(set, COMPONENTS)?)
        } else if set.key.matches(&labels::SOURCE_CLIP) {
            ComponentKind::SourceClip(SourceClip {
                start_position: set.get_i64(START_POSITION)?.unwrap_or(0),
                source_package_id: set
                    .required(SOURCE_PACKAGE_ID, set.get_umid(SOURCE_PACKAGE_ID)?)?,
                source_track_id: set.get_u32(SOURCE_TRACK_ID)?.unwrap_or(0),
            })
        } else if set.key.matches(&labels::FILLER) {
            ComponentKind::Filler
        } else if set.key.matches(&labels::TIMECODE_COMPONENT) {
            ComponentKind::Timecode(TimecodeComponent {
                rounded_base: set.required(
                    ROUNDED_TIMECODE_BASE,
                    set.get_u16(ROUNDED_TIMECODE_BASE)?,
                )?,
                start_timecode: set.get_i64(START_TIMECODE)?.unwrap_or(0),
                drop_frame: set.get_bool(DROP_FRAME)?.unwrap_or(false),
            })
        } else if set.key.matches(&labels::ESSENCE_GROUP) {
            ComponentKind::EssenceGroup(self.components(set, CHOICES)?)
        } else {
            ComponentKind::Other
        };

        Ok(StructuralComponent {
            data_def,
            duration,
            kind,
        })
    }
}
