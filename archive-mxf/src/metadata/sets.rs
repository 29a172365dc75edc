//! Primer pack and generic local sets.
//!
//! Every header metadata set is first decoded into a [`MetadataSet`]: its
//! key, InstanceUID and raw items by local tag. [`MetadataSets`] holds them
//! in an arena addressed by InstanceUID, which is what strong references
//! point at.

use crate::error::{MxfError, Result};
use crate::klv::{local_items, read_batch_header};
use crate::types::{Rational, Umid};
use crate::ul::{labels, UniversalLabel, UL};
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;
use uuid::Uuid;

/// InstanceUID local tag
pub const TAG_INSTANCE_UID: u16 = 0x3C0A;

/// Primer pack for local tag mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimerPack {
    /// Local tag to UL mapping
    pub mappings: Vec<(u16, UL)>,
}

impl PrimerPack {
    /// Create an empty primer pack
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a primer pack value: a batch of 18-byte tag/UL pairs.
    pub fn parse(value: &[u8]) -> Result<Self> {
        let (count, item_size) = read_batch_header(value)?;
        if item_size != 18 {
            return Err(MxfError::InvalidHeaderMetadata(format!(
                "primer pack item size {} is not 18",
                item_size
            )));
        }
        let mappings = value[8..8 + count * 18]
            .chunks_exact(18)
            .map(|item| {
                let mut ul = [0u8; 16];
                ul.copy_from_slice(&item[2..]);
                (u16::from_be_bytes([item[0], item[1]]), ul)
            })
            .collect();
        Ok(PrimerPack { mappings })
    }

    /// Encode the primer pack value.
    pub fn write_value(&self) -> Result<Vec<u8>> {
        let mut value = Vec::with_capacity(8 + self.mappings.len() * 18);
        value.write_u32::<BigEndian>(self.mappings.len() as u32)?;
        value.write_u32::<BigEndian>(18)?;
        for (tag, ul) in &self.mappings {
            value.write_u16::<BigEndian>(*tag)?;
            value.extend_from_slice(ul);
        }
        Ok(value)
    }

    /// Add mapping
    pub fn add(&mut self, tag: u16, ul: UL) {
        if !self.mappings.iter().any(|(t, _)| *t == tag) {
            self.mappings.push((tag, ul));
        }
    }

    /// Lookup UL by tag
    pub fn lookup(&self, tag: u16) -> Option<&UL> {
        self.mappings
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, ul)| ul)
    }
}

/// A decoded local set.
#[derive(Debug, Clone)]
pub struct MetadataSet {
    /// Set key
    pub key: UniversalLabel,
    /// InstanceUID, the target of strong references
    pub instance_uid: Uuid,
    items: HashMap<u16, Vec<u8>>,
}

impl MetadataSet {
    /// Decode a local set value.
    pub fn parse(key: UniversalLabel, value: &[u8]) -> Result<Self> {
        let mut items = HashMap::new();
        for item in local_items(value) {
            let (tag, data) = item.map_err(|e| {
                MxfError::InvalidHeaderMetadata(format!("{} set: {}", key, e))
            })?;
            items.insert(tag, data.to_vec());
        }
        let uid = items.get(&TAG_INSTANCE_UID).ok_or_else(|| {
            MxfError::InvalidHeaderMetadata(format!("{} set without an InstanceUID", key))
        })?;
        let instance_uid = Uuid::from_slice(uid).map_err(|_| {
            MxfError::InvalidHeaderMetadata(format!("{} set InstanceUID is malformed", key))
        })?;
        Ok(MetadataSet {
            key,
            instance_uid,
            items,
        })
    }

    /// The structural metadata class byte of the key.
    pub fn class(&self) -> Option<u8> {
        self.key.set_class()
    }

    /// Raw item value.
    pub fn item(&self, tag: u16) -> Option<&[u8]> {
        self.items.get(&tag).map(Vec::as_slice)
    }

    /// Whether the set has an item with `tag`.
    pub fn has(&self, tag: u16) -> bool {
        self.items.contains_key(&tag)
    }

    fn malformed(&self, tag: u16, expected: &str, len: usize) -> MxfError {
        MxfError::InvalidHeaderMetadata(format!(
            "item 0x{:04x} of {} set has {} bytes, expected {}",
            tag, self.key, len, expected
        ))
    }

    fn fixed<const N: usize>(&self, tag: u16) -> Result<Option<[u8; N]>> {
        match self.item(tag) {
            None => Ok(None),
            Some(data) => <[u8; N]>::try_from(data)
                .map(Some)
                .map_err(|_| self.malformed(tag, &N.to_string(), data.len())),
        }
    }

    /// Missing mandatory item.
    pub fn required<T>(&self, tag: u16, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| {
            MxfError::InvalidHeaderMetadata(format!(
                "{} set is missing required item 0x{:04x}",
                self.key, tag
            ))
        })
    }

    /// UInt8 item
    pub fn get_u8(&self, tag: u16) -> Result<Option<u8>> {
        Ok(self.fixed::<1>(tag)?.map(|b| b[0]))
    }

    /// Boolean item
    pub fn get_bool(&self, tag: u16) -> Result<Option<bool>> {
        Ok(self.get_u8(tag)?.map(|b| b != 0))
    }

    /// UInt16 item
    pub fn get_u16(&self, tag: u16) -> Result<Option<u16>> {
        Ok(self.fixed(tag)?.map(u16::from_be_bytes))
    }

    /// UInt32 item
    pub fn get_u32(&self, tag: u16) -> Result<Option<u32>> {
        Ok(self.fixed(tag)?.map(u32::from_be_bytes))
    }

    /// UInt64 item
    pub fn get_u64(&self, tag: u16) -> Result<Option<u64>> {
        Ok(self.fixed(tag)?.map(u64::from_be_bytes))
    }

    /// Int64 item (positions and lengths)
    pub fn get_i64(&self, tag: u16) -> Result<Option<i64>> {
        Ok(self.fixed(tag)?.map(i64::from_be_bytes))
    }

    /// Rational item
    pub fn get_rational(&self, tag: u16) -> Result<Option<Rational>> {
        Ok(self.fixed::<8>(tag)?.map(|b| {
            Rational::new(
                i32::from_be_bytes([b[0], b[1], b[2], b[3]]),
                i32::from_be_bytes([b[4], b[5], b[6], b[7]]),
            )
        }))
    }

    /// UL item
    pub fn get_ul(&self, tag: u16) -> Result<Option<UL>> {
        self.fixed(tag)
    }

    /// UMID item
    pub fn get_umid(&self, tag: u16) -> Result<Option<Umid>> {
        Ok(self.fixed(tag)?.map(Umid))
    }

    /// UUID item, e.g. a strong reference
    pub fn get_uuid(&self, tag: u16) -> Result<Option<Uuid>> {
        Ok(self.fixed(tag)?.map(Uuid::from_bytes))
    }

    /// UTF-16BE string item, trailing NULs removed
    pub fn get_string(&self, tag: u16) -> Result<Option<String>> {
        let Some(data) = self.item(tag) else {
            return Ok(None);
        };
        if data.len() % 2 != 0 {
            return Err(self.malformed(tag, "an even count", data.len()));
        }
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .take_while(|&unit| unit != 0)
            .collect();
        Ok(Some(String::from_utf16_lossy(&units)))
    }

    fn batch(&self, tag: u16, item_size: usize) -> Result<Option<Vec<&[u8]>>> {
        let Some(data) = self.item(tag) else {
            return Ok(None);
        };
        let (count, size) = read_batch_header(data).map_err(|_| {
            self.malformed(tag, "a batch", data.len())
        })?;
        if size != item_size && count > 0 {
            return Err(self.malformed(tag, &format!("{}-byte batch items", item_size), size));
        }
        Ok(Some(data[8..8 + count * size].chunks_exact(item_size.max(1)).collect()))
    }

    /// Batch or array of UUIDs (strong references); absent is empty
    pub fn get_uuid_batch(&self, tag: u16) -> Result<Vec<Uuid>> {
        Ok(self
            .batch(tag, 16)?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| Uuid::from_slice(item).ok())
            .collect())
    }

    /// Batch or array of ULs; absent is empty
    pub fn get_ul_batch(&self, tag: u16) -> Result<Vec<UL>> {
        Ok(self
            .batch(tag, 16)?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| <UL>::try_from(item).ok())
            .collect())
    }
}

/// Arena of the sets in one header metadata run.
#[derive(Debug, Clone, Default)]
pub struct MetadataSets {
    sets: Vec<MetadataSet>,
    by_uid: HashMap<Uuid, usize>,
}

impl MetadataSets {
    /// An empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set; a later set with the same InstanceUID replaces the earlier one.
    pub fn insert(&mut self, set: MetadataSet) {
        match self.by_uid.get(&set.instance_uid) {
            Some(&index) => self.sets[index] = set,
            None => {
                self.by_uid.insert(set.instance_uid, self.sets.len());
                self.sets.push(set);
            }
        }
    }

    /// Resolve a strong reference.
    pub fn get(&self, uid: &Uuid) -> Option<&MetadataSet> {
        self.by_uid.get(uid).map(|&index| &self.sets[index])
    }

    /// Sets of a structural metadata class, in file order.
    pub fn find_by_class(&self, class: u8) -> impl Iterator<Item = &MetadataSet> {
        self.sets.iter().filter(move |set| set.class() == Some(class))
    }

    /// The single Preface set.
    pub fn preface(&self) -> Result<&MetadataSet> {
        let class = labels::PREFACE[14];
        let mut prefaces = self.find_by_class(class);
        let preface = prefaces
            .next()
            .ok_or_else(|| MxfError::InvalidHeaderMetadata("no Preface set".into()))?;
        if prefaces.next().is_some() {
            return Err(MxfError::InvalidHeaderMetadata(
                "more than one Preface set".into(),
            ));
        }
        Ok(preface)
    }

    /// Number of sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether no sets were read.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
