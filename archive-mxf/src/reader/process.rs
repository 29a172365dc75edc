//! Opening a file and composing its track readers.

use super::timecodes::StartTimecodes;
use super::{ComposedTrack, ExternalReader, MxfFileReader, OpenFile};
use crate::edit_rate::{convert_duration, convert_position, sample_sequence, to_higher, to_lower, Rounding};
use crate::error::{MxfError, OpenResult, Result};
use crate::essence_reader::{EssenceReader, EssenceTrack};
use crate::essence_type::EssenceType;
use crate::klv::KlvStream;
use crate::metadata::{Descriptor, HeaderMetadata, Package, SourceClip, Track};
use crate::partition::PartitionSet;
use crate::resolver::{FileId, PackageResolver};
use crate::stream::MxfStream;
use crate::track_reader::{MxfTrackInfo, MxfTrackReader, TrackDetails};
use crate::types::{Rational, Umid};
use crate::ul::{DataDefinition, OperationalPattern, UniversalLabel};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

impl MxfFileReader {
    /// Open the file at `path`.
    pub fn open(&mut self, path: impl AsRef<Path>) -> OpenResult {
        let path = path.as_ref();
        match self.file_factory.open_read(path) {
            Ok(stream) => self.open_stream(stream, path),
            Err(e) => {
                self.close();
                let error = MxfError::OpenFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                };
                self.with_logging(|_| warn!(%error, "failed to open file"));
                error.open_result()
            }
        }
    }

    /// Open an MXF stream. `path` identifies the file to the package
    /// resolver and anchors relative locators.
    ///
    /// On failure the reader is left closed and can be opened again.
    pub fn open_stream(&mut self, stream: Box<dyn MxfStream>, path: impl AsRef<Path>) -> OpenResult {
        let path = path.as_ref().to_path_buf();
        self.with_logging(move |reader| reader.open_logged(stream, &path))
    }

    /// Close the open file.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Some(resolver) = self.resolver.as_mut() {
                resolver.unregister(file.file_id);
            }
        }
        self.read_error = false;
        self.read_error_message.clear();
    }

    fn open_logged(&mut self, stream: Box<dyn MxfStream>, path: &Path) -> OpenResult {
        self.close();
        let Some(mut resolver) = self.resolver.take() else {
            return MxfError::precondition("no package resolver").open_result();
        };
        resolver.set_external_reader_settings(&self.config, self.log_dispatch.as_ref());

        let mut registered = None;
        let result = self.open_file(stream, path, resolver.as_mut(), &mut registered);
        self.resolver = Some(resolver);

        match result {
            Ok(file) => {
                info!(
                    path = %path.display(),
                    tracks = file.tracks.len(),
                    externals = file.externals.len(),
                    edit_rate = %file.edit_rate,
                    duration = file.duration,
                    "opened MXF file"
                );
                self.file = Some(file);
                self.finish_open();
                OpenResult::Success
            }
            Err(e) => {
                if let (Some(file_id), Some(resolver)) = (registered, self.resolver.as_mut()) {
                    resolver.unregister(file_id);
                }
                warn!(path = %path.display(), error = %e, "failed to open MXF file");
                e.open_result()
            }
        }
    }

    fn open_file(
        &self,
        stream: Box<dyn MxfStream>,
        path: &Path,
        resolver: &mut dyn PackageResolver,
        registered: &mut Option<FileId>,
    ) -> Result<OpenFile> {
        let mut stream = KlvStream::new(stream);
        let seekable = stream.is_seekable();

        let mut partitions = PartitionSet::read_header_partition(&mut stream)?;
        let operational_pattern = partitions.operational_pattern();
        if !operational_pattern.is_supported() {
            return Err(MxfError::not_supported(format!(
                "operational pattern {}",
                UniversalLabel(partitions.header().operational_pattern)
            )));
        }
        let wrapping = partitions.wrapping_type();

        if seekable {
            if let Err(e) = partitions.read_partitions(&mut stream) {
                let header = partitions.header();
                if header.is_closed() || header.has_footer() {
                    warn!(error = %e, "failed to read all partitions, the file may be incomplete");
                } else {
                    debug!(error = %e, "failed to read partitions of an open file");
                }
            }
        } else {
            debug!("stream is not seekable, reading it as an incomplete file");
        }
        let file_complete = seekable && partitions.is_complete();

        let metadata_partition = partitions
            .metadata_partition()
            .ok_or(MxfError::NoHeaderMetadata)?;
        let header = HeaderMetadata::read(&mut stream, metadata_partition)?;

        let file_id = resolver.extract_packages(path, &header, None);
        *registered = Some(file_id);

        let material = header
            .material_package()
            .ok_or_else(|| MxfError::invalid_metadata("no material package"))?;

        let mut composer = Composer {
            header: &header,
            material,
            resolver,
            file_id,
            operational_pattern,
            composition: Composition::default(),
        };
        for track in &material.tracks {
            composer.add_track(track)?;
        }
        let Composition {
            internal,
            internal_package,
            edit_rate: internal_edit_rate,
            origin: internal_origin,
            mut externals,
            mut tracks,
            ..
        } = composer.composition;

        if tracks.is_empty() {
            return Err(MxfError::NoEssence(
                "no material track resolved to essence".into(),
            ));
        }
        tracks.sort_by(|a, b| compare_tracks(a.reader.borrow().info(), b.reader.borrow().info()));

        let timecodes = StartTimecodes::extract(&header, material);

        let (body_sid, index_sid) = match internal_package {
            Some(package_uid) => essence_container_sids(&header, &package_uid)?,
            None => (0, 0),
        };

        for external in &externals {
            external.reader.borrow().enable_only(&external.file_track_ids);
        }

        let edit_rate = match internal_edit_rate {
            Some(rate) => rate,
            None => externals
                .iter()
                .map(|external| external.reader.borrow().edit_rate())
                .min_by(|a, b| a.to_f64().total_cmp(&b.to_f64()))
                .ok_or_else(|| MxfError::NoEssence("no essence edit rate".into()))?,
        };

        for external in &mut externals {
            let external_rate = external.reader.borrow().edit_rate();
            external.sample_sequence =
                sample_sequence(edit_rate, external_rate).ok_or_else(|| {
                    MxfError::not_supported(format!(
                        "external edit rate {} is incompatible with clip edit rate {}",
                        external_rate, edit_rate
                    ))
                })?;
        }

        let internal_origin = internal_origin.unwrap_or(0);
        let internal_tracks: Vec<Rc<RefCell<MxfTrackReader>>> =
            internal.iter().map(|track| track.reader.clone()).collect();
        let essence_reader = if internal.is_empty() {
            None
        } else {
            let mut essence_reader = EssenceReader::new(
                stream,
                &partitions,
                body_sid,
                index_sid,
                wrapping,
                edit_rate,
                internal_origin,
                internal,
                file_complete,
            )?;
            essence_reader.prepare()?;
            Some(essence_reader)
        };

        let duration = clip_duration(&internal_tracks, &externals, edit_rate);
        if duration >= 0 {
            for external in &externals {
                let forced = to_higher(duration, &external.sample_sequence);
                external.reader.borrow_mut().force_duration(forced);
            }
        }

        let mut origin = internal_origin;
        for external in &externals {
            let external_origin = external.reader.borrow().origin();
            origin = origin.max(to_lower(
                external_origin,
                &external.sample_sequence,
                Rounding::Up,
            ));
        }

        let material_package_uid = material.uid;
        let material_package_name = material.name.clone();
        Ok(OpenFile {
            path: path.to_path_buf(),
            file_id,
            header,
            operational_pattern,
            wrapping,
            seekable,
            file_complete,
            material_package_uid,
            material_package_name,
            essence_reader,
            internal_tracks,
            tracks,
            externals,
            edit_rate,
            duration,
            origin,
            position: 0,
            read_start: -origin,
            read_duration: -1,
            frame_info_done: false,
            timecodes,
        })
    }

    /// Log index shortfalls and apply the default read limits.
    fn finish_open(&mut self) {
        let Some(file) = &self.file else {
            return;
        };
        if let Some(essence_reader) = &file.essence_reader {
            let indexed = essence_reader.indexed_duration();
            if indexed >= 0 && file.duration >= 0 && indexed - essence_reader.origin() < file.duration {
                warn!(
                    indexed,
                    duration = file.duration,
                    "index table covers less than the track duration"
                );
            }
        }

        if self.is_complete() {
            self.check_reorder_coverage();
        }
        self.set_default_read_limits();
    }

    fn check_reorder_coverage(&self) {
        let duration = self.duration();
        let checks = self.max_precharge(0, false).and_then(|required| {
            let available = self.max_precharge(0, true)?;
            Ok((required, available))
        });
        match checks {
            Ok((required, available)) if available > required => warn!(
                required,
                available, "index table lacks the precharge needed at the start"
            ),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "precharge check skipped"),
        }
        if duration <= 0 {
            return;
        }
        let last = duration - 1;
        let checks = self.max_rollout(last, false).and_then(|required| {
            let available = self.max_rollout(last, true)?;
            Ok((required, available))
        });
        match checks {
            Ok((required, available)) if available < required => warn!(
                required,
                available, "index table lacks the rollout needed at the end"
            ),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "rollout check skipped"),
        }
    }

    /// Limit reads to the precharge and rollout extended clip of a
    /// complete file, or to the essence from the origin on for a growing
    /// file.
    pub fn set_default_read_limits(&mut self) {
        let (origin, duration) = (self.origin(), self.duration());
        let limits = if self.is_complete() {
            match self.max_read_limits() {
                Ok(limits) => limits,
                Err(e) => {
                    warn!(error = %e, "failed to compute read limits");
                    (-origin, duration + origin)
                }
            }
        } else if duration >= 0 {
            (-origin, duration + origin)
        } else {
            (-origin, -1)
        };
        self.set_read_limits(limits.0, limits.1, true);
    }

    /// Restrict reads to `duration` edit units from `start`; a negative
    /// duration leaves the end open. With `seek_start` the reader moves to
    /// `start`.
    pub fn set_read_limits(&mut self, start: i64, duration: i64, seek_start: bool) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        file.read_start = start;
        file.read_duration = duration;
        if let Some(essence_reader) = file.essence_reader.as_mut() {
            essence_reader.set_read_limits(start, duration);
        }
        for external in &file.externals {
            let external_start = to_higher(start, &external.sample_sequence);
            let external_duration = if duration < 0 {
                -1
            } else {
                to_higher(start + duration, &external.sample_sequence) - external_start
            };
            external
                .reader
                .borrow_mut()
                .set_read_limits(external_start, external_duration, false);
        }
        if seek_start {
            self.seek(start);
        }
    }

    /// The read limits as `(start, duration)`.
    pub fn read_limits(&self) -> (i64, i64) {
        self.file
            .as_ref()
            .map_or((0, -1), |file| (file.read_start, file.read_duration))
    }

    /// Reduce the clip duration, e.g. to that of a referencing clip, and
    /// reset the read limits.
    pub fn force_duration(&mut self, duration: i64) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if file.duration >= 0 && duration > file.duration {
            warn!(
                duration,
                current = file.duration,
                "not extending the clip duration"
            );
            return;
        }
        file.duration = duration;
        self.set_default_read_limits();
    }
}

#[derive(Default)]
struct Composition {
    internal: Vec<EssenceTrack>,
    internal_package: Option<Umid>,
    edit_rate: Option<Rational>,
    origin: Option<i64>,
    externals: Vec<ExternalReader>,
    tracks: Vec<ComposedTrack>,
    /// (file, file source track) pairs already read by a track
    used: HashSet<(FileId, u32)>,
}

/// Resolves material tracks to internal or external track readers.
struct Composer<'a> {
    header: &'a HeaderMetadata,
    material: &'a Package,
    resolver: &'a mut dyn PackageResolver,
    file_id: FileId,
    operational_pattern: OperationalPattern,
    composition: Composition,
}

impl Composer<'_> {
    fn add_track(&mut self, track: &Track) -> Result<()> {
        if !track.data_def().is_essence() {
            return Ok(());
        }
        if track.track_id == 0 {
            warn!("skipping material track without a track id");
            return Ok(());
        }
        let Some((clip, lead_filler_offset)) = track.sequence.effective_source_clip() else {
            warn!(track_id = track.track_id, "material track has no source clip");
            return Ok(());
        };
        if clip.is_null_reference() {
            warn!(track_id = track.track_id, "material track references no package");
            return Ok(());
        }
        if clip.start_position != 0
            && (self.operational_pattern != OperationalPattern::OpAtom || clip.start_position < 0)
        {
            return Err(MxfError::not_supported(format!(
                "material track {} source clip start position {}",
                track.track_id, clip.start_position
            )));
        }

        let candidates = self.resolver.resolve_source_clip(clip, None, self.file_id);
        if candidates.is_empty() {
            warn!(
                track_id = track.track_id,
                package = %clip.source_package_id,
                "source clip does not resolve to a package"
            );
            return Ok(());
        }
        let local = candidates
            .iter()
            .find(|c| c.file_id == self.file_id && c.is_file_source_package);
        match local {
            Some(candidate) if !candidate.external_essence => {
                self.add_internal(track, clip, lead_filler_offset)
            }
            Some(_) => self.add_external(track, clip, lead_filler_offset),
            None if candidates.iter().any(|c| c.file_id != self.file_id) => {
                Err(MxfError::not_supported(format!(
                    "top-level file source package {} is located in another file",
                    clip.source_package_id
                )))
            }
            None => {
                warn!(
                    track_id = track.track_id,
                    "source clip does not reference a file source package"
                );
                Ok(())
            }
        }
    }

    fn mark_used(&mut self, file_id: FileId, file_track_id: u32) -> Result<()> {
        if !self.composition.used.insert((file_id, file_track_id)) {
            return Err(MxfError::not_supported(format!(
                "file source track {} is referenced by more than one material track",
                file_track_id
            )));
        }
        Ok(())
    }

    fn add_internal(&mut self, track: &Track, clip: &SourceClip, lead_filler_offset: i64) -> Result<()> {
        let header = self.header;
        let package = header.find_package(&clip.source_package_id).ok_or_else(|| {
            MxfError::invalid_metadata(format!("package {} not found", clip.source_package_id))
        })?;
        let file_track = package.find_track(clip.source_track_id).ok_or_else(|| {
            MxfError::invalid_metadata(format!(
                "track {} not found in file source package",
                clip.source_track_id
            ))
        })?;
        let descriptor = package
            .descriptor
            .as_ref()
            .and_then(|d| d.file_descriptor_for_track(file_track.track_id))
            .ok_or_else(|| {
                MxfError::invalid_metadata(format!(
                    "no file descriptor for file source track {}",
                    file_track.track_id
                ))
            })?;

        let composition = &mut self.composition;
        match composition.internal_package {
            None => composition.internal_package = Some(package.uid),
            Some(uid) if uid != package.uid => {
                return Err(MxfError::not_supported(
                    "essence of several file source packages in one file",
                ))
            }
            Some(_) => {}
        }
        match composition.edit_rate {
            None => composition.edit_rate = Some(file_track.edit_rate),
            Some(rate) if !rate.same_rate(&file_track.edit_rate) => {
                return Err(MxfError::not_supported(format!(
                    "file source track edit rate {} differs from {}",
                    file_track.edit_rate, rate
                )))
            }
            Some(_) => {}
        }
        let mut origin = file_track.origin;
        if clip.start_position > 0 {
            origin += convert_position(
                clip.start_position,
                track.edit_rate,
                file_track.edit_rate,
                Rounding::Auto,
            );
        }
        match composition.origin {
            None => composition.origin = Some(origin),
            Some(existing) if existing != origin => {
                return Err(MxfError::not_supported(format!(
                    "internal track origins differ ({} and {})",
                    existing, origin
                )))
            }
            Some(_) => {}
        }
        self.mark_used(self.file_id, file_track.track_id)?;

        let data_def = track.data_def();
        let info = MxfTrackInfo {
            data_def,
            essence_type: EssenceType::from_descriptor(descriptor),
            edit_rate: track.edit_rate,
            duration: track.sequence.duration,
            material_package_uid: self.material.uid,
            material_track_id: track.track_id,
            material_track_number: track.track_number,
            file_package_uid: package.uid,
            file_track_id: file_track.track_id,
            file_track_number: file_track.track_number,
            file_edit_rate: file_track.edit_rate,
            lead_filler_offset,
            essence_container_label: descriptor.essence_container,
            details: TrackDetails::from_descriptor(data_def, descriptor),
        };
        debug!(
            track_id = track.track_id,
            essence_type = %info.essence_type,
            "internal track"
        );
        let sample_size = constant_sample_size(descriptor, file_track.edit_rate);
        let reader = Rc::new(RefCell::new(MxfTrackReader::new(info)));
        self.composition.internal.push(EssenceTrack {
            track_number: file_track.track_number,
            sample_size,
            reader: reader.clone(),
        });
        self.composition.tracks.push(ComposedTrack {
            reader,
            external: None,
        });
        Ok(())
    }

    fn add_external(&mut self, track: &Track, clip: &SourceClip, lead_filler_offset: i64) -> Result<()> {
        let locators = self
            .header
            .find_package(&clip.source_package_id)
            .and_then(|package| package.descriptor.as_ref())
            .map(|descriptor| descriptor.locators.clone())
            .unwrap_or_default();
        let resolved = self
            .resolver
            .resolve_source_clip(clip, Some(&locators), self.file_id);
        let target = resolved
            .into_iter()
            .filter(|c| c.file_id != self.file_id && c.is_file_source_package && !c.external_essence)
            .find_map(|c| c.file_reader.map(|reader| (c.file_id, reader)));
        let Some((file_id, reader)) = target else {
            warn!(
                track_id = track.track_id,
                package = %clip.source_package_id,
                "external essence not found"
            );
            return Ok(());
        };

        let track_reader = reader.borrow().internal_track(clip.source_track_id);
        let Some(track_reader) = track_reader else {
            warn!(
                track_id = track.track_id,
                file_track_id = clip.source_track_id,
                "external file has no reader for the referenced track"
            );
            return Ok(());
        };
        self.mark_used(file_id, clip.source_track_id)?;

        {
            let mut track_reader = track_reader.borrow_mut();
            let info = track_reader.info_mut();
            info.material_package_uid = self.material.uid;
            info.material_track_id = track.track_id;
            info.material_track_number = track.track_number;
            info.edit_rate = track.edit_rate;
            info.duration = track.sequence.duration;
            info.lead_filler_offset = lead_filler_offset;
        }

        let externals = &mut self.composition.externals;
        let index = match externals.iter().position(|e| e.file_id == file_id) {
            Some(index) => index,
            None => {
                externals.push(ExternalReader {
                    file_id,
                    reader,
                    sample_sequence: Vec::new(),
                    file_track_ids: Vec::new(),
                });
                externals.len() - 1
            }
        };
        externals[index].file_track_ids.push(clip.source_track_id);
        debug!(track_id = track.track_id, file_id, "external track");
        self.composition.tracks.push(ComposedTrack {
            reader: track_reader,
            external: Some(index),
        });
        Ok(())
    }
}

fn essence_container_sids(header: &HeaderMetadata, package_uid: &Umid) -> Result<(u32, u32)> {
    match header.essence_container_data() {
        [] => Err(MxfError::invalid_metadata("no essence container data")),
        [ecd] if ecd.linked_package_uid != *package_uid => Err(MxfError::invalid_metadata(
            "essence container data does not link to the internal file source package",
        )),
        [ecd] => Ok((ecd.body_sid, ecd.index_sid)),
        many => Err(MxfError::not_supported(format!(
            "{} internal essence containers",
            many.len()
        ))),
    }
}

/// Bytes per edit unit of PCM sound, 0 when not constant.
fn constant_sample_size(descriptor: &Descriptor, edit_rate: Rational) -> u32 {
    let (Some(sound), Some(wave)) = (descriptor.sound(), descriptor.wave()) else {
        return 0;
    };
    let rate = sound.sampling_rate;
    let numerator = rate.numerator as i64 * edit_rate.denominator as i64;
    let denominator = rate.denominator as i64 * edit_rate.numerator as i64;
    if denominator <= 0 || numerator % denominator != 0 {
        return 0;
    }
    (numerator / denominator) as u32 * wave.block_align as u32
}

fn clip_duration(
    internal_tracks: &[Rc<RefCell<MxfTrackReader>>],
    externals: &[ExternalReader],
    edit_rate: Rational,
) -> i64 {
    let mut duration: Option<i64> = None;
    for track in internal_tracks {
        let track = track.borrow();
        let info = track.info();
        if info.duration < 0 {
            return -1;
        }
        let converted = convert_duration(info.duration, info.edit_rate, edit_rate, Rounding::Auto);
        duration = Some(duration.map_or(converted, |d| d.min(converted)));
    }
    for external in externals {
        let external_duration = external.reader.borrow().duration();
        if external_duration < 0 {
            return -1;
        }
        let converted = to_lower(external_duration, &external.sample_sequence, Rounding::Down);
        duration = Some(duration.map_or(converted, |d| d.min(converted)));
    }
    duration.unwrap_or(-1)
}

/// Picture before sound before data, then by track number and track ID
/// with absent (zero) values last.
fn compare_tracks(a: &MxfTrackInfo, b: &MxfTrackInfo) -> Ordering {
    fn nonzero_first(a: u32, b: u32) -> Ordering {
        match (a, b) {
            (0, 0) => Ordering::Equal,
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            _ => a.cmp(&b),
        }
    }
    data_def_rank(a.data_def)
        .cmp(&data_def_rank(b.data_def))
        .then_with(|| nonzero_first(a.material_track_number, b.material_track_number))
        .then_with(|| nonzero_first(a.material_track_id, b.material_track_id))
}

fn data_def_rank(data_def: DataDefinition) -> u8 {
    match data_def {
        DataDefinition::Picture => 0,
        DataDefinition::Sound => 1,
        _ => 2,
    }
}
