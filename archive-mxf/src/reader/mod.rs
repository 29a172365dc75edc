//! The MXF file reader.
//!
//! [`MxfFileReader`] opens one file, resolves its material package to
//! track readers and reads edit units into their frame buffers. Tracks
//! whose essence lives in other files are read through shared external
//! readers, re-labelled with this file's material track identity.
//!
//! Positions are counted in the clip edit rate and are relative to the
//! clip origin: position 0 is the first edit unit after precharge.

mod precharge;
mod process;
mod read;
mod timecodes;

use crate::essence_reader::EssenceReader;
use crate::metadata::HeaderMetadata;
use crate::resolver::{DefaultPackageResolver, FileId, PackageResolver};
use crate::stream::{DiskFileFactory, FileFactory};
use crate::track_reader::MxfTrackReader;
use crate::types::{Rational, Umid};
use crate::ul::{OperationalPattern, WrappingType};
use archive_timecode::Timecode;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use timecodes::StartTimecodes;
use tracing::Dispatch;

/// Reader behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Upper bound on frames read to extract in-frame track information
    pub max_frame_info_frames: u32,
    /// Extract in-frame track information before the first read
    pub extract_frame_info: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            max_frame_info_frames: 250,
            extract_frame_info: true,
        }
    }
}

/// A track reader in the composed track list.
struct ComposedTrack {
    reader: Rc<RefCell<MxfTrackReader>>,
    /// Index into the external readers, `None` for internal essence
    external: Option<usize>,
}

/// A reader of another file supplying some of the tracks.
struct ExternalReader {
    file_id: FileId,
    reader: Rc<RefCell<MxfFileReader>>,
    /// External edit units per clip edit unit
    sample_sequence: Vec<u32>,
    /// File source track IDs used by this file
    file_track_ids: Vec<u32>,
}

/// State of an open file.
struct OpenFile {
    path: PathBuf,
    file_id: FileId,
    header: HeaderMetadata,
    operational_pattern: OperationalPattern,
    wrapping: WrappingType,
    seekable: bool,
    /// Seekable and every partition was found
    file_complete: bool,
    material_package_uid: Umid,
    material_package_name: Option<String>,
    essence_reader: Option<EssenceReader>,
    internal_tracks: Vec<Rc<RefCell<MxfTrackReader>>>,
    tracks: Vec<ComposedTrack>,
    externals: Vec<ExternalReader>,
    edit_rate: Rational,
    duration: i64,
    origin: i64,
    position: i64,
    read_start: i64,
    read_duration: i64,
    frame_info_done: bool,
    timecodes: StartTimecodes,
}

impl OpenFile {
    fn external_enabled(&self, index: usize) -> bool {
        self.tracks
            .iter()
            .any(|t| t.external == Some(index) && t.reader.borrow().is_enabled())
    }

    fn internal_enabled(&self) -> bool {
        self.internal_tracks.iter().any(|t| t.borrow().is_enabled())
    }
}

/// Reads the tracks of one MXF file and the external files it references.
///
/// ```no_run
/// use archive_mxf::MxfFileReader;
///
/// let mut reader = MxfFileReader::new();
/// let result = reader.open("clip.mxf");
/// assert!(result.is_success());
/// while reader.read(1) == 1 {
///     for i in 0..reader.num_track_readers() {
///         let mut track = reader.track_reader_mut(i).unwrap();
///         while let Some(frame) = track.frame_buffer_mut().pop() {
///             println!("track {} position {} {} bytes", i, frame.position, frame.data.len());
///         }
///     }
/// }
/// ```
pub struct MxfFileReader {
    config: ReaderConfig,
    file_factory: Rc<dyn FileFactory>,
    resolver: Option<Box<dyn PackageResolver>>,
    log_dispatch: Option<Dispatch>,
    file: Option<OpenFile>,
    read_error: bool,
    read_error_message: String,
}

impl fmt::Debug for MxfFileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MxfFileReader");
        s.field("config", &self.config);
        if let Some(file) = &self.file {
            s.field("path", &file.path)
                .field("tracks", &file.tracks.len())
                .field("externals", &file.externals.len())
                .field("edit_rate", &file.edit_rate)
                .field("duration", &file.duration)
                .field("position", &file.position);
        }
        s.finish()
    }
}

impl Default for MxfFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl MxfFileReader {
    /// A reader opening files from disk.
    pub fn new() -> Self {
        Self::with_factory(DiskFileFactory)
    }

    /// A reader opening this file and the files it references through
    /// `factory`.
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: FileFactory + 'static,
    {
        Self::with_shared_factory(Rc::new(factory))
    }

    /// A reader sharing `factory` with other readers.
    pub fn with_shared_factory(factory: Rc<dyn FileFactory>) -> Self {
        MxfFileReader {
            config: ReaderConfig::default(),
            file_factory: factory.clone(),
            resolver: Some(Box::new(DefaultPackageResolver::new(factory))),
            log_dispatch: None,
            file: None,
            read_error: false,
            read_error_message: String::new(),
        }
    }

    /// Replace the package resolver, e.g. with one that already knows the
    /// other files of a group.
    pub fn set_package_resolver(&mut self, resolver: Box<dyn PackageResolver>) {
        self.resolver = Some(resolver);
    }

    /// Reader settings.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Change the reader settings.
    pub fn set_config(&mut self, config: ReaderConfig) {
        self.config = config;
    }

    /// Route the logging of open, read and seek to `dispatch`.
    pub fn set_log_dispatch(&mut self, dispatch: Dispatch) {
        self.log_dispatch = Some(dispatch);
    }

    fn with_logging<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        match self.log_dispatch.clone() {
            Some(dispatch) => tracing::dispatcher::with_default(&dispatch, || f(self)),
            None => f(self),
        }
    }

    /// Decoded header metadata of the open file.
    pub fn header_metadata(&self) -> Option<&HeaderMetadata> {
        self.file.as_ref().map(|file| &file.header)
    }

    /// Path the open file was registered under.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path.as_path())
    }

    /// Number of readable tracks.
    pub fn num_track_readers(&self) -> usize {
        self.file.as_ref().map_or(0, |file| file.tracks.len())
    }

    /// Track reader `index`, ordered picture, sound, data and then by
    /// material track number.
    pub fn track_reader(&self, index: usize) -> Option<Ref<'_, MxfTrackReader>> {
        let track = self.file.as_ref()?.tracks.get(index)?;
        Some(track.reader.borrow())
    }

    /// Mutable access to track reader `index`, e.g. to pop frames.
    pub fn track_reader_mut(&self, index: usize) -> Option<RefMut<'_, MxfTrackReader>> {
        let track = self.file.as_ref()?.tracks.get(index)?;
        Some(track.reader.borrow_mut())
    }

    /// Enable or disable reading of track `index`. Returns false for an
    /// unknown track.
    pub fn set_track_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.file.as_ref().and_then(|file| file.tracks.get(index)) {
            Some(track) => {
                track.reader.borrow_mut().set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// The internal track reading file source track `file_track_id`.
    pub(crate) fn internal_track(&self, file_track_id: u32) -> Option<Rc<RefCell<MxfTrackReader>>> {
        self.file
            .as_ref()?
            .internal_tracks
            .iter()
            .find(|t| t.borrow().info().file_track_id == file_track_id)
            .cloned()
    }

    /// Disable the internal tracks not in `file_track_ids`.
    pub(crate) fn enable_only(&self, file_track_ids: &[u32]) {
        let Some(file) = &self.file else {
            return;
        };
        for track in &file.internal_tracks {
            let mut track = track.borrow_mut();
            let used = file_track_ids.contains(&track.info().file_track_id);
            track.set_enabled(used);
        }
    }

    /// Clip edit rate.
    pub fn edit_rate(&self) -> Rational {
        self.file.as_ref().map_or(Rational::ZERO, |file| file.edit_rate)
    }

    /// Clip duration, -1 when unknown.
    pub fn duration(&self) -> i64 {
        self.file.as_ref().map_or(-1, |file| file.duration)
    }

    /// Precharge edit units before position 0 in the essence.
    pub fn origin(&self) -> i64 {
        self.file.as_ref().map_or(0, |file| file.origin)
    }

    /// Next position read.
    pub fn position(&self) -> i64 {
        self.file.as_ref().map_or(0, |file| file.position)
    }

    /// Whether the file is complete: seekable, every partition found,
    /// indexed essence and a known duration.
    pub fn is_complete(&self) -> bool {
        let Some(file) = &self.file else {
            return false;
        };
        file.file_complete
            && file.duration >= 0
            && file
                .essence_reader
                .as_ref()
                .map_or(true, EssenceReader::is_complete)
            && file
                .externals
                .iter()
                .all(|external| external.reader.borrow().is_complete())
    }

    /// Whether the file stream is seekable.
    pub fn is_seekable(&self) -> bool {
        self.file.as_ref().is_some_and(|file| file.seekable)
    }

    /// Whether the last [`read`](Self::read) failed.
    pub fn read_error(&self) -> bool {
        self.read_error
    }

    /// Message of the last read failure.
    pub fn read_error_message(&self) -> &str {
        &self.read_error_message
    }

    /// Drop the buffered frames of every track.
    pub fn clear_frame_buffers(&mut self) {
        if let Some(file) = &self.file {
            for track in &file.tracks {
                track.reader.borrow_mut().frame_buffer_mut().clear();
            }
        }
    }

    fn clear_internal_frame_buffers(file: &OpenFile) {
        for track in &file.internal_tracks {
            track.borrow_mut().frame_buffer_mut().clear();
        }
    }

    /// UMID of the material package.
    pub fn material_package_uid(&self) -> Option<Umid> {
        self.file.as_ref().map(|file| file.material_package_uid)
    }

    /// Name of the material package.
    pub fn material_package_name(&self) -> Option<&str> {
        self.file.as_ref()?.material_package_name.as_deref()
    }

    /// Operational pattern of the file.
    pub fn operational_pattern(&self) -> Option<OperationalPattern> {
        self.file.as_ref().map(|file| file.operational_pattern)
    }

    /// Essence wrapping of the file.
    pub fn wrapping_type(&self) -> Option<WrappingType> {
        self.file.as_ref().map(|file| file.wrapping)
    }

    /// Whether the material package has a timecode track.
    pub fn have_material_timecode(&self) -> bool {
        self.file
            .as_ref()
            .is_some_and(|file| file.timecodes.material.is_some())
    }

    /// Material package timecode at `position`.
    pub fn material_timecode(&self, position: i64) -> Option<Timecode> {
        let file = self.file.as_ref()?;
        Some(file.timecodes.material?.timecode_at(position, file.edit_rate))
    }

    /// Whether the file source package has a timecode track.
    pub fn have_file_source_timecode(&self) -> bool {
        self.file
            .as_ref()
            .is_some_and(|file| file.timecodes.file_source.is_some())
    }

    /// File source package timecode at `position`.
    pub fn file_source_timecode(&self, position: i64) -> Option<Timecode> {
        let file = self.file.as_ref()?;
        Some(file.timecodes.file_source?.timecode_at(position, file.edit_rate))
    }

    /// Whether a physical source package with a timecode track was found.
    pub fn have_physical_source_timecode(&self) -> bool {
        self.file
            .as_ref()
            .is_some_and(|file| file.timecodes.physical_source.is_some())
    }

    /// Physical source package timecode at `position`.
    pub fn physical_source_timecode(&self, position: i64) -> Option<Timecode> {
        let file = self.file.as_ref()?;
        Some(
            file.timecodes
                .physical_source?
                .timecode_at(position, file.edit_rate),
        )
    }

    /// Name of the physical source package, e.g. a tape name.
    pub fn physical_source_package_name(&self) -> Option<&str> {
        self.file
            .as_ref()?
            .timecodes
            .physical_source_package_name
            .as_deref()
    }
}
