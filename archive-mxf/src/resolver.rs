//! Package resolution across files.
//!
//! A source clip names the package and track supplying its essence by UMID
//! and track ID. The resolver keeps a registry of the packages of every
//! file opened so far and opens the files named by locators on demand.

use crate::metadata::{HeaderMetadata, Locator, SourceClip};
use crate::reader::{MxfFileReader, ReaderConfig};
use crate::stream::{normalize_path, FileFactory};
use crate::types::Umid;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn, Dispatch};

/// Identifies a file registered with a resolver.
pub type FileId = usize;

/// A package able to supply the essence of a source clip.
#[derive(Clone)]
pub struct ResolvedPackage {
    pub package_uid: Umid,
    pub track_id: u32,
    pub file_id: FileId,
    /// Reader of the file holding the package; `None` for a file still
    /// being opened
    pub file_reader: Option<Rc<RefCell<MxfFileReader>>>,
    pub is_file_source_package: bool,
    /// The package's essence lives in yet another file
    pub external_essence: bool,
}

impl fmt::Debug for ResolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPackage")
            .field("package_uid", &self.package_uid)
            .field("track_id", &self.track_id)
            .field("file_id", &self.file_id)
            .field("has_reader", &self.file_reader.is_some())
            .field("is_file_source_package", &self.is_file_source_package)
            .field("external_essence", &self.external_essence)
            .finish()
    }
}

/// Finds the packages referenced by source clips.
pub trait PackageResolver {
    /// Register the packages of a file. `reader` is `None` while the file
    /// itself is being opened.
    fn extract_packages(
        &mut self,
        path: &Path,
        header: &HeaderMetadata,
        reader: Option<Rc<RefCell<MxfFileReader>>>,
    ) -> FileId;

    /// Candidates for `clip`, opening the files named by `locators` if no
    /// registered package matches.
    fn resolve_source_clip(
        &mut self,
        clip: &SourceClip,
        locators: Option<&[Locator]>,
        referencing: FileId,
    ) -> Vec<ResolvedPackage>;

    /// Forget the packages of a file whose open failed.
    fn unregister(&mut self, file_id: FileId);

    /// Settings for the readers opened on external files. Called by the
    /// owning reader before each open.
    fn set_external_reader_settings(
        &mut self,
        _config: &ReaderConfig,
        _log_dispatch: Option<&Dispatch>,
    ) {
    }
}

#[derive(Debug, Clone)]
struct RegisteredPackage {
    uid: Umid,
    track_ids: Vec<u32>,
    file_id: FileId,
    is_file_source: bool,
    external_essence: bool,
}

struct RegisteredFile {
    path: PathBuf,
    reader: Option<Rc<RefCell<MxfFileReader>>>,
    packages: Vec<RegisteredPackage>,
}

/// Resolver backed by a [`FileFactory`].
///
/// External readers are memoized by absolute path, so every referencing
/// track shares one reader per file. They open through the same factory,
/// so references made by external files resolve in the same file space.
pub struct DefaultPackageResolver {
    factory: Rc<dyn FileFactory>,
    config: ReaderConfig,
    log_dispatch: Option<Dispatch>,
    files: Vec<RegisteredFile>,
    by_path: HashMap<PathBuf, FileId>,
}

impl fmt::Debug for DefaultPackageResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPackageResolver")
            .field("files", &self.by_path)
            .finish()
    }
}

impl DefaultPackageResolver {
    /// Create a resolver that opens external files through `factory`.
    pub fn new(factory: Rc<dyn FileFactory>) -> Self {
        DefaultPackageResolver {
            factory,
            config: ReaderConfig::default(),
            log_dispatch: None,
            files: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Open the file at `path` as an external reader and register its
    /// packages. Files already registered are not reopened.
    pub fn register_file(&mut self, path: &Path) -> Option<FileId> {
        let path = self.factory.absolute_path(path);
        if let Some(&file_id) = self.by_path.get(&path) {
            return Some(file_id);
        }

        let stream = match self.factory.open_read(&path) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to open external file");
                return None;
            }
        };
        let mut reader = MxfFileReader::with_shared_factory(self.factory.clone());
        reader.set_config(self.config.clone());
        if let Some(dispatch) = &self.log_dispatch {
            reader.set_log_dispatch(dispatch.clone());
        }
        let result = reader.open_stream(stream, &path);
        if !result.is_success() {
            warn!(path = %path.display(), %result, "failed to open external file");
            return None;
        }

        let reader = Rc::new(RefCell::new(reader));
        let file_id = {
            let borrowed = reader.borrow();
            let header = borrowed.header_metadata()?;
            self.register(&path, header, Some(reader.clone()))
        };
        debug!(path = %path.display(), file_id, "registered external file");
        Some(file_id)
    }

    /// The external reader registered for `file_id`.
    pub fn file_reader(&self, file_id: FileId) -> Option<Rc<RefCell<MxfFileReader>>> {
        self.files.get(file_id)?.reader.clone()
    }

    /// Number of registered files.
    pub fn num_files(&self) -> usize {
        self.by_path.len()
    }

    fn register(
        &mut self,
        path: &Path,
        header: &HeaderMetadata,
        reader: Option<Rc<RefCell<MxfFileReader>>>,
    ) -> FileId {
        let file_id = match self.by_path.get(path) {
            Some(&file_id) => file_id,
            None => {
                self.files.push(RegisteredFile {
                    path: path.to_path_buf(),
                    reader: None,
                    packages: Vec::new(),
                });
                let file_id = self.files.len() - 1;
                self.by_path.insert(path.to_path_buf(), file_id);
                file_id
            }
        };

        let linked: Vec<Umid> = header
            .essence_container_data()
            .iter()
            .map(|ecd| ecd.linked_package_uid)
            .collect();
        let packages = header
            .packages()
            .iter()
            .map(|package| {
                let is_file_source = package.is_file_source();
                RegisteredPackage {
                    uid: package.uid,
                    track_ids: package.tracks.iter().map(|t| t.track_id).collect(),
                    file_id,
                    is_file_source,
                    external_essence: is_file_source && !linked.contains(&package.uid),
                }
            })
            .collect();

        let file = &mut self.files[file_id];
        file.reader = reader;
        file.packages = packages;
        file_id
    }

    fn find(&self, clip: &SourceClip) -> Vec<ResolvedPackage> {
        self.files
            .iter()
            .flat_map(|file| file.packages.iter().map(move |p| (file, p)))
            .filter(|(_, p)| {
                p.uid == clip.source_package_id && p.track_ids.contains(&clip.source_track_id)
            })
            .map(|(file, p)| ResolvedPackage {
                package_uid: p.uid,
                track_id: clip.source_track_id,
                file_id: p.file_id,
                file_reader: file.reader.clone(),
                is_file_source_package: p.is_file_source,
                external_essence: p.external_essence,
            })
            .collect()
    }

    fn locator_path(&self, url: &str, referencing: FileId) -> PathBuf {
        let stripped = url
            .strip_prefix("file://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        let path = Path::new(stripped);
        if path.is_absolute() {
            return normalize_path(path);
        }
        let base = self
            .files
            .get(referencing)
            .and_then(|file| file.path.parent())
            .map(Path::to_path_buf)
            .unwrap_or_default();
        normalize_path(&base.join(path))
    }
}

impl PackageResolver for DefaultPackageResolver {
    fn extract_packages(
        &mut self,
        path: &Path,
        header: &HeaderMetadata,
        reader: Option<Rc<RefCell<MxfFileReader>>>,
    ) -> FileId {
        let path = self.factory.absolute_path(path);
        self.register(&path, header, reader)
    }

    fn resolve_source_clip(
        &mut self,
        clip: &SourceClip,
        locators: Option<&[Locator]>,
        referencing: FileId,
    ) -> Vec<ResolvedPackage> {
        let found = self.find(clip);
        let Some(locators) = locators else {
            return found;
        };
        let external: Vec<ResolvedPackage> = found
            .iter()
            .filter(|r| r.file_id != referencing)
            .cloned()
            .collect();
        if !external.is_empty() {
            return external;
        }

        for locator in locators {
            let Locator::Network(url) = locator else {
                continue;
            };
            let path = self.locator_path(url, referencing);
            if self.register_file(&path).is_none() {
                continue;
            }
            let resolved: Vec<ResolvedPackage> = self
                .find(clip)
                .into_iter()
                .filter(|r| r.file_id != referencing)
                .collect();
            if !resolved.is_empty() {
                return resolved;
            }
        }
        Vec::new()
    }

    fn unregister(&mut self, file_id: FileId) {
        if let Some(file) = self.files.get_mut(file_id) {
            file.packages.clear();
            file.reader = None;
            let path = file.path.clone();
            self.by_path.remove(&path);
        }
    }

    fn set_external_reader_settings(
        &mut self,
        config: &ReaderConfig,
        log_dispatch: Option<&Dispatch>,
    ) {
        self.config = config.clone();
        self.log_dispatch = log_dispatch.cloned();
    }
}
