//! Byte streams and file factories.
//!
//! The reader never opens files directly. It asks a [`FileFactory`] for an
//! [`MxfStream`], which lets tests serve fixtures from memory and lets
//! callers wrap pipes as non-seekable streams.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

/// A readable byte stream carrying MXF data.
pub trait MxfStream: Read + Seek {
    /// Whether arbitrary seeks are supported.
    fn is_seekable(&self) -> bool {
        true
    }
}

impl MxfStream for File {}

impl<T: AsRef<[u8]>> MxfStream for Cursor<T> {}

/// Wraps a reader that can only move forward.
///
/// Forward seeks read and discard; backward seeks and seeks from the end
/// fail with [`io::ErrorKind::Unsupported`].
#[derive(Debug)]
pub struct NonSeekableStream<R> {
    inner: R,
    position: u64,
}

impl<R: Read> NonSeekableStream<R> {
    /// Wrap `inner`.
    pub fn new(inner: R) -> Self {
        NonSeekableStream { inner, position: 0 }
    }

    fn skip_forward(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(count), &mut io::sink())?;
        self.position += skipped;
        if skipped < count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "end of stream while skipping",
            ));
        }
        Ok(())
    }
}

impl<R: Read> Read for NonSeekableStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.position += count as u64;
        Ok(count)
    }
}

impl<R: Read> Seek for NonSeekableStream<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(_) => None,
        };
        match target {
            Some(target) if target >= self.position => {
                self.skip_forward(target - self.position)?;
                Ok(self.position)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stream is not seekable",
            )),
        }
    }
}

impl<R: Read> MxfStream for NonSeekableStream<R> {
    fn is_seekable(&self) -> bool {
        false
    }
}

/// Opens streams for file paths.
pub trait FileFactory {
    /// Open `path` for reading.
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn MxfStream>>;

    /// Absolute form of `path`, used to identify files.
    fn absolute_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            normalize_path(path)
        } else {
            match std::env::current_dir() {
                Ok(dir) => normalize_path(&dir.join(path)),
                Err(_) => normalize_path(path),
            }
        }
    }
}

/// Opens files from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskFileFactory;

impl FileFactory for DiskFileFactory {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn MxfStream>> {
        Ok(Box::new(File::open(path)?))
    }
}

/// Serves files from an in-memory map.
///
/// Clones share the same map, so a clone handed to a package resolver sees
/// files added through the original.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileFactory {
    files: Rc<RefCell<HashMap<PathBuf, Rc<[u8]>>>>,
}

impl MemoryFileFactory {
    /// An empty file map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the file at `path`.
    pub fn insert(&self, path: impl AsRef<Path>, data: Vec<u8>) {
        let path = self.absolute_path(path.as_ref());
        self.files.borrow_mut().insert(path, Rc::from(data));
    }

    /// Remove the file at `path`.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute_path(path.as_ref());
        self.files.borrow_mut().remove(&path).is_some()
    }

    /// Whether a file exists at `path`.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute_path(path.as_ref());
        self.files.borrow().contains_key(&path)
    }
}

impl FileFactory for MemoryFileFactory {
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn MxfStream>> {
        let path = self.absolute_path(path);
        let data = self.files.borrow().get(&path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory file '{}'", path.display()),
            )
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn absolute_path(&self, path: &Path) -> PathBuf {
        normalize_path(&Path::new("/").join(path))
    }
}

/// Lexically remove `.` and `..` components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
