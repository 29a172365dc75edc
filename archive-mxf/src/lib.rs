//! MXF (Material eXchange Format) file reader
//!
//! This crate reads MXF files as produced by broadcast and archive
//! ingest: OP-1A, OP-1B and OP-Atom files with frame or clip wrapped
//! essence, including files still being written and files streamed
//! through a pipe.
//!
//! # Features
//!
//! - KLV and partition parsing, with Random Index Pack, footer chain and
//!   forward scan partition discovery
//! - Header metadata decoding into packages, tracks and descriptors
//! - Index table (CBE and VBE) based random access, sequential reading
//!   without an index
//! - Material package composition from internal and external essence,
//!   with edit rate conversion through sample sequences
//! - Precharge and rollout for long GOP MPEG-2 essence
//! - Material, file source and physical source timecodes
//!
//! # Example
//!
//! ```no_run
//! use archive_mxf::{MxfFileReader, OpenResult};
//!
//! let mut reader = MxfFileReader::new();
//! match reader.open("ingest/0001.mxf") {
//!     OpenResult::Success => {}
//!     other => panic!("open failed: {}", other.as_str()),
//! }
//!
//! println!("tracks: {}", reader.num_track_readers());
//! println!("duration: {} at {}", reader.duration(), reader.edit_rate());
//! if let Some(tc) = reader.material_timecode(0) {
//!     println!("start timecode: {}", tc);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod edit_rate;
mod error;
mod essence_reader;
mod essence_type;
mod frame;
mod frame_info;
pub mod index;
pub mod klv;
pub mod metadata;
pub mod partition;
mod reader;
mod resolver;
mod stream;
mod track_reader;
mod types;
pub mod ul;

pub use edit_rate::Rounding;
pub use error::{MxfError, OpenResult, Result};
pub use essence_type::EssenceType;
pub use frame::{Frame, FrameBuffer};
pub use frame_info::{AncManifestElement, FrameInfo, VbiManifestElement};
pub use metadata::HeaderMetadata;
pub use reader::{MxfFileReader, ReaderConfig};
pub use resolver::{DefaultPackageResolver, FileId, PackageResolver, ResolvedPackage};
pub use stream::{
    normalize_path, DiskFileFactory, FileFactory, MemoryFileFactory, MxfStream, NonSeekableStream,
};
pub use track_reader::{
    DataTrackInfo, MxfTrackInfo, MxfTrackReader, PictureTrackInfo, SoundTrackInfo, TrackDetails,
};
pub use types::{EditRate, Rational, Umid};
pub use ul::{DataDefinition, OperationalPattern, UniversalLabel, WrappingType, UL};

pub use archive_timecode::Timecode;
