//! Error types for MXF reading.
//!
//! Every error maps onto an [`OpenResult`] category so that
//! [`MxfFileReader::open`](crate::MxfFileReader::open) can report a
//! categorical outcome instead of an error value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for MXF operations.
pub type Result<T> = std::result::Result<T, MxfError>;

/// Errors that can occur while reading MXF files.
#[derive(Error, Debug)]
pub enum MxfError {
    /// IO error during read or seek.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The file could not be opened.
    #[error("Failed to open '{path}': {message}")]
    OpenFailed {
        /// Path that failed to open.
        path: String,
        /// Underlying reason.
        message: String,
    },

    /// Structurally invalid MXF file.
    #[error("Invalid MXF file: {0}")]
    InvalidFile(String),

    /// Invalid KLV structure.
    #[error("Invalid KLV at offset {offset}: {message}")]
    InvalidKlv {
        /// Description of the problem.
        message: String,
        /// File offset of the offending KLV.
        offset: u64,
    },

    /// Insufficient data for operation.
    #[error("Insufficient data: need {needed} bytes, have {available}")]
    InsufficientData {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// BER length encoding error.
    #[error("BER encoding error: {0}")]
    BerError(String),

    /// Invalid partition structure.
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    /// No partition carries header metadata.
    #[error("No header metadata found")]
    NoHeaderMetadata,

    /// Header metadata is malformed or inconsistent.
    #[error("Invalid header metadata: {0}")]
    InvalidHeaderMetadata(String),

    /// No material track resolved to essence.
    #[error("No essence tracks: {0}")]
    NoEssence(String),

    /// Essence is present but the index table is missing.
    #[error("No index table for index SID {0}")]
    NoIndexTable(u32),

    /// The index table has gaps or does not start at zero.
    #[error("Incomplete index table: {0}")]
    IncompleteIndexTable(String),

    /// The file uses a structure this reader does not handle.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A call was made in a state where it has no meaning.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Runtime read failure.
    #[error("Read error: {0}")]
    Read(String),
}

impl MxfError {
    /// Create an invalid header metadata error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        MxfError::InvalidHeaderMetadata(message.into())
    }

    /// Create a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        MxfError::NotSupported(message.into())
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        MxfError::Precondition(message.into())
    }

    /// The [`OpenResult`] category reported when this error ends an open.
    pub fn open_result(&self) -> OpenResult {
        match self {
            MxfError::OpenFailed { .. } => OpenResult::OpenFail,
            MxfError::InvalidFile(_)
            | MxfError::InvalidKlv { .. }
            | MxfError::InsufficientData { .. }
            | MxfError::BerError(_)
            | MxfError::InvalidPartition(_) => OpenResult::InvalidFile,
            MxfError::NoHeaderMetadata => OpenResult::NoHeaderMetadata,
            MxfError::InvalidHeaderMetadata(_) => OpenResult::InvalidHeaderMetadata,
            MxfError::NoEssence(_) => OpenResult::NoEssence,
            MxfError::NoIndexTable(_) => OpenResult::NoIndexTable,
            MxfError::IncompleteIndexTable(_) => OpenResult::IncompleteIndexTable,
            MxfError::NotSupported(_) => OpenResult::NotSupported,
            MxfError::Io(_) | MxfError::Precondition(_) | MxfError::Read(_) => {
                OpenResult::GeneralFail
            }
        }
    }
}

/// Outcome of opening an MXF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenResult {
    /// The file opened and at least one track is readable.
    Success,
    /// The file could not be opened.
    OpenFail,
    /// The file is not valid MXF.
    InvalidFile,
    /// The file uses an unsupported structure.
    NotSupported,
    /// No partition holds header metadata.
    NoHeaderMetadata,
    /// The header metadata is invalid.
    InvalidHeaderMetadata,
    /// No track resolved to essence.
    NoEssence,
    /// The index table is missing.
    NoIndexTable,
    /// The index table is incomplete.
    IncompleteIndexTable,
    /// Any other failure.
    GeneralFail,
}

impl OpenResult {
    /// True for [`OpenResult::Success`].
    pub fn is_success(self) -> bool {
        self == OpenResult::Success
    }

    /// Short description suitable for log messages.
    pub fn as_str(self) -> &'static str {
        match self {
            OpenResult::Success => "success",
            OpenResult::OpenFail => "open failed",
            OpenResult::InvalidFile => "invalid file",
            OpenResult::NotSupported => "not supported",
            OpenResult::NoHeaderMetadata => "no header metadata",
            OpenResult::InvalidHeaderMetadata => "invalid header metadata",
            OpenResult::NoEssence => "no essence",
            OpenResult::NoIndexTable => "no index table",
            OpenResult::IncompleteIndexTable => "incomplete index table",
            OpenResult::GeneralFail => "general error",
        }
    }
}

impl fmt::Display for OpenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
