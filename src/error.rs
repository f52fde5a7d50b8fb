//! Error types.
//!
//! All operations in this crate report failures synchronously through [`Error`].  Nothing is
//! retried and nothing is silently repaired: each variant carries the offsets and the expected
//! versus found values needed to diagnose the problem.

use thiserror::Error;

use crate::{document::DocumentError, manifest::NameError, semantic::PixelSemantic};

/// A numeric field was outside its valid domain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("{field} {value} must be in the range [1, 4294967295]")]
    OutOfRange { field: &'static str, value: u64 },
    #[error("{table} entry {id} should be associated with key {key}")]
    KeyMismatch {
        table: &'static str,
        key: u64,
        id: u64,
    },
}

/// The file (or a part of it) is not a valid IronSegment file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Bad file identifier: expected {expected:#018x}, found {found:#018x}")]
    BadMagic { expected: u64, found: u64 },
    #[error("Unsupported version {major}.{minor} (supported major version is {supported})")]
    UnsupportedVersion {
        major: u32,
        minor: u32,
        supported: u32,
    },
    #[error("File header truncated: file is {length} octets but the header needs {needed}")]
    TruncatedFileHeader { length: u64, needed: u64 },
    #[error("Section at offset {offset:#x} declares size {size} which overflows the file offset")]
    SectionOverflow { offset: u64, size: u64 },
    #[error("Section at offset {offset:#x} declares size {size} ending at unaligned offset {end:#x}")]
    MisalignedSection { offset: u64, size: u64, end: u64 },
    #[error("Section at offset {offset:#x} declares size {size} but the file ends at {length:#x}")]
    TruncatedSection { offset: u64, size: u64, length: u64 },
    #[error("Manifest section of size {size} is too small to hold a length field")]
    TruncatedManifest { size: u64 },
    #[error("Manifest declares {declared} octets but the section size is {size}")]
    ManifestLength { declared: u64, size: u64 },
    #[error("Manifest document of {length} octets does not fit a 32-bit length field")]
    ManifestTooLarge { length: usize },
    #[error("Image section of size {size} cannot hold {needed} octets of image data")]
    ImageTooSmall { size: u64, needed: u64 },
    #[error("Image section carries invalid image ID {value}")]
    InvalidImageId { value: u32 },
}

/// An operation was attempted in a state that does not permit it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Section {identifier:#018x} at offset {offset:#x} is still open for writing")]
    SectionOpen { identifier: u64, offset: u64 },
    #[error("The list of sections is not available while writing")]
    SectionsUnavailable,
    #[error("The manifest has already been written to this section")]
    ManifestAlreadyWritten,
}

#[derive(Error, Debug)] // can't derive PartialEq because of std::io::Error
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("Sections must be aligned to 16 octet boundaries (offset is {offset:#x})")]
    Alignment { offset: u64 },
    #[error("Offset {offset:#x} would damage the existing section that closed at {last_closed:#x}")]
    Overlap { offset: u64, last_closed: u64 },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Image data of {width}x{height} pixels of {semantic} overflows a 64-bit size")]
    Overflow {
        width: u64,
        height: u64,
        semantic: PixelSemantic,
    },
    #[error(transparent)]
    State(#[from] StateError),
    #[error("{0}")]
    Argument(String),
    #[error("Manifest document: {0}")]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, Error>;
