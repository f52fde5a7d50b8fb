//! IronSegment on-disk format definitions.
//!
//! A file is a 16 octet header followed by a chain of sections.  Each section starts with a 16
//! octet header giving its identifier and the size of its data, and the data is padded so that
//! the next section header is again aligned to 16 octets.  All integers are big-endian.

use std::fmt;

use zerocopy::{
    big_endian::{U32, U64},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

use crate::identifiers::{file_identifier, name_of, SectionKind};

pub const FILE_HEADER_SIZE: u64 = 16;
pub const SECTION_HEADER_SIZE: u64 = 16;
pub const SECTION_ALIGNMENT: u64 = 16;

/// The `u32` length field that precedes the document in a manifest section.
pub const MANIFEST_LENGTH_SIZE: u64 = 4;
/// The `u32` image ID stamp that precedes the pixel data in an image section.
pub const IMAGE_ID_SIZE: u64 = 4;

pub const SUPPORTED_MAJOR_VERSION: u32 = 1;
pub const HIGHEST_MINOR_VERSION: u32 = 0;

/// Rounds `n` up to the next multiple of `to`, which must be a power of two.
///
/// Returns `None` if the result doesn't fit in a `u64`.
pub fn round_up(n: u64, to: u64) -> Option<u64> {
    debug_assert!(to.is_power_of_two());
    Some(n.checked_add(to - 1)? & !(to - 1))
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
#[repr(C)]
pub struct FileHeader {
    pub magic: U64,
    pub version_major: U32,
    pub version_minor: U32,
}

impl FileHeader {
    pub fn new(version: Version) -> Self {
        FileHeader {
            magic: file_identifier().into(),
            version_major: version.major.into(),
            version_minor: version.minor.into(),
        }
    }

    pub fn version(&self) -> Version {
        Version {
            major: self.version_major.get(),
            minor: self.version_minor.get(),
        }
    }
}

/// The size excludes the header itself but includes any alignment padding after the data.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
)]
#[repr(C)]
pub struct SectionHeader {
    pub identifier: U64,
    pub size: U64,
}

impl SectionHeader {
    pub fn new(identifier: u64, size: u64) -> Self {
        SectionHeader {
            identifier: identifier.into(),
            size: size.into(),
        }
    }
}

/// The offset of the size field within a [`SectionHeader`].
pub(crate) const SECTION_SIZE_FIELD_OFFSET: u64 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Version { major, minor }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::new(SUPPORTED_MAJOR_VERSION, HIGHEST_MINOR_VERSION)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The header fields of a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SectionDescription {
    pub identifier: u64,
    pub size: u64,
}

impl SectionDescription {
    pub fn kind(&self) -> SectionKind {
        SectionKind::from_identifier(self.identifier)
    }

    pub fn name(&self) -> Option<&'static str> {
        name_of(self.identifier)
    }
}

impl From<SectionHeader> for SectionDescription {
    fn from(header: SectionHeader) -> Self {
        SectionDescription {
            identifier: header.identifier.get(),
            size: header.size.get(),
        }
    }
}

/// A section's header fields along with its absolute position in a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileSectionDescription {
    pub description: SectionDescription,
    pub file_offset: u64,
    pub file_offset_data: u64,
}

impl FileSectionDescription {
    pub(crate) fn new(description: SectionDescription, file_offset: u64) -> Self {
        FileSectionDescription {
            description,
            file_offset,
            file_offset_data: file_offset + SECTION_HEADER_SIZE,
        }
    }

    pub fn identifier(&self) -> u64 {
        self.description.identifier
    }

    pub fn kind(&self) -> SectionKind {
        self.description.kind()
    }

    pub fn size(&self) -> u64 {
        self.description.size
    }

    /// The offset of the octet following this section (and its padding).
    pub fn file_offset_end(&self) -> u64 {
        self.file_offset_data + self.description.size
    }
}
