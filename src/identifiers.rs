//! Magic numbers for IronSegment files and the standard section kinds.
//!
//! Every identifier is a big-endian `u64`.  The section identifiers spell out short ASCII tags
//! ("IrS_MNIF", "IrS_IMGD", "IrS_END!") so that they are easy to spot in a hex dump.  The file
//! identifier follows the PNG convention of a high-bit first octet followed by line-ending
//! octets, which catches files that were mangled by text-mode transfers.

const FILE_IDENTIFIER: u64 = 0x8949_7253_0D0A_1A0A;
const SECTION_MANIFEST_IDENTIFIER: u64 = 0x4972_535F_4D4E_4946;
const SECTION_IMAGE_IDENTIFIER: u64 = 0x4972_535F_494D_4744;
const SECTION_END_IDENTIFIER: u64 = 0x4972_535F_454E_4421;

/// The identifier stored in the first eight octets of every IronSegment file.
pub const fn file_identifier() -> u64 {
    FILE_IDENTIFIER
}

/// The identifier of manifest sections.
pub const fn section_manifest_identifier() -> u64 {
    SECTION_MANIFEST_IDENTIFIER
}

/// The identifier of image sections.
pub const fn section_image_identifier() -> u64 {
    SECTION_IMAGE_IDENTIFIER
}

/// The identifier of the terminating end section.
pub const fn section_end_identifier() -> u64 {
    SECTION_END_IDENTIFIER
}

/// Returns a human-readable name for one of the standard section identifiers.
pub fn name_of(identifier: u64) -> Option<&'static str> {
    match identifier {
        SECTION_MANIFEST_IDENTIFIER => Some("MANIFEST"),
        SECTION_IMAGE_IDENTIFIER => Some("IMAGE"),
        SECTION_END_IDENTIFIER => Some("END"),
        _ => None,
    }
}

/// The kind of a section, as determined by its identifier.
///
/// The set of standard kinds is closed, but files may carry sections with any other identifier;
/// those are preserved as `Other` and treated as opaque byte ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectionKind {
    End,
    Manifest,
    Image,
    Other(u64),
}

impl SectionKind {
    pub fn from_identifier(identifier: u64) -> Self {
        match identifier {
            SECTION_END_IDENTIFIER => Self::End,
            SECTION_MANIFEST_IDENTIFIER => Self::Manifest,
            SECTION_IMAGE_IDENTIFIER => Self::Image,
            other => Self::Other(other),
        }
    }

    pub fn identifier(self) -> u64 {
        match self {
            Self::End => SECTION_END_IDENTIFIER,
            Self::Manifest => SECTION_MANIFEST_IDENTIFIER,
            Self::Image => SECTION_IMAGE_IDENTIFIER,
            Self::Other(identifier) => identifier,
        }
    }
}

impl From<u64> for SectionKind {
    fn from(identifier: u64) -> Self {
        Self::from_identifier(identifier)
    }
}
