//! Reading IronSegment files.
//!
//! [`FileReader::open`] checks the file header and walks the whole section chain up front, so
//! that a structurally broken file is rejected before any section is handed out.  The scan stops
//! after the end section; anything following it is counted as trailing octets and otherwise
//! ignored.

use std::io::{self, Read, Seek, SeekFrom};

use log::{debug, trace, warn};
use zerocopy::{big_endian::U32, IntoBytes};

use crate::{
    channel::{resolve_seek, InputChannel},
    document::{ManifestCodec, TextManifestCodec},
    error::{Error, FormatError, Result},
    format::{
        round_up, FileHeader, FileSectionDescription, SectionDescription, SectionHeader, Version,
        FILE_HEADER_SIZE, MANIFEST_LENGTH_SIZE, SECTION_ALIGNMENT, SECTION_HEADER_SIZE,
        SUPPORTED_MAJOR_VERSION,
    },
    identifiers::{file_identifier, SectionKind},
    manifest::Manifest,
};

/// A read session over a seekable source.
#[derive(Debug)]
pub struct FileReader<R> {
    input: InputChannel<R>,
    version: Version,
    sections: Vec<FileSectionDescription>,
    trailing_octets: u64,
}

fn scan_sections<R: Read + Seek>(
    input: &mut InputChannel<R>,
) -> Result<Vec<FileSectionDescription>> {
    let length = input.length();
    let mut sections = vec![];
    let mut offset = FILE_HEADER_SIZE;

    while length - offset >= SECTION_HEADER_SIZE {
        input.seek_to(offset)?;
        let header: SectionHeader = input.read_struct()?;
        let section = FileSectionDescription::new(header.into(), offset);
        let size = section.size();

        let end = section
            .file_offset_data
            .checked_add(size)
            .ok_or(FormatError::SectionOverflow { offset, size })?;
        if end % SECTION_ALIGNMENT != 0 {
            return Err(FormatError::MisalignedSection { offset, size, end }.into());
        }
        if end > length {
            return Err(FormatError::TruncatedSection {
                offset,
                size,
                length,
            }
            .into());
        }

        trace!("{section:?}, input @{:#x}", input.offset());
        debug!(
            "Section {} ({:#018x}) @{offset:#x}, size {size}",
            section.description.name().unwrap_or("unknown"),
            section.identifier()
        );

        sections.push(section);
        offset = end;

        if section.kind() == SectionKind::End {
            return Ok(sections);
        }
    }

    warn!("No end section found before offset {offset:#x}");
    Ok(sections)
}

impl<R: Read + Seek> FileReader<R> {
    /// Validates the file header and scans the section chain of `inner`.
    pub fn open(inner: R) -> Result<Self> {
        let mut input = InputChannel::new(inner)?;

        if input.length() < FILE_HEADER_SIZE {
            return Err(FormatError::TruncatedFileHeader {
                length: input.length(),
                needed: FILE_HEADER_SIZE,
            }
            .into());
        }

        let header: FileHeader = input.read_struct()?;
        if header.magic.get() != file_identifier() {
            return Err(FormatError::BadMagic {
                expected: file_identifier(),
                found: header.magic.get(),
            }
            .into());
        }

        let version = header.version();
        if version.major != SUPPORTED_MAJOR_VERSION {
            return Err(FormatError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
                supported: SUPPORTED_MAJOR_VERSION,
            }
            .into());
        }
        debug!("Opened file with version {version}");

        let sections = scan_sections(&mut input)?;
        let end = sections
            .last()
            .map_or(FILE_HEADER_SIZE, FileSectionDescription::file_offset_end);
        let trailing_octets = input.length() - end;
        if trailing_octets != 0 {
            warn!("{trailing_octets} trailing octets after the last section @{end:#x}");
        }

        Ok(FileReader {
            input,
            version,
            sections,
            trailing_octets,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The sections of the file in order, up to and including the end section.
    pub fn sections(&self) -> &[FileSectionDescription] {
        &self.sections
    }

    /// The number of octets after the last section, which nothing accounts for.
    pub fn trailing_octets(&self) -> u64 {
        self.trailing_octets
    }

    /// Opens one of the sections returned by [`FileReader::sections`].
    pub fn open_section(
        &mut self,
        section: &FileSectionDescription,
    ) -> Result<SectionReader<'_, R>> {
        if !self.sections.contains(section) {
            return Err(Error::Argument(format!(
                "File does not contain a section {:#018x} @{:#x}",
                section.identifier(),
                section.file_offset
            )));
        }

        let length = match section.kind() {
            SectionKind::End => 0,
            _ => section.size(),
        };

        Ok(SectionReader {
            input: &mut self.input,
            section: *section,
            length,
            position: 0,
        })
    }

    /// Ends the session, giving back the source.
    pub fn close(self) -> R {
        self.input.into_inner()
    }
}

/// The data of one section, as a bounded `Read + Seek` view.
///
/// Positions are relative to the start of the section data.  The view covers the whole size
/// recorded in the section header, padding included; an end section always reads as empty.
#[derive(Debug)]
pub struct SectionReader<'f, R> {
    input: &'f mut InputChannel<R>,
    section: FileSectionDescription,
    length: u64,
    position: u64,
}

impl<R: Read + Seek> SectionReader<'_, R> {
    pub fn file_section(&self) -> &FileSectionDescription {
        &self.section
    }

    pub fn description(&self) -> &SectionDescription {
        &self.section.description
    }

    pub fn kind(&self) -> SectionKind {
        self.section.kind()
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Decodes the manifest of a manifest section with the [`TextManifestCodec`].
    pub fn manifest(&mut self) -> Result<Manifest> {
        self.manifest_with(&TextManifestCodec)
    }

    /// Decodes the manifest of a manifest section with `codec`.
    ///
    /// The section size has to be exactly the length field plus the declared document length,
    /// rounded up to 16 octets.
    pub fn manifest_with(&mut self, codec: &impl ManifestCodec) -> Result<Manifest> {
        if self.kind() != SectionKind::Manifest {
            return Err(Error::Argument(format!(
                "Section {:#018x} is not a manifest section",
                self.description().identifier
            )));
        }

        let size = self.length;
        if size < MANIFEST_LENGTH_SIZE {
            return Err(FormatError::TruncatedManifest { size }.into());
        }

        self.seek(SeekFrom::Start(0))?;
        let mut declared = U32::new(0);
        self.read_exact(declared.as_mut_bytes())?;
        let declared = u64::from(declared.get());

        if round_up(MANIFEST_LENGTH_SIZE + declared, SECTION_ALIGNMENT) != Some(size) {
            return Err(FormatError::ManifestLength { declared, size }.into());
        }

        let mut document = vec![0; declared as usize];
        self.read_exact(&mut document)?;
        Ok(codec.decode(&document)?)
    }
}

impl<R: Read + Seek> Read for SectionReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length.saturating_sub(self.position);
        let n = buf.len().min(remaining.try_into().unwrap_or(usize::MAX));
        if n == 0 {
            return Ok(0);
        }
        self.input
            .seek_to(self.section.file_offset_data + self.position)?;
        let n = self.input.read(&mut buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for SectionReader<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(self.position, self.length, pos)?;
        Ok(self.position)
    }
}
