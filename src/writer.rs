//! Writing IronSegment files.
//!
//! A [`FileWriter`] owns a seekable sink and hands out one section at a time.  Sections are
//! written in order: a section header with a placeholder size goes down when the section is
//! opened, the caller writes the section data through the returned handle (seeking freely within
//! it), and closing the handle pads the data to 16 octets and patches the real size back into the
//! header.
//!
//! The section handles mutably borrow the [`FileWriter`], so a second section can't be opened
//! while one is in use.  A handle that is dropped without being closed leaves its section open,
//! and every further attempt to open a section or to finish the file then fails with
//! [`StateError::SectionOpen`].

use std::io::{self, Seek, SeekFrom, Write};

use log::{debug, warn};
use zerocopy::{
    big_endian::{U32, U64},
    IntoBytes,
};

use crate::{
    channel::{resolve_seek, OutputChannel},
    document::{ManifestCodec, TextManifestCodec},
    error::{Error, FormatError, Result, StateError},
    format::{
        FileHeader, FileSectionDescription, SectionDescription, SectionHeader, Version,
        FILE_HEADER_SIZE, SECTION_ALIGNMENT, SECTION_HEADER_SIZE, SECTION_SIZE_FIELD_OFFSET,
        SUPPORTED_MAJOR_VERSION,
    },
    identifiers::{
        section_end_identifier, section_image_identifier, section_manifest_identifier, SectionKind,
    },
    image::ImageSectionWriter,
    manifest::Manifest,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    SectionOpen { identifier: u64, offset: u64 },
}

/// A write session over a seekable sink.
#[derive(Debug)]
pub struct FileWriter<W> {
    output: OutputChannel<W>,
    version: Version,
    state: State,
    last_closed: u64,
}

impl<W: Write + Seek> FileWriter<W> {
    /// Starts a new file, writing the file header at offset 0 of `inner`.
    ///
    /// The cursor is left directly after the header, which is where the first section goes.
    pub fn create(inner: W, version: Version) -> Result<Self> {
        if version.major != SUPPORTED_MAJOR_VERSION {
            return Err(FormatError::UnsupportedVersion {
                major: version.major,
                minor: version.minor,
                supported: SUPPORTED_MAJOR_VERSION,
            }
            .into());
        }

        let mut output = OutputChannel::new(inner)?;
        output.seek_to(0)?;
        output.write_struct(&FileHeader::new(version))?;
        debug!("Created file with version {version}");

        Ok(FileWriter {
            output,
            version,
            state: State::Idle,
            last_closed: FILE_HEADER_SIZE,
        })
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// The absolute position at which the next section will be opened.
    pub fn offset(&self) -> u64 {
        self.output.offset()
    }

    /// Moves the cursor.  Nothing is checked until the next section is opened.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        Ok(self.output.seek_to(offset)?)
    }

    /// The section directory is only known once a file is read back, so this always fails.
    pub fn sections(&self) -> Result<Vec<FileSectionDescription>> {
        Err(StateError::SectionsUnavailable.into())
    }

    /// Opens a section with the given identifier at the current offset.
    ///
    /// Sections with one of the well-known identifiers come back as their specialised handle.
    pub fn create_section(&mut self, identifier: u64) -> Result<WritableSection<'_, W>> {
        let section = self.open_section(identifier)?;
        Ok(match SectionKind::from_identifier(identifier) {
            SectionKind::End => WritableSection::End(EndSectionWriter(section)),
            SectionKind::Manifest => WritableSection::Manifest(ManifestSectionWriter(section)),
            SectionKind::Image => WritableSection::Image(ImageSectionWriter::new(section)),
            SectionKind::Other(_) => WritableSection::Other(section),
        })
    }

    pub fn create_section_end(&mut self) -> Result<EndSectionWriter<'_, W>> {
        self.open_section(section_end_identifier())
            .map(EndSectionWriter)
    }

    pub fn create_section_manifest(&mut self) -> Result<ManifestSectionWriter<'_, W>> {
        self.open_section(section_manifest_identifier())
            .map(ManifestSectionWriter)
    }

    pub fn create_section_image(&mut self) -> Result<ImageSectionWriter<'_, W>> {
        self.open_section(section_image_identifier())
            .map(ImageSectionWriter::new)
    }

    fn open_section(&mut self, identifier: u64) -> Result<SectionWriter<'_, W>> {
        if let State::SectionOpen { identifier, offset } = self.state {
            return Err(StateError::SectionOpen { identifier, offset }.into());
        }

        let offset = self.output.offset();
        if offset % SECTION_ALIGNMENT != 0 {
            return Err(Error::Alignment { offset });
        }
        if offset < self.last_closed {
            return Err(Error::Overlap {
                offset,
                last_closed: self.last_closed,
            });
        }

        self.output
            .write_struct(&SectionHeader::new(identifier, 0))?;
        self.state = State::SectionOpen { identifier, offset };
        debug!("Opened section {identifier:#018x} @{offset:#x}");

        Ok(SectionWriter {
            file: self,
            identifier,
            offset_start: offset,
            position: 0,
            high_water: 0,
            closed: false,
        })
    }

    fn on_section_closed(&mut self, end: u64) {
        self.state = State::Idle;
        self.last_closed = end;
    }

    /// Flushes the sink and gives it back.
    ///
    /// Nothing checks that an end section was written: a reader copes without one.
    pub fn finish(mut self) -> Result<W> {
        if let State::SectionOpen { identifier, offset } = self.state {
            return Err(StateError::SectionOpen { identifier, offset }.into());
        }
        self.output.flush()?;
        Ok(self.output.into_inner())
    }
}

/// The data of a section that is being written.
///
/// Positions are relative to the start of the section data.  The section ends at the highest
/// position ever written to, rounded up to 16 octets; seeking beyond that without writing doesn't
/// grow the section.
#[derive(Debug)]
pub struct SectionWriter<'f, W> {
    file: &'f mut FileWriter<W>,
    identifier: u64,
    offset_start: u64,
    position: u64,
    high_water: u64,
    closed: bool,
}

impl<W: Write + Seek> SectionWriter<'_, W> {
    pub fn identifier(&self) -> u64 {
        self.identifier
    }

    pub fn kind(&self) -> SectionKind {
        SectionKind::from_identifier(self.identifier)
    }

    /// The absolute offset of the section header.
    pub fn offset_start(&self) -> u64 {
        self.offset_start
    }

    /// The absolute offset of the first octet of section data.
    pub fn offset_start_data(&self) -> u64 {
        self.offset_start + SECTION_HEADER_SIZE
    }

    /// The number of octets of data written so far, before padding.
    pub fn len(&self) -> u64 {
        self.high_water
    }

    pub fn is_empty(&self) -> bool {
        self.high_water == 0
    }

    /// Pads the data, patches the section size into the header and leaves the file cursor at the
    /// end of the section, where the next one can be opened.
    pub fn close(mut self) -> Result<FileSectionDescription> {
        let data_start = self.offset_start_data();
        let output = &mut self.file.output;

        output.seek_to(data_start + self.high_water)?;
        output.pad(SECTION_ALIGNMENT)?;
        let end = output.offset();
        let size = end - data_start;

        output.seek_to(self.offset_start + SECTION_SIZE_FIELD_OFFSET)?;
        output.write_struct(&U64::new(size))?;
        output.seek_to(end)?;

        debug!(
            "Closed section {:#018x} @{:#x}: {} octets of data, size {size}",
            self.identifier, self.offset_start, self.high_water
        );

        self.closed = true;
        self.file.on_section_closed(end);

        Ok(FileSectionDescription::new(
            SectionDescription {
                identifier: self.identifier,
                size,
            },
            self.offset_start,
        ))
    }
}

impl<W: Write + Seek> Write for SectionWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let offset = self
            .offset_start_data()
            .checked_add(self.position)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "offset overflow"))?;
        self.file.output.seek_to(offset)?;
        let n = self.file.output.write(buf)?;
        self.position += n as u64;
        self.high_water = self.high_water.max(self.position);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.output.flush()
    }
}

impl<W: Write + Seek> Seek for SectionWriter<'_, W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(self.position, self.high_water, pos)?;
        Ok(self.position)
    }
}

impl<W> Drop for SectionWriter<'_, W> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "Section {:#018x} @{:#x} dropped without being closed",
                self.identifier, self.offset_start
            );
        }
    }
}

/// The end section.  It carries no data: all there is to do is close it.
#[derive(Debug)]
pub struct EndSectionWriter<'f, W>(SectionWriter<'f, W>);

impl<W: Write + Seek> EndSectionWriter<'_, W> {
    pub fn identifier(&self) -> u64 {
        self.0.identifier()
    }

    pub fn close(self) -> Result<FileSectionDescription> {
        self.0.close()
    }
}

/// The manifest section: a `u32` document length followed by the document.
#[derive(Debug)]
pub struct ManifestSectionWriter<'f, W>(SectionWriter<'f, W>);

impl<W: Write + Seek> ManifestSectionWriter<'_, W> {
    pub fn identifier(&self) -> u64 {
        self.0.identifier()
    }

    /// Encodes `manifest` with the [`TextManifestCodec`] and writes it into the section.
    pub fn set_manifest(&mut self, manifest: &Manifest) -> Result<()> {
        self.set_manifest_with(&TextManifestCodec, manifest)
    }

    /// Encodes `manifest` with `codec` and writes it into the section.  This can be done once.
    pub fn set_manifest_with(
        &mut self,
        codec: &impl ManifestCodec,
        manifest: &Manifest,
    ) -> Result<()> {
        if !self.0.is_empty() {
            return Err(StateError::ManifestAlreadyWritten.into());
        }

        let document = codec.encode(manifest)?;
        let length = u32::try_from(document.len()).map_err(|_| FormatError::ManifestTooLarge {
            length: document.len(),
        })?;

        self.0.write_all(U32::new(length).as_bytes())?;
        self.0.write_all(&document)?;
        debug!("Wrote manifest document of {length} octets");
        Ok(())
    }

    pub fn close(self) -> Result<FileSectionDescription> {
        self.0.close()
    }
}

/// A freshly opened section, specialised by identifier.
#[derive(Debug)]
pub enum WritableSection<'f, W> {
    End(EndSectionWriter<'f, W>),
    Manifest(ManifestSectionWriter<'f, W>),
    Image(ImageSectionWriter<'f, W>),
    Other(SectionWriter<'f, W>),
}

impl<W: Write + Seek> WritableSection<'_, W> {
    pub fn identifier(&self) -> u64 {
        match self {
            WritableSection::End(section) => section.identifier(),
            WritableSection::Manifest(section) => section.identifier(),
            WritableSection::Image(section) => section.identifier(),
            WritableSection::Other(section) => section.identifier(),
        }
    }

    pub fn close(self) -> Result<FileSectionDescription> {
        match self {
            WritableSection::End(section) => section.close(),
            WritableSection::Manifest(section) => section.close(),
            WritableSection::Image(section) => section.close(),
            WritableSection::Other(section) => section.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::test::minimal_manifest;

    const CUSTOM: u64 = 0x5445_5354_5345_4354; // "TESTSECT"

    fn new_writer() -> FileWriter<Cursor<Vec<u8>>> {
        FileWriter::create(Cursor::new(vec![]), Version::default()).unwrap()
    }

    fn section_size(data: &[u8], offset: usize) -> u64 {
        u64::from_be_bytes(data[offset + 8..offset + 16].try_into().unwrap())
    }

    #[test]
    fn test_create_writes_header() {
        let writer = FileWriter::create(Cursor::new(vec![]), Version::new(1, 3)).unwrap();
        assert_eq!(writer.offset(), 16);
        assert_eq!(writer.version(), Version::new(1, 3));
        let data = writer.finish().unwrap().into_inner();
        assert_eq!(data, FileHeader::new(Version::new(1, 3)).as_bytes());
    }

    #[test]
    fn test_create_rejects_major_version() {
        let err = FileWriter::create(Cursor::new(vec![]), Version::new(2, 0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::UnsupportedVersion {
                major: 2,
                minor: 0,
                supported: 1
            })
        ));
    }

    #[test]
    fn test_end_section() {
        let mut writer = new_writer();
        let end = writer.create_section_end().unwrap().close().unwrap();
        assert_eq!(end.file_offset, 16);
        assert_eq!(end.file_offset_data, 32);
        assert_eq!(end.size(), 0);
        assert_eq!(writer.offset(), 32);

        let data = writer.finish().unwrap().into_inner();
        assert_eq!(data.len(), 32);
        assert_eq!(&data[16..24], b"IrS_END!");
        assert_eq!(section_size(&data, 16), 0);
    }

    #[test]
    fn test_padding_and_backpatch() {
        let mut writer = new_writer();
        let WritableSection::Other(mut section) = writer.create_section(CUSTOM).unwrap() else {
            panic!("custom identifier should give a plain section");
        };
        section.write_all(b"0123456789").unwrap();
        section.seek(SeekFrom::Start(2)).unwrap();
        section.write_all(b"ab").unwrap();
        assert_eq!(section.len(), 10);
        let description = section.close().unwrap();
        assert_eq!(description.size(), 16);
        assert_eq!(description.file_offset_end(), 48);
        assert_eq!(writer.offset(), 48);

        let data = writer.finish().unwrap().into_inner();
        assert_eq!(data.len(), 48);
        assert_eq!(section_size(&data, 16), 16);
        assert_eq!(&data[32..42], b"01ab456789");
        assert!(data[42..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_seek_without_write_does_not_grow() {
        let mut writer = new_writer();
        let WritableSection::Other(mut section) = writer.create_section(CUSTOM).unwrap() else {
            panic!("custom identifier should give a plain section");
        };
        section.write_all(&[1; 16]).unwrap();
        section.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(section.seek(SeekFrom::End(0)).unwrap(), 16);
        assert_eq!(section.close().unwrap().size(), 16);
    }

    #[test]
    fn test_write_at_later_position() {
        let mut writer = new_writer();
        let WritableSection::Other(mut section) = writer.create_section(CUSTOM).unwrap() else {
            panic!("custom identifier should give a plain section");
        };
        section.seek(SeekFrom::Start(20)).unwrap();
        section.write_all(b"x").unwrap();
        assert_eq!(section.close().unwrap().size(), 32);
        assert_eq!(writer.offset(), 64);
    }

    #[test]
    fn test_alignment() {
        let mut writer = new_writer();
        writer.seek_to(17).unwrap();
        assert!(matches!(
            writer.create_section_end(),
            Err(Error::Alignment { offset: 17 })
        ));
        writer.seek_to(48).unwrap();
        let end = writer.create_section_end().unwrap().close().unwrap();
        assert_eq!(end.file_offset, 48);
    }

    #[test]
    fn test_overlap() {
        let mut writer = new_writer();
        writer.seek_to(0).unwrap();
        assert!(matches!(
            writer.create_section_end(),
            Err(Error::Overlap {
                offset: 0,
                last_closed: 16
            })
        ));

        writer.seek_to(16).unwrap();
        let mut manifest = writer.create_section_manifest().unwrap();
        manifest.set_manifest(&minimal_manifest()).unwrap();
        let closed = manifest.close().unwrap();

        writer.seek_to(16).unwrap();
        assert!(matches!(
            writer.create_section_end(),
            Err(Error::Overlap { offset: 16, last_closed }) if last_closed == closed.file_offset_end()
        ));
    }

    #[test]
    fn test_dropped_section_stays_open() {
        let mut writer = new_writer();
        let mut section = writer.create_section(0x1234).unwrap();
        if let WritableSection::Other(section) = &mut section {
            section.write_all(b"abc").unwrap();
        }
        drop(section);

        // the open section is reported even though the cursor is now misaligned
        assert_eq!(writer.offset(), 35);
        assert!(matches!(
            writer.create_section_end(),
            Err(Error::State(StateError::SectionOpen { offset: 16, .. }))
        ));
        assert!(matches!(
            writer.finish(),
            Err(Error::State(StateError::SectionOpen {
                identifier: 0x1234,
                offset: 16
            }))
        ));
    }

    #[test]
    fn test_sections_unavailable() {
        let writer = new_writer();
        assert!(matches!(
            writer.sections(),
            Err(Error::State(StateError::SectionsUnavailable))
        ));
    }

    #[test]
    fn test_manifest_written_once() {
        let mut writer = new_writer();
        let mut section = writer.create_section_manifest().unwrap();
        section.set_manifest(&minimal_manifest()).unwrap();
        assert!(matches!(
            section.set_manifest(&minimal_manifest()),
            Err(Error::State(StateError::ManifestAlreadyWritten))
        ));
        let description = section.close().unwrap();

        let document = TextManifestCodec.encode(&minimal_manifest()).unwrap();
        assert_eq!(description.size() % 16, 0);
        assert!(description.size() >= 4 + document.len() as u64);
        assert!(description.size() < 4 + document.len() as u64 + 16);
    }

    #[test]
    fn test_create_section_dispatch() {
        let mut writer = new_writer();
        for identifier in [
            section_manifest_identifier(),
            section_image_identifier(),
            CUSTOM,
            section_end_identifier(),
        ] {
            let section = writer.create_section(identifier).unwrap();
            assert_eq!(section.identifier(), identifier);
            let expected = matches!(
                (&section, SectionKind::from_identifier(identifier)),
                (WritableSection::Manifest(_), SectionKind::Manifest)
                    | (WritableSection::Image(_), SectionKind::Image)
                    | (WritableSection::End(_), SectionKind::End)
                    | (WritableSection::Other(_), SectionKind::Other(_))
            );
            assert!(expected);
            section.close().unwrap();
        }
        // four empty sections, each just a header
        assert_eq!(writer.offset(), 16 + 4 * 16);
    }
}
