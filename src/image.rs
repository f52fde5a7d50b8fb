//! Image sections.
//!
//! An image section holds a single image: a `u32` image ID stamp followed by exactly
//! `width * height * octets_per_pixel` octets of pixel data, then the usual section padding.  The
//! dimensions and pixel semantic are not stored in the section; they come from the manifest.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::debug;
use zerocopy::{big_endian::U32, IntoBytes};

use crate::{
    channel::resolve_seek,
    error::{Error, FormatError, Result},
    format::{FileSectionDescription, IMAGE_ID_SIZE},
    identifiers::SectionKind,
    manifest::ImageId,
    reader::SectionReader,
    semantic::{image_data_size, PixelSemantic},
    writer::SectionWriter,
};

fn overflow(width: u64, height: u64, semantic: PixelSemantic) -> Error {
    Error::Overflow {
        width,
        height,
        semantic,
    }
}

#[derive(Debug)]
pub struct ImageSectionWriter<'f, W> {
    section: SectionWriter<'f, W>,
}

impl<'f, W: Write + Seek> ImageSectionWriter<'f, W> {
    pub(crate) fn new(section: SectionWriter<'f, W>) -> Self {
        ImageSectionWriter { section }
    }

    pub fn identifier(&self) -> u64 {
        self.section.identifier()
    }

    /// Stamps the section with `image_id` and reserves room for the pixel data.
    ///
    /// The returned [`ImageData`] covers exactly the pixel data: writes past its end are short,
    /// and the reserved space is already zero-filled so anything not written stays zero.
    pub fn create_image_data(
        &mut self,
        image_id: ImageId,
        width: u64,
        height: u64,
        semantic: PixelSemantic,
    ) -> Result<ImageData<'_, 'f, W>> {
        let length = image_data_size(width, height, semantic)?;
        let end = length
            .checked_add(IMAGE_ID_SIZE)
            .ok_or_else(|| overflow(width, height, semantic))?;

        let section = &mut self.section;
        section.seek(SeekFrom::Start(0))?;
        section.write_all(U32::new(image_id.get() as u32).as_bytes())?;
        if length > 0 {
            section.seek(SeekFrom::Start(end - 1))?;
            section.write_all(&[0])?;
        }
        debug!("Image {image_id}: {width}x{height} {semantic}, {length} octets");

        Ok(ImageData {
            section,
            length,
            position: 0,
        })
    }

    pub fn close(self) -> Result<FileSectionDescription> {
        self.section.close()
    }
}

/// The pixel data of an image being written, as a bounded `Write + Seek` view.
#[derive(Debug)]
pub struct ImageData<'s, 'f, W> {
    section: &'s mut SectionWriter<'f, W>,
    length: u64,
    position: u64,
}

impl<W> ImageData<'_, '_, W> {
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl<W: Write + Seek> Write for ImageData<'_, '_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.length.saturating_sub(self.position);
        let n = buf.len().min(remaining.try_into().unwrap_or(usize::MAX));
        if n == 0 {
            return Ok(0);
        }
        self.section
            .seek(SeekFrom::Start(IMAGE_ID_SIZE + self.position))?;
        let n = self.section.write(&buf[..n])?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.section.flush()
    }
}

impl<W: Write + Seek> Seek for ImageData<'_, '_, W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = resolve_seek(self.position, self.length, pos)?;
        Ok(self.position)
    }
}

impl<'f, R: Read + Seek> SectionReader<'f, R> {
    /// Reads the image ID stamp of an image section and returns a reader over its pixel data.
    ///
    /// The caller supplies the dimensions and semantic from the manifest.  Fails if this isn't an
    /// image section, or if the section is too small to hold the stamp and the pixel data.
    pub fn image_data(
        &mut self,
        width: u64,
        height: u64,
        semantic: PixelSemantic,
    ) -> Result<ImageDataReader<'_, 'f, R>> {
        if self.kind() != SectionKind::Image {
            return Err(Error::Argument(format!(
                "Section {:#018x} is not an image section",
                self.description().identifier
            )));
        }

        let length = image_data_size(width, height, semantic)?;
        let needed = length
            .checked_add(IMAGE_ID_SIZE)
            .ok_or_else(|| overflow(width, height, semantic))?;
        if self.len() < needed {
            return Err(FormatError::ImageTooSmall {
                size: self.len(),
                needed,
            }
            .into());
        }

        self.seek(SeekFrom::Start(0))?;
        let mut stamp = U32::new(0);
        self.read_exact(stamp.as_mut_bytes())?;
        let image_id = ImageId::new(stamp.get().into())
            .map_err(|_| FormatError::InvalidImageId { value: stamp.get() })?;

        Ok(ImageDataReader {
            image_id,
            data: self.by_ref().take(length),
        })
    }
}

/// The pixel data of an image section, as read back from a file.
#[derive(Debug)]
pub struct ImageDataReader<'s, 'f, R> {
    image_id: ImageId,
    data: io::Take<&'s mut SectionReader<'f, R>>,
}

impl<R> ImageDataReader<'_, '_, R> {
    pub fn image_id(&self) -> ImageId {
        self.image_id
    }

    /// The number of octets of pixel data not yet read.
    pub fn remaining(&self) -> u64 {
        self.data.limit()
    }
}

impl<R: Read + Seek> Read for ImageDataReader<'_, '_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}
