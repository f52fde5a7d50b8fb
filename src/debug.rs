//! Human-readable dumps of IronSegment files.

use std::io::{Read, Seek, Write};

use anyhow::Result;

use crate::{
    format::IMAGE_ID_SIZE, identifiers::SectionKind, manifest::Manifest, reader::FileReader,
};

fn utf8_or_hex(data: &[u8]) -> String {
    if let Ok(string) = std::str::from_utf8(data) {
        format!("{:?}", string)
    } else {
        hex::encode(data)
    }
}

fn dump_manifest(output: &mut impl Write, manifest: &Manifest) -> Result<()> {
    let images = manifest.images();
    writeln!(output, "    images {}x{}", images.width(), images.height())?;
    for image in images.images().values() {
        writeln!(output, "      image {}: {}", image.image_id, image.semantic)?;
    }
    for object in manifest.objects().values() {
        writeln!(
            output,
            "    object {}: {:?}",
            object.object_id, object.description
        )?;
    }
    for (name, value) in manifest.metadata().iter() {
        writeln!(output, "    meta {name}: {value:?}")?;
    }
    Ok(())
}

/// Writes a listing of the sections in `file` to `output`.
///
/// Manifest sections are decoded and summarised, and image sections show their image ID stamp.
/// Problems with the content of a section are reported inline rather than stopping the dump.
pub fn debug_file<R: Read + Seek>(output: &mut impl Write, file: &mut FileReader<R>) -> Result<()> {
    writeln!(output, "IronSegment file, version {}", file.version())?;

    for section in file.sections().to_vec() {
        let identifier = section.identifier();
        writeln!(
            output,
            "{:#010x}: {} {} ({identifier:#018x}), size {}",
            section.file_offset,
            section.description.name().unwrap_or("unknown"),
            utf8_or_hex(&identifier.to_be_bytes()),
            section.size()
        )?;

        let mut reader = file.open_section(&section)?;
        match section.kind() {
            SectionKind::Manifest => match reader.manifest() {
                Ok(manifest) => dump_manifest(output, &manifest)?,
                Err(err) => writeln!(output, "    invalid manifest: {err}")?,
            },
            SectionKind::Image if reader.len() >= IMAGE_ID_SIZE => {
                let mut stamp = [0; 4];
                reader.read_exact(&mut stamp)?;
                writeln!(output, "    image id {}", u32::from_be_bytes(stamp))?;
            }
            SectionKind::Image => writeln!(output, "    too small for an image id")?,
            SectionKind::End | SectionKind::Other(_) => {}
        }
    }

    writeln!(output, "trailing octets: {}", file.trailing_octets())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        format::Version,
        manifest::ImageId,
        semantic::PixelSemantic,
        test::{minimal_manifest, sample_manifest},
        writer::{FileWriter, WritableSection},
    };

    #[test]
    fn test_utf8_or_hex() {
        assert_eq!(utf8_or_hex(b"IrS_END!"), "\"IrS_END!\"");
        assert_eq!(utf8_or_hex(&[0xff, 0x00]), "ff00");
    }

    #[test]
    fn test_debug_minimal() {
        let mut writer = FileWriter::create(Cursor::new(vec![]), Version::default()).unwrap();
        let mut section = writer.create_section_manifest().unwrap();
        section.set_manifest(&minimal_manifest()).unwrap();
        section.close().unwrap();
        let WritableSection::Other(mut custom) = writer.create_section(0xff00_0000_0000_0001).unwrap()
        else {
            panic!("expected a plain section");
        };
        custom.write_all(b"x").unwrap();
        custom.close().unwrap();
        writer.create_section_end().unwrap().close().unwrap();
        let mut data = writer.finish().unwrap().into_inner();
        data.extend_from_slice(b"junk");

        let mut file = FileReader::open(Cursor::new(data)).unwrap();
        let mut output = vec![];
        debug_file(&mut output, &mut file).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "IronSegment file, version 1.0\n\
             0x00000010: MANIFEST \"IrS_MNIF\" (0x4972535f4d4e4946), size 48\n    \
             images 1x1\n\
             0x00000050: unknown ff00000000000001 (0xff00000000000001), size 16\n\
             0x00000070: END \"IrS_END!\" (0x4972535f454e4421), size 0\n\
             trailing octets: 4\n"
        );
    }

    #[test]
    fn test_debug_images() {
        let manifest = sample_manifest();
        let images = manifest.images();
        let one = ImageId::new(1).unwrap();

        let mut writer = FileWriter::create(Cursor::new(vec![]), Version::default()).unwrap();
        let mut section = writer.create_section_manifest().unwrap();
        section.set_manifest(&manifest).unwrap();
        section.close().unwrap();
        let mut section = writer.create_section_image().unwrap();
        section
            .create_image_data(one, images.width(), images.height(), images.images()[&one].semantic)
            .unwrap();
        section.close().unwrap();
        writer.create_section_image().unwrap().close().unwrap();
        writer.create_section_end().unwrap().close().unwrap();

        let mut file = FileReader::open(writer.finish().unwrap()).unwrap();
        let mut output = vec![];
        debug_file(&mut output, &mut file).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains(&format!(
            "      image 1: {}\n",
            PixelSemantic::DenoiseRgb16
        )));
        assert!(output.contains("    image id 1\n"));
        assert!(output.contains("    too small for an image id\n"));
        assert!(output.ends_with("trailing octets: 0\n"));
    }
}
