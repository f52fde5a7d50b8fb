//! Manifest documents.
//!
//! The manifest section stores a [`Manifest`] as an opaque, length-prefixed document.  The
//! encoding of that document is pluggable through [`ManifestCodec`]; [`TextManifestCodec`] is the
//! encoding used by default.  It is line oriented:
//!
//! ```text
//! ironsegment-manifest 1
//! images 32 16
//! image 1 DEPTH_16
//! object 3 A\x20small\x20lamp.
//! meta com.io7m.license -
//! ```
//!
//! Each line is a record of space-separated fields.  In free text fields, octets outside of `!` to
//! `~` (and `\` itself) are written as `\xNN`, and the empty string is written as `-`.

use std::{collections::BTreeMap, fmt, fmt::Write as _};

use thiserror::Error;

use crate::{
    error::RangeError,
    manifest::{DottedName, Image, ImageId, Images, Manifest, Metadata, NameError, Object, ObjectId},
    semantic::UnknownSemantic,
};

const HEADER: &str = "ironsegment-manifest 1";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Manifest document is not valid UTF-8")]
    Utf8,
    #[error("Manifest document is empty")]
    Empty,
    #[error("Failed to format manifest document")]
    Write,
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("line {line}: {source}")]
    Range { line: usize, source: RangeError },
    #[error("line {line}: {source}")]
    Name { line: usize, source: NameError },
    #[error("line {line}: {source}")]
    Semantic { line: usize, source: UnknownSemantic },
}

/// Converts between a [`Manifest`] and the octets stored in a manifest section.
///
/// `decode(encode(m))` must give back `m`.
pub trait ManifestCodec {
    fn encode(&self, manifest: &Manifest) -> Result<Vec<u8>, DocumentError>;
    fn decode(&self, data: &[u8]) -> Result<Manifest, DocumentError>;
}

/// The line-oriented text encoding described in the module documentation.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextManifestCodec;

impl ManifestCodec for TextManifestCodec {
    fn encode(&self, manifest: &Manifest) -> Result<Vec<u8>, DocumentError> {
        let mut document = String::new();
        write_manifest(&mut document, manifest).map_err(|_| DocumentError::Write)?;
        Ok(document.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Manifest, DocumentError> {
        let text = std::str::from_utf8(data).map_err(|_| DocumentError::Utf8)?;
        parse_manifest(text)
    }
}

fn write_escaped(writer: &mut impl fmt::Write, text: &str) -> fmt::Result {
    if text.is_empty() {
        return writer.write_str("-");
    }
    if text == "-" {
        return writer.write_str("\\x2d");
    }

    for c in text.bytes() {
        if c < b'!' || c == b'\\' || c > b'~' {
            write!(writer, "\\x{c:02x}")?;
        } else {
            writer.write_char(c as char)?;
        }
    }

    Ok(())
}

/// Writes `manifest` in the text encoding.
pub fn write_manifest(writer: &mut impl fmt::Write, manifest: &Manifest) -> fmt::Result {
    let images = manifest.images();

    writeln!(writer, "{HEADER}")?;
    writeln!(writer, "images {} {}", images.width(), images.height())?;
    for image in images.images().values() {
        writeln!(writer, "image {} {}", image.image_id, image.semantic)?;
    }
    for object in manifest.objects().values() {
        write!(writer, "object {} ", object.object_id)?;
        write_escaped(writer, &object.description)?;
        writeln!(writer)?;
    }
    for (name, value) in manifest.metadata().iter() {
        write!(writer, "meta {name} ")?;
        write_escaped(writer, value)?;
        writeln!(writer)?;
    }

    Ok(())
}

fn syntax(line: usize, reason: impl Into<String>) -> DocumentError {
    DocumentError::Syntax {
        line,
        reason: reason.into(),
    }
}

fn parse_number(line: usize, field: &str) -> Result<u64, DocumentError> {
    if field.is_empty() || !field.bytes().all(|c| c.is_ascii_digit()) {
        return Err(syntax(line, format!("expected a number, found {field:?}")));
    }
    field
        .parse()
        .map_err(|_| syntax(line, format!("number {field} is too large")))
}

fn unescape(line: usize, field: &str) -> Result<String, DocumentError> {
    if field == "-" {
        return Ok(String::new());
    }

    let mut bytes = field.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    while let Some((&c, rest)) = bytes.split_first() {
        if c != b'\\' {
            result.push(c);
            bytes = rest;
            continue;
        }
        let (digits, rest) = match rest {
            [b'x', hi, lo, rest @ ..] => ([*hi, *lo], rest),
            [b'x', ..] => return Err(syntax(line, "truncated escape sequence")),
            _ => return Err(syntax(line, "unsupported escape sequence")),
        };
        let mut value = [0u8];
        hex::decode_to_slice(digits, &mut value)
            .map_err(|_| syntax(line, "invalid escape sequence"))?;
        result.push(value[0]);
        bytes = rest;
    }

    String::from_utf8(result).map_err(|_| syntax(line, "escaped text is not valid UTF-8"))
}

fn parse_manifest(text: &str) -> Result<Manifest, DocumentError> {
    let mut lines = text.lines().zip(1..);

    match lines.next() {
        Some((HEADER, _)) => {}
        Some((other, line)) => {
            return Err(syntax(line, format!("expected {HEADER:?}, found {other:?}")))
        }
        None => return Err(DocumentError::Empty),
    }

    let mut dimensions = None;
    let mut images = BTreeMap::new();
    let mut objects = BTreeMap::new();
    let mut metadata = Metadata::new();

    for (content, line) in lines {
        let fields: Vec<&str> = content.split(' ').collect();
        match fields.as_slice() {
            ["images", width, height] => {
                if dimensions.is_some() {
                    return Err(syntax(line, "duplicate images record"));
                }
                dimensions = Some((line, parse_number(line, width)?, parse_number(line, height)?));
            }
            ["image", id, semantic] => {
                let image_id = ImageId::new(parse_number(line, id)?)
                    .map_err(|source| DocumentError::Range { line, source })?;
                let semantic = semantic
                    .parse()
                    .map_err(|source| DocumentError::Semantic { line, source })?;
                if images
                    .insert(image_id, Image::new(image_id, semantic))
                    .is_some()
                {
                    return Err(syntax(line, format!("duplicate image {image_id}")));
                }
            }
            ["object", id, description] => {
                let object_id = ObjectId::new(parse_number(line, id)?)
                    .map_err(|source| DocumentError::Range { line, source })?;
                let object = Object::new(object_id, unescape(line, description)?);
                if objects.insert(object_id, object).is_some() {
                    return Err(syntax(line, format!("duplicate object {object_id}")));
                }
            }
            ["meta", name, value] => {
                let name = DottedName::new(*name)
                    .map_err(|source| DocumentError::Name { line, source })?;
                if metadata.insert(name, unescape(line, value)?).is_some() {
                    return Err(syntax(line, "duplicate metadata name"));
                }
            }
            _ => return Err(syntax(line, format!("unrecognized record {content:?}"))),
        }
    }

    let Some((line, width, height)) = dimensions else {
        return Err(syntax(text.lines().count(), "missing images record"));
    };
    let images = Images::new(images, width, height)
        .map_err(|source| DocumentError::Range { line, source })?;
    Manifest::new(images, objects, metadata).map_err(|source| DocumentError::Range { line, source })
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::{semantic::PixelSemantic, test::sample_manifest};

    fn decode(text: &str) -> Result<Manifest, DocumentError> {
        TextManifestCodec.decode(text.as_bytes())
    }

    fn escaped(text: &str) -> String {
        let mut out = String::new();
        write_escaped(&mut out, text).unwrap();
        out
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escaped(""), "-");
        assert_eq!(escaped("-"), "\\x2d");
        assert_eq!(escaped("--"), "--");
        assert_eq!(escaped("a b\\c\n"), "a\\x20b\\x5cc\\x0a");
        assert_eq!(escaped("©"), "\\xc2\\xa9");

        for text in ["", "-", "--", "a b\\c\n", "©", "x\\x41"] {
            assert_eq!(unescape(1, &escaped(text)).unwrap(), text);
        }
    }

    #[test]
    fn test_unescape_errors() {
        assert!(matches!(
            unescape(4, "a\\n"),
            Err(DocumentError::Syntax { line: 4, .. })
        ));
        assert!(unescape(1, "a\\x4").is_err());
        assert!(unescape(1, "a\\xzz").is_err());
        assert!(unescape(1, "\\xff").is_err());
    }

    #[test]
    fn test_encode() {
        let one = ImageId::new(1).unwrap();
        let images = Images::new(
            BTreeMap::from([(one, Image::new(one, PixelSemantic::Depth16))]),
            32,
            16,
        )
        .unwrap();
        let three = ObjectId::new(3).unwrap();
        let objects = BTreeMap::from([(three, Object::new(three, "A small lamp."))]);
        let metadata = Metadata::from_iter([("com.io7m.license".parse().unwrap(), String::new())]);
        let manifest = Manifest::new(images, objects, metadata).unwrap();

        let document = TextManifestCodec.encode(&manifest).unwrap();
        assert_eq!(
            String::from_utf8(document).unwrap(),
            "ironsegment-manifest 1\n\
             images 32 16\n\
             image 1 DEPTH_16\n\
             object 3 A\\x20small\\x20lamp.\n\
             meta com.io7m.license -\n"
        );
    }

    #[test]
    fn test_round_trip() {
        let manifest = sample_manifest();
        let document = TextManifestCodec.encode(&manifest).unwrap();
        assert_eq!(TextManifestCodec.decode(&document).unwrap(), manifest);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode(""), Err(DocumentError::Empty));
        assert_eq!(
            TextManifestCodec.decode(b"\xff\xfe"),
            Err(DocumentError::Utf8)
        );
        assert!(matches!(
            decode("ironsegment-manifest 2\n"),
            Err(DocumentError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\n"),
            Err(DocumentError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 0 1\n"),
            Err(DocumentError::Range { line: 2, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 1 1\nimages 1 1\n"),
            Err(DocumentError::Syntax { line: 3, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 1 1\nimage 0 DEPTH_16\n"),
            Err(DocumentError::Range { line: 3, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 1 1\nimage 2 DEPTH_16\nimage 2 DEPTH_32\n"),
            Err(DocumentError::Syntax { line: 4, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 1 1\nimage 2 DEPTH_64\n"),
            Err(DocumentError::Semantic { line: 3, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 1 1\nmeta Bad.Name x\n"),
            Err(DocumentError::Name { line: 3, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages +1 1\n"),
            Err(DocumentError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            decode("ironsegment-manifest 1\nimages 1 1\nobject 1 two words\n"),
            Err(DocumentError::Syntax { line: 3, .. })
        ));
    }
}
