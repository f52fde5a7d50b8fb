//! The manifest data model.
//!
//! A manifest describes the images stored in a file (all of which share one raster size), the
//! objects that those images refer to, and a table of free-form metadata.  All values are
//! validated at construction time and are immutable afterwards.  Every table is a `BTreeMap` so
//! that iteration (and therefore serialization) order is deterministic.

use std::{collections::BTreeMap, fmt, str::FromStr};

use thiserror::Error;

use crate::{error::RangeError, semantic::PixelSemantic};

const ID_MAX: u64 = 0xffff_ffff;

fn check_range(field: &'static str, value: u64) -> Result<u32, RangeError> {
    match value {
        1..=ID_MAX => Ok(value as u32),
        _ => Err(RangeError::OutOfRange { field, value }),
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Fails unless `value` is in the range `[1, 2^32 - 1]`.
            pub fn new(value: u64) -> Result<Self, RangeError> {
                check_range($field, value).map(Self)
            }

            pub fn get(self) -> u64 {
                self.0 as u64
            }
        }

        impl TryFrom<u64> for $name {
            type Error = RangeError;

            fn try_from(value: u64) -> Result<Self, RangeError> {
                Self::new(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

numeric_id!(
    /// The identifier of an image within a manifest.
    ImageId,
    "Image ID"
);

numeric_id!(
    /// The identifier of an object within a manifest.
    ObjectId,
    "Object ID"
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Image {
    pub image_id: ImageId,
    pub semantic: PixelSemantic,
}

impl Image {
    pub fn new(image_id: ImageId, semantic: PixelSemantic) -> Self {
        Image { image_id, semantic }
    }
}

/// The set of images in a file, along with their shared dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Images {
    images: BTreeMap<ImageId, Image>,
    width: u64,
    height: u64,
}

impl Images {
    pub fn new(
        images: BTreeMap<ImageId, Image>,
        width: u64,
        height: u64,
    ) -> Result<Self, RangeError> {
        check_range("Width", width)?;
        check_range("Height", height)?;

        for (key, image) in &images {
            if *key != image.image_id {
                return Err(RangeError::KeyMismatch {
                    table: "Image",
                    key: key.get(),
                    id: image.image_id.get(),
                });
            }
        }

        Ok(Images {
            images,
            width,
            height,
        })
    }

    pub fn images(&self) -> &BTreeMap<ImageId, Image> {
        &self.images
    }

    pub fn get(&self, image_id: ImageId) -> Option<&Image> {
        self.images.get(&image_id)
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn height(&self) -> u64 {
        self.height
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Object {
    pub object_id: ObjectId,
    pub description: String,
}

impl Object {
    pub fn new(object_id: ObjectId, description: impl Into<String>) -> Self {
        Object {
            object_id,
            description: description.into(),
        }
    }
}

const NAME_MAX: usize = 255;
const SEGMENT_MAX: usize = 63;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Dotted name {name:?} is {length} octets long (the maximum is {NAME_MAX})")]
    TooLong { name: String, length: usize },
    #[error("Dotted name {name:?} has an invalid segment {segment:?}")]
    InvalidSegment { name: String, segment: String },
}

/// A metadata key: a non-empty sequence of dot-separated segments.
///
/// Each segment starts with a lowercase ASCII letter, continues with lowercase ASCII letters,
/// digits, `_` or `-`, and is at most 63 octets long.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DottedName(String);

impl DottedName {
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();

        if name.len() > NAME_MAX {
            return Err(NameError::TooLong {
                length: name.len(),
                name,
            });
        }

        let invalid = name.split('.').find(|s| !valid_segment(s)).map(str::to_string);
        if let Some(segment) = invalid {
            return Err(NameError::InvalidSegment { name, segment });
        }

        Ok(DottedName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn valid_segment(segment: &str) -> bool {
    let mut bytes = segment.bytes();
    segment.len() <= SEGMENT_MAX
        && bytes.next().is_some_and(|c| c.is_ascii_lowercase())
        && bytes.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == b'_' || c == b'-')
}

impl FromStr for DottedName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, NameError> {
        Self::new(s)
    }
}

impl fmt::Display for DottedName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-form metadata, ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<DottedName, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the previous value for `name`, if any.
    pub fn insert(&mut self, name: DottedName, value: impl Into<String>) -> Option<String> {
        self.0.insert(name, value.into())
    }

    pub fn get(&self, name: &DottedName) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DottedName, &str)> {
        self.0.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(DottedName, String)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (DottedName, String)>>(iter: T) -> Self {
        Metadata(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    images: Images,
    objects: BTreeMap<ObjectId, Object>,
    metadata: Metadata,
}

impl Manifest {
    pub fn new(
        images: Images,
        objects: BTreeMap<ObjectId, Object>,
        metadata: Metadata,
    ) -> Result<Self, RangeError> {
        for (key, object) in &objects {
            if *key != object.object_id {
                return Err(RangeError::KeyMismatch {
                    table: "Object",
                    key: key.get(),
                    id: object.object_id.get(),
                });
            }
        }

        Ok(Manifest {
            images,
            objects,
            metadata,
        })
    }

    pub fn images(&self) -> &Images {
        &self.images
    }

    pub fn objects(&self) -> &BTreeMap<ObjectId, Object> {
        &self.objects
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
