//! IronSegment: a segmented binary container for images.
//!
//! A file is a short header followed by a chain of 16-octet aligned sections.  The well-known
//! sections are the manifest (a document describing the images in the file), image sections
//! (one image each) and the end section, but any 64-bit identifier can be used.
//!
//! Files are written with a [`writer::FileWriter`] and read back with a [`reader::FileReader`].
//! Both work over any seekable byte stream.

pub mod debug;
pub mod document;
pub mod error;
pub mod format;
pub mod identifiers;
pub mod image;
pub mod manifest;
pub mod reader;
pub mod semantic;
pub mod writer;

mod channel;


pub use error::{Error, Result};
