//! Pixel semantics and image data sizing.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// The meaning and encoding of the pixels of an image.
///
/// Each semantic has a fixed pixel size.  Channel order and endianness within a pixel are a
/// matter between the producer and the consumer of the file: the container only frames the data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PixelSemantic {
    /// Source for denoising: RGB, 16 bit unsigned normalized channels.
    DenoiseRgb16,
    /// Source for denoising: RGB, 8 bit unsigned normalized channels.
    DenoiseRgb8,
    /// Source for denoising: RGBA, 16 bit unsigned normalized channels.
    DenoiseRgba16,
    /// Source for denoising: RGBA, 8 bit unsigned normalized channels.
    DenoiseRgba8,
    /// Depth map, 16 bit unsigned normalized.
    Depth16,
    /// Depth map, 32 bit unsigned normalized.
    Depth32,
    /// Monochrome line image, 8 bit unsigned normalized.
    MonochromeLines8,
    /// Object ID map, 32 bits per pixel.
    ObjectId32,
}

impl PixelSemantic {
    pub const ALL: [PixelSemantic; 8] = [
        Self::DenoiseRgb16,
        Self::DenoiseRgb8,
        Self::DenoiseRgba16,
        Self::DenoiseRgba8,
        Self::Depth16,
        Self::Depth32,
        Self::MonochromeLines8,
        Self::ObjectId32,
    ];

    /// The size of a single pixel in octets.
    pub const fn octets_per_pixel(self) -> u64 {
        match self {
            Self::DenoiseRgb16 => 3 * 2,
            Self::DenoiseRgb8 => 3,
            Self::DenoiseRgba16 => 4 * 2,
            Self::DenoiseRgba8 => 4,
            Self::Depth16 => 2,
            Self::Depth32 => 4,
            Self::MonochromeLines8 => 1,
            Self::ObjectId32 => 4,
        }
    }

    /// The name used for this semantic in manifests.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DenoiseRgb16 => "DENOISE_RGB16",
            Self::DenoiseRgb8 => "DENOISE_RGB8",
            Self::DenoiseRgba16 => "DENOISE_RGBA16",
            Self::DenoiseRgba8 => "DENOISE_RGBA8",
            Self::Depth16 => "DEPTH_16",
            Self::Depth32 => "DEPTH_32",
            Self::MonochromeLines8 => "MONOCHROME_LINES_8",
            Self::ObjectId32 => "OBJECT_ID_32",
        }
    }
}

impl fmt::Display for PixelSemantic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown pixel semantic {0:?}")]
pub struct UnknownSemantic(pub String);

impl FromStr for PixelSemantic {
    type Err = UnknownSemantic;

    fn from_str(s: &str) -> std::result::Result<Self, UnknownSemantic> {
        Self::ALL
            .into_iter()
            .find(|semantic| semantic.as_str() == s)
            .ok_or_else(|| UnknownSemantic(s.to_string()))
    }
}

/// Computes the number of octets of pixel data in a `width` by `height` image.
///
/// Fails with [`Error::Overflow`] if the size doesn't fit in a `u64`.
pub fn image_data_size(width: u64, height: u64, semantic: PixelSemantic) -> Result<u64> {
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(semantic.octets_per_pixel()))
        .ok_or(Error::Overflow {
            width,
            height,
            semantic,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octets_per_pixel() {
        let sizes: Vec<u64> = PixelSemantic::ALL
            .iter()
            .map(|s| s.octets_per_pixel())
            .collect();
        assert_eq!(sizes, [6, 3, 8, 4, 2, 4, 1, 4]);
        assert_eq!(PixelSemantic::DenoiseRgba16.octets_per_pixel(), 8);
    }

    #[test]
    fn test_names() {
        for semantic in PixelSemantic::ALL {
            assert_eq!(semantic.to_string().parse::<PixelSemantic>(), Ok(semantic));
        }
        assert_eq!(
            "DEPTH_64".parse::<PixelSemantic>(),
            Err(UnknownSemantic("DEPTH_64".into()))
        );
        assert!("depth_16".parse::<PixelSemantic>().is_err());
    }

    #[test]
    fn test_image_data_size() {
        assert_eq!(
            image_data_size(32, 16, PixelSemantic::MonochromeLines8).unwrap(),
            512
        );
        assert_eq!(
            image_data_size(32, 16, PixelSemantic::DenoiseRgb16).unwrap(),
            3072
        );
        assert_eq!(image_data_size(0, 16, PixelSemantic::Depth32).unwrap(), 0);

        // the pixel count fits, but the octet count does not
        let err = image_data_size(1 << 32, 1 << 30, PixelSemantic::DenoiseRgba8).unwrap_err();
        assert!(matches!(
            err,
            Error::Overflow {
                width: 0x1_0000_0000,
                height: 0x4000_0000,
                semantic: PixelSemantic::DenoiseRgba8
            }
        ));
        assert!(image_data_size(u64::MAX, 2, PixelSemantic::MonochromeLines8).is_err());
    }
}
