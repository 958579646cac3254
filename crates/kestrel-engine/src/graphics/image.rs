//! Image decoding collaborator used by [`super::Texture::init_from_file`].

use std::path::Path;

use crate::error::{Error, Result};

use super::PixelFormat;

/// Decoded pixels plus the layout they ended up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Actual format of `pixels`; may differ from the requested one.
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

/// Turns an image file into tightly packed pixels.
pub trait ImageDecoder {
    fn decode(&self, path: &Path, desired: PixelFormat) -> Result<ImageData>;
}

/// Decoder backed by the `image` crate (PNG, JPEG, BMP, GIF, ICO, TIFF, WebP).
///
/// Single-channel and two-channel requests are honoured; every other request
/// decodes to 8-bit RGBA, sRGB-tagged only when sRGB was asked for.
#[derive(Debug, Copy, Clone, Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    /// Decodes an in-memory encoded image.
    pub fn decode_bytes(&self, bytes: &[u8], desired: PixelFormat) -> std::result::Result<ImageData, image::ImageError> {
        image::load_from_memory(bytes).map(|img| convert(img, desired))
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, path: &Path, desired: PixelFormat) -> Result<ImageData> {
        let img = image::open(path).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let data = convert(img, desired);
        log::debug!(
            "decoded {} ({}x{}, {:?})",
            path.display(),
            data.width,
            data.height,
            data.format
        );
        Ok(data)
    }
}

fn convert(img: image::DynamicImage, desired: PixelFormat) -> ImageData {
    let (width, height) = (img.width(), img.height());
    let (format, pixels) = match desired {
        PixelFormat::R8Unorm => (PixelFormat::R8Unorm, img.into_luma8().into_raw()),
        PixelFormat::Rg8Unorm => (PixelFormat::Rg8Unorm, img.into_luma_alpha8().into_raw()),
        PixelFormat::Rgba8UnormSrgb => (PixelFormat::Rgba8UnormSrgb, img.into_rgba8().into_raw()),
        _ => (PixelFormat::Rgba8Unorm, img.into_rgba8().into_raw()),
    };

    ImageData { width, height, format, pixels }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn rgba_request_decodes_four_channels() {
        let data = ImageCrateDecoder.decode_bytes(&png_bytes(3, 2), PixelFormat::Rgba8Unorm).unwrap();
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.format, PixelFormat::Rgba8Unorm);
        assert_eq!(&data.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn unsupported_request_falls_back_to_rgba() {
        let data = ImageCrateDecoder.decode_bytes(&png_bytes(1, 1), PixelFormat::Rgba32Float).unwrap();
        assert_eq!(data.format, PixelFormat::Rgba8Unorm);
        assert_eq!(data.pixels.len(), 4);
    }

    #[test]
    fn luma_request_yields_one_byte_per_pixel() {
        let data = ImageCrateDecoder.decode_bytes(&png_bytes(2, 2), PixelFormat::R8Unorm).unwrap();
        assert_eq!(data.pixels.len(), 4);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = ImageCrateDecoder
            .decode(Path::new("/definitely/not/here.png"), PixelFormat::Rgba8Unorm)
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(!err.is_validation());
    }
}
