//! JPEG re-encoding for attached photos.

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, DynamicImage, GenericImageView};

use crate::{Error, Result};

/// Longest edge, in pixels, of a compressed photo.
pub const MAX_EDGE: u32 = 2048;

/// Default JPEG quality used by the editor.
pub const DEFAULT_QUALITY: u8 = 80;

/// Compressed photo payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `source_bytes`, bound the longest edge to [`MAX_EDGE`] and
/// re-encode as JPEG at `quality` (clamped to 1-100).
///
/// Images already within bounds are not upscaled.
pub fn compress_jpeg(source_bytes: &[u8], quality: u8) -> Result<CompressedImage> {
    if source_bytes.is_empty() {
        return Err(Error::Compression("source image is empty".to_string()));
    }

    let source = image::load_from_memory(source_bytes)
        .map_err(|error| Error::Compression(format!("failed to decode source image: {error}")))?;

    let (source_width, source_height) = source.dimensions();
    let resized = if source_width <= MAX_EDGE && source_height <= MAX_EDGE {
        source
    } else {
        source.thumbnail(MAX_EDGE, MAX_EDGE)
    };
    let (width, height) = resized.dimensions();

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());
    let mut cursor = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|error| Error::Compression(format!("failed to encode JPEG: {error}")))?;

    Ok(CompressedImage {
        bytes: cursor.into_inner(),
        width,
        height,
    })
}
