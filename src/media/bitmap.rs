// SPDX-License-Identifier: MPL-2.0

//! Bitmap codec adapters
//!
//! Thin wrappers over the `image` crate used by the aging pipeline and the
//! photo store: JPEG encode/decode, rotation by quarter turns, and
//! aspect-preserving downscale.

use crate::errors::{AgeError, AgeResult};
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use tracing::debug;

/// Decode encoded image bytes (any format the `image` crate knows) into RGB
pub fn decode(bytes: &[u8]) -> AgeResult<RgbImage> {
    if bytes.is_empty() {
        return Err(AgeError::DecodeFailure("empty image data".to_string()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| AgeError::DecodeFailure(e.to_string()))?;

    debug!(width = image.width(), height = image.height(), "Decoded image");
    Ok(image.to_rgb8())
}

/// Encode an RGB image as JPEG
///
/// `quality` is on the usual 0-100 scale; the encoder's scale starts at 1,
/// so 0 is treated as 1.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> AgeResult<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| AgeError::EncodeFailure(format!("JPEG encoding failed: {}", e)))?;

    debug!(size = buffer.len(), quality, "Encoded JPEG");
    Ok(buffer)
}

/// Guess the container format of encoded bytes
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Rotate clockwise by a multiple of 90 degrees
///
/// Zero returns the input untouched. Negative angles and full turns are
/// normalized first.
pub fn rotate(image: RgbImage, degrees: i32) -> AgeResult<RgbImage> {
    if degrees % 90 != 0 {
        return Err(AgeError::invalid_argument(format!(
            "Rotation must be a multiple of 90 degrees, got {}",
            degrees
        )));
    }

    Ok(match degrees.rem_euclid(360) {
        0 => image,
        90 => imageops::rotate90(&image),
        180 => imageops::rotate180(&image),
        _ => imageops::rotate270(&image),
    })
}

/// Portrait means strictly taller than wide
pub fn is_portrait(image: &RgbImage) -> bool {
    image.height() > image.width()
}

/// Compute the largest size with the source's aspect ratio that fits in `target`
pub fn fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let (tw, th) = (target.0.max(1) as f64, target.1.max(1) as f64);
    let ratio = (tw / sw).min(th / sh);

    let width = (sw * ratio).round().clamp(1.0, tw) as u32;
    let height = (sh * ratio).round().clamp(1.0, th) as u32;
    (width, height)
}

/// Scale an image to fit inside `target` without stretching
///
/// Images already matching the fitted size are returned as is.
pub fn scale_to_fit(image: RgbImage, target: (u32, u32)) -> RgbImage {
    let (width, height) = fit_dimensions(image.dimensions(), target);
    if (width, height) == image.dimensions() {
        return image;
    }
    imageops::resize(&image, width, height, FilterType::Triangle)
}
