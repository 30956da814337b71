// SPDX-License-Identifier: MPL-2.0

//! Integer NV21 (YUV 4:2:0) conversion
//!
//! Layout: a full-resolution luma plane followed by `ceil(height / 2)`
//! chroma rows. Each chroma row holds interleaved V/U pairs, one pair per
//! two luma columns, and is `width` rounded up to even bytes long.
//!
//! Decoding produces packed `0xAARRGGBB` words using 10-bit fixed point
//! BT.601 coefficients. Encoding goes the other way and can scale luma and
//! chroma independently, which is how the aging pipeline desaturates.

use crate::errors::{AgeError, AgeResult};
use image::RgbImage;

/// Upper clamp for the 18-bit intermediate channel values
const CHANNEL_MAX: i32 = 262_143;

/// Plane sizes for an NV21 buffer of a given resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nv21Layout {
    pub width: usize,
    pub height: usize,
    /// Bytes per chroma row
    pub chroma_stride: usize,
    /// Number of chroma rows
    pub chroma_rows: usize,
}

impl Nv21Layout {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width as usize;
        let height = height as usize;
        Self {
            width,
            height,
            chroma_stride: (width + 1) & !1,
            chroma_rows: height.div_ceil(2),
        }
    }

    pub fn luma_len(&self) -> usize {
        self.width * self.height
    }

    /// Total buffer length in bytes
    pub fn len(&self) -> usize {
        self.luma_len() + self.chroma_stride * self.chroma_rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode an NV21 buffer into packed ARGB words
///
/// `out` is cleared and resized to `width * height`; passing the same vector
/// across calls reuses its allocation.
pub fn decode_nv21(data: &[u8], width: u32, height: u32, out: &mut Vec<u32>) -> AgeResult<()> {
    let layout = Nv21Layout::new(width, height);
    if data.len() < layout.len() {
        return Err(AgeError::invalid_argument(format!(
            "NV21 buffer too small for {}x{}: expected {}, got {}",
            width,
            height,
            layout.len(),
            data.len()
        )));
    }

    let w = layout.width;
    out.clear();
    out.resize(layout.luma_len(), 0);

    let (luma, chroma) = data.split_at(layout.luma_len());

    for row in 0..layout.height {
        // One chroma row serves two luma rows
        let chroma_start = (row >> 1) * layout.chroma_stride;
        let chroma_row = &chroma[chroma_start..chroma_start + layout.chroma_stride];
        let luma_row = &luma[row * w..(row + 1) * w];
        let out_row = &mut out[row * w..(row + 1) * w];

        let mut u = 0;
        let mut v = 0;
        for col in 0..w {
            if col & 1 == 0 {
                v = chroma_row[col] as i32 - 128;
                u = chroma_row[col + 1] as i32 - 128;
            }
            let y = (luma_row[col] as i32 - 16).max(0);
            out_row[col] = pack_argb(y, u, v);
        }
    }

    Ok(())
}

#[inline]
fn pack_argb(y: i32, u: i32, v: i32) -> u32 {
    let y = 1192 * y;
    let r = (y + 1634 * v).clamp(0, CHANNEL_MAX);
    let g = (y - 833 * v - 400 * u).clamp(0, CHANNEL_MAX);
    let b = (y + 2066 * u).clamp(0, CHANNEL_MAX);

    0xFF00_0000
        | (((r << 6) as u32) & 0x00FF_0000)
        | (((g >> 2) as u32) & 0x0000_FF00)
        | (((b >> 10) as u32) & 0x0000_00FF)
}

/// Encode an RGB image as NV21
///
/// Luma is scaled about black (16) and chroma about neutral (128), so a
/// `chroma_scale` below 1.0 desaturates without touching brightness.
/// Chroma is averaged over each 2x2 block.
pub fn encode_nv21(image: &RgbImage, luma_scale: f32, chroma_scale: f32) -> Vec<u8> {
    let layout = Nv21Layout::new(image.width(), image.height());
    let mut data = vec![0u8; layout.len()];
    let (luma, chroma) = data.split_at_mut(layout.luma_len());

    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(i32::from);
        let value = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
        luma[y as usize * layout.width + x as usize] = scale_about(value, 16, luma_scale);
    }

    for block_row in 0..layout.chroma_rows {
        for block_col in 0..layout.chroma_stride / 2 {
            let (r, g, b) = block_average(image, block_col as u32 * 2, block_row as u32 * 2);
            let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
            let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;

            let offset = block_row * layout.chroma_stride + block_col * 2;
            chroma[offset] = scale_about(v, 128, chroma_scale);
            chroma[offset + 1] = scale_about(u, 128, chroma_scale);
        }
    }

    data
}

/// Average RGB over the (up to) 2x2 block whose top-left corner is `(x, y)`
fn block_average(image: &RgbImage, x: u32, y: u32) -> (i32, i32, i32) {
    let mut sum = [0i32; 3];
    let mut count = 0;
    for dy in 0..2 {
        for dx in 0..2 {
            if let Some(pixel) = image.get_pixel_checked(x + dx, y + dy) {
                for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                    *acc += channel as i32;
                }
                count += 1;
            }
        }
    }
    let count = count.max(1);
    ((sum[0] + count / 2) / count, (sum[1] + count / 2) / count, (sum[2] + count / 2) / count)
}

#[inline]
fn scale_about(value: i32, pivot: i32, scale: f32) -> u8 {
    if scale == 1.0 {
        return value.clamp(0, 255) as u8;
    }
    let scaled = pivot as f32 + (value - pivot) as f32 * scale;
    scaled.round().clamp(0.0, 255.0) as u8
}

/// Unpack ARGB words into an RGB image (alpha is dropped)
pub fn packed_to_rgb(pixels: &[u32], width: u32, height: u32) -> AgeResult<RgbImage> {
    let expected = width as usize * height as usize;
    if pixels.len() < expected {
        return Err(AgeError::invalid_argument(format!(
            "Packed pixel buffer too small: expected {}, got {}",
            expected,
            pixels.len()
        )));
    }

    let rgb: Vec<u8> = pixels[..expected]
        .iter()
        .flat_map(|&argb| [(argb >> 16) as u8, (argb >> 8) as u8, argb as u8])
        .collect();

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| AgeError::invalid_argument("Failed to create RGB image from packed pixels"))
}
