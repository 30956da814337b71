// SPDX-License-Identifier: MPL-2.0

//! Pixel-level media processing
//!
//! # Color Space Conversion
//!
//! The aging pipeline drains color by round-tripping images through NV21
//! (YUV 4:2:0, luma plane then interleaved V/U) with exact integer math.
//! See [`yuv`].
//!
//! # Modules
//!
//! - [`bitmap`]: JPEG codec, rotation and aspect-preserving scaling
//! - [`noise`]: Deterministic gradient noise for sample imagery
//! - [`yuv`]: NV21 to packed ARGB conversion and back

pub mod bitmap;
pub mod noise;
pub mod yuv;

// Re-export commonly used types
pub use noise::{Interpolation, NoiseCanvas, NoiseField};
pub use yuv::{Nv21Layout, decode_nv21, encode_nv21};
