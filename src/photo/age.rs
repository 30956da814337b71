// SPDX-License-Identifier: GPL-3.0-only

//! Age-state schedule
//!
//! Size, JPEG quality and color saturation are pure functions of the age
//! state. State 0 is the fresh photo, `AGE_STATE_MAX - 1` the oldest.

use crate::constants::AGE_STATE_MAX;
use crate::constants::aging::{
    COLOR_STEP_MASK, JPEG_QUALITY_MAX, JPEG_QUALITY_MIN, LOGICAL_HEIGHT, LOGICAL_WIDTH,
    MIN_SIZE_SCALE,
};
use crate::errors::{AgeError, AgeResult};

/// Oldest valid age state
pub const OLDEST: u32 = AGE_STATE_MAX - 1;

/// Default full logical size (landscape)
pub const DEFAULT_LOGICAL_SIZE: (u32, u32) = (LOGICAL_WIDTH, LOGICAL_HEIGHT);

/// Reject ages outside `0..AGE_STATE_MAX`
pub fn validate(age: u32) -> AgeResult<u32> {
    if age >= AGE_STATE_MAX {
        return Err(AgeError::invalid_argument(format!(
            "age state {} outside 0..{}",
            age, AGE_STATE_MAX
        )));
    }
    Ok(age)
}

/// Fraction of the way from state 0 to the oldest state
#[inline]
fn progress(age: u32) -> f32 {
    age.min(OLDEST) as f32 / OLDEST as f32
}

#[inline]
fn even(value: f32) -> u32 {
    ((value as u32) & !1).max(2)
}

/// Logical pixel size for an age state
///
/// `full` is the landscape size at state 0; portrait photos swap the axes.
/// Both sides shrink linearly to `MIN_SIZE_SCALE` and are rounded down to
/// even numbers.
pub fn logical_size(age: u32, portrait: bool, full: (u32, u32)) -> (u32, u32) {
    let scale = 1.0 + (MIN_SIZE_SCALE - 1.0) * progress(age);
    let (width, height) = if portrait { (full.1, full.0) } else { full };
    (even(width as f32 * scale), even(height as f32 * scale))
}

/// JPEG quality for an age state, interpolated from 80 down to 50
pub fn jpeg_quality(age: u32) -> u8 {
    let max = JPEG_QUALITY_MAX as f32;
    let min = JPEG_QUALITY_MIN as f32;
    (max + (min - max) * progress(age)).round() as u8
}

/// Color saturation scale for an age state
///
/// Only changes every four states. Falls from 1.0 to 0.0 and is reshaped
/// with `1 - (1 - s)^2` so the last steps bleed the most color.
pub fn color_scale(age: u32) -> f32 {
    let top = OLDEST & COLOR_STEP_MASK;
    let stepped = (age.min(OLDEST) & COLOR_STEP_MASK).min(top);
    let linear = 1.0 - stepped as f32 / top as f32;
    let fade = 1.0 - linear;
    1.0 - fade * fade
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_endpoints() {
        assert_eq!(jpeg_quality(0), 80);
        assert_eq!(jpeg_quality(OLDEST), 50);
        assert_eq!(jpeg_quality(1), 77);
    }

    #[test]
    fn test_quality_non_increasing() {
        for age in 1..AGE_STATE_MAX {
            assert!(jpeg_quality(age) <= jpeg_quality(age - 1));
        }
    }

    #[test]
    fn test_size_endpoints() {
        assert_eq!(logical_size(0, false, (1024, 768)), (1024, 768));
        assert_eq!(logical_size(0, true, (1024, 768)), (768, 1024));
        let (w, h) = logical_size(OLDEST, false, (1024, 768));
        assert_eq!((w, h), (306, 230));
    }

    #[test]
    fn test_sizes_even_and_shrinking() {
        let mut previous = (u32::MAX, u32::MAX);
        for age in 0..AGE_STATE_MAX {
            let (w, h) = logical_size(age, false, (1000, 750));
            assert_eq!(w % 2, 0);
            assert_eq!(h % 2, 0);
            assert!(w <= previous.0 && h <= previous.1);
            previous = (w, h);
        }
    }

    #[test]
    fn test_tiny_sizes_stay_positive() {
        assert_eq!(logical_size(OLDEST, false, (3, 3)), (2, 2));
    }

    #[test]
    fn test_color_schedule() {
        for age in 0..4 {
            assert_eq!(color_scale(age), 1.0);
        }
        for age in 4..8 {
            assert!((color_scale(age) - 0.75).abs() < 1e-6);
        }
        for age in 8..AGE_STATE_MAX {
            assert_eq!(color_scale(age), 0.0);
        }
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate(0).unwrap(), 0);
        assert_eq!(validate(OLDEST).unwrap(), OLDEST);
        assert!(matches!(validate(AGE_STATE_MAX), Err(AgeError::InvalidArgument(_))));
    }
}
