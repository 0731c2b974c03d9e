//! Checked conversions between detector floats and pixel integers

use crate::{Error, Result};

/// Safely convert f32 to i64 with bounds checking, rounding toward negative infinity
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i64 range
#[allow(clippy::cast_precision_loss)] // MIN/MAX bounds checking is approximate
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f32_to_i64_floor(value: f32) -> Result<i64> {
    let floored = value.floor();
    if floored.is_finite() && floored >= i64::MIN as f32 && floored < i64::MAX as f32 {
        Ok(floored as i64)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i64"
        )))
    }
}

/// Round and clamp f32 to u32 for pixel sizes
#[must_use]
#[allow(clippy::cast_precision_loss)] // Acceptable for clamping bounds
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Clamping ensures safe truncation
pub fn f32_to_u32_clamp(value: f32, min: u32, max: u32) -> u32 {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    if !value.is_finite() {
        return min;
    }

    let clamped = value.round().clamp(min as f32, max as f32);
    (clamped as u32).clamp(min, max)
}

/// Map a destination index to the matching source index when resampling
/// `dst_len` cells onto `src_len` cells (cell-center alignment)
#[must_use]
#[allow(clippy::cast_precision_loss)] // Image dimensions are far below f64 precision limits
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Result is clamped to the source range
pub fn scaled_index(dst: usize, dst_len: usize, src_len: usize) -> usize {
    if dst_len == 0 || src_len == 0 {
        return 0;
    }
    let pos = (dst as f64 + 0.5) * src_len as f64 / dst_len as f64;
    (pos.floor() as usize).min(src_len - 1)
}
