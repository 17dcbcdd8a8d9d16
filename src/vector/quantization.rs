//! Float to byte quantization for sparse weights.
//!
//! Weights are clamped to `[0, ceiling]` and mapped linearly onto `0..=255`.
//! The byte is always read as unsigned; Rust's `u8` already is, so the
//! helpers below only widen.

use std::cmp::Ordering;

/// Largest quantized weight.
pub const MAX_UNSIGNED_BYTE: u32 = 255;

/// Quantizes `value` into a byte using the given ceiling.
///
/// Out-of-range and non-finite inputs are clamped, never rejected. A
/// non-positive ceiling quantizes everything to zero.
#[must_use]
pub fn quantize_float_to_byte(value: f32, ceiling: f32) -> u8 {
    if ceiling.is_nan() || ceiling <= 0.0 || value.is_nan() {
        return 0;
    }
    let clamped = value.clamp(0.0, ceiling);
    let scaled = (clamped / ceiling * MAX_UNSIGNED_BYTE as f32).round();
    scaled.clamp(0.0, MAX_UNSIGNED_BYTE as f32) as u8
}

/// Maps a quantized byte back to float space.
#[must_use]
pub fn dequantize_byte_to_float(value: u8, ceiling: f32) -> f32 {
    f32::from(value) / MAX_UNSIGNED_BYTE as f32 * ceiling
}

/// Unsigned value of a stored weight, in `0..=255`.
#[inline]
#[must_use]
pub fn get_unsigned_byte(value: u8) -> u32 {
    u32::from(value)
}

#[inline]
#[must_use]
pub fn compare_unsigned_byte(x: u8, y: u8) -> Ordering {
    get_unsigned_byte(x).cmp(&get_unsigned_byte(y))
}

/// Product of two unsigned weights, in `0..=65025`.
#[inline]
#[must_use]
pub fn multiply_unsigned_byte(x: u8, y: u8) -> u32 {
    get_unsigned_byte(x) * get_unsigned_byte(y)
}

/// Factor converting a dot product of two quantized vectors back to float space.
#[must_use]
pub fn rescale_ratio(ceiling_ingest: f32, ceiling_search: f32) -> f32 {
    ceiling_ingest * ceiling_search / MAX_UNSIGNED_BYTE as f32 / MAX_UNSIGNED_BYTE as f32
}

/// Quantizer bound to a single ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ByteQuantizer {
    ceiling: f32,
}

impl ByteQuantizer {
    #[must_use]
    pub const fn new(ceiling: f32) -> Self {
        Self { ceiling }
    }

    #[must_use]
    pub const fn ceiling(&self) -> f32 {
        self.ceiling
    }

    #[must_use]
    pub fn quantize(&self, value: f32) -> u8 {
        quantize_float_to_byte(value, self.ceiling)
    }

    #[must_use]
    pub fn dequantize(&self, value: u8) -> f32 {
        dequantize_byte_to_float(value, self.ceiling)
    }
}
