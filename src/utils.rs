//! Utility functions for numeric casts and compositing buffers.

pub mod image_conversion;
pub mod safe_cast;

pub use image_conversion::confidence_to_alpha;
