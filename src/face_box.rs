//! Face box derivation from normalized landmarks.
//!
//! The box is the tight extent of all landmarks, optionally reflected
//! horizontally, then padded. Horizontal padding is split evenly; only a
//! `y_shift` fraction of the vertical padding is taken from the top, which
//! moves the box upward so the forehead (under-covered by landmarks) is
//! framed.

use crate::constants::{AVATAR_PAD_X, AVATAR_PAD_Y, AVATAR_Y_SHIFT, MASK_PAD_X, MASK_PAD_Y, MASK_Y_SHIFT};
use crate::types::{FaceBox, FrameSize, LandmarkPoint};
use serde::{Deserialize, Serialize};

/// Padding profile applied around the landmark extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxPadding {
    /// Horizontal padding as a fraction of the extent width
    pub pad_x: f32,
    /// Vertical padding as a fraction of the extent height
    pub pad_y: f32,
    /// Fraction of the vertical padding applied above the extent
    pub y_shift: f32,
}

impl BoxPadding {
    /// Tight profile for the 2D image-mask overlay
    pub const MASK: Self = Self {
        pad_x: MASK_PAD_X,
        pad_y: MASK_PAD_Y,
        y_shift: MASK_Y_SHIFT,
    };

    /// Wide, upward-biased profile for fitting the 3D avatar head
    pub const AVATAR: Self = Self {
        pad_x: AVATAR_PAD_X,
        pad_y: AVATAR_PAD_Y,
        y_shift: AVATAR_Y_SHIFT,
    };

    /// No padding: the raw landmark extent
    pub const NONE: Self = Self {
        pad_x: 0.0,
        pad_y: 0.0,
        y_shift: 0.0,
    };
}

/// Normalized extent of a landmark set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkExtent {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl LandmarkExtent {
    /// Single min/max scan; `None` for an empty set
    #[must_use]
    pub fn scan(landmarks: &[LandmarkPoint]) -> Option<Self> {
        let first = landmarks.first()?;
        let init = Self {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };

        Some(landmarks[1..].iter().fold(init, |acc, p| Self {
            min_x: acc.min_x.min(p.x),
            max_x: acc.max_x.max(p.x),
            min_y: acc.min_y.min(p.y),
            max_y: acc.max_y.max(p.y),
        }))
    }

    /// Reflect the horizontal extent (`x -> 1 - x`)
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            min_x: 1.0 - self.max_x,
            max_x: 1.0 - self.min_x,
            ..*self
        }
    }
}

/// Derive the padded face box for a frame.
///
/// Mirroring is applied to the extent, never to individual landmarks, so
/// callers that already mirror their draw transform pass `mirror = false`.
///
/// Returns `None` when there are no landmarks.
#[must_use]
pub fn derive_face_box(
    landmarks: &[LandmarkPoint],
    frame: FrameSize,
    padding: BoxPadding,
    mirror: bool,
) -> Option<FaceBox> {
    let extent = LandmarkExtent::scan(landmarks)?;
    let extent = if mirror { extent.mirrored() } else { extent };

    #[allow(clippy::cast_precision_loss)] // Frame dimensions are far below f32 precision limits
    let (frame_w, frame_h) = (frame.width as f32, frame.height as f32);

    let x = extent.min_x * frame_w;
    let y = extent.min_y * frame_h;
    let w = (extent.max_x - extent.min_x) * frame_w;
    let h = (extent.max_y - extent.min_y) * frame_h;

    let pad_w = w * padding.pad_x;
    let pad_h = h * padding.pad_y;

    Some(FaceBox {
        x: x - pad_w * 0.5,
        y: y - pad_h * padding.y_shift,
        width: w + pad_w,
        height: h + pad_h,
    })
}
