//! Core data model shared by every pipeline stage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Number of components in a 4x4 transformation matrix
pub const MATRIX_LEN: usize = 16;

/// Canonical transformation matrix: 16 components in column-major order
pub type TransformMatrix = [f32; MATRIX_LEN];

/// Named expression weights (blendshape name to weight)
pub type ExpressionWeights = BTreeMap<String, f32>;

/// A normalized (0..1) landmark coordinate within the frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    /// Horizontal position, 0 = left edge, 1 = right edge
    pub x: f32,
    /// Vertical position, 0 = top edge, 1 = bottom edge
    pub y: f32,
    /// Optional relative depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl LandmarkPoint {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    #[must_use]
    pub const fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }

    /// Reflect horizontally (`x -> 1 - x`)
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            x: 1.0 - self.x,
            ..*self
        }
    }
}

/// One detector-derived description of the tracked face at a point in time.
///
/// Snapshots are immutable; a newer detection supersedes the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    landmarks: Vec<LandmarkPoint>,
    transform: Option<TransformMatrix>,
    expressions: Option<ExpressionWeights>,
    captured_at: Duration,
}

impl PoseSnapshot {
    /// Create a snapshot from already-normalized detector output
    #[must_use]
    pub fn new(
        landmarks: Vec<LandmarkPoint>,
        transform: Option<TransformMatrix>,
        expressions: Option<ExpressionWeights>,
        captured_at: Duration,
    ) -> Self {
        Self {
            landmarks,
            transform,
            expressions,
            captured_at,
        }
    }

    /// Landmarks in detector topology order
    #[must_use]
    pub fn landmarks(&self) -> &[LandmarkPoint] {
        &self.landmarks
    }

    /// Raw transformation matrix, if the detector produced one
    #[must_use]
    pub fn transform(&self) -> Option<&TransformMatrix> {
        self.transform.as_ref()
    }

    /// Transformation matrix, only if every component is finite
    #[must_use]
    pub fn finite_transform(&self) -> Option<&TransformMatrix> {
        self.transform
            .as_ref()
            .filter(|matrix| matrix.iter().all(|v| v.is_finite()))
    }

    #[must_use]
    pub fn expressions(&self) -> Option<&ExpressionWeights> {
        self.expressions.as_ref()
    }

    /// Presentation timestamp of the frame this snapshot was detected in
    #[must_use]
    pub fn captured_at(&self) -> Duration {
        self.captured_at
    }
}

/// Axis-aligned rectangle in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceBox {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Center point `(x, y)` in pixels
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// The same box reflected across the vertical center line of a frame
    #[must_use]
    pub fn mirrored(&self, frame_width: f32) -> Self {
        Self {
            x: frame_width - self.right(),
            ..*self
        }
    }

    /// Whether a pixel position falls inside the box (used for UI hit testing)
    #[must_use]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }
}

/// Dimensions of the current video frame in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// False until the source has reported a non-zero resolution
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[must_use]
    pub fn of(image: &image::RgbaImage) -> Self {
        Self::new(image.width(), image.height())
    }
}

/// A raw video frame with its presentation timestamp
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: image::RgbaImage,
    pub timestamp: Duration,
}

impl VideoFrame {
    #[must_use]
    pub fn new(image: image::RgbaImage, timestamp: Duration) -> Self {
        Self { image, timestamp }
    }

    #[must_use]
    pub fn size(&self) -> FrameSize {
        FrameSize::of(&self.image)
    }
}
