//! Detection adapter contract.
//!
//! Face landmarking and person segmentation run in an external model
//! runtime. This module defines the narrow interface the pipeline consumes,
//! the raw result shapes it accepts, and acceleration-mode fallback for
//! bringing the runtime up.

use crate::types::{LandmarkPoint, TransformMatrix, MATRIX_LEN};
use crate::{Error, Result};
use image::RgbaImage;
use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Transformation matrix as exposed by the detector runtime.
///
/// Runtimes hand the matrix out either as a flat list or as a matrix object
/// wrapping a numeric buffer. Both collapse to [`TransformMatrix`] through
/// [`RawMatrix::to_canonical`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawMatrix {
    /// Plain list of components
    Flat(Vec<f32>),
    /// Matrix object exposing its backing buffer
    Buffer {
        rows: usize,
        columns: usize,
        data: Vec<f32>,
    },
}

impl RawMatrix {
    /// The underlying numeric components
    #[must_use]
    pub fn components(&self) -> &[f32] {
        match self {
            Self::Flat(values) => values,
            Self::Buffer { data, .. } => data,
        }
    }

    /// First 16 components, or `None` if fewer are available
    #[must_use]
    pub fn to_canonical(&self) -> Option<TransformMatrix> {
        let components = self.components();
        let mut matrix = [0.0; MATRIX_LEN];
        matrix.copy_from_slice(components.get(..MATRIX_LEN)?);
        Some(matrix)
    }
}

/// One named expression weight as reported by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionCategory {
    pub name: String,
    pub score: f32,
}

/// Detector output for a single face
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawFace {
    pub landmarks: Vec<LandmarkPoint>,
    #[serde(default)]
    pub transform: Option<RawMatrix>,
    #[serde(default)]
    pub expressions: Option<Vec<ExpressionCategory>>,
}

/// Detector output for a frame; only the first face is tracked
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub faces: Vec<RawFace>,
}

impl RawDetection {
    #[must_use]
    pub fn single(face: RawFace) -> Self {
        Self { faces: vec![face] }
    }
}

/// Per-pixel segmentation at detector-native resolution, indexed `[row, col]`
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentationMask {
    /// Continuous person confidence in `[0, 1]`
    Confidence(Array2<f32>),
    /// Category labels; any nonzero label is the person
    Category(Array2<u8>),
}

impl SegmentationMask {
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Confidence(a) => a.ncols(),
            Self::Category(a) => a.ncols(),
        }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            Self::Confidence(a) => a.nrows(),
            Self::Category(a) => a.nrows(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Alpha (0..=255) at a mask cell
    #[must_use]
    pub fn alpha_at(&self, row: usize, col: usize) -> u8 {
        match self {
            Self::Confidence(a) => crate::utils::confidence_to_alpha(a[[row, col]]),
            Self::Category(a) => {
                if a[[row, col]] != 0 {
                    u8::MAX
                } else {
                    0
                }
            }
        }
    }
}

/// Completion callback for an asynchronous segmentation request
pub type MaskCallback = Box<dyn FnOnce(SegmentationMask) + Send>;

/// Face landmark detector running in the external model runtime
pub trait FaceDetector {
    /// Detect at most one face. `Ok(None)` means no face this frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime call itself failed
    fn detect_face(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<Option<RawDetection>>;
}

/// Person/background segmenter running in the external model runtime
pub trait Segmenter {
    /// Submit a frame. `on_mask` is invoked exactly once per successful
    /// submission, possibly after this call returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be submitted
    fn segment(&mut self, frame: &RgbaImage, timestamp: Duration, on_mask: MaskCallback) -> Result<()>;
}

/// Acceleration backend for the model runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccelerationMode {
    /// Hardware accelerated
    Gpu,
    /// Software fallback
    Cpu,
}

impl AccelerationMode {
    /// Hardware first, software last
    pub const PREFERENCE: [Self; 2] = [Self::Gpu, Self::Cpu];
}

impl fmt::Display for AccelerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

/// Try each acceleration mode in order and keep the first that initializes.
///
/// # Errors
///
/// Returns `Error::DetectorInit` listing every attempt if all modes fail
pub fn initialize_with_fallback<T, F>(modes: &[AccelerationMode], mut init: F) -> Result<(T, AccelerationMode)>
where
    F: FnMut(AccelerationMode) -> Result<T>,
{
    let mut attempts = Vec::with_capacity(modes.len());
    for &mode in modes {
        match init(mode) {
            Ok(value) => {
                info!("Detector initialized with {} acceleration", mode);
                return Ok((value, mode));
            }
            Err(e) => {
                warn!("Detector initialization with {} acceleration failed: {}", mode, e);
                attempts.push(format!("{mode}: {e}"));
            }
        }
    }
    Err(Error::DetectorInit { attempts })
}

/// The external detector pair the pipeline drives
pub struct DetectionModels {
    pub face: Box<dyn FaceDetector>,
    pub segmenter: Option<Box<dyn Segmenter>>,
}

/// State of the AI-dependent features
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiStatus {
    Uninitialized,
    Ready(AccelerationMode),
    /// Every acceleration mode failed; passthrough video continues
    Failed(String),
}

/// Idempotent holder for the detection models
pub struct DetectorHandle {
    models: Option<DetectionModels>,
    status: AiStatus,
}

impl Default for DetectorHandle {
    fn default() -> Self {
        Self {
            models: None,
            status: AiStatus::Uninitialized,
        }
    }
}

impl DetectorHandle {
    /// Wrap models that were created elsewhere
    #[must_use]
    pub fn ready(models: DetectionModels, mode: AccelerationMode) -> Self {
        Self {
            models: Some(models),
            status: AiStatus::Ready(mode),
        }
    }

    /// Initialize once. A call after success returns the chosen mode without
    /// touching `init`; a call after failure retries the whole list.
    ///
    /// # Errors
    ///
    /// Returns `Error::DetectorInit` if every mode fails
    pub fn initialize<F>(&mut self, modes: &[AccelerationMode], init: F) -> Result<AccelerationMode>
    where
        F: FnMut(AccelerationMode) -> Result<DetectionModels>,
    {
        if let AiStatus::Ready(mode) = self.status {
            return Ok(mode);
        }

        match initialize_with_fallback(modes, init) {
            Ok((models, mode)) => {
                self.models = Some(models);
                self.status = AiStatus::Ready(mode);
                Ok(mode)
            }
            Err(e) => {
                self.models = None;
                self.status = AiStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> &AiStatus {
        &self.status
    }

    pub fn models_mut(&mut self) -> Option<&mut DetectionModels> {
        self.models.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_matrix_canonical() {
        let values: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let canonical = RawMatrix::Flat(values).to_canonical().unwrap();
        assert_eq!(canonical[0], 0.0);
        assert_eq!(canonical[15], 15.0);
    }

    #[test]
    fn test_buffer_matrix_canonical() {
        let raw = RawMatrix::Buffer {
            rows: 4,
            columns: 4,
            data: (0..16).map(|v| v as f32 * 2.0).collect(),
        };
        assert_eq!(raw.to_canonical().unwrap()[15], 30.0);
    }

    #[test]
    fn test_short_matrix_rejected() {
        assert!(RawMatrix::Flat(vec![1.0; 15]).to_canonical().is_none());
    }

    #[test]
    fn test_category_mask_alpha() {
        let mask = SegmentationMask::Category(Array2::from_shape_vec((1, 3), vec![0, 1, 7]).unwrap());
        assert_eq!(mask.alpha_at(0, 0), 0);
        assert_eq!(mask.alpha_at(0, 1), 255);
        assert_eq!(mask.alpha_at(0, 2), 255);
        assert_eq!((mask.width(), mask.height()), (3, 1));
    }

    #[test]
    fn test_fallback_uses_first_success() {
        let mut tried = Vec::new();
        let (value, mode) = initialize_with_fallback(&AccelerationMode::PREFERENCE, |mode| {
            tried.push(mode);
            match mode {
                AccelerationMode::Gpu => Err(Error::Detection("no device".to_string())),
                AccelerationMode::Cpu => Ok(5),
            }
        })
        .unwrap();
        assert_eq!(value, 5);
        assert_eq!(mode, AccelerationMode::Cpu);
        assert_eq!(tried, vec![AccelerationMode::Gpu, AccelerationMode::Cpu]);
    }

    #[test]
    fn test_fallback_exhausted() {
        let result: Result<((), AccelerationMode)> =
            initialize_with_fallback(&AccelerationMode::PREFERENCE, |_| Err(Error::Detection("boom".to_string())));
        match result {
            Err(Error::DetectorInit { attempts }) => assert_eq!(attempts.len(), 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_raw_matrix_yaml_shapes() {
        let flat: RawMatrix = serde_yaml::from_str("[1, 2, 3]").unwrap();
        assert_eq!(flat, RawMatrix::Flat(vec![1.0, 2.0, 3.0]));
        let buffer: RawMatrix = serde_yaml::from_str("{rows: 1, columns: 2, data: [4, 5]}").unwrap();
        assert_eq!(buffer.components(), &[4.0, 5.0]);
    }
}
