//! Recorded detection tracks for offline runs.
//!
//! A track is a YAML file listing frames with their timestamp, image path and
//! the detector output recorded for that frame. [`ReplayDetector`] and
//! [`ReplaySegmenter`] serve those recordings through the detection adapter
//! traits, so the full pipeline runs without a model runtime.

use crate::detection::{
    AccelerationMode, DetectionModels, FaceDetector, MaskCallback, RawDetection, RawFace, SegmentationMask, Segmenter,
};
use crate::types::VideoFrame;
use crate::{Error, Result};
use image::RgbaImage;
use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One recorded source frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Presentation timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Frame image
    pub image: PathBuf,
    /// Detected face, absent when tracking was lost
    #[serde(default)]
    pub face: Option<RawFace>,
    /// Grayscale person mask, white = person
    #[serde(default)]
    pub mask: Option<PathBuf>,
}

impl ReplayFrame {
    #[must_use]
    pub fn timestamp(&self) -> Duration {
        Duration::from_millis(self.timestamp_ms)
    }

    /// Decode the frame image
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be read or decoded
    pub fn load(&self) -> Result<VideoFrame> {
        let image = image::open(&self.image)?.to_rgba8();
        Ok(VideoFrame::new(image, self.timestamp()))
    }
}

/// An ordered list of recorded frames
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayTrack {
    pub frames: Vec<ReplayFrame>,
}

impl ReplayTrack {
    /// Load a track; relative paths resolve against the track file's directory
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut track = Self::from_yaml(&content)?;
        if let Some(base) = path.parent() {
            track.resolve_paths(base);
        }
        info!("Loaded replay track with {} frames from {}", track.frames.len(), path.display());
        Ok(track)
    }

    /// Parse a track from YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(content: &str) -> Result<Self> {
        let track: Self = serde_yaml::from_str(content)?;
        if track
            .frames
            .windows(2)
            .any(|pair| pair[1].timestamp_ms < pair[0].timestamp_ms)
        {
            return Err(Error::InvalidInput("Replay timestamps must not decrease".to_string()));
        }
        Ok(track)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for frame in &mut self.frames {
            if frame.image.is_relative() {
                frame.image = base.join(&frame.image);
            }
            if let Some(mask) = frame.mask.as_mut().filter(|m| m.is_relative()) {
                *mask = base.join(&*mask);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn detector(&self) -> ReplayDetector {
        ReplayDetector {
            faces: self
                .frames
                .iter()
                .filter_map(|f| Some((f.timestamp(), f.face.clone()?)))
                .collect(),
        }
    }

    #[must_use]
    pub fn segmenter(&self) -> ReplaySegmenter {
        ReplaySegmenter {
            masks: self
                .frames
                .iter()
                .filter_map(|f| Some((f.timestamp(), f.mask.clone()?)))
                .collect(),
        }
    }

    /// Detection models serving this track; the mode is ignored
    #[must_use]
    pub fn models(&self, _mode: AccelerationMode) -> DetectionModels {
        DetectionModels {
            face: Box::new(self.detector()),
            segmenter: Some(Box::new(self.segmenter())),
        }
    }
}

/// Face detector answering from recorded results
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    faces: BTreeMap<Duration, RawFace>,
}

impl FaceDetector for ReplayDetector {
    fn detect_face(&mut self, _image: &RgbaImage, timestamp: Duration) -> Result<Option<RawDetection>> {
        Ok(self.faces.get(&timestamp).cloned().map(RawDetection::single))
    }
}

/// Segmenter reading recorded grayscale masks.
///
/// Frames without a recording deliver an empty mask, which the compositor
/// treats as "no mask this frame".
#[derive(Debug, Clone, Default)]
pub struct ReplaySegmenter {
    masks: BTreeMap<Duration, PathBuf>,
}

impl Segmenter for ReplaySegmenter {
    fn segment(&mut self, _image: &RgbaImage, timestamp: Duration, on_mask: MaskCallback) -> Result<()> {
        let mask = match self.masks.get(&timestamp) {
            Some(path) => load_confidence_mask(path)?,
            None => {
                debug!("No recorded mask at {:?}", timestamp);
                SegmentationMask::Confidence(Array2::zeros((0, 0)))
            }
        };
        on_mask(mask);
        Ok(())
    }
}

/// Read a grayscale image as a confidence mask
///
/// # Errors
///
/// Returns an error if the image cannot be read or decoded
pub fn load_confidence_mask(path: &Path) -> Result<SegmentationMask> {
    let luma = image::open(path)?.to_luma8();
    let shape = (luma.height() as usize, luma.width() as usize);
    let values = luma.pixels().map(|p| f32::from(p[0]) / f32::from(u8::MAX)).collect();
    let confidence = Array2::from_shape_vec(shape, values)
        .map_err(|e| Error::InvalidInput(format!("Mask {} has an invalid shape: {e}", path.display())))?;
    Ok(SegmentationMask::Confidence(confidence))
}
