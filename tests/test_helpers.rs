//! Helper functions and utilities for tests

#![allow(dead_code)]

use face_overlay::detection::{
    DetectionModels, FaceDetector, MaskCallback, RawDetection, RawFace, SegmentationMask, Segmenter,
};
use face_overlay::types::{LandmarkPoint, PoseSnapshot, VideoFrame};
use face_overlay::Result;
use image::{Rgba, RgbaImage};
use ndarray::Array2;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// 468 landmarks spread over a grid spanning `[min, max]` on both axes
pub fn face_mesh(min: f32, max: f32) -> Vec<LandmarkPoint> {
    let columns = 26;
    let rows = 18;
    (0..rows * columns)
        .map(|i| {
            let (row, col) = (i / columns, i % columns);
            let x = min + (max - min) * col as f32 / (columns - 1) as f32;
            let y = min + (max - min) * row as f32 / (rows - 1) as f32;
            LandmarkPoint::new(x, y)
        })
        .collect()
}

pub fn mesh_snapshot(at: Duration) -> PoseSnapshot {
    PoseSnapshot::new(face_mesh(0.1, 0.9), None, None, at)
}

pub fn raw_face(landmarks: Vec<LandmarkPoint>) -> RawFace {
    RawFace {
        landmarks,
        transform: None,
        expressions: None,
    }
}

/// Frame where every pixel encodes its own coordinates
pub fn gradient_frame(width: u32, height: u32, at: Duration) -> VideoFrame {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255]));
    VideoFrame::new(image, at)
}

/// Detector replaying a scripted sequence of results, one per call
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    pub script: Arc<Mutex<VecDeque<Result<Option<RawDetection>>>>>,
    pub calls: Arc<Mutex<Vec<Duration>>>,
}

impl ScriptedDetector {
    pub fn push_face(&self, landmarks: Vec<LandmarkPoint>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(Some(RawDetection::single(raw_face(landmarks)))));
    }

    pub fn push_none(&self) {
        self.script.lock().unwrap().push_back(Ok(None));
    }

    pub fn push_error(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(face_overlay::Error::Detection(message.to_string())));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect_face(&mut self, _image: &RgbaImage, timestamp: Duration) -> Result<Option<RawDetection>> {
        self.calls.lock().unwrap().push(timestamp);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

/// Segmenter that reports the same category mask for every frame
#[derive(Clone)]
pub struct FixedSegmenter {
    pub mask: Array2<u8>,
    pub calls: Arc<Mutex<usize>>,
}

impl FixedSegmenter {
    /// Person occupies the left half
    pub fn left_half(width: usize, height: usize) -> Self {
        Self {
            mask: Array2::from_shape_fn((height, width), |(_, col)| u8::from(col < width / 2)),
            calls: Arc::new(Mutex::new(0)),
        }
    }
}

impl Segmenter for FixedSegmenter {
    fn segment(&mut self, _image: &RgbaImage, _timestamp: Duration, on_mask: MaskCallback) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        on_mask(SegmentationMask::Category(self.mask.clone()));
        Ok(())
    }
}

pub fn models(detector: &ScriptedDetector, segmenter: Option<&FixedSegmenter>) -> DetectionModels {
    DetectionModels {
        face: Box::new(detector.clone()),
        segmenter: segmenter.map(|s| Box::new(s.clone()) as Box<dyn Segmenter>),
    }
}
