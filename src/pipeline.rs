//! Per-frame orchestration of the overlay pipeline.
//!
//! The host calls [`OverlayPipeline::tick`] once per display frame. Detection,
//! segmentation and compositing only run when the source timestamp changed
//! since the last composited frame; avatar smoothing and the render scheduler
//! run every display frame.

use crate::compositor::{Compositor, LayerFlags};
use crate::config::Config;
use crate::detection::{AccelerationMode, AiStatus, DetectionModels, DetectorHandle, SegmentationMask};
use crate::hold::HoldState;
use crate::renderer::{OverlayRenderer, RenderScheduler};
use crate::snapshot::build_snapshot;
use crate::stabilizer::{AvatarPose, AvatarStabilizer, TemporalStabilizer};
use crate::types::{FaceBox, FrameSize, PoseSnapshot, VideoFrame};
use crate::Result;
use image::RgbaImage;
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Feature switches; turning one off skips its stage from the next frame on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    pub background_replacement: bool,
    pub face_overlay: bool,
    pub avatar: bool,
    pub continuous_avatar: bool,
    pub mirror: bool,
}

impl FeatureFlags {
    #[must_use]
    pub fn layer_flags(&self) -> LayerFlags {
        LayerFlags {
            background_replacement: self.background_replacement,
            face_overlay: self.face_overlay,
            mirror: self.mirror,
        }
    }

    /// Whether any consumer needs face detection
    #[must_use]
    pub fn needs_face(&self) -> bool {
        self.face_overlay || self.avatar
    }
}

/// What happened on one display frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// False when the source timestamp repeated and the frame was skipped
    pub processed: bool,
    /// Hold state of the effective snapshot after this frame
    pub hold: HoldState,
    /// 2D overlay face box in unmirrored frame pixels
    pub face_box: Option<FaceBox>,
    /// Whether the overlay renderer ran
    pub rendered: bool,
}

/// Frame counters in the source timeline
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub processed: u64,
    pub skipped: u64,
    first_timestamp: Option<Duration>,
    last_timestamp: Option<Duration>,
}

impl FrameStats {
    fn record(&mut self, timestamp: Duration) {
        self.processed += 1;
        self.first_timestamp.get_or_insert(timestamp);
        self.last_timestamp = Some(timestamp);
    }

    /// Processed frames per second of source time
    #[must_use]
    pub fn fps(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) if last > first && self.processed > 1 => {
                #[allow(clippy::cast_precision_loss)]
                let intervals = (self.processed - 1) as f64;
                intervals / (last - first).as_secs_f64()
            }
            _ => 0.0,
        }
    }
}

/// The complete per-frame pipeline
pub struct OverlayPipeline {
    flags: FeatureFlags,
    detector: DetectorHandle,
    stabilizer: TemporalStabilizer,
    avatar: AvatarStabilizer,
    avatar_pose: AvatarPose,
    compositor: Compositor,
    scheduler: RenderScheduler,
    renderer: Option<Box<dyn OverlayRenderer>>,
    mask_tx: Sender<SegmentationMask>,
    mask_rx: Receiver<SegmentationMask>,
    last_tick: Option<Duration>,
    stats: FrameStats,
}

impl OverlayPipeline {
    /// Build a pipeline from validated configuration, loading any images it names
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an image fails to load
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let compositor = Compositor::new(config.layer_flags())
            .with_padding(config.face_box.mask)
            .with_marker_radius(config.compositor.marker_radius)
            .with_background(config.background()?)
            .with_overlay_image(config.overlay_image()?);

        let mut pipeline = Self::with_parts(
            TemporalStabilizer::new(config.snapshot_hold()),
            AvatarStabilizer::new(config.avatar_settings()),
            compositor,
            RenderScheduler::new(config.renderer.max_fps),
        );
        pipeline.set_flags(config.feature_flags());
        Ok(pipeline)
    }

    /// Assemble a pipeline from preconfigured stages; all features start off
    #[must_use]
    pub fn with_parts(
        stabilizer: TemporalStabilizer,
        avatar: AvatarStabilizer,
        compositor: Compositor,
        scheduler: RenderScheduler,
    ) -> Self {
        let (mask_tx, mask_rx) = mpsc::channel();
        let mut pipeline = Self {
            flags: FeatureFlags::default(),
            detector: DetectorHandle::default(),
            stabilizer,
            avatar,
            avatar_pose: AvatarPose::hidden(),
            compositor,
            scheduler,
            renderer: None,
            mask_tx,
            mask_rx,
            last_tick: None,
            stats: FrameStats::default(),
        };
        pipeline.apply_flags(FeatureFlags::default());
        pipeline
    }

    /// Bring up the detection models, trying each acceleration mode in order.
    ///
    /// On failure the AI features stay off and frames pass through unmodified.
    ///
    /// # Errors
    ///
    /// Returns `Error::DetectorInit` if every mode failed
    pub fn initialize_detection<F>(&mut self, modes: &[AccelerationMode], init: F) -> Result<AccelerationMode>
    where
        F: FnMut(AccelerationMode) -> Result<DetectionModels>,
    {
        self.detector.initialize(modes, init).map_err(|e| {
            error!("AI features unavailable: {}", e);
            e
        })
    }

    /// Use models that were already initialized
    pub fn attach_models(&mut self, models: DetectionModels, mode: AccelerationMode) {
        self.detector = DetectorHandle::ready(models, mode);
    }

    #[must_use]
    pub fn ai_status(&self) -> &AiStatus {
        self.detector.status()
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn OverlayRenderer>) {
        self.renderer = Some(renderer);
        self.scheduler.invalidate();
    }

    /// Apply new feature switches, invalidating the renderer on avatar transitions
    pub fn set_flags(&mut self, flags: FeatureFlags) {
        if flags != self.flags {
            info!("Feature flags changed: {:?}", flags);
            self.apply_flags(flags);
        }
    }

    fn apply_flags(&mut self, flags: FeatureFlags) {
        self.flags = flags;
        let continuous = flags.avatar && flags.continuous_avatar;
        self.stabilizer.set_continuous(continuous);
        self.avatar.set_continuous(continuous);
        self.avatar.set_mirror(flags.mirror);
        self.scheduler.set_enabled(flags.avatar);
        self.compositor.set_flags(flags.layer_flags());
        if !flags.avatar {
            self.avatar.reset();
            self.avatar_pose = AvatarPose::hidden();
        }
    }

    #[must_use]
    pub fn flags(&self) -> FeatureFlags {
        self.flags
    }

    /// Run one display frame.
    ///
    /// `now` is the display clock; the elapsed time since the previous tick
    /// drives smoothing. A frame whose timestamp equals the last composited
    /// one is skipped for detection and compositing. A timestamp that went
    /// backwards is processed as a new frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame has zero size
    pub fn tick(&mut self, now: Duration, frame: &VideoFrame) -> Result<FrameReport> {
        let dt = self.last_tick.map_or(Duration::ZERO, |last| now.saturating_sub(last));
        self.last_tick = Some(now);

        let fresh = self.compositor.is_dirty(frame.timestamp);
        let hold = if fresh {
            if let Some(last) = self.compositor.last_drawn().filter(|last| frame.timestamp < *last) {
                warn!(
                    "Source timestamp went backwards ({:?} -> {:?}), treating as new frame",
                    last, frame.timestamp
                );
            }
            self.stats.record(frame.timestamp);
            self.process_source_frame(now, frame)?
        } else {
            debug!("Skipping frame with repeated timestamp {:?}", frame.timestamp);
            self.stats.skipped += 1;
            if self.stabilizer.effective().is_some() {
                HoldState::Held
            } else {
                HoldState::Empty
            }
        };

        if self.flags.avatar {
            let snapshot = self.stabilizer.effective().map(Arc::as_ref);
            self.avatar_pose = self.avatar.update(snapshot, self.compositor.frame_size(), now, dt);
        }

        let rendered = self.scheduler.should_render(now);
        if rendered {
            if let Some(renderer) = self.renderer.as_mut() {
                let snapshot = self
                    .stabilizer
                    .effective()
                    .map(Arc::as_ref)
                    .filter(|_| self.flags.avatar);
                renderer.render(self.compositor.frame_size(), snapshot, &self.avatar_pose);
            }
        }

        Ok(FrameReport {
            processed: fresh,
            hold,
            face_box: self.compositor.face_box(),
            rendered,
        })
    }

    fn process_source_frame(&mut self, now: Duration, frame: &VideoFrame) -> Result<HoldState> {
        let mut raw = None;
        if let Some(models) = self.detector.models_mut() {
            if self.flags.needs_face() {
                raw = models.face.detect_face(&frame.image, frame.timestamp).unwrap_or_else(|e| {
                    warn!("Face detection failed at {:?}: {}", frame.timestamp, e);
                    None
                });
            }

            if self.flags.background_replacement {
                if let Some(segmenter) = models.segmenter.as_mut() {
                    let tx = self.mask_tx.clone();
                    let submitted = segmenter.segment(
                        &frame.image,
                        frame.timestamp,
                        Box::new(move |mask| {
                            // The pipeline owns the receiver for its whole life
                            let _ = tx.send(mask);
                        }),
                    );
                    if let Err(e) = submitted {
                        warn!("Segmentation failed at {:?}: {}", frame.timestamp, e);
                    }
                }
            }
        }

        let hold = self.stabilizer.update(build_snapshot(raw.as_ref(), frame.timestamp), now);

        // Masks are frame-scoped: only the newest delivery is used, the rest are released
        let mask = self.mask_rx.try_iter().last();
        let effective = self.stabilizer.effective().cloned();
        self.compositor.compose(frame, mask, effective.as_deref())?;

        Ok(hold)
    }

    /// The currently effective snapshot
    #[must_use]
    pub fn effective_snapshot(&self) -> Option<&PoseSnapshot> {
        self.stabilizer.effective().map(Arc::as_ref)
    }

    /// Shared handle to the effective snapshot for an external renderer
    #[must_use]
    pub fn snapshot_handle(&self) -> Option<Arc<PoseSnapshot>> {
        self.stabilizer.effective().cloned()
    }

    #[must_use]
    pub fn avatar_pose(&self) -> &AvatarPose {
        &self.avatar_pose
    }

    #[must_use]
    pub fn frame_size(&self) -> FrameSize {
        self.compositor.frame_size()
    }

    /// Last composited output frame
    #[must_use]
    pub fn output(&self) -> Option<&RgbaImage> {
        self.compositor.output()
    }

    /// Face box as drawn on screen, for UI hit testing
    #[must_use]
    pub fn display_face_box(&self) -> Option<FaceBox> {
        self.compositor.display_face_box()
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    #[must_use]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Forget tracking state, e.g. after the host restarts the stream
    pub fn reset(&mut self) {
        info!("Resetting tracking state");
        self.stabilizer.reset();
        self.avatar.reset();
        self.avatar_pose = AvatarPose::hidden();
        self.compositor.invalidate();
        self.last_tick = None;
        while self.mask_rx.try_recv().is_ok() {}
        self.scheduler.invalidate();
    }
}
