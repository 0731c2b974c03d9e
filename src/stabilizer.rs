//! Temporal stabilization of the tracked face.
//!
//! [`TemporalStabilizer`] owns the single effective snapshot and keeps it
//! alive across short detection gaps. [`AvatarStabilizer`] is the 3D overlay
//! consumer: it holds its own last-known face box and smooths position,
//! scale, rotation and expression weights per display frame.

use crate::constants::{
    EXPRESSION_FACTOR, FACE_BOX_HOLD_MS, GAZE_FACTOR, GAZE_SCALE, POSITION_RATE, ROTATION_RATE, SCALE_RATE,
    SNAPSHOT_HOLD_MS,
};
use crate::face_box::{derive_face_box, BoxPadding};
use crate::filters::{
    exponential::ExponentialSmoother, expression::ExpressionSmoother, rotation::RotationSmoother, Smoother,
};
use crate::hold::{HeldValue, HoldState};
use crate::types::{ExpressionWeights, FaceBox, FrameSize, PoseSnapshot};
use log::{debug, info};
use nalgebra::{UnitQuaternion, Vector2};
use std::sync::Arc;
use std::time::Duration;

/// Holds the effective pose snapshot with a hold-then-clear policy
#[derive(Debug, Clone)]
pub struct TemporalStabilizer {
    slot: HeldValue<Arc<PoseSnapshot>>,
    continuous: bool,
}

impl Default for TemporalStabilizer {
    fn default() -> Self {
        Self::new(Duration::from_millis(SNAPSHOT_HOLD_MS))
    }
}

impl TemporalStabilizer {
    #[must_use]
    pub fn new(hold: Duration) -> Self {
        Self {
            slot: HeldValue::new(hold),
            continuous: false,
        }
    }

    /// In continuous avatar mode the held snapshot is never cleared
    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    #[must_use]
    pub fn hold_window(&self) -> Duration {
        self.slot.window()
    }

    /// Feed this frame's detection result.
    ///
    /// A snapshot becomes effective immediately. Without one, the previous
    /// snapshot survives until the gap since its arrival exceeds the hold
    /// window.
    pub fn update(&mut self, snapshot: Option<PoseSnapshot>, now: Duration) -> HoldState {
        match snapshot {
            Some(snapshot) => {
                self.slot.refresh(Arc::new(snapshot), now);
                HoldState::Fresh
            }
            None if self.continuous => {
                if self.slot.current().is_some() {
                    HoldState::Held
                } else {
                    HoldState::Empty
                }
            }
            None => {
                let state = self.slot.age(now);
                if state == HoldState::Expired {
                    info!("Face lost for more than {:?}, clearing effective snapshot", self.slot.window());
                }
                state
            }
        }
    }

    /// The currently effective snapshot
    #[must_use]
    pub fn effective(&self) -> Option<&Arc<PoseSnapshot>> {
        self.slot.current()
    }

    /// Time the effective snapshot was last refreshed
    #[must_use]
    pub fn last_update(&self) -> Option<Duration> {
        self.slot.last_update()
    }

    pub fn reset(&mut self) {
        self.slot.clear();
    }
}

/// Tuning for the 3D avatar consumer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvatarSettings {
    pub padding: BoxPadding,
    pub mirror: bool,
    pub box_hold: Duration,
    pub position_rate: f32,
    pub scale_rate: f32,
    pub rotation_rate: f32,
    pub expression_factor: f32,
    pub gaze_factor: f32,
    pub gaze_scale: f32,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            padding: BoxPadding::AVATAR,
            mirror: false,
            box_hold: Duration::from_millis(FACE_BOX_HOLD_MS),
            position_rate: POSITION_RATE,
            scale_rate: SCALE_RATE,
            rotation_rate: ROTATION_RATE,
            expression_factor: EXPRESSION_FACTOR,
            gaze_factor: GAZE_FACTOR,
            gaze_scale: GAZE_SCALE,
        }
    }
}

/// Smoothed avatar placement for one display frame
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarPose {
    /// False when there is no face box to place the avatar in
    pub visible: bool,
    /// Last-known avatar face box in frame pixels
    pub face_box: Option<FaceBox>,
    /// Smoothed face box center in frame pixels
    pub position: Vector2<f32>,
    /// Smoothed head size in pixels (larger box side)
    pub scale: f32,
    /// Smoothed head orientation, mirrored when mirroring is on
    pub rotation: UnitQuaternion<f32>,
    /// Smoothed expression weights in `[0, 1]`
    pub expressions: ExpressionWeights,
}

impl AvatarPose {
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            visible: false,
            face_box: None,
            position: Vector2::zeros(),
            scale: 0.0,
            rotation: UnitQuaternion::identity(),
            expressions: ExpressionWeights::new(),
        }
    }
}

/// Per-display-frame smoothing for the 3D avatar overlay
#[derive(Debug, Clone)]
pub struct AvatarStabilizer {
    padding: BoxPadding,
    mirror: bool,
    continuous: bool,
    face_box: HeldValue<FaceBox>,
    last_capture: Option<Duration>,
    position: ExponentialSmoother<Vector2<f32>>,
    scale: ExponentialSmoother<f32>,
    rotation: RotationSmoother,
    expressions: ExpressionSmoother,
}

impl Default for AvatarStabilizer {
    fn default() -> Self {
        Self::new(AvatarSettings::default())
    }
}

impl AvatarStabilizer {
    #[must_use]
    pub fn new(settings: AvatarSettings) -> Self {
        Self {
            padding: settings.padding,
            mirror: settings.mirror,
            continuous: false,
            face_box: HeldValue::new(settings.box_hold),
            last_capture: None,
            position: ExponentialSmoother::new(settings.position_rate),
            scale: ExponentialSmoother::new(settings.scale_rate),
            rotation: RotationSmoother::new(settings.rotation_rate, settings.mirror),
            expressions: ExpressionSmoother::new(settings.expression_factor, settings.gaze_factor, settings.gaze_scale),
        }
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        if mirror != self.mirror {
            self.mirror = mirror;
            self.rotation.set_mirror(mirror);
            // Box and position live in the other half of the frame now
            self.face_box.clear();
            self.last_capture = None;
            self.position.reset();
        }
    }

    /// In continuous mode the box is re-derived from the held snapshot on
    /// every frame, so the avatar never times out while a snapshot exists
    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    /// Advance one display frame.
    ///
    /// `now` drives the face-box hold; `dt` is the real time elapsed since
    /// the previous display frame and drives smoothing. The box hold counts
    /// from the last snapshot with a new capture time. An unknown frame
    /// size or a missing snapshot without a held box hides the avatar.
    pub fn update(&mut self, snapshot: Option<&PoseSnapshot>, frame: FrameSize, now: Duration, dt: Duration) -> AvatarPose {
        if !frame.is_known() {
            return AvatarPose::hidden();
        }

        let new_capture = snapshot.filter(|s| self.continuous || self.last_capture != Some(s.captured_at()));
        if let Some(s) = new_capture {
            self.last_capture = Some(s.captured_at());
        }
        let derived = new_capture.and_then(|s| derive_face_box(s.landmarks(), frame, self.padding, self.mirror));
        if self.face_box.observe(derived, now) == HoldState::Expired {
            debug!("Avatar face box hold expired");
        }

        let Some(target) = self.face_box.current().copied() else {
            self.reset();
            return AvatarPose::hidden();
        };

        let (cx, cy) = target.center();
        let position = self.position.apply(Vector2::new(cx, cy), dt);
        let scale = self.scale.apply(target.width.max(target.height), dt);

        if let Some(matrix) = snapshot.and_then(PoseSnapshot::finite_transform) {
            self.rotation.apply_matrix(matrix, dt);
        }
        if let Some(weights) = snapshot.and_then(PoseSnapshot::expressions) {
            self.expressions.apply(weights);
        }

        AvatarPose {
            visible: true,
            face_box: Some(target),
            position,
            scale,
            rotation: self.rotation.current().unwrap_or_else(UnitQuaternion::identity),
            expressions: self.expressions.weights().clone(),
        }
    }

    /// Drop all smoothing state so the next appearance snaps
    pub fn reset(&mut self) {
        self.position.reset();
        self.scale.reset();
        self.rotation.reset();
        self.expressions.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LandmarkPoint;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn snapshot(x: f32, at: Duration) -> PoseSnapshot {
        PoseSnapshot::new(
            vec![LandmarkPoint::new(x, 0.4), LandmarkPoint::new(x + 0.2, 0.6)],
            None,
            None,
            at,
        )
    }

    #[test]
    fn test_snapshot_becomes_effective_immediately() {
        let mut stabilizer = TemporalStabilizer::default();
        assert_eq!(stabilizer.update(Some(snapshot(0.1, ms(0))), ms(0)), HoldState::Fresh);
        assert_eq!(stabilizer.effective().unwrap().captured_at(), ms(0));
    }

    #[test]
    fn test_continuous_mode_never_clears() {
        let mut stabilizer = TemporalStabilizer::default();
        stabilizer.set_continuous(true);
        stabilizer.update(Some(snapshot(0.1, ms(0))), ms(0));
        assert_eq!(stabilizer.update(None, ms(60_000)), HoldState::Held);
        assert!(stabilizer.effective().is_some());
    }

    #[test]
    fn test_avatar_hidden_without_frame_size() {
        let mut avatar = AvatarStabilizer::default();
        let s = snapshot(0.3, ms(0));
        let pose = avatar.update(Some(&s), FrameSize::default(), ms(0), ms(16));
        assert!(!pose.visible);
    }

    #[test]
    fn test_avatar_first_frame_snaps_to_box_center() {
        let mut avatar = AvatarStabilizer::default();
        let s = snapshot(0.3, ms(0));
        let frame = FrameSize::new(640, 480);
        let pose = avatar.update(Some(&s), frame, ms(0), ms(16));
        let expected = derive_face_box(s.landmarks(), frame, BoxPadding::AVATAR, false).unwrap();
        assert!(pose.visible);
        assert_eq!((pose.position.x, pose.position.y), expected.center());
        assert_eq!(pose.scale, expected.width.max(expected.height));
    }

    #[test]
    fn test_avatar_box_hold_then_hide() {
        let mut avatar = AvatarStabilizer::default();
        let frame = FrameSize::new(640, 480);
        let s = snapshot(0.3, ms(0));
        avatar.update(Some(&s), frame, ms(0), ms(16));
        assert!(avatar.update(None, frame, ms(1500), ms(16)).visible);
        assert!(!avatar.update(None, frame, ms(1501), ms(16)).visible);
    }

    #[test]
    fn test_avatar_hold_counts_from_new_capture() {
        let mut avatar = AvatarStabilizer::default();
        let frame = FrameSize::new(640, 480);
        let s = snapshot(0.3, ms(0));
        avatar.update(Some(&s), frame, ms(0), ms(16));
        // The same held snapshot on later frames does not refresh the box
        assert!(avatar.update(Some(&s), frame, ms(1000), ms(16)).visible);
        assert!(!avatar.update(Some(&s), frame, ms(1501), ms(16)).visible);

        avatar.set_continuous(true);
        assert!(avatar.update(Some(&s), frame, ms(9000), ms(16)).visible);
    }
}
