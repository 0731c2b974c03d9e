//! Overlay renderer contract and render-on-demand scheduling.
//!
//! The 3D renderer is external. It reads the effective snapshot, the frame
//! size and the smoothed avatar pose on ticks the scheduler grants, and
//! writes nothing back.

use crate::constants::DEFAULT_RENDER_MAX_FPS;
use crate::stabilizer::AvatarPose;
use crate::types::{FrameSize, PoseSnapshot};
use std::time::Duration;

/// External 3D overlay renderer
pub trait OverlayRenderer {
    /// Draw one overlay frame.
    ///
    /// `frame` may be zero-sized before the first video frame and `snapshot`
    /// may be absent; the renderer should draw nothing or hide in that case.
    fn render(&mut self, frame: FrameSize, snapshot: Option<&PoseSnapshot>, pose: &AvatarPose);
}

/// Decides on which display frames the overlay renderer runs.
///
/// While enabled the renderer is invalidated at most once per interval.
/// Enabling or disabling invalidates once more so the renderer can show or
/// hide the overlay; while disabled nothing else is scheduled.
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    min_interval: Duration,
    enabled: bool,
    invalidated: bool,
    last_render: Option<Duration>,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_MAX_FPS)
    }
}

impl RenderScheduler {
    /// Create a scheduler capped at `max_fps` renders per second
    ///
    /// # Panics
    ///
    /// Panics if max_fps is zero
    #[must_use]
    pub fn new(max_fps: u32) -> Self {
        assert!(max_fps > 0, "Max FPS must be greater than 0");
        Self {
            min_interval: Duration::from_secs(1) / max_fps,
            enabled: false,
            invalidated: false,
            last_render: None,
        }
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            self.enabled = enabled;
            self.invalidated = true;
        }
    }

    /// Request a render on the next display frame
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Whether the renderer should run on this display frame
    pub fn should_render(&mut self, now: Duration) -> bool {
        let interval_elapsed = self
            .last_render
            .map_or(true, |last| now.saturating_sub(last) >= self.min_interval);

        let render = self.invalidated || (self.enabled && interval_elapsed);
        if render {
            self.invalidated = false;
            self.last_render = Some(now);
        }
        render
    }
}
