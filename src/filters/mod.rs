//! Signal smoothing for overlay alignment.
//!
//! Live detector output is independent per frame and jitters. These
//! smoothers trade a little latency for stable overlay motion. Time-based
//! smoothers use the factor `1 - e^(-k * dt)` so the result does not depend
//! on the display refresh rate, and snap to the first target they see.

/// Time-based exponential smoothing for scalars and 2D positions
pub mod exponential;

/// Spherical interpolation of orientations extracted from transform matrices
pub mod rotation;

/// Per-frame interpolation of named expression weights
pub mod expression;

use std::time::Duration;

/// Trait for smoothers that approach a target over elapsed real time
pub trait Smoother {
    /// Smoothed signal type
    type Value;

    /// Move toward `target` given the time elapsed since the previous frame
    fn apply(&mut self, target: Self::Value, dt: Duration) -> Self::Value;

    /// Current smoothed value, `None` before the first target
    fn current(&self) -> Option<Self::Value>;

    /// Forget all state so the next target snaps
    fn reset(&mut self);

    /// Get smoother name
    fn name(&self) -> &str;
}

/// Interpolation factor `1 - e^(-rate * dt)`, always in `[0, 1)`
#[must_use]
pub fn smoothing_factor(rate: f32, dt: Duration) -> f32 {
    let t = 1.0 - (-rate * dt.as_secs_f32()).exp();
    t.clamp(0.0, 1.0)
}

/// Number of frames at fixed `dt` needed for the remaining error to fall
/// below `epsilon` times the initial error
#[must_use]
pub fn frames_to_converge(rate: f32, dt: Duration, epsilon: f32) -> Option<u32> {
    let t = smoothing_factor(rate, dt);
    if t <= 0.0 || epsilon <= 0.0 || epsilon >= 1.0 {
        return None;
    }
    if t >= 1.0 {
        return Some(1);
    }
    // Remaining error after n frames is (1 - t)^n
    let n = (epsilon.ln() / (1.0 - t).ln()).ceil();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // n is a small positive count
    Some(n as u32)
}
