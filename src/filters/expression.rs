use crate::constants::{EXPRESSION_FACTOR, GAZE_FACTOR, GAZE_MARKER, GAZE_SCALE};
use crate::types::ExpressionWeights;

/// Whether an expression weight drives gaze/eye direction
#[must_use]
pub fn is_gaze_weight(name: &str) -> bool {
    name.to_ascii_lowercase().contains(GAZE_MARKER)
}

/// Per-frame linear interpolation of named expression weights.
///
/// Gaze weights are scaled down and follow more slowly than the other
/// channels. Every output is clamped to `[0, 1]`; a channel seen for the
/// first time starts from 0.
#[derive(Debug, Clone)]
pub struct ExpressionSmoother {
    factor: f32,
    gaze_factor: f32,
    gaze_scale: f32,
    weights: ExpressionWeights,
}

impl Default for ExpressionSmoother {
    fn default() -> Self {
        Self::new(EXPRESSION_FACTOR, GAZE_FACTOR, GAZE_SCALE)
    }
}

impl ExpressionSmoother {
    /// Create a new expression smoother
    ///
    /// # Panics
    ///
    /// Panics if either factor is not in (0, 1] or the gaze scale is negative
    #[must_use]
    pub fn new(factor: f32, gaze_factor: f32, gaze_scale: f32) -> Self {
        assert!(factor > 0.0 && factor <= 1.0, "Factor must be in (0, 1]");
        assert!(gaze_factor > 0.0 && gaze_factor <= 1.0, "Factor must be in (0, 1]");
        assert!(gaze_scale >= 0.0, "Gaze scale must be non-negative");
        Self {
            factor,
            gaze_factor,
            gaze_scale,
            weights: ExpressionWeights::new(),
        }
    }

    /// Move every named weight toward its latest target.
    ///
    /// Channels missing from `targets` keep their value; non-finite targets
    /// are skipped.
    pub fn apply(&mut self, targets: &ExpressionWeights) -> &ExpressionWeights {
        for (name, &target) in targets {
            if !target.is_finite() {
                continue;
            }
            let (target, factor) = if is_gaze_weight(name) {
                (target * self.gaze_scale, self.gaze_factor)
            } else {
                (target, self.factor)
            };

            let prev = self.weights.get(name).copied().unwrap_or(0.0);
            let next = factor.mul_add(target - prev, prev).clamp(0.0, 1.0);
            self.weights.insert(name.clone(), next);
        }
        &self.weights
    }

    #[must_use]
    pub fn weights(&self) -> &ExpressionWeights {
        &self.weights
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f32> {
        self.weights.get(name).copied()
    }

    pub fn reset(&mut self) {
        self.weights.clear();
    }
}
